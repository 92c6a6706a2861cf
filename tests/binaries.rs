use std::io::Write;
use std::process::{Command, Output, Stdio};

fn run(exe: &str, args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(exe)
        .args(args)
        .env_remove("MPSUM_RANKS")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

#[test]
fn static_sum_of_the_built_in_array() {
    let output = run(env!("CARGO_BIN_EXE_static-sum"), &["-n", "4"], "");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    for line in [
        "Process 0: Partial Sum = 30",
        "Process 1: Partial Sum = 70",
        "Process 2: Partial Sum = 110",
        "Process 3: Partial Sum = 150",
        "Total Sum = 360",
    ] {
        assert!(stdout.lines().any(|l| l == line), "missing {:?} in {:?}", line, stdout);
    }
}

#[test]
fn static_sum_of_given_values_with_remainder() {
    let output = run(
        env!("CARGO_BIN_EXE_static-sum"),
        &["-n", "3", "--", "1", "-2", "3", "4"],
        "",
    );
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.lines().any(|l| l == "Process 2: Partial Sum = 7"));
    assert!(stdout.lines().any(|l| l == "Total Sum = 6"));
}

#[test]
fn scatter_sum_reads_the_array_from_stdin() {
    let output = run(
        env!("CARGO_BIN_EXE_scatter-sum"),
        &["-n", "3"],
        "6\n1 2 3 4 5 6\n",
    );
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("Enter total number of elements: "));
    assert!(stdout.contains("Enter 6 integers:\n"));
    assert!(stdout.lines().any(|l| l == "Process 1: Partial Sum = 7"));
    assert!(stdout.lines().any(|l| l == "Total Sum = 21"));
}

#[test]
fn scatter_sum_exits_with_status_one_on_indivisible_length() {
    let output = run(env!("CARGO_BIN_EXE_scatter-sum"), &["-n", "4"], "9\n");
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Please enter a number divisible by 4 (number of processes).\n"));
    assert!(!stdout.contains("Total Sum"));
}

#[test]
fn scatter_sum_exits_with_status_one_on_malformed_input() {
    let output = run(env!("CARGO_BIN_EXE_scatter-sum"), &["-n", "2"], "2\n1 x\n");
    assert_eq!(output.status.code(), Some(1));
}
