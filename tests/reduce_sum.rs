use std::io;
use std::sync::{mpsc, Mutex};
use std::thread;
use std::time::Duration;

use mpsum::console::Console;
use mpsum::reduce_sum::{self, ConsoleReport, RankSummary, Report, Silent, COORDINATOR};
use mpsum::traits::*;
use mpsum::topology::Rank;
use mpsum::Error;

fn run_static<S: Accumulate>(array: &[i32], ranks: usize) -> Vec<RankSummary<S>> {
    mpsum::initialize(ranks)
        .unwrap()
        .launch(|world| reduce_sum::static_sum::<_, S>(&world, array, &mut Silent))
        .unwrap()
}

fn run_scatter<S: Accumulate>(array: &[i32], ranks: usize) -> mpsum::Result<Vec<RankSummary<S>>> {
    mpsum::initialize(ranks).unwrap().launch(|world| {
        if world.rank() == COORDINATOR {
            let mut source = array.to_vec();
            reduce_sum::scatter_sum::<_, S>(&world, Some(&mut source), &mut Silent)
        } else {
            reduce_sum::scatter_sum::<_, S>(&world, None, &mut Silent)
        }
    })
}

fn partials<S: Copy>(summaries: &[RankSummary<S>]) -> Vec<S> {
    summaries.iter().map(|s| s.partial).collect()
}

#[test]
fn static_eight_elements_on_four_ranks() {
    let summaries = run_static::<i32>(&[10, 20, 30, 40, 50, 60, 70, 80], 4);
    assert_eq!(partials(&summaries), vec![30, 70, 110, 150]);
    assert_eq!(summaries[0].total, Some(360));
    assert!(summaries[1..].iter().all(|s| s.total.is_none()));
    for (rank, summary) in summaries.iter().enumerate() {
        assert_eq!(summary.rank as usize, rank);
        assert_eq!(summary.chunk.len(), 2);
    }
}

#[test]
fn static_remainder_goes_to_last_rank() {
    let array: Vec<i32> = (1..=10).collect();
    let summaries = run_static::<i32>(&array, 4);
    let chunks: Vec<_> = summaries.iter().map(|s| s.chunk.clone()).collect();
    assert_eq!(chunks, vec![0..2, 2..4, 4..6, 6..10]);
    assert_eq!(partials(&summaries), vec![3, 7, 11, 34]);
    assert_eq!(summaries[0].total, Some(55));
}

#[test]
fn partial_sums_add_up_to_the_array_sum() {
    for ranks in 1..7 {
        for len in [0usize, 1, 5, 12, 17] {
            let array: Vec<i32> = (0..len as i32).map(|x| x * 3 - 7).collect();
            let expected: i32 = array.iter().sum();

            let summaries = run_static::<i32>(&array, ranks);
            assert_eq!(partials(&summaries).iter().sum::<i32>(), expected);
            assert_eq!(summaries[0].total, Some(expected));

            if len % ranks == 0 {
                let summaries = run_scatter::<i32>(&array, ranks).unwrap();
                assert_eq!(partials(&summaries).iter().sum::<i32>(), expected);
                assert_eq!(summaries[0].total, Some(expected));
            }
        }
    }
}

#[test]
fn repeated_runs_agree() {
    let array: Vec<i32> = (0..64).map(|x| (x * 37) % 23 - 11).collect();
    let first = run_static::<i64>(&array, 5)[0].total;
    for _ in 0..10 {
        assert_eq!(run_static::<i64>(&array, 5)[0].total, first);
        assert_eq!(run_scatter::<i64>(&array, 4).unwrap()[0].total, first);
    }
}

#[test]
fn empty_array() {
    let summaries = run_static::<i32>(&[], 3);
    assert_eq!(partials(&summaries), vec![0, 0, 0]);
    assert_eq!(summaries[0].total, Some(0));

    let summaries = run_scatter::<i32>(&[], 3).unwrap();
    assert!(summaries.iter().all(|s| s.chunk.is_empty()));
    assert_eq!(summaries[0].total, Some(0));
}

#[test]
fn single_rank_owns_everything() {
    let array = [5, -3, 9, 1, 1];
    let summaries = run_static::<i32>(&array, 1);
    assert_eq!(summaries[0].chunk, 0..5);
    assert_eq!(summaries[0].total, Some(13));
    assert_eq!(run_scatter::<i32>(&array, 1).unwrap()[0].total, Some(13));
}

#[test]
fn scatter_six_elements_on_three_ranks() {
    let summaries = run_scatter::<i32>(&[1, 2, 3, 4, 5, 6], 3).unwrap();
    let chunks: Vec<_> = summaries.iter().map(|s| s.chunk.clone()).collect();
    assert_eq!(chunks, vec![0..2, 2..4, 4..6]);
    assert_eq!(partials(&summaries), vec![3, 7, 11]);
    assert_eq!(summaries[0].total, Some(21));
}

#[test]
fn scatter_rejects_indivisible_length() {
    let prompted = Mutex::new(String::new());
    let err = mpsum::initialize(4)
        .unwrap()
        .launch(|world| {
            if world.rank() == COORDINATOR {
                let mut console = Console::new(&b"9\n1 2 3 4 5 6 7 8 9\n"[..], Vec::new());
                let result = reduce_sum::scatter_sum::<_, i32>(&world, Some(&mut console), &mut Silent);
                *prompted.lock().unwrap() = String::from_utf8(console.into_output()).unwrap();
                result
            } else {
                reduce_sum::scatter_sum::<_, i32>(&world, None, &mut Silent)
            }
        })
        .unwrap_err();
    assert!(matches!(err, Error::Aborted { code: 1, origin: 0 }));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(
        *prompted.lock().unwrap(),
        "Enter total number of elements: \
         Please enter a number divisible by 4 (number of processes).\n"
    );
}

#[test]
fn scatter_aborts_on_malformed_input() {
    let err = mpsum::initialize(2)
        .unwrap()
        .launch(|world| {
            if world.rank() == COORDINATOR {
                let mut console = Console::new(&b"4\n1 2 x 4\n"[..], Vec::new());
                reduce_sum::scatter_sum::<_, i32>(&world, Some(&mut console), &mut Silent)
            } else {
                reduce_sum::scatter_sum::<_, i32>(&world, None, &mut Silent)
            }
        })
        .unwrap_err();
    assert!(matches!(err, Error::Aborted { code: 1, origin: 0 }));
}

#[test]
fn scatter_aborts_on_negative_length() {
    let err = mpsum::initialize(2)
        .unwrap()
        .launch(|world| {
            if world.rank() == COORDINATOR {
                let mut console = Console::new(&b"-4\n"[..], Vec::new());
                reduce_sum::scatter_sum::<_, i32>(&world, Some(&mut console), &mut Silent)
            } else {
                reduce_sum::scatter_sum::<_, i32>(&world, None, &mut Silent)
            }
        })
        .unwrap_err();
    assert!(err.is_abort());
}

#[test]
fn narrow_accumulator_wraps_and_wide_does_not() {
    let array = [i32::MAX, i32::MAX];
    assert_eq!(run_static::<i32>(&array, 2)[0].total, Some(-2));
    assert_eq!(
        run_static::<i64>(&array, 2)[0].total,
        Some(2 * i64::from(i32::MAX))
    );
}

#[test]
fn console_report_format() {
    let lines = mpsum::initialize(2)
        .unwrap()
        .launch(|world| {
            let mut report = ConsoleReport::new(Vec::new());
            reduce_sum::static_sum::<_, i32>(&world, &[1, 2, 3, 4], &mut report)?;
            Ok(String::from_utf8(report.into_inner()).unwrap())
        })
        .unwrap();
    assert_eq!(lines[0], "Process 0: Partial Sum = 3\nTotal Sum = 10\n");
    assert_eq!(lines[1], "Process 1: Partial Sum = 7\n");
}

/// Fails like a report writing into a closed pipe.
struct ClosedPipe;

impl Report<i32> for ClosedPipe {
    fn partial(&mut self, _rank: Rank, _partial: i32) -> mpsum::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed").into())
    }

    fn total(&mut self, _total: i32) -> mpsum::Result<()> {
        Ok(())
    }
}

#[test]
fn report_failure_on_one_rank_halts_the_group() {
    let (done, finished) = mpsc::channel();
    thread::spawn(move || {
        let outcome = mpsum::initialize(3).unwrap().launch(|world| {
            if world.rank() == 1 {
                reduce_sum::static_sum::<_, i32>(&world, &[1, 2, 3, 4, 5, 6], &mut ClosedPipe)
            } else {
                reduce_sum::static_sum::<_, i32>(&world, &[1, 2, 3, 4, 5, 6], &mut Silent)
            }
        });
        let _ = done.send(outcome.map(|summaries| summaries.len()));
    });

    let err = finished
        .recv_timeout(Duration::from_secs(10))
        .expect("launch did not return")
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert_eq!(err.exit_code(), 1);
}
