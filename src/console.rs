//! Coordinator input from an interactive console
//!
//! Only the coordinator reads input. Numbers are whitespace-delimited and may be spread over
//! any number of lines, the way `scanf("%d")` consumes them.
use std::collections::VecDeque;
use std::io::{BufRead, Write};

use conv::ConvUtil;

use crate::error::{Error, Result};

/// Where the coordinator gets the global array from.
pub trait ArraySource {
    /// Read the number of elements `N`.
    fn read_len(&mut self) -> Result<i64>;

    /// Tell the operator that `len` cannot be split across `group_size` processes.
    fn reject(&mut self, len: i64, group_size: usize) -> Result<()>;

    /// Read the `len` elements of the array.
    fn read_values(&mut self, len: usize) -> Result<Vec<i32>>;
}

/// An in-memory array, e.g. one given on the command line.
impl ArraySource for Vec<i32> {
    fn read_len(&mut self) -> Result<i64> {
        self.len()
            .value_as::<i64>()
            .map_err(|_| Error::InvalidLength(i64::MAX))
    }

    fn reject(&mut self, _len: i64, _group_size: usize) -> Result<()> {
        Ok(())
    }

    fn read_values(&mut self, len: usize) -> Result<Vec<i32>> {
        if self.len() < len {
            return Err(Error::UnexpectedEof { what: "array elements" });
        }
        Ok(self.drain(..len).collect())
    }
}

/// Prompts on `output` and reads whitespace-delimited integers from `input`.
pub struct Console<R, W> {
    input: R,
    output: W,
    pending: VecDeque<String>,
}

impl<R: BufRead, W: Write> Console<R, W> {
    /// A console reading from `input` and prompting on `output`
    pub fn new(input: R, output: W) -> Self {
        Console {
            input,
            output,
            pending: VecDeque::new(),
        }
    }

    /// Give back the output, e.g. to inspect what was prompted
    pub fn into_output(self) -> W {
        self.output
    }

    fn next_token(&mut self, what: &'static str) -> Result<String> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(token);
            }
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(Error::UnexpectedEof { what });
            }
            self.pending
                .extend(line.split_whitespace().map(str::to_owned));
        }
    }

    fn next_number<T>(&mut self, what: &'static str) -> Result<T>
    where
        T: std::str::FromStr<Err = std::num::ParseIntError>,
    {
        let token = self.next_token(what)?;
        token
            .parse()
            .map_err(|source| Error::Parse { token, source })
    }
}

impl<R: BufRead, W: Write> ArraySource for Console<R, W> {
    fn read_len(&mut self) -> Result<i64> {
        write!(self.output, "Enter total number of elements: ")?;
        self.output.flush()?;
        self.next_number("the number of elements")
    }

    fn reject(&mut self, _len: i64, group_size: usize) -> Result<()> {
        writeln!(
            self.output,
            "Please enter a number divisible by {} (number of processes).",
            group_size
        )?;
        self.output.flush()?;
        Ok(())
    }

    fn read_values(&mut self, len: usize) -> Result<Vec<i32>> {
        writeln!(self.output, "Enter {} integers:", len)?;
        self.output.flush()?;
        (0..len)
            .map(|_| self.next_number("array elements"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console(input: &str) -> Console<&[u8], Vec<u8>> {
        Console::new(input.as_bytes(), Vec::new())
    }

    #[test]
    fn reads_length_and_values_across_lines() {
        let mut c = console("6\n1 2\n3\n  4 5 6  \n");
        assert_eq!(c.read_len().unwrap(), 6);
        assert_eq!(c.read_values(6).unwrap(), vec![1, 2, 3, 4, 5, 6]);
        let prompted = String::from_utf8(c.into_output()).unwrap();
        assert_eq!(
            prompted,
            "Enter total number of elements: Enter 6 integers:\n"
        );
    }

    #[test]
    fn values_on_the_same_line_as_the_length() {
        let mut c = console("3 7 8 9");
        assert_eq!(c.read_len().unwrap(), 3);
        assert_eq!(c.read_values(3).unwrap(), vec![7, 8, 9]);
    }

    #[test]
    fn rejection_names_the_group_size() {
        let mut c = console("9\n");
        assert_eq!(c.read_len().unwrap(), 9);
        c.reject(9, 4).unwrap();
        let prompted = String::from_utf8(c.into_output()).unwrap();
        assert!(prompted
            .ends_with("Please enter a number divisible by 4 (number of processes).\n"));
    }

    #[test]
    fn malformed_input() {
        let mut c = console("four\n");
        match c.read_len() {
            Err(Error::Parse { token, .. }) => assert_eq!(token, "four"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn truncated_input() {
        let mut c = console("4\n1 2\n");
        assert_eq!(c.read_len().unwrap(), 4);
        assert!(matches!(
            c.read_values(4),
            Err(Error::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn in_memory_source() {
        let mut source = vec![1, 2, 3];
        assert_eq!(source.read_len().unwrap(), 3);
        assert_eq!(source.read_values(3).unwrap(), vec![1, 2, 3]);
    }
}
