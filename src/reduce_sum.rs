//! Distributed summation of an integer array
//!
//! Both variants run the same three phases on every rank: resolve the rank's part of the array,
//! sum it locally, and reduce the partial sums onto the coordinator (rank `0`).
//!
//! - `static_sum`: every rank sees the whole array and resolves its range with a
//!   `BlockPartition`; the last rank takes the remainder.
//! - `scatter_sum`: only the coordinator has the array. It validates that the group size divides
//!   the length, broadcasts the length and scatters equal chunks.
//!
//! A failed validation on the coordinator aborts the whole group, since every other rank is
//! already waiting in the broadcast.
use std::fmt;
use std::io::{self, Write};
use std::ops::Range;

use conv::ConvUtil;
use log::{debug, error};

use crate::collective::{traits::*, SystemOperation};
use crate::console::ArraySource;
use crate::datatype::traits::*;
use crate::error::{Error, Result};
use crate::partition::BlockPartition;
use crate::topology::traits::*;
use crate::topology::Rank;

/// Rank of the coordinator
pub const COORDINATOR: Rank = 0;

/// Error code the group is aborted with when the coordinator rejects its input
pub const INPUT_ERROR_CODE: i32 = 1;

/// The phases a rank goes through, in order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Group established
    Init,
    /// Coordinator reads and validates the array
    Load,
    /// Workers wait for the coordinator
    Wait,
    /// Length of the array is broadcast
    Broadcast,
    /// Chunks are scattered
    Scatter,
    /// Each rank sums its chunk
    LocalSum,
    /// Partial sums are reduced onto the coordinator
    Reduce,
    /// Result reported
    Done,
}

fn enter<C: Communicator>(world: &C, phase: Phase) {
    debug!("rank {}: {:?}", world.rank(), phase);
}

/// Receives the results of a run as they become available.
pub trait Report<S> {
    /// Called by every rank after summing its chunk
    fn partial(&mut self, rank: Rank, partial: S) -> Result<()>;
    /// Called once, on the coordinator, after the reduction
    fn total(&mut self, total: S) -> Result<()>;
}

/// Prints results in the format `Process {rank}: Partial Sum = {value}` and
/// `Total Sum = {value}`.
pub struct ConsoleReport<W> {
    out: W,
}

impl<W: Write> ConsoleReport<W> {
    /// Report on `out`
    pub fn new(out: W) -> Self {
        ConsoleReport { out }
    }

    /// Give back the underlying writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl ConsoleReport<io::Stdout> {
    /// Report on standard output
    pub fn stdout() -> Self {
        ConsoleReport::new(io::stdout())
    }
}

impl<W: Write, S: fmt::Display> Report<S> for ConsoleReport<W> {
    fn partial(&mut self, rank: Rank, partial: S) -> Result<()> {
        writeln!(self.out, "Process {}: Partial Sum = {}", rank, partial)?;
        self.out.flush()?;
        Ok(())
    }

    fn total(&mut self, total: S) -> Result<()> {
        writeln!(self.out, "Total Sum = {}", total)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Discards all results.
#[derive(Copy, Clone, Debug)]
pub struct Silent;

impl<S> Report<S> for Silent {
    fn partial(&mut self, _rank: Rank, _partial: S) -> Result<()> {
        Ok(())
    }
    fn total(&mut self, _total: S) -> Result<()> {
        Ok(())
    }
}

/// What one rank did during a run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankSummary<S> {
    /// The reporting rank
    pub rank: Rank,
    /// The part of the global array this rank summed
    pub chunk: Range<usize>,
    /// Sum of the rank's chunk
    pub partial: S,
    /// Sum of all partial sums; only the coordinator has one
    pub total: Option<S>,
}

/// Sum a chunk of the array, wrapping on overflow.
///
/// # Examples
///
/// ```
/// use mpsum::reduce_sum::local_sum;
///
/// assert_eq!(local_sum::<i32>(&[10, 20, 30]), 60);
/// assert_eq!(local_sum::<i64>(&[i32::MAX, 1]), i64::from(i32::MAX) + 1);
/// ```
pub fn local_sum<S: Accumulate>(chunk: &[i32]) -> S {
    chunk.iter().fold(S::default(), |acc, &x| acc.accumulate(x))
}

/// Sum `partial` over the group onto the coordinator.
fn reduce_to_coordinator<C, S>(world: &C, partial: S) -> Result<Option<S>>
where
    C: Communicator,
    S: Accumulate,
{
    let coordinator = world.process_at_rank(COORDINATOR)?;
    if coordinator.is_self() {
        let mut total = S::default();
        coordinator.reduce_into_root(&partial, &mut total, SystemOperation::sum())?;
        Ok(Some(total))
    } else {
        coordinator.reduce_into(&partial, SystemOperation::sum())?;
        Ok(None)
    }
}

/// Sum and report a rank's chunk, then reduce and report the total.
fn aggregate<C, S>(
    world: &C,
    chunk: Range<usize>,
    values: &[i32],
    report: &mut dyn Report<S>,
) -> Result<RankSummary<S>>
where
    C: Communicator,
    S: Accumulate,
{
    enter(world, Phase::LocalSum);
    let partial = local_sum::<S>(values);
    report.partial(world.rank(), partial)?;

    enter(world, Phase::Reduce);
    let total = reduce_to_coordinator(world, partial)?;
    if let Some(total) = total {
        report.total(total)?;
    }

    enter(world, Phase::Done);
    Ok(RankSummary {
        rank: world.rank(),
        chunk,
        partial,
        total,
    })
}

fn group_size<C: Communicator>(world: &C) -> Result<usize> {
    let size = world.size();
    size.value_as::<usize>()
        .map_err(|_| Error::InvalidRank {
            rank: i64::from(size),
            size,
        })
}

/// Sum an array that every rank holds a copy of.
///
/// Each rank sums `BlockPartition::new(array.len(), size).range(rank)` and the partial sums are
/// reduced onto the coordinator. Never aborts the group.
pub fn static_sum<C, S>(
    world: &C,
    array: &[i32],
    report: &mut dyn Report<S>,
) -> Result<RankSummary<S>>
where
    C: Communicator,
    S: Accumulate,
{
    enter(world, Phase::Init);
    let partition = BlockPartition::new(array.len(), group_size(world)?)?;
    let chunk = partition.range(world.rank())?;
    aggregate(world, chunk.clone(), &array[chunk], report)
}

/// Abort the group because the coordinator cannot go on with its input.
fn reject_input<C: Communicator>(world: &C, err: Error) -> Error {
    error!("coordinator rejected its input: {}", err);
    world.abort(INPUT_ERROR_CODE)
}

/// Read and validate the array on the coordinator.
fn load<C: Communicator>(world: &C, source: &mut dyn ArraySource) -> Result<Vec<i32>> {
    let size = group_size(world)?;
    let len = source.read_len().map_err(|err| reject_input(world, err))?;
    let len_usize = len
        .value_as::<usize>()
        .map_err(|_| reject_input(world, Error::InvalidLength(len)))?;
    if let Err(err) = BlockPartition::even(len_usize, size) {
        source
            .reject(len, size)
            .map_err(|err| reject_input(world, err))?;
        return Err(reject_input(world, err));
    }
    source
        .read_values(len_usize)
        .map_err(|err| reject_input(world, err))
}

/// Sum an array that only the coordinator holds, distributing it in equal chunks.
///
/// `source` must be `Some` on the coordinator and is ignored elsewhere. If the coordinator
/// cannot read its input, or the group size does not divide the length, the group is aborted
/// with error code `1` and every rank returns `Error::Aborted`.
pub fn scatter_sum<C, S>(
    world: &C,
    source: Option<&mut dyn ArraySource>,
    report: &mut dyn Report<S>,
) -> Result<RankSummary<S>>
where
    C: Communicator,
    S: Accumulate,
{
    enter(world, Phase::Init);
    let coordinator = world.process_at_rank(COORDINATOR)?;

    let (mut len, array) = if coordinator.is_self() {
        enter(world, Phase::Load);
        let array = match source {
            Some(source) => load(world, source)?,
            None => return Err(reject_input(world, Error::UnexpectedEof { what: "input" })),
        };
        let len = array
            .len()
            .value_as::<u64>()
            .map_err(|_| reject_input(world, Error::InvalidLength(i64::MAX)))?;
        (len, array)
    } else {
        enter(world, Phase::Wait);
        (0u64, Vec::new())
    };

    enter(world, Phase::Broadcast);
    coordinator.broadcast_into(&mut len)?;

    enter(world, Phase::Scatter);
    let len = len
        .value_as::<usize>()
        .map_err(|_| reject_input(world, Error::InvalidLength(i64::MAX)))?;
    let partition = BlockPartition::even(len, group_size(world)?)?;
    let mut chunk = vec![0i32; partition.chunk_len()];
    if coordinator.is_self() {
        coordinator.scatter_into_root(&array[..], &mut chunk[..])?;
    } else {
        coordinator.scatter_into(&mut chunk[..])?;
    }
    let range = partition.range(world.rank())?;

    aggregate(world, range, &chunk, report)
}
