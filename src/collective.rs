//! Collective communication
//!
//! Every collective operation is a blocking rendezvous: all ranks of the communicator must call
//! the same operations in the same order, with matching counts and the same root. A rank that
//! skips a call leaves its peers blocked.
//!
//! Argument mismatches that only one rank can see (a root buffer of the wrong length, a chunk
//! that does not fit the receive buffer) abort the whole group with error code `1`, so that no
//! peer is left waiting for a message that will never come.
//!
//! # Unfinished features
//!
//! - Varying counts operations
//! - All to all
//! - Scans
//! - Non-blocking collective operations
use log::{debug, error};

use crate::datatype::traits::*;
use crate::error::{Error, Result};
use crate::point_to_point::{copy_exact, Channel};
use crate::topology::traits::*;
use crate::topology::{rank_index, Process, Rank};

/// Collective communication traits
pub mod traits {
    pub use super::{CommunicatorCollectives, Operation, Root};
}

/// Error code used when a collective detects mismatching arguments
pub const MISMATCH_ERROR_CODE: i32 = 1;

/// Can be used to combine two values in a reduction.
pub trait Operation<T> {
    /// Combine `a` (the accumulated value of lower ranks) with `b`
    fn apply(&self, a: T, b: T) -> T;

    /// Whether the operation is commutative
    fn is_commutative(&self) -> bool {
        true
    }
}

/// A built-in operation like `MPI_SUM`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SystemOperation {
    /// Maximum
    Max,
    /// Minimum
    Min,
    /// Sum, wrapping on integer overflow
    Sum,
    /// Product, wrapping on integer overflow
    Product,
}

macro_rules! system_operation_constructors {
    ($($ctor:ident => $val:path),*) => (
        $(pub fn $ctor() -> SystemOperation {
            //! A built-in operation
            $val
        })*
    )
}

impl SystemOperation {
    system_operation_constructors! {
        max => SystemOperation::Max,
        min => SystemOperation::Min,
        sum => SystemOperation::Sum,
        product => SystemOperation::Product
    }
}

impl<T: Arithmetic> Operation<T> for SystemOperation {
    fn apply(&self, a: T, b: T) -> T {
        match *self {
            SystemOperation::Max => {
                if b > a {
                    b
                } else {
                    a
                }
            }
            SystemOperation::Min => {
                if b < a {
                    b
                } else {
                    a
                }
            }
            SystemOperation::Sum => a.sum(b),
            SystemOperation::Product => a.product(b),
        }
    }
}

/// A user-defined operation.
///
/// # Examples
///
/// ```
/// use mpsum::collective::{self, UserOperation};
///
/// let mut acc = [1, 2, 3];
/// collective::reduce_local_into(&[4, 5, 6][..], &mut acc[..], UserOperation::commutative(|a: i32, b: i32| a - b));
/// assert_eq!(acc, [3, 3, 3]);
/// ```
#[cfg(feature = "user-operations")]
pub struct UserOperation<F> {
    op: F,
    commutative: bool,
}

#[cfg(feature = "user-operations")]
impl<F> UserOperation<F> {
    /// Define an operation from a closure that is declared to be commutative.
    pub fn commutative(op: F) -> Self {
        UserOperation {
            op,
            commutative: true,
        }
    }

    /// Define an operation from a closure that is not commutative.
    ///
    /// Contributions are always combined in rank order, so the result is well defined.
    pub fn non_commutative(op: F) -> Self {
        UserOperation {
            op,
            commutative: false,
        }
    }
}

#[cfg(feature = "user-operations")]
impl<T, F> Operation<T> for UserOperation<F>
where
    F: Fn(T, T) -> T,
{
    fn apply(&self, a: T, b: T) -> T {
        (self.op)(a, b)
    }

    fn is_commutative(&self) -> bool {
        self.commutative
    }
}

/// Reduce `inbuf` into `inoutbuf` elementwise under `op`, without communicating.
///
/// `inbuf` plays the role of the lower rank: `inoutbuf[i] = op(inbuf[i], inoutbuf[i])`.
///
/// # Panics
///
/// If the buffers have different lengths.
pub fn reduce_local_into<S, R, O>(inbuf: &S, inoutbuf: &mut R, op: O)
where
    S: Buffer + ?Sized,
    R: BufferMut<Item = S::Item> + ?Sized,
    O: Operation<S::Item>,
{
    let input = inbuf.as_slice();
    let inout = inoutbuf.as_mut_slice();
    assert_eq!(input.len(), inout.len());
    for (acc, x) in inout.iter_mut().zip(input) {
        *acc = op.apply(*x, *acc);
    }
}

/// Escalate a locally detected argument mismatch to a group-wide abort.
fn mismatch<C: Communicator>(comm: &C, what: &str, err: Error) -> Error {
    error!("rank {}: {}: {}", comm.rank(), what, err);
    comm.abort(MISMATCH_ERROR_CODE)
}

/// Receive a message that must have exactly `count` elements.
fn collect_exact<C: Communicator, T: Equivalence>(
    comm: &C,
    source: Rank,
    channel: Channel,
    count: usize,
    what: &str,
) -> Result<Vec<T>> {
    let data = comm.collect::<T>(source, channel)?;
    if data.len() != count {
        return Err(mismatch(
            comm,
            what,
            Error::CountMismatch {
                expected: count,
                actual: data.len(),
            },
        ));
    }
    Ok(data)
}

/// Collective communication patterns defined on `Communicator`s
pub trait CommunicatorCollectives: Communicator + Sized {
    /// Barrier synchronization among all processes in a `Communicator`
    ///
    /// Blocks until all processes in the `Communicator` `&self` have entered the barrier.
    fn barrier(&self) -> Result<()> {
        let root = self.process_at_rank(0)?;
        let mut token = 0u8;
        if root.is_self() {
            root.gather_into_root(&token, &mut vec![0u8; self_size(self)?][..])?;
        } else {
            root.gather_into(&token)?;
        }
        root.broadcast_into(&mut token)
    }

    /// Performs a global reduction under the operation `op` of the input data in `sendbuf` and
    /// stores the result in `recvbuf` on all processes.
    fn all_reduce_into<S, R, O>(&self, sendbuf: &S, recvbuf: &mut R, op: O) -> Result<()>
    where
        S: Buffer + ?Sized,
        R: BufferMut<Item = S::Item> + ?Sized,
        O: Operation<S::Item>,
    {
        let root = self.process_at_rank(0)?;
        if root.is_self() {
            root.reduce_into_root(sendbuf, recvbuf, op)?;
        } else {
            root.reduce_into(sendbuf, op)?;
        }
        root.broadcast_into(recvbuf)
    }
}

impl<C: Communicator> CommunicatorCollectives for C {}

fn self_size<C: Communicator>(comm: &C) -> Result<usize> {
    let size = comm.size();
    rank_index(size - 1, size).map(|last| last + 1)
}

/// Something that can take the role of 'root' in a collective operation.
///
/// Many collective operations define a 'root' process that takes a special role in the
/// communication. These collective operations are implemented as default methods of this trait.
pub trait Root: AsCommunicator {
    /// Rank of the root process
    fn root_rank(&self) -> Rank;

    /// Broadcast of the contents of a buffer
    ///
    /// After the call completes, the `Buffer` on all processes in the `Communicator` of the `Root`
    /// `&self` will contain what it contains on the `Root`. The buffer must have the same length
    /// everywhere.
    fn broadcast_into<B: BufferMut + ?Sized>(&self, buffer: &mut B) -> Result<()> {
        let comm = self.as_communicator();
        let channel = comm.next_collective();
        let root = self.root_rank();
        if comm.rank() == root {
            for r in (0..comm.size()).filter(|&r| r != root) {
                comm.post(r, channel, buffer.as_slice().to_vec())?;
            }
        } else {
            let data =
                collect_exact::<_, B::Item>(comm, root, channel, buffer.count(), "broadcast")?;
            copy_exact(&data, buffer)?;
        }
        debug!("rank {}: broadcast from {} complete", comm.rank(), root);
        Ok(())
    }

    /// Gather contents of buffers on `Root`.
    ///
    /// This function must be called on all non-root processes.
    fn gather_into<S: Buffer + ?Sized>(&self, sendbuf: &S) -> Result<()> {
        let comm = self.as_communicator();
        assert_ne!(comm.rank(), self.root_rank());
        let channel = comm.next_collective();
        comm.post(self.root_rank(), channel, sendbuf.as_slice().to_vec())
    }

    /// Gather contents of buffers on `Root`.
    ///
    /// After the call completes, the contents of the `Buffer`s on all ranks will be concatenated
    /// in rank order into `recvbuf`, which must hold `sendbuf.count() * size` elements.
    ///
    /// This function must be called on the root process.
    fn gather_into_root<S, R>(&self, sendbuf: &S, recvbuf: &mut R) -> Result<()>
    where
        S: Buffer + ?Sized,
        R: BufferMut<Item = S::Item> + ?Sized,
    {
        let comm = self.as_communicator();
        let root = self.root_rank();
        assert_eq!(comm.rank(), root);
        let channel = comm.next_collective();
        let count = sendbuf.count();
        let expected = count * self_size(comm)?;
        if recvbuf.count() != expected {
            return Err(mismatch(
                comm,
                "gather",
                Error::CountMismatch {
                    expected,
                    actual: recvbuf.count(),
                },
            ));
        }
        let recv = recvbuf.as_mut_slice();
        for r in 0..comm.size() {
            let start = rank_index(r, comm.size())? * count;
            let chunk = &mut recv[start..start + count];
            if r == root {
                chunk.copy_from_slice(sendbuf.as_slice());
            } else {
                let data = collect_exact::<_, S::Item>(comm, r, channel, count, "gather")?;
                chunk.copy_from_slice(&data);
            }
        }
        Ok(())
    }

    /// Scatter contents of a buffer on the root process to all processes.
    ///
    /// After the call completes each participating process will have received a part of the send
    /// `Buffer` on the root process.
    ///
    /// This function must be called on all non-root processes.
    fn scatter_into<R: BufferMut + ?Sized>(&self, recvbuf: &mut R) -> Result<()> {
        let comm = self.as_communicator();
        assert_ne!(comm.rank(), self.root_rank());
        let channel = comm.next_collective();
        let data =
            collect_exact::<_, R::Item>(comm, self.root_rank(), channel, recvbuf.count(), "scatter")?;
        copy_exact(&data, recvbuf)
    }

    /// Scatter contents of a buffer on the root process to all processes.
    ///
    /// The send `Buffer` is cut into `size` contiguous chunks of `recvbuf.count()` elements; rank
    /// `r` receives chunk `r`. The send buffer must hold exactly `recvbuf.count() * size` elements.
    ///
    /// This function must be called on the root process.
    fn scatter_into_root<S, R>(&self, sendbuf: &S, recvbuf: &mut R) -> Result<()>
    where
        S: Buffer + ?Sized,
        R: BufferMut<Item = S::Item> + ?Sized,
    {
        let comm = self.as_communicator();
        let root = self.root_rank();
        assert_eq!(comm.rank(), root);
        let channel = comm.next_collective();
        let count = recvbuf.count();
        let expected = count * self_size(comm)?;
        if sendbuf.count() != expected {
            return Err(mismatch(
                comm,
                "scatter",
                Error::CountMismatch {
                    expected,
                    actual: sendbuf.count(),
                },
            ));
        }
        let send = sendbuf.as_slice();
        for r in 0..comm.size() {
            let start = rank_index(r, comm.size())? * count;
            let chunk = &send[start..start + count];
            if r == root {
                recvbuf.as_mut_slice().copy_from_slice(chunk);
            } else {
                comm.post(r, channel, chunk.to_vec())?;
            }
        }
        debug!("rank {}: scattered {} elements per rank", root, count);
        Ok(())
    }

    /// Performs a global reduction under the operation `op` of the input data in `sendbuf` and
    /// stores the result on the `Root` process.
    ///
    /// This function must be called on all non-root processes.
    fn reduce_into<S, O>(&self, sendbuf: &S, _op: O) -> Result<()>
    where
        S: Buffer + ?Sized,
        O: Operation<S::Item>,
    {
        let comm = self.as_communicator();
        assert_ne!(comm.rank(), self.root_rank());
        let channel = comm.next_collective();
        comm.post(self.root_rank(), channel, sendbuf.as_slice().to_vec())
    }

    /// Performs a global reduction under the operation `op` of the input data in `sendbuf` and
    /// stores the result on the `Root` process.
    ///
    /// Contributions are combined in rank order: `op(op(op(x0, x1), x2), ...)`.
    ///
    /// This function must be called on the root process.
    fn reduce_into_root<S, R, O>(&self, sendbuf: &S, recvbuf: &mut R, op: O) -> Result<()>
    where
        S: Buffer + ?Sized,
        R: BufferMut<Item = S::Item> + ?Sized,
        O: Operation<S::Item>,
    {
        let comm = self.as_communicator();
        let root = self.root_rank();
        assert_eq!(comm.rank(), root);
        let channel = comm.next_collective();
        let count = sendbuf.count();
        if recvbuf.count() != count {
            return Err(mismatch(
                comm,
                "reduce",
                Error::CountMismatch {
                    expected: count,
                    actual: recvbuf.count(),
                },
            ));
        }

        let mut acc: Option<Vec<S::Item>> = None;
        for r in 0..comm.size() {
            let contribution = if r == root {
                sendbuf.as_slice().to_vec()
            } else {
                collect_exact::<_, S::Item>(comm, r, channel, count, "reduce")?
            };
            acc = Some(match acc {
                None => contribution,
                Some(mut acc) => {
                    for (a, x) in acc.iter_mut().zip(contribution) {
                        *a = op.apply(*a, x);
                    }
                    acc
                }
            });
        }
        if let Some(acc) = acc {
            recvbuf.as_mut_slice().copy_from_slice(&acc);
        }
        debug!("rank {}: reduction of {} elements complete", root, count);
        Ok(())
    }
}

impl<'a, C: 'a + Communicator> Root for Process<'a, C> {
    fn root_rank(&self) -> Rank {
        self.rank()
    }
}
