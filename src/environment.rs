//! Environmental management
//!
//! This module sets up a process group. `initialize()` fixes the number of ranks; the
//! `Universe` it returns launches one thread per rank and hands each of them its own
//! `LocalCommunicator`.
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use conv::ConvUtil;
use log::{debug, info, warn};
use smallvec::SmallVec;

use crate::error::{Error, Result, PANIC_EXIT_CODE};
use crate::point_to_point::Mailbox;
use crate::topology::traits::*;
use crate::topology::{Fabric, LocalCommunicator, Rank};

/// Global context of a process group
#[derive(Copy, Clone, Debug)]
pub struct Universe {
    size: Rank,
}

/// Initialize a process group of `size` ranks.
///
/// Fails with `Error::InvalidGroupSize` for an empty group or one whose size cannot be expressed
/// as a `Rank`.
///
/// # Examples
///
/// ```
/// use mpsum::traits::*;
///
/// let universe = mpsum::initialize(3).unwrap();
/// let ranks = universe.launch(|world| Ok(world.rank())).unwrap();
/// assert_eq!(ranks, vec![0, 1, 2]);
/// ```
pub fn initialize(size: usize) -> Result<Universe> {
    if size == 0 {
        return Err(Error::InvalidGroupSize(size));
    }
    let size = size
        .value_as::<Rank>()
        .map_err(|_| Error::InvalidGroupSize(size))?;
    Ok(Universe { size })
}

/// Aborts the group if a rank thread unwinds, so that its peers do not wait forever.
struct AbortOnPanic<'a> {
    rank: Rank,
    fabric: &'a Fabric,
}

impl<'a> Drop for AbortOnPanic<'a> {
    fn drop(&mut self) {
        if thread::panicking() {
            warn!("rank {} panicked, aborting process group", self.rank);
            self.fabric.broadcast_abort(self.rank, PANIC_EXIT_CODE);
        }
    }
}

impl Universe {
    /// Number of ranks in the group
    pub fn size(&self) -> Rank {
        self.size
    }

    /// The shared fabric and the communicators of all ranks, in rank order.
    fn communicators(&self) -> (Arc<Fabric>, Vec<LocalCommunicator>) {
        let (outboxes, inboxes): (Vec<_>, Vec<_>) =
            (0..self.size).map(|_| mpsc::channel()).unzip();
        let fabric = Arc::new(Fabric::new(outboxes));
        let comms = inboxes
            .into_iter()
            .zip(0..)
            .map(|(inbox, rank)| {
                LocalCommunicator::new(rank, self.size, fabric.clone(), Mailbox::new(rank, inbox))
            })
            .collect();
        (fabric, comms)
    }

    /// Run `rank_main` once per rank, each on its own thread, and wait for all of them.
    ///
    /// Returns the per-rank results in rank order.
    ///
    /// A rank that returns an error other than `Error::Aborted` aborts the group with the
    /// error's exit code, so that no peer is left waiting for it. If any rank fails, the first
    /// error in this order of precedence is returned: a panic, any error other than an abort
    /// (the cause of the abort), an abort (lowest rank first).
    pub fn launch<F, T>(&self, rank_main: F) -> Result<Vec<T>>
    where
        F: Fn(LocalCommunicator) -> Result<T> + Sync,
        T: Send,
    {
        info!("launching process group of {} ranks", self.size);
        let rank_main = &rank_main;
        let (fabric, comms) = self.communicators();
        let outcomes: Vec<Result<T>> = thread::scope(|scope| {
            let mut handles: SmallVec<[_; 8]> = SmallVec::new();
            for comm in comms {
                let rank = comm.rank();
                let guarded = comm.fabric().clone();
                let spawned = thread::Builder::new()
                    .name(format!("rank-{}", rank))
                    .spawn_scoped(scope, move || {
                        let _guard = AbortOnPanic {
                            rank,
                            fabric: &guarded,
                        };
                        let outcome = rank_main(comm);
                        if let Err(err) = &outcome {
                            if !err.is_abort() {
                                // Peers may be blocked on a message this rank will never send.
                                warn!("rank {} failed: {}, aborting process group", rank, err);
                                guarded.broadcast_abort(rank, err.exit_code());
                            }
                        }
                        outcome
                    });
                match spawned {
                    Ok(handle) => handles.push((rank, Ok(handle))),
                    Err(source) => {
                        // Ranks already running would wait for the missing one forever.
                        fabric.broadcast_abort(rank, 1);
                        handles.push((rank, Err(Error::Spawn { rank, source })));
                        break;
                    }
                }
            }
            handles
                .into_iter()
                .map(|(rank, handle)| match handle {
                    Ok(handle) => handle.join().unwrap_or(Err(Error::RankPanicked { rank })),
                    Err(err) => Err(err),
                })
                .collect()
        });
        if fabric.is_aborted() {
            debug!("process group of {} ranks was aborted", self.size);
        }

        let mut failure: Option<Error> = None;
        let mut results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                Ok(value) => results.push(value),
                Err(err) => {
                    let replace = match (&failure, &err) {
                        (None, _) => true,
                        (Some(Error::RankPanicked { .. }), _) => false,
                        (_, Error::RankPanicked { .. }) => true,
                        (Some(Error::Aborted { .. }), Error::Aborted { .. }) => false,
                        (Some(Error::Aborted { .. }), _) => true,
                        _ => false,
                    };
                    if replace {
                        failure = Some(err);
                    }
                }
            }
        }
        match failure {
            Some(err) => {
                warn!("process group failed: {}", err);
                Err(err)
            }
            None => Ok(results),
        }
    }
}
