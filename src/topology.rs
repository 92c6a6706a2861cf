//! Organizing processes as groups and communicators
//!
//! All ranks partaking in a computation are organized in a communicator. Ranks are addressed
//! via their `Rank` within that communicator; this information is encapsulated in a `Process`,
//! which is also what plays the role of the root in collective operations.
//!
//! `Communicator` is the seam between the collective algorithms and a transport. Its required
//! methods are process identity, abort, and typed message posting; everything else is built on
//! top. `LocalCommunicator` is the in-process transport used by `Universe::launch`.
//!
//! # Unfinished features
//!
//! - Group management
//! - Communicator duplication and splitting
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use conv::ConvUtil;
use log::error;

use crate::datatype::traits::*;
use crate::error::{Error, Result};
use crate::point_to_point::{self, Channel, Envelope, Mailbox};

/// Topology traits
pub mod traits {
    pub use super::{AsCommunicator, Communicator};
}

/// Identifies a certain process within a communicator.
pub type Rank = i32;

/// Something that has a communicator associated with it
pub trait AsCommunicator {
    /// The type of the associated communicator
    type Out: Communicator;
    /// Returns the associated communicator.
    fn as_communicator(&self) -> &Self::Out;
}

/// Communicators are contexts for communication
pub trait Communicator {
    /// Number of processes in this communicator
    fn size(&self) -> Rank;

    /// The `Rank` that identifies the calling process within this communicator
    fn rank(&self) -> Rank;

    /// Abort program execution of the whole group.
    ///
    /// Every other rank observes `Error::Aborted` at its current or next blocking call. The
    /// returned error is the same one, for the caller to propagate.
    fn abort(&self, errorcode: i32) -> Error;

    /// Post `data` into the mailbox of `dest` on `channel`.
    ///
    /// This is the sending half of the transport; collective operations and `Destination` are
    /// built on it.
    fn post<T: Equivalence>(&self, dest: Rank, channel: Channel, data: Vec<T>) -> Result<()>;

    /// Block until a message from `source` on `channel` arrives and return its contents.
    fn collect<T: Equivalence>(&self, source: Rank, channel: Channel) -> Result<Vec<T>>;

    /// Allocate the channel of the next collective operation.
    ///
    /// All ranks call collectives in the same order, so they agree on the channel without
    /// communicating.
    fn next_collective(&self) -> Channel;

    /// Bundles a reference to this communicator with a specific `Rank` into a `Process`.
    fn process_at_rank(&self, r: Rank) -> Result<Process<'_, Self>>
    where
        Self: Sized,
    {
        Process::by_rank(self, r)
    }

    /// A `Process` for the calling process
    fn this_process(&self) -> Process<'_, Self>
    where
        Self: Sized,
    {
        Process {
            comm: self,
            rank: self.rank(),
        }
    }

    /// Whether the calling process has rank `r`
    fn is_rank(&self, r: Rank) -> bool {
        self.rank() == r
    }
}

/// Convert a rank of a group with `size` members into an index.
pub(crate) fn rank_index(rank: Rank, size: Rank) -> Result<usize> {
    if rank >= size {
        return Err(Error::InvalidRank {
            rank: i64::from(rank),
            size,
        });
    }
    rank.value_as::<usize>().map_err(|_| Error::InvalidRank {
        rank: i64::from(rank),
        size,
    })
}

/// Identifies a process by its `Rank` within a certain communicator.
pub struct Process<'a, C>
where
    C: 'a + Communicator,
{
    comm: &'a C,
    rank: Rank,
}

impl<'a, C> Process<'a, C>
where
    C: 'a + Communicator,
{
    fn by_rank(comm: &'a C, rank: Rank) -> Result<Self> {
        rank_index(rank, comm.size())?;
        Ok(Process { comm, rank })
    }

    /// The process rank
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Whether this process is the calling process
    pub fn is_self(&self) -> bool {
        self.comm.rank() == self.rank
    }
}

impl<'a, C: Communicator> Clone for Process<'a, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, C: Communicator> Copy for Process<'a, C> {}

impl<'a, C> AsCommunicator for Process<'a, C>
where
    C: 'a + Communicator,
{
    type Out = C;
    fn as_communicator(&self) -> &Self::Out {
        self.comm
    }
}

/// State shared by all ranks of an in-process group
pub(crate) struct Fabric {
    pub(crate) outboxes: Vec<Sender<Envelope>>,
    aborted: AtomicBool,
}

impl Fabric {
    pub(crate) fn new(outboxes: Vec<Sender<Envelope>>) -> Self {
        Fabric {
            outboxes,
            aborted: AtomicBool::new(false),
        }
    }

    /// Whether any rank of the group has called `abort`
    pub(crate) fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Wake every rank with an abort notice.
    pub(crate) fn broadcast_abort(&self, origin: Rank, code: i32) {
        self.aborted.store(true, Ordering::SeqCst);
        for outbox in &self.outboxes {
            // A rank that already finished has dropped its mailbox; nobody is left to wake.
            let _ = outbox.send(Envelope::abort(origin, code));
        }
    }
}

/// A communicator whose ranks are threads of the calling process.
///
/// Obtained from `Universe::launch`. Each rank owns exactly one `LocalCommunicator`; it can be
/// moved to another thread but not shared between threads.
pub struct LocalCommunicator {
    rank: Rank,
    size: Rank,
    fabric: Arc<Fabric>,
    mailbox: Mailbox,
    collectives: Cell<u64>,
}

impl LocalCommunicator {
    pub(crate) fn new(rank: Rank, size: Rank, fabric: Arc<Fabric>, mailbox: Mailbox) -> Self {
        LocalCommunicator {
            rank,
            size,
            fabric,
            mailbox,
            collectives: Cell::new(0),
        }
    }

    pub(crate) fn fabric(&self) -> &Arc<Fabric> {
        &self.fabric
    }
}

impl Communicator for LocalCommunicator {
    fn size(&self) -> Rank {
        self.size
    }

    fn rank(&self) -> Rank {
        self.rank
    }

    fn abort(&self, errorcode: i32) -> Error {
        error!(
            "rank {} aborting process group with error code {}",
            self.rank, errorcode
        );
        self.fabric.broadcast_abort(self.rank, errorcode);
        Error::Aborted {
            code: errorcode,
            origin: self.rank,
        }
    }

    fn post<T: Equivalence>(&self, dest: Rank, channel: Channel, data: Vec<T>) -> Result<()> {
        let index = rank_index(dest, self.size)?;
        point_to_point::post(
            &self.fabric.outboxes[index],
            dest,
            Envelope::data(self.rank, channel, data),
        )
    }

    fn collect<T: Equivalence>(&self, source: Rank, channel: Channel) -> Result<Vec<T>> {
        rank_index(source, self.size)?;
        self.mailbox.receive(source, channel)
    }

    fn next_collective(&self) -> Channel {
        let seq = self.collectives.get();
        self.collectives.set(seq + 1);
        Channel::Collective(seq)
    }
}
