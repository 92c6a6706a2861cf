//! Point to point communication
//!
//! Every rank owns a mailbox that all ranks of the group can post messages into. A message is
//! matched on its source rank and its `Channel`. Messages that arrive before anybody asks for
//! them are kept in a queue of unexpected messages, so ranks may run ahead of each other
//! between two rendezvous points.
//!
//! Collective operations are built on top of these primitives, on channels of their own.
//!
//! # Unfinished features
//!
//! - Wildcard receives (any source, any tag)
//! - Probe
//! - Non-blocking send and receive

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, Sender};

use log::trace;

use crate::datatype::traits::*;
use crate::error::{Error, Result};
use crate::topology::traits::*;
use crate::topology::{Process, Rank};

/// Point to point communication traits
pub mod traits {
    pub use super::{Destination, Source};
}

/// Can be used to tag messages on the sender side and match on the receiver side.
pub type Tag = i32;

/// The matching context of a message.
///
/// User traffic and collective traffic never match each other, whatever their tags.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// A message sent through `Destination::send_with_tag`
    PointToPoint(Tag),
    /// Traffic of the `n`th collective operation on a communicator
    Collective(u64),
}

pub(crate) enum Payload {
    Data(Box<dyn Any + Send>),
    Abort { code: i32, origin: Rank },
}

pub(crate) struct Envelope {
    pub(crate) source: Rank,
    pub(crate) channel: Channel,
    pub(crate) payload: Payload,
}

impl Envelope {
    pub(crate) fn data<T: Equivalence>(source: Rank, channel: Channel, data: Vec<T>) -> Self {
        Envelope {
            source,
            channel,
            payload: Payload::Data(Box::new(data)),
        }
    }

    pub(crate) fn abort(origin: Rank, code: i32) -> Self {
        Envelope {
            source: origin,
            channel: Channel::Collective(u64::MAX),
            payload: Payload::Abort { code, origin },
        }
    }

    fn matches(&self, source: Rank, channel: Channel) -> bool {
        self.source == source && self.channel == channel
    }

    fn into_vec<T: Equivalence>(self) -> Result<Vec<T>> {
        match self.payload {
            Payload::Data(data) => data
                .downcast::<Vec<T>>()
                .map(|data| *data)
                .map_err(|_| Error::TypeMismatch {
                    source_rank: self.source,
                    expected: T::type_name(),
                }),
            Payload::Abort { code, origin } => Err(Error::Aborted { code, origin }),
        }
    }
}

/// The receiving end of a rank, with its queue of unexpected messages.
pub(crate) struct Mailbox {
    owner: Rank,
    inbox: Receiver<Envelope>,
    unexpected: RefCell<VecDeque<Envelope>>,
}

impl Mailbox {
    pub(crate) fn new(owner: Rank, inbox: Receiver<Envelope>) -> Self {
        Mailbox {
            owner,
            inbox,
            unexpected: RefCell::new(VecDeque::new()),
        }
    }

    /// Block until a message from `source` on `channel` arrives.
    ///
    /// An abort notice anywhere in the mailbox takes precedence over data.
    pub(crate) fn receive<T: Equivalence>(&self, source: Rank, channel: Channel) -> Result<Vec<T>> {
        {
            let mut unexpected = self.unexpected.borrow_mut();
            if let Some(err) = unexpected.iter().find_map(abort_notice) {
                return Err(err);
            }
            if let Some(pos) = unexpected.iter().position(|e| e.matches(source, channel)) {
                if let Some(envelope) = unexpected.remove(pos) {
                    return envelope.into_vec();
                }
            }
        }

        loop {
            let envelope = self
                .inbox
                .recv()
                .map_err(|_| Error::Disconnected { rank: self.owner })?;
            if let Some(err) = abort_notice(&envelope) {
                // Keep the notice so later receives fail as well.
                self.unexpected.borrow_mut().push_back(envelope);
                return Err(err);
            }
            if envelope.matches(source, channel) {
                return envelope.into_vec();
            }
            trace!(
                "rank {}: queueing unexpected message from rank {} on {:?}",
                self.owner,
                envelope.source,
                envelope.channel
            );
            self.unexpected.borrow_mut().push_back(envelope);
        }
    }
}

fn abort_notice(envelope: &Envelope) -> Option<Error> {
    match envelope.payload {
        Payload::Abort { code, origin } => Some(Error::Aborted { code, origin }),
        Payload::Data(_) => None,
    }
}

/// Posts an envelope, treating a closed mailbox as a disconnected peer.
pub(crate) fn post(outbox: &Sender<Envelope>, dest: Rank, envelope: Envelope) -> Result<()> {
    outbox
        .send(envelope)
        .map_err(|_| Error::Disconnected { rank: dest })
}

/// Something that can be sent messages, e.g. a `Process`
pub trait Destination: AsCommunicator {
    /// Rank that identifies the destination
    fn destination_rank(&self) -> Rank;

    /// Send the contents of a `Buffer` with tag `0`.
    ///
    /// The send completes as soon as the message is posted; it does not wait for a matching
    /// receive.
    fn send<B: Buffer + ?Sized>(&self, buf: &B) -> Result<()> {
        self.send_with_tag(buf, 0)
    }

    /// Send the contents of a `Buffer` with an explicit tag.
    fn send_with_tag<B: Buffer + ?Sized>(&self, buf: &B, tag: Tag) -> Result<()> {
        self.as_communicator().post(
            self.destination_rank(),
            Channel::PointToPoint(tag),
            buf.as_slice().to_vec(),
        )
    }
}

/// Something that messages can be received from, e.g. a `Process`
pub trait Source: AsCommunicator {
    /// Rank that identifies the source
    fn source_rank(&self) -> Rank;

    /// Receive a message with tag `0` containing any number of `T`.
    fn receive_vec<T: Equivalence>(&self) -> Result<Vec<T>> {
        self.receive_vec_with_tag(0)
    }

    /// Receive a message with tag `tag` containing any number of `T`.
    fn receive_vec_with_tag<T: Equivalence>(&self, tag: Tag) -> Result<Vec<T>> {
        self.as_communicator()
            .collect(self.source_rank(), Channel::PointToPoint(tag))
    }

    /// Receive a message into a `BufferMut`; the message must have exactly the buffer's length.
    fn receive_into<B: BufferMut + ?Sized>(&self, buf: &mut B) -> Result<()> {
        let data = self.receive_vec::<B::Item>()?;
        copy_exact(&data, buf)
    }
}

impl<'a, C: Communicator> Destination for Process<'a, C> {
    fn destination_rank(&self) -> Rank {
        self.rank()
    }
}

impl<'a, C: Communicator> Source for Process<'a, C> {
    fn source_rank(&self) -> Rank {
        self.rank()
    }
}

/// Copy a received message into a buffer of the same length.
pub(crate) fn copy_exact<B: BufferMut + ?Sized>(data: &[B::Item], buf: &mut B) -> Result<()> {
    let target = buf.as_mut_slice();
    if data.len() != target.len() {
        return Err(Error::CountMismatch {
            expected: target.len(),
            actual: data.len(),
        });
    }
    target.copy_from_slice(data);
    Ok(())
}
