//! Distributed reduce-sum over a message-passing process group
//!
//! A fixed group of ranks cooperates to sum an integer array: the array is partitioned across
//! the ranks, every rank sums its own part, and the partial sums are reduced onto the
//! coordinator, rank `0`.
//!
//! The group communication layer follows the shape of MPI: a `Universe` launches the ranks, each
//! rank talks through a `Communicator`, and `Process` values take the role of the root in
//! collective operations (broadcast, scatter, gather, reduce).
//!
//! # Usage
//!
//! ```
//! use mpsum::traits::*;
//! use mpsum::collective::SystemOperation;
//!
//! let universe = mpsum::initialize(4).unwrap();
//! let totals = universe
//!     .launch(|world| {
//!         let root = world.process_at_rank(0)?;
//!         let rank = world.rank();
//!         if root.is_self() {
//!             let mut sum = 0;
//!             root.reduce_into_root(&rank, &mut sum, SystemOperation::sum())?;
//!             Ok(Some(sum))
//!         } else {
//!             root.reduce_into(&rank, SystemOperation::sum())?;
//!             Ok(None)
//!         }
//!     })
//!     .unwrap();
//! assert_eq!(totals[0], Some(6));
//! ```
//!
//! The two summation variants live in `reduce_sum`:
//!
//! - `reduce_sum::static_sum`: every rank holds the array and resolves its own block, the last
//!   rank taking the remainder.
//! - `reduce_sum::scatter_sum`: the coordinator reads the array, checks that the group size
//!   divides its length, broadcasts the length and scatters equal chunks. A failed check aborts
//!   the whole group.
#![deny(missing_docs)]
#![warn(missing_copy_implementations)]

pub mod collective;
pub mod config;
pub mod console;
pub mod datatype;
pub mod environment;
pub mod error;
pub mod logging;
pub mod partition;
pub mod point_to_point;
pub mod reduce_sum;
pub mod topology;

/// Re-exports all traits.
pub mod traits {
    pub use crate::collective::traits::*;
    pub use crate::datatype::traits::*;
    pub use crate::point_to_point::traits::*;
    pub use crate::topology::traits::*;
}

pub use environment::{initialize, Universe};
pub use error::{Error, Result};
