//! Block partitioning of an array across the ranks of a group
//!
//! Every rank resolves its own contiguous range from the array length and the group size alone,
//! without communicating. All ranks get `len / parts` elements, except the last one, which also
//! takes the remainder.
use std::ops::Range;

use conv::ConvUtil;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::topology::{rank_index, Rank};

/// Per-rank element counts; groups are usually small enough to stay on the stack.
pub type Counts = SmallVec<[usize; 8]>;

/// A split of `len` elements into `parts` contiguous blocks
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockPartition {
    len: usize,
    parts: usize,
}

impl BlockPartition {
    /// Partition `len` elements across `parts` ranks, the last rank absorbing the remainder.
    ///
    /// # Examples
    ///
    /// ```
    /// use mpsum::partition::BlockPartition;
    ///
    /// let partition = BlockPartition::new(10, 4).unwrap();
    /// assert_eq!(partition.range(0).unwrap(), 0..2);
    /// assert_eq!(partition.range(3).unwrap(), 6..10);
    /// ```
    pub fn new(len: usize, parts: usize) -> Result<Self> {
        if parts == 0 {
            return Err(Error::InvalidGroupSize(parts));
        }
        Ok(BlockPartition { len, parts })
    }

    /// Partition `len` elements into `parts` blocks of exactly the same length.
    ///
    /// Fails with `Error::NotDivisible` when `parts` does not divide `len`.
    pub fn even(len: usize, parts: usize) -> Result<Self> {
        let partition = BlockPartition::new(len, parts)?;
        if !partition.is_even() {
            return Err(Error::NotDivisible { len, parts });
        }
        Ok(partition)
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no elements to distribute
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of blocks
    pub fn parts(&self) -> usize {
        self.parts
    }

    /// Length of every block but the last
    pub fn chunk_len(&self) -> usize {
        self.len / self.parts
    }

    /// Whether all blocks have the same length
    pub fn is_even(&self) -> bool {
        self.len % self.parts == 0
    }

    /// The range of elements owned by `rank`.
    ///
    /// With fewer elements than ranks, every rank but the last gets an empty range.
    pub fn range(&self, rank: Rank) -> Result<Range<usize>> {
        let parts = self
            .parts
            .value_as::<Rank>()
            .map_err(|_| Error::InvalidGroupSize(self.parts))?;
        let index = rank_index(rank, parts)?;
        let start = index * self.chunk_len();
        let end = if index == self.parts - 1 {
            self.len
        } else {
            start + self.chunk_len()
        };
        Ok(start..end)
    }

    /// The length of every block, in rank order
    pub fn counts(&self) -> Counts {
        let mut counts: Counts = SmallVec::from_elem(self.chunk_len(), self.parts);
        if let Some(last) = counts.last_mut() {
            *last = self.len - (self.parts - 1) * self.chunk_len();
        }
        counts
    }
}
