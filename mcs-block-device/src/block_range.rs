use std::fmt;

use mcs_types::BlockId;
use serde::{Deserialize, Serialize};

/// Half-open `[begin, end)` range over block ids.
///
/// Deriving `Ord` compares `begin` first, then `end` — exactly the "order
/// by the full range, not a single endpoint" comparator the meta-data layer
/// requires: transient states during [`crate::Blocks::remove`] can produce
/// entries that share a `begin` or an `end`, so ordering by one endpoint
/// alone would not give a strict order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockRange {
    pub begin: BlockId,
    pub end: BlockId,
}

impl BlockRange {
    pub fn new(begin: BlockId, end: BlockId) -> Self {
        debug_assert!(begin <= end, "reversed block range {begin}..{end}");
        BlockRange { begin, end }
    }

    pub fn count(self) -> u64 {
        self.end.as_u64() - self.begin.as_u64()
    }

    pub fn contains(self, id: BlockId) -> bool {
        self.begin <= id && id < self.end
    }

    pub fn touches(self, other: BlockRange) -> bool {
        self.end == other.begin
    }

    pub fn intersection(self, other: BlockRange) -> Option<BlockRange> {
        let begin = self.begin.max(other.begin);
        let end = self.end.min(other.end);
        if begin < end {
            Some(BlockRange { begin, end })
        } else {
            None
        }
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}
