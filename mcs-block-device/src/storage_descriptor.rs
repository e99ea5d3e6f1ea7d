use mcs_types::{Range, SegmentId, StorageId};
use serde::{Deserialize, Serialize};

/// A physical storage range being added to, or removed from, the
/// block-device meta-data layer: the byte sub-range of one segment that a
/// contiguous block-id range is being carved out of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDescriptor {
    pub storage_id: StorageId,
    pub segment_id: SegmentId,
    pub byte_range: Range,
}

impl StorageDescriptor {
    pub fn new(storage_id: StorageId, segment_id: SegmentId, byte_range: Range) -> Self {
        StorageDescriptor {
            storage_id,
            segment_id,
            byte_range,
        }
    }
}

/// Where a block resolves to: the owning storage/segment plus the byte
/// offset of the block's first byte inside that segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub storage_id: StorageId,
    pub segment_id: SegmentId,
    pub offset: mcs_types::Offset,
}
