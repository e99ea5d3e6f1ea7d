use std::collections::BTreeMap;
use std::ops::Bound::{Included, Unbounded};
use std::sync::RwLock;

use mcs_types::{BlockId, Offset, Size};

use crate::block_range::BlockRange;
use crate::error::Error;
use crate::storage_descriptor::{Location, StorageDescriptor};

/// Result of [`Blocks::add`]: the block-id range assigned to the storage
/// (`None` if the storage was too small to hold even one block), and the
/// tail of the storage that did not fit into a whole number of blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct AddResult {
    pub blocks: Option<BlockRange>,
    pub unused: Option<StorageDescriptor>,
}

/// Result of [`Blocks::remove`]: the storage sub-ranges that are no longer
/// backing any block, in the order they were encountered.
#[derive(Debug, Default, Clone)]
pub struct RemoveResult {
    pub unused: Vec<StorageDescriptor>,
}

struct Inner {
    number_of_blocks: u64,
    next_block_id: BlockId,
    used_storages: BTreeMap<BlockRange, StorageDescriptor>,
}

/// Bidirectional map between monotonically increasing block ids and
/// `(storage, segment, offset)` tuples.
///
/// Grounded on `original_source/block_device/{include,src}/mcs/block_device/meta_data/Blocks.{hpp,cpp}`:
/// same single-reader-writer-lock discipline, same add/remove/locate/blocks
/// algorithms, same never-reuse invariant on block ids.
pub struct Blocks {
    block_size: Size,
    inner: RwLock<Inner>,
}

impl Blocks {
    pub fn new(block_size: Size) -> Self {
        Blocks {
            block_size,
            inner: RwLock::new(Inner {
                number_of_blocks: 0,
                next_block_id: BlockId::new(0),
                used_storages: BTreeMap::new(),
            }),
        }
    }

    pub fn block_size(&self) -> Size {
        self.block_size
    }

    pub fn number_of_blocks(&self) -> u64 {
        self.inner.read().unwrap().number_of_blocks
    }

    /// Merges touching ranges for reporting purposes only; the internal set
    /// keeps each physical storage's range distinct.
    pub fn blocks(&self) -> Vec<BlockRange> {
        let inner = self.inner.read().unwrap();
        let mut out: Vec<BlockRange> = Vec::new();
        for range in inner.used_storages.keys() {
            match out.last_mut() {
                Some(last) if last.touches(*range) => last.end = range.end,
                _ => out.push(*range),
            }
        }
        out
    }

    /// §4.D `add`.
    pub fn add(&self, storage: StorageDescriptor) -> AddResult {
        let n = storage.byte_range.size() / self.block_size;
        if n == 0 {
            return AddResult {
                blocks: None,
                unused: Some(storage),
            };
        }

        let mut inner = self.inner.write().unwrap();
        let begin = inner.next_block_id;
        let end = BlockId::new(begin.as_u64() + n);
        let block_range = BlockRange::new(begin, end);

        let used_end = storage.byte_range.begin() + self.block_size * n;
        let used_descriptor = StorageDescriptor::new(
            storage.storage_id,
            storage.segment_id,
            mcs_types::Range::new(storage.byte_range.begin(), used_end)
                .expect("used_end computed from a non-negative multiple of block_size"),
        );

        let unused = if used_end < storage.byte_range.end() {
            Some(StorageDescriptor::new(
                storage.storage_id,
                storage.segment_id,
                mcs_types::Range::new(used_end, storage.byte_range.end())
                    .expect("used_end <= byte_range.end by construction"),
            ))
        } else {
            None
        };

        inner.used_storages.insert(block_range, used_descriptor);
        inner.number_of_blocks += n;
        inner.next_block_id = end;

        AddResult {
            blocks: Some(block_range),
            unused,
        }
    }

    /// §4.D `remove`. Iteratively finds the first storage whose block range
    /// intersects `[begin, end)`, splits it into up to three entries
    /// (prefix, removed, suffix), and advances past the removed range's
    /// end — mirroring `Blocks.cpp::remove`'s `block_begin = end(range)`
    /// advance, not the request's own end, so a later storage entry that
    /// only partially overlaps the request is still walked correctly.
    pub fn remove(&self, range: BlockRange) -> RemoveResult {
        let mut inner = self.inner.write().unwrap();
        let mut result = RemoveResult::default();
        let mut cursor = range.begin;

        while cursor < range.end {
            let found = first_intersecting(&inner.used_storages, cursor, range.end);
            let Some((entry_range, entry_desc)) = found else {
                break;
            };

            let intersection = entry_range
                .intersection(BlockRange::new(cursor, range.end))
                .expect("first_intersecting only returns overlapping entries");

            let prefix = if entry_range.begin < intersection.begin {
                Some((
                    BlockRange::new(entry_range.begin, intersection.begin),
                    sub_descriptor(entry_desc, entry_range, entry_range.begin, intersection.begin, self.block_size),
                ))
            } else {
                None
            };

            let suffix = if intersection.end < entry_range.end {
                Some((
                    BlockRange::new(intersection.end, entry_range.end),
                    sub_descriptor(entry_desc, entry_range, intersection.end, entry_range.end, self.block_size),
                ))
            } else {
                None
            };

            let removed_desc = sub_descriptor(
                entry_desc,
                entry_range,
                intersection.begin,
                intersection.end,
                self.block_size,
            );

            inner.used_storages.remove(&entry_range);
            if let Some((r, d)) = prefix {
                inner.used_storages.insert(r, d);
            }
            if let Some((r, d)) = suffix {
                inner.used_storages.insert(r, d);
            }

            result.unused.push(removed_desc);
            inner.number_of_blocks -= intersection.count();
            cursor = entry_range.end;
        }

        result
    }

    /// §4.D `locate`.
    pub fn locate(&self, block_id: BlockId) -> Result<Location, Error> {
        let inner = self.inner.read().unwrap();
        let (entry_range, desc) = find_containing(&inner.used_storages, block_id)
            .ok_or(Error::BlockNotInAnyStorage(block_id))?;
        let offset = Offset::new(
            desc.byte_range.begin().as_u64()
                + (block_id.as_u64() - entry_range.begin.as_u64()) * self.block_size.as_u64(),
        );
        Ok(Location {
            storage_id: desc.storage_id,
            segment_id: desc.segment_id,
            offset,
        })
    }
}

/// The unique entry containing `id`, if any: the last entry whose `begin`
/// is `<= id`, filtered to those whose `end` is actually `> id`. `O(log N)`
/// via `BTreeMap::range`.
fn find_containing(
    map: &BTreeMap<BlockRange, StorageDescriptor>,
    id: BlockId,
) -> Option<(BlockRange, StorageDescriptor)> {
    map.range((
        Unbounded,
        Included(BlockRange::new(id, BlockId::new(u64::MAX))),
    ))
    .next_back()
    .filter(|(r, _)| r.contains(id))
    .map(|(r, d)| (*r, *d))
}

/// The first entry (in ascending-begin order) that intersects
/// `[cursor, limit)`, whether or not it literally contains `cursor`.
fn first_intersecting(
    map: &BTreeMap<BlockRange, StorageDescriptor>,
    cursor: BlockId,
    limit: BlockId,
) -> Option<(BlockRange, StorageDescriptor)> {
    if let Some(found) = find_containing(map, cursor) {
        return Some(found);
    }
    // Lower bound on `begin` alone: any real entry has `end >= begin`, so
    // using `BlockId::new(0)` as the key's `end` keeps this below every
    // entry whose `begin == cursor`, without needing `BlockRange::new`'s
    // `begin <= end` precondition (this key is never stored, only compared).
    map.range((
        Included(BlockRange {
            begin: cursor,
            end: BlockId::new(0),
        }),
        Unbounded,
    ))
    .next()
    .filter(|(r, _)| r.begin < limit)
    .map(|(r, d)| (*r, *d))
}

fn sub_descriptor(
    desc: StorageDescriptor,
    entry_range: BlockRange,
    sub_begin: BlockId,
    sub_end: BlockId,
    block_size: Size,
) -> StorageDescriptor {
    let byte_begin = desc.byte_range.begin()
        + block_size * (sub_begin.as_u64() - entry_range.begin.as_u64());
    let byte_end = desc.byte_range.begin()
        + block_size * (sub_end.as_u64() - entry_range.begin.as_u64());
    StorageDescriptor::new(
        desc.storage_id,
        desc.segment_id,
        mcs_types::Range::new(byte_begin, byte_end)
            .expect("sub-range derived from a valid block sub-range"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcs_types::{SegmentId, StorageId};

    fn storage(storage_id: u64, segment_id: u64, begin: u64, end: u64) -> StorageDescriptor {
        StorageDescriptor::new(
            StorageId::new(storage_id),
            SegmentId::new(segment_id),
            mcs_types::Range::new(Offset::new(begin), Offset::new(end)).unwrap(),
        )
    }

    /// Seed scenario (a).
    #[test]
    fn add_remove_locate_walkthrough() {
        let blocks = Blocks::new(Size::new(4));

        let r1 = blocks.add(storage(1, 0, 0, 14));
        assert_eq!(r1.blocks, Some(BlockRange::new(BlockId::new(0), BlockId::new(3))));
        assert_eq!(
            r1.unused.unwrap().byte_range,
            mcs_types::Range::new(Offset::new(12), Offset::new(14)).unwrap()
        );

        let r2 = blocks.add(storage(2, 0, 0, 8));
        assert_eq!(r2.blocks, Some(BlockRange::new(BlockId::new(3), BlockId::new(5))));
        assert!(r2.unused.is_none());

        assert_eq!(blocks.number_of_blocks(), 5);
        assert_eq!(
            blocks.blocks(),
            vec![BlockRange::new(BlockId::new(0), BlockId::new(5))]
        );

        let removed = blocks.remove(BlockRange::new(BlockId::new(1), BlockId::new(4)));
        assert_eq!(removed.unused.len(), 2);
        assert_eq!(blocks.number_of_blocks(), 2);

        let loc0 = blocks.locate(BlockId::new(0)).unwrap();
        assert_eq!(loc0.storage_id, StorageId::new(1));
        assert_eq!(loc0.offset, Offset::new(0));

        let loc4 = blocks.locate(BlockId::new(4)).unwrap();
        assert_eq!(loc4.storage_id, StorageId::new(2));
        assert_eq!(loc4.offset, Offset::new(4));

        assert!(blocks.locate(BlockId::new(3)).is_err());
    }

    #[test]
    fn zero_sized_block_count_reports_whole_storage_as_unused() {
        let blocks = Blocks::new(Size::new(4));
        let r = blocks.add(storage(1, 0, 0, 3));
        assert!(r.blocks.is_none());
        assert_eq!(r.unused.unwrap().byte_range.size(), Size::new(3));
        assert_eq!(blocks.number_of_blocks(), 0);
    }

    #[test]
    fn adding_same_physical_storage_twice_yields_distinct_ranges() {
        let blocks = Blocks::new(Size::new(4));
        let a = blocks.add(storage(1, 0, 0, 8)).blocks.unwrap();
        let b = blocks.add(storage(1, 0, 0, 8)).blocks.unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn block_accounting_matches_blocks_sum() {
        let blocks = Blocks::new(Size::new(4));
        blocks.add(storage(1, 0, 0, 40));
        blocks.add(storage(2, 0, 0, 24));
        blocks.remove(BlockRange::new(BlockId::new(2), BlockId::new(5)));
        let sum: u64 = blocks.blocks().iter().map(|r| r.count()).sum();
        assert_eq!(sum, blocks.number_of_blocks());
    }
}
