use std::collections::BTreeMap;
use std::ops::Bound::{Included, Unbounded};

use mcs_types::{Offset, Range, SegmentId, StorageId};

use crate::error::Error;

/// A single `(range, segment_id, storage_id)` binding inside a collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UsedStorageRecord {
    pub range: Range,
    pub storage_id: StorageId,
    pub segment_id: SegmentId,
}

/// An ordered, non-overlapping, contiguous ("touching-partition") set of
/// byte ranges bound to `(storage, segment)` pairs.
///
/// Grounded on `original_source/iov_backend/{include,src}/mcs/iov_backend/UsedStorages.{hpp,cpp}`:
/// same touching-partition invariant, same `lower_bound`-then-walk query
/// shape for [`Self::locations`] via [`crate::state`].
#[derive(Clone, Debug, Default)]
pub struct UsedStorages {
    records: BTreeMap<Range, (StorageId, SegmentId)>,
}

impl UsedStorages {
    pub fn empty() -> Self {
        UsedStorages {
            records: BTreeMap::new(),
        }
    }

    /// Builds a `UsedStorages` from records already in ascending range
    /// order, failing if any two consecutive records are not touching.
    pub fn construct(records: Vec<UsedStorageRecord>) -> Result<Self, Error> {
        let mut map = BTreeMap::new();
        let mut prev: Option<Range> = None;
        for r in records {
            if let Some(p) = prev {
                if p.end() != r.range.begin() {
                    return Err(Error::Common(mcs_types::CommonError::not_touching(p, r.range)));
                }
            }
            prev = Some(r.range);
            map.insert(r.range, (r.storage_id, r.segment_id));
        }
        Ok(UsedStorages { records: map })
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `[begin(first), end(last))`; `Err(RangeEmpty)` if empty.
    pub fn range(&self) -> Result<Range, Error> {
        let first = self.records.keys().next().ok_or(Error::RangeEmpty)?;
        let last = self.records.keys().next_back().ok_or(Error::RangeEmpty)?;
        Ok(Range::new(first.begin(), last.end()).expect("first.begin <= last.end by construction"))
    }

    /// Appends another touching-partition batch; fails if it does not
    /// start exactly where this one ends.
    pub fn append(&mut self, additions: UsedStorages) -> Result<(), Error> {
        if additions.is_empty() {
            return Ok(());
        }
        if !self.is_empty() {
            let existing_end = self.range()?.end();
            let to_append_begin = additions.range()?.begin();
            if existing_end != to_append_begin {
                return Err(Error::Common(mcs_types::CommonError::not_touching(
                    self.range()?,
                    additions.range()?,
                )));
            }
        }
        self.records.extend(additions.records);
        Ok(())
    }

    /// The records whose range overlaps `sub_range`, clipped to the
    /// intersection, in ascending order. `sub_range` must be contained in
    /// `self.range()`.
    pub fn locations(&self, sub_range: Range) -> Result<Vec<(Range, StorageId, SegmentId)>, Error> {
        let collection_range = self.range()?;
        if sub_range.begin() < collection_range.begin() || sub_range.end() > collection_range.end()
        {
            return Err(Error::SubRangeNotContained {
                sub_range,
                collection_range,
            });
        }

        let mut out = Vec::new();
        let start = self.lower_bound(sub_range.begin());
        for (range, (storage_id, segment_id)) in self.records.range(start..) {
            if range.begin() >= sub_range.end() {
                break;
            }
            if let Some(clipped) = range.intersection(sub_range) {
                out.push((clipped, *storage_id, *segment_id));
            }
        }
        Ok(out)
    }

    /// Every record in ascending range order, unclipped. Unlike
    /// [`Self::locations`], this includes zero-width records (a storage
    /// the distributor assigned no bytes to still owns a segment that
    /// needs to be found and removed).
    pub fn records(&self) -> impl Iterator<Item = UsedStorageRecord> + '_ {
        self.records
            .iter()
            .map(|(range, (storage_id, segment_id))| UsedStorageRecord {
                range: *range,
                storage_id: *storage_id,
                segment_id: *segment_id,
            })
    }

    /// The smallest stored range that is not smaller than `point`: the
    /// range containing `point` if one exists, else the first range
    /// starting at or after `point`.
    fn lower_bound(&self, point: Offset) -> Range {
        let containing = self
            .records
            .range((
                Unbounded,
                Included(Range::new(point, Offset::new(u64::MAX)).unwrap()),
            ))
            .next_back()
            .map(|(r, _)| *r)
            .filter(|r| r.contains(point));

        if let Some(r) = containing {
            return r;
        }

        let zero_width = Range::new(point, point).expect("begin == end is always a valid range");
        self.records
            .range((Included(zero_width), Unbounded))
            .next()
            .map(|(r, _)| *r)
            .unwrap_or(zero_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(begin: u64, end: u64, storage: u64, segment: u64) -> UsedStorageRecord {
        UsedStorageRecord {
            range: Range::new(Offset::new(begin), Offset::new(end)).unwrap(),
            storage_id: StorageId::new(storage),
            segment_id: SegmentId::new(segment),
        }
    }

    #[test]
    fn construction_rejects_gaps() {
        let err = UsedStorages::construct(vec![rec(0, 5, 1, 0), rec(6, 10, 2, 0)]).unwrap_err();
        assert!(matches!(err, Error::Common(_)));
    }

    #[test]
    fn construction_accepts_touching_records() {
        let us = UsedStorages::construct(vec![rec(0, 5, 1, 0), rec(5, 10, 2, 0)]).unwrap();
        assert_eq!(us.range().unwrap(), Range::new(Offset::new(0), Offset::new(10)).unwrap());
    }

    #[test]
    fn append_requires_exact_touch() {
        let mut us = UsedStorages::construct(vec![rec(0, 5, 1, 0)]).unwrap();
        let bad = UsedStorages::construct(vec![rec(6, 10, 2, 0)]).unwrap();
        assert!(us.append(bad).is_err());

        let good = UsedStorages::construct(vec![rec(5, 10, 2, 0)]).unwrap();
        us.append(good).unwrap();
        assert_eq!(us.range().unwrap(), Range::new(Offset::new(0), Offset::new(10)).unwrap());
    }

    #[test]
    fn locations_clips_to_sub_range() {
        let us = UsedStorages::construct(vec![rec(0, 5, 1, 0), rec(5, 10, 2, 0)]).unwrap();
        let locs = us
            .locations(Range::new(Offset::new(3), Offset::new(8)).unwrap())
            .unwrap();
        assert_eq!(locs.len(), 2);
        assert_eq!(locs[0].0, Range::new(Offset::new(3), Offset::new(5)).unwrap());
        assert_eq!(locs[1].0, Range::new(Offset::new(5), Offset::new(8)).unwrap());
    }

    #[test]
    fn locations_rejects_out_of_bounds_sub_range() {
        let us = UsedStorages::construct(vec![rec(0, 5, 1, 0)]).unwrap();
        assert!(us
            .locations(Range::new(Offset::new(3), Offset::new(8)).unwrap())
            .is_err());
    }
}
