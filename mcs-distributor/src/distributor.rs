use std::collections::BTreeMap;

use mcs_types::{MaxSize, Offset, Range, Size, StorageId};

use crate::error::Error;

/// Splits `size` bytes pairwise-fairly across the given storages' remaining
/// capacities (§4.F). Returns the number of bytes assigned to each storage;
/// every eligible storage (one that did not get fully packed) differs from
/// every other eligible storage by at most one byte, and any storage whose
/// capacity is below its fair share is fully packed.
///
/// Grounded on `original_source/iov_backend/src/provider/State.cpp`'s
/// `distribute_as_equal_as_possible`/`AsEqualAsPossible` usage; the
/// source's max-heap-of-remaining-capacity is realised here as a sort
/// ascending by `(capacity, storage_id)` walked from the small end, which
/// is equivalent to repeatedly popping the smallest remaining capacity.
pub fn as_equal_as_possible_sizes(
    size: Size,
    capacities: &[(StorageId, MaxSize)],
) -> Result<BTreeMap<StorageId, Size>, Error> {
    let total = capacities
        .iter()
        .fold(MaxSize::Limit(Size::ZERO), |acc, (_, c)| acc + *c);
    if total < MaxSize::Limit(size) {
        return Err(Error::InsufficientCapacity {
            requested: size,
            available: total,
        });
    }

    let mut sorted: Vec<(StorageId, MaxSize)> = capacities.to_vec();
    sorted.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));

    let mut assigned = BTreeMap::new();
    let mut remaining_size = size.as_u64();
    let n = sorted.len();
    let mut i = 0;

    while i < n {
        let remaining_count = (n - i) as u64;
        let fair_share = remaining_size / remaining_count;
        let (id, capacity) = sorted[i];

        let fully_packed = match capacity {
            MaxSize::Limit(c) => c.as_u64() <= fair_share,
            MaxSize::Unlimited => false,
        };

        if fully_packed {
            let assigned_size = capacity.limit();
            assigned.insert(id, assigned_size);
            remaining_size -= assigned_size.as_u64();
            i += 1;
            continue;
        }

        // Every remaining storage (by construction of the ascending sort)
        // has capacity > fair_share, so all of them are "eligible" and can
        // absorb the +1-byte remainder.
        let remainder = remaining_size % remaining_count;
        let mut rest: Vec<StorageId> = sorted[i..].iter().map(|(id, _)| *id).collect();
        rest.sort();
        for (k, id) in rest.into_iter().enumerate() {
            let extra = u64::from((k as u64) < remainder);
            assigned.insert(id, Size::new(fair_share + extra));
        }
        break;
    }

    Ok(assigned)
}

/// Turns a size assignment into a touching partition of `[base_offset,
/// base_offset + size)`, walked in ascending storage-id order — the
/// "deterministic storage-id order" the source leaves to the caller.
pub fn as_equal_as_possible(
    size: Size,
    capacities: &[(StorageId, MaxSize)],
    base_offset: Offset,
) -> Result<BTreeMap<StorageId, Range>, Error> {
    let sizes = as_equal_as_possible_sizes(size, capacities)?;
    let mut offset = base_offset;
    let mut out = BTreeMap::new();
    for (id, sz) in sizes {
        let r = Range::from_len(offset, sz);
        offset = r.end();
        out.insert(id, r);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limited(v: u64) -> MaxSize {
        MaxSize::Limit(Size::new(v))
    }

    /// Seed scenario (b).
    #[test]
    fn forty_across_nine_eleven_ten_ten() {
        let caps = vec![
            (StorageId::new(1), limited(9)),
            (StorageId::new(2), limited(11)),
            (StorageId::new(3), limited(10)),
            (StorageId::new(4), limited(10)),
        ];
        let sizes = as_equal_as_possible_sizes(Size::new(40), &caps).unwrap();
        assert_eq!(sizes[&StorageId::new(1)], Size::new(9));
        assert_eq!(sizes[&StorageId::new(2)], Size::new(11));
        assert_eq!(sizes[&StorageId::new(3)], Size::new(10));
        assert_eq!(sizes[&StorageId::new(4)], Size::new(10));
    }

    /// Seed scenario (c).
    #[test]
    fn twelve_across_three_two_three_two_two() {
        let caps = vec![
            (StorageId::new(1), limited(3)),
            (StorageId::new(2), limited(2)),
            (StorageId::new(3), limited(3)),
            (StorageId::new(4), limited(2)),
            (StorageId::new(5), limited(2)),
        ];
        let sizes = as_equal_as_possible_sizes(Size::new(12), &caps).unwrap();
        let total: u64 = sizes.values().map(|s| s.as_u64()).sum();
        assert_eq!(total, 12);
        assert_eq!(sizes[&StorageId::new(1)], Size::new(3));
        assert_eq!(sizes[&StorageId::new(2)], Size::new(2));
    }

    /// Seed scenario (d).
    #[test]
    fn two_across_one_zero_one_zero() {
        let caps = vec![
            (StorageId::new(1), limited(1)),
            (StorageId::new(2), limited(0)),
            (StorageId::new(3), limited(1)),
            (StorageId::new(4), limited(0)),
        ];
        let sizes = as_equal_as_possible_sizes(Size::new(2), &caps).unwrap();
        assert_eq!(sizes[&StorageId::new(1)], Size::new(1));
        assert_eq!(sizes[&StorageId::new(2)], Size::new(0));
        assert_eq!(sizes[&StorageId::new(3)], Size::new(1));
        assert_eq!(sizes[&StorageId::new(4)], Size::new(0));
    }

    #[test]
    fn fails_when_requested_size_exceeds_capacity() {
        let caps = vec![(StorageId::new(1), limited(1))];
        assert!(as_equal_as_possible_sizes(Size::new(2), &caps).is_err());
    }

    #[test]
    fn unlimited_storage_absorbs_whatever_limited_storages_cannot() {
        let caps = vec![
            (StorageId::new(1), limited(1)),
            (StorageId::new(2), MaxSize::Unlimited),
        ];
        let sizes = as_equal_as_possible_sizes(Size::new(10), &caps).unwrap();
        let total: u64 = sizes.values().map(|s| s.as_u64()).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn ranges_form_a_touching_partition() {
        let caps = vec![
            (StorageId::new(1), limited(9)),
            (StorageId::new(2), limited(11)),
        ];
        let ranges = as_equal_as_possible(Size::new(20), &caps, Offset::ZERO).unwrap();
        let r1 = ranges[&StorageId::new(1)];
        let r2 = ranges[&StorageId::new(2)];
        assert_eq!(r1.begin(), Offset::ZERO);
        assert_eq!(r1.end(), r2.begin());
        assert_eq!(r2.end(), Offset::new(20));
    }
}
