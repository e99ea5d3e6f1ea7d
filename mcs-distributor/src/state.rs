use std::collections::HashMap;

use mcs_types::{CollectionId, CommonError, IdKind, MaxSize, Offset, SegmentId, Size, StorageId};

use crate::distributor::as_equal_as_possible;
use crate::error::Error;
use crate::used_storages::{UsedStorageRecord, UsedStorages};

/// The collaborator a collection-state `State` talks to for everything that
/// actually touches a storage kernel. Kept as a trait so `mcs-distributor`
/// has no dependency on `mcs-storage` — grounded on
/// `original_source/iov_backend/src/provider/State.cpp`'s `storages_clients`
/// callback parameter, which plays the same decoupling role there.
pub trait StorageClient {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Remaining capacity of each of the given storages, in the same order.
    fn capacities(&self, storage_ids: &[StorageId]) -> Vec<(StorageId, MaxSize)>;

    fn segment_create(&self, storage_id: StorageId, size: Size) -> Result<SegmentId, Self::Error>;

    fn segment_remove(&self, storage_id: StorageId, segment_id: SegmentId) -> Result<Size, Self::Error>;
}

/// Maps collection ids to their [`UsedStorages`] and runs the distributor
/// against a [`StorageClient`] to realize create/append/delete.
#[derive(Default)]
pub struct State {
    collections: HashMap<CollectionId, UsedStorages>,
}

impl State {
    pub fn new() -> Self {
        State::default()
    }

    fn distribute<C: StorageClient>(
        &self,
        client: &C,
        storage_ids: &[StorageId],
        size: Size,
        offset: Offset,
    ) -> Result<UsedStorages, Error> {
        let capacities = client.capacities(storage_ids);
        let ranges = as_equal_as_possible(size, &capacities, offset)?;

        let mut records = Vec::with_capacity(ranges.len());
        for (storage_id, range) in ranges {
            let segment_id = client.segment_create(storage_id, range.size()).map_err(|e| {
                log::warn!("segment_create failed on storage {storage_id}: {e}");
                Error::Common(CommonError::BadAlloc {
                    requested: range.size(),
                    used: Size::ZERO,
                    max: Size::ZERO,
                })
            })?;
            records.push(UsedStorageRecord {
                range,
                storage_id,
                segment_id,
            });
        }
        UsedStorages::construct(records)
    }

    /// §4.E `create`. No automatic rollback on partial failure (§9 open
    /// question, resolved): segments already created on storages that
    /// succeeded before a later storage failed are not freed. The
    /// collection entry itself is only inserted once every per-storage
    /// `segment_create` has succeeded, so a failed `create` never leaves a
    /// partially-visible collection behind — it just leaks segments on the
    /// storages that did succeed.
    pub fn collection_create<C: StorageClient>(
        &mut self,
        client: &C,
        collection_id: CollectionId,
        storage_ids: &[StorageId],
        size: Size,
    ) -> Result<(), Error> {
        if self.collections.contains_key(&collection_id) {
            return Err(Error::Common(CommonError::duplicate(
                IdKind::Collection,
                &collection_id,
            )));
        }
        let used_storages = self.distribute(client, storage_ids, size, Offset::ZERO)?;
        self.collections.insert(collection_id, used_storages);
        Ok(())
    }

    /// §4.E `append`.
    pub fn collection_append<C: StorageClient>(
        &mut self,
        client: &C,
        collection_id: &CollectionId,
        storage_ids: &[StorageId],
        up_to_end: Offset,
    ) -> Result<Size, Error> {
        let current_end = self.range(collection_id)?.end();
        if current_end < up_to_end {
            let delta = up_to_end - current_end;
            let addition = self.distribute(client, storage_ids, delta, current_end)?;
            let used_storages = self
                .collections
                .get_mut(collection_id)
                .expect("presence already checked by self.range above");
            used_storages.append(addition)?;
        }
        self.range(collection_id).map(|r| r.size())
    }

    /// §4.E `delete`: removes every per-storage segment, collecting
    /// failures into an aggregate error rather than stopping at the first
    /// one; erases the collection entry regardless of whether any
    /// individual removal failed.
    pub fn collection_delete<C: StorageClient>(
        &mut self,
        client: &C,
        collection_id: &CollectionId,
    ) -> Result<(), Error> {
        let used_storages = self
            .collections
            .remove(collection_id)
            .ok_or_else(|| Error::Common(CommonError::unknown(IdKind::Collection, collection_id)))?;

        let mut failures = Vec::new();
        let mut attempted = 0usize;
        for record in used_storages.records() {
            attempted += 1;
            if let Err(e) = client.segment_remove(record.storage_id, record.segment_id) {
                failures.push(format!(
                    "storage {} segment {}: {e}",
                    record.storage_id, record.segment_id
                ));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::aggregate_delete_failure(attempted, &failures))
        }
    }

    pub fn range(&self, collection_id: &CollectionId) -> Result<mcs_types::Range, Error> {
        let used_storages = self
            .collections
            .get(collection_id)
            .ok_or_else(|| Error::Common(CommonError::unknown(IdKind::Collection, collection_id)))?;
        used_storages.range()
    }

    /// §4.E `locations`.
    pub fn locations(
        &self,
        collection_id: &CollectionId,
        sub_range: mcs_types::Range,
    ) -> Result<Vec<(mcs_types::Range, StorageId, SegmentId)>, Error> {
        let used_storages = self
            .collections
            .get(collection_id)
            .ok_or_else(|| Error::Common(CommonError::unknown(IdKind::Collection, collection_id)))?;
        used_storages.locations(sub_range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// A `StorageClient` that keeps its books in-process, so tests can
    /// assert on exactly which segments got created/removed.
    struct MockClient {
        capacities: HashMap<StorageId, MaxSize>,
        created: RefCell<HashMap<(StorageId, SegmentId), Size>>,
        removed: RefCell<Vec<(StorageId, SegmentId)>>,
        next_segment_id: RefCell<u64>,
        fail_create_on: Option<StorageId>,
    }

    impl MockClient {
        fn new(capacities: Vec<(StorageId, MaxSize)>) -> Self {
            MockClient {
                capacities: capacities.into_iter().collect(),
                created: RefCell::new(HashMap::new()),
                removed: RefCell::new(Vec::new()),
                next_segment_id: RefCell::new(0),
                fail_create_on: None,
            }
        }

        fn failing_create_on(mut self, storage_id: StorageId) -> Self {
            self.fail_create_on = Some(storage_id);
            self
        }

        fn created_segments(&self) -> Vec<(StorageId, SegmentId)> {
            self.created.borrow().keys().copied().collect()
        }
    }

    impl StorageClient for MockClient {
        type Error = std::io::Error;

        fn capacities(&self, storage_ids: &[StorageId]) -> Vec<(StorageId, MaxSize)> {
            storage_ids
                .iter()
                .filter_map(|id| self.capacities.get(id).map(|c| (*id, *c)))
                .collect()
        }

        fn segment_create(&self, storage_id: StorageId, size: Size) -> Result<SegmentId, Self::Error> {
            if self.fail_create_on == Some(storage_id) {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "segment_create failed"));
            }
            let mut next = self.next_segment_id.borrow_mut();
            let segment_id = SegmentId::new(*next);
            *next += 1;
            self.created.borrow_mut().insert((storage_id, segment_id), size);
            Ok(segment_id)
        }

        fn segment_remove(&self, storage_id: StorageId, segment_id: SegmentId) -> Result<Size, Self::Error> {
            match self.created.borrow_mut().remove(&(storage_id, segment_id)) {
                Some(size) => {
                    self.removed.borrow_mut().push((storage_id, segment_id));
                    Ok(size)
                }
                None => Err(std::io::Error::new(std::io::ErrorKind::NotFound, "unknown segment")),
            }
        }
    }

    fn limited(v: u64) -> MaxSize {
        MaxSize::Limit(Size::new(v))
    }

    /// A `segment_create` failure on a later storage must not roll back the
    /// segments already created on storages processed earlier.
    #[test]
    fn partial_failure_leaves_earlier_segments_allocated() {
        let client = MockClient::new(vec![
            (StorageId::new(1), limited(10)),
            (StorageId::new(2), limited(10)),
        ])
        .failing_create_on(StorageId::new(2));
        let mut state = State::new();

        let err = state
            .collection_create(&client, CollectionId::new("c1"), &[StorageId::new(1), StorageId::new(2)], Size::new(10))
            .unwrap_err();
        assert!(matches!(err, Error::Common(CommonError::BadAlloc { .. })));

        // storage 1 was processed first (ascending storage id) and its
        // segment_create succeeded before storage 2 failed; it is not
        // rolled back.
        assert_eq!(client.created_segments().len(), 1);
        assert!(state.range(&CollectionId::new("c1")).is_err());
    }

    /// Seed scenario (d): two of the four storages are assigned zero bytes.
    /// `collection_delete` must still remove their (zero-size) segments.
    #[test]
    fn delete_removes_zero_size_segments() {
        let client = MockClient::new(vec![
            (StorageId::new(1), limited(1)),
            (StorageId::new(2), limited(0)),
            (StorageId::new(3), limited(1)),
            (StorageId::new(4), limited(0)),
        ]);
        let mut state = State::new();
        let collection_id = CollectionId::new("c1");
        let storage_ids = [StorageId::new(1), StorageId::new(2), StorageId::new(3), StorageId::new(4)];

        state
            .collection_create(&client, collection_id.clone(), &storage_ids, Size::new(2))
            .unwrap();
        assert_eq!(client.created_segments().len(), 4);

        state.collection_delete(&client, &collection_id).unwrap();
        assert_eq!(client.created_segments().len(), 0);
        assert!(state.range(&collection_id).is_err());
    }
}
