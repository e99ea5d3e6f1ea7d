use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use mcs_types::{Access, CommonError, IdKind, MaxSize, Offset, Range, SegmentId, Size, StorageId};

use crate::backends::{
    ChunkDescription, CreateParams, HeapSegmentCreateParams, OnRemove, SegmentRemoveParams,
    StorageInstance,
};
use crate::chunk::{self, ChunkState};
use crate::error::Error;

struct Inner {
    storages: HashMap<StorageId, StorageInstance>,
    next_storage_id: StorageId,
}

/// A per-process container of storage instances (§4.B). Every public
/// operation other than [`StorageKernel::read_access`]/
/// [`StorageKernel::write_access`] takes an access token by reference and
/// verifies the token belongs to this exact kernel instance before doing
/// anything — the dynamic mutex-address check the source uses to catch
/// cross-kernel token confusion.
pub struct StorageKernel {
    inner: RwLock<Inner>,
}

/// A capability proving the holder took the kernel's shared lock.
pub struct ReadToken<'k> {
    kernel: &'k StorageKernel,
    guard: RwLockReadGuard<'k, Inner>,
}

/// A capability proving the holder took the kernel's exclusive lock.
pub struct WriteToken<'k> {
    kernel: &'k StorageKernel,
    guard: RwLockWriteGuard<'k, Inner>,
}

fn check_token(token_kernel: *const StorageKernel, kernel: &StorageKernel) -> Result<(), Error> {
    if token_kernel != kernel as *const StorageKernel {
        return Err(Error::AccessTokenMismatch);
    }
    Ok(())
}

impl StorageKernel {
    pub fn new() -> Arc<Self> {
        Arc::new(StorageKernel {
            inner: RwLock::new(Inner {
                storages: HashMap::new(),
                next_storage_id: StorageId::new(0),
            }),
        })
    }

    pub fn read_access(&self) -> ReadToken<'_> {
        ReadToken {
            kernel: self,
            guard: self.inner.read().expect("storage kernel lock poisoned"),
        }
    }

    pub fn write_access(&self) -> WriteToken<'_> {
        WriteToken {
            kernel: self,
            guard: self.inner.write().expect("storage kernel lock poisoned"),
        }
    }

    /// `create<T>` (§4.B): constructs a backend instance and assigns the
    /// next storage id. The id is incremented even if construction fails,
    /// matching the source's "monotonic regardless of emplace outcome"
    /// contract.
    pub fn create(&self, token: &mut WriteToken<'_>, params: CreateParams) -> Result<StorageId, Error> {
        check_token(token.kernel as *const StorageKernel, self)?;
        let id = token.guard.next_storage_id;
        token.guard.next_storage_id = id.next();
        let instance = StorageInstance::construct(params)?;
        token.guard.storages.insert(id, instance);
        Ok(id)
    }

    /// `remove` (§4.B): erases the entry; the backend's own resources are
    /// released by `StorageInstance`'s drop glue.
    pub fn remove(&self, token: &mut WriteToken<'_>, storage_id: StorageId) -> Result<(), Error> {
        check_token(token.kernel as *const StorageKernel, self)?;
        token
            .guard
            .storages
            .remove(&storage_id)
            .ok_or_else(|| CommonError::unknown(IdKind::Storage, storage_id).into())
            .map(|_| ())
    }

    fn at<'a>(
        storages: &'a HashMap<StorageId, StorageInstance>,
        storage_id: StorageId,
    ) -> Result<&'a StorageInstance, Error> {
        storages
            .get(&storage_id)
            .ok_or_else(|| CommonError::unknown(IdKind::Storage, storage_id).into())
    }

    pub fn size_max(&self, token: &ReadToken<'_>, storage_id: StorageId) -> Result<MaxSize, Error> {
        check_token(token.kernel as *const StorageKernel, self)?;
        Ok(Self::at(&token.guard.storages, storage_id)?.size_max())
    }

    pub fn size_used(&self, token: &ReadToken<'_>, storage_id: StorageId) -> Result<Size, Error> {
        check_token(token.kernel as *const StorageKernel, self)?;
        Ok(Self::at(&token.guard.storages, storage_id)?.size_used())
    }

    pub fn segment_create(
        &self,
        token: &mut WriteToken<'_>,
        storage_id: StorageId,
        size: Size,
        heap_params: HeapSegmentCreateParams,
        on_remove: OnRemove,
    ) -> Result<SegmentId, Error> {
        check_token(token.kernel as *const StorageKernel, self)?;
        let instance = token
            .guard
            .storages
            .get_mut(&storage_id)
            .ok_or_else(|| Error::from(CommonError::unknown(IdKind::Storage, storage_id)))?;
        instance.segment_create(size, heap_params, on_remove)
    }

    pub fn segment_remove(
        &self,
        token: &mut WriteToken<'_>,
        storage_id: StorageId,
        segment_id: SegmentId,
        params: SegmentRemoveParams,
    ) -> Result<Size, Error> {
        check_token(token.kernel as *const StorageKernel, self)?;
        let instance = token
            .guard
            .storages
            .get_mut(&storage_id)
            .ok_or_else(|| Error::from(CommonError::unknown(IdKind::Storage, storage_id)))?;
        instance.segment_remove(segment_id, params)
    }

    pub fn chunk_description(
        &self,
        token: &ReadToken<'_>,
        storage_id: StorageId,
        segment_id: SegmentId,
        range: Range,
    ) -> Result<ChunkDescription, Error> {
        check_token(token.kernel as *const StorageKernel, self)?;
        Self::at(&token.guard.storages, storage_id)?.chunk_description(segment_id, range)
    }

    /// Materializes a chunk directly; combines `chunk_description` and
    /// `chunk.rs::materialize` (§4.C) for callers that do not need the
    /// description to cross a transport boundary first.
    pub fn chunk_state<A: Access>(
        &self,
        token: &ReadToken<'_>,
        storage_id: StorageId,
        segment_id: SegmentId,
        range: Range,
    ) -> Result<ChunkState<A>, Error> {
        let description = self.chunk_description(token, storage_id, segment_id, range)?;
        chunk::materialize::<A>(&description)
    }

    /// `file_read`/`file_write` (§4.A): the read lock is held for the
    /// duration of the backend call (§9, resolved open question).
    pub fn file_read(
        &self,
        token: &mut WriteToken<'_>,
        storage_id: StorageId,
        segment_id: SegmentId,
        offset: Offset,
        path: &std::path::Path,
        range: Range,
    ) -> Result<u64, Error> {
        check_token(token.kernel as *const StorageKernel, self)?;
        let instance = token
            .guard
            .storages
            .get_mut(&storage_id)
            .ok_or_else(|| Error::from(CommonError::unknown(IdKind::Storage, storage_id)))?;
        instance.file_read(segment_id, offset, path, range)
    }

    pub fn file_write(
        &self,
        token: &ReadToken<'_>,
        storage_id: StorageId,
        segment_id: SegmentId,
        offset: Offset,
        path: &std::path::Path,
        range: Range,
    ) -> Result<u64, Error> {
        check_token(token.kernel as *const StorageKernel, self)?;
        Self::at(&token.guard.storages, storage_id)?.file_write(segment_id, offset, path, range)
    }
}

/// Owns a storage id and removes it from the kernel on drop (§4.H). Any
/// failure while doing so is fatal: this discipline mirrors
/// `ProcessLockSharedGuard`/`ProcessLockExclusiveGuard`'s `panic!`-in-`Drop`
/// idiom, escalated to a process abort so a double-failure never unwinds
/// through an already-unwinding drop.
pub struct StorageHandle {
    kernel: Arc<StorageKernel>,
    storage_id: StorageId,
    released: bool,
}

impl StorageHandle {
    pub fn new(kernel: Arc<StorageKernel>, storage_id: StorageId) -> Self {
        StorageHandle {
            kernel,
            storage_id,
            released: false,
        }
    }

    pub fn id(&self) -> StorageId {
        self.storage_id
    }

    pub fn kernel(&self) -> &Arc<StorageKernel> {
        &self.kernel
    }
}

impl Drop for StorageHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let mut token = self.kernel.write_access();
        if let Err(err) = self.kernel.remove(&mut token, self.storage_id) {
            log::error!("storage handle drop: failed to remove storage {} - {err}", self.storage_id);
            std::process::abort();
        }
    }
}

/// Owns a segment id inside one storage and removes it on drop (§4.H).
pub struct SegmentHandle {
    kernel: Arc<StorageKernel>,
    storage_id: StorageId,
    segment_id: SegmentId,
    remove_params: SegmentRemoveParams,
}

impl SegmentHandle {
    pub fn new(
        kernel: Arc<StorageKernel>,
        storage_id: StorageId,
        segment_id: SegmentId,
        remove_params: SegmentRemoveParams,
    ) -> Self {
        SegmentHandle {
            kernel,
            storage_id,
            segment_id,
            remove_params,
        }
    }

    pub fn storage_id(&self) -> StorageId {
        self.storage_id
    }

    pub fn segment_id(&self) -> SegmentId {
        self.segment_id
    }
}

impl Drop for SegmentHandle {
    fn drop(&mut self) {
        let mut token = self.kernel.write_access();
        if let Err(err) =
            self.kernel
                .segment_remove(&mut token, self.storage_id, self.segment_id, self.remove_params)
        {
            log::error!(
                "segment handle drop: failed to remove segment {} of storage {} - {err}",
                self.segment_id,
                self.storage_id
            );
            std::process::abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{HeapCreateParams, HeapSegmentCreateParams};
    use mcs_types::{Const, MaxSize};

    fn new_heap_storage(kernel: &StorageKernel) -> StorageId {
        let mut token = kernel.write_access();
        kernel
            .create(
                &mut token,
                CreateParams::Heap(HeapCreateParams {
                    max_size: MaxSize::Unlimited,
                }),
            )
            .unwrap()
    }

    #[test]
    fn unknown_storage_id_is_reported() {
        let kernel = StorageKernel::new();
        let token = kernel.read_access();
        let err = kernel.size_used(&token, StorageId::new(99)).unwrap_err();
        assert!(matches!(err, Error::Common(CommonError::UnknownId { .. })));
    }

    /// Ambient-stack test 10: a token from kernel A presented to kernel B.
    #[test]
    fn token_from_a_different_kernel_is_rejected() {
        let kernel_a = StorageKernel::new();
        let kernel_b = StorageKernel::new();
        new_heap_storage(&kernel_a);

        // A token whose `kernel` pointer belongs to A, presented to B's
        // method dispatch.
        let token_from_a = ReadToken {
            kernel: kernel_a.as_ref(),
            guard: kernel_a.inner.read().unwrap(),
        };
        let err = kernel_b.size_used(&token_from_a, StorageId::new(0)).unwrap_err();
        assert!(matches!(err, Error::AccessTokenMismatch));
    }

    #[test]
    fn segment_lifecycle_round_trips() {
        let kernel = StorageKernel::new();
        let storage_id = new_heap_storage(&kernel);

        let segment_id = {
            let mut token = kernel.write_access();
            kernel
                .segment_create(
                    &mut token,
                    storage_id,
                    Size::new(16),
                    HeapSegmentCreateParams::default(),
                    OnRemove::Keep,
                )
                .unwrap()
        };

        let token = kernel.read_access();
        let description = kernel
            .chunk_description(
                &token,
                storage_id,
                segment_id,
                Range::new(Offset::new(0), Offset::new(16)).unwrap(),
            )
            .unwrap();
        drop(token);

        let state = chunk::materialize::<Const>(&description).unwrap();
        assert_eq!(state.len(), 16);
    }
}
