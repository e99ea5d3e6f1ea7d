//! Storage backend variants (§4.A): heap, shared-memory, file-backed, and
//! a `Virtual` C-ABI stub. All four present the same operation set; the
//! [`StorageInstance`] tagged union dispatches to whichever is active for
//! a given storage id (§4.B "heterogeneous map").

pub mod file;
pub mod heap;
pub mod shmem;
pub mod virtual_backend;

use mcs_types::{MaxSize, Offset, Range, SegmentId, Size};

use crate::error::Error;

pub use file::{FileBackend, FileCreateParams, FileSegmentRemoveParams, OnRemove};
pub use heap::{HeapBackend, HeapCreateParams, HeapSegmentCreateParams};
pub use shmem::{ShmemBackend, ShmemCreateParams};
pub use virtual_backend::{ChunkChannel, VirtualBackend};

/// Backend-tagged chunk locator. Serializable so a transport can carry
/// `(backend_tag, description)` across the wire (§6).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum ChunkDescription {
    Heap {
        address: u64,
        size: u64,
        sub_begin: u64,
        sub_end: u64,
    },
    Shmem {
        prefix: String,
        segment_id: SegmentId,
        size: u64,
        sub_begin: u64,
        sub_end: u64,
    },
    File {
        path: std::path::PathBuf,
        size: u64,
        sub_begin: u64,
        sub_end: u64,
    },
}

/// `construct` parameters, one variant per backend.
pub enum CreateParams {
    Heap(HeapCreateParams),
    Shmem(ShmemCreateParams),
    File(FileCreateParams),
    Virtual,
}

/// `segment_remove` parameters. Only the file backend's `Keep`/`Remove`
/// distinction is meaningful; the other backends ignore `force_removal`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SegmentRemoveParams {
    pub force_removal: bool,
}

/// The active backend instance for one storage id.
pub enum StorageInstance {
    Heap(HeapBackend),
    Shmem(ShmemBackend),
    File(FileBackend),
    Virtual(VirtualBackend),
}

impl StorageInstance {
    pub fn construct(params: CreateParams) -> Result<Self, Error> {
        let instance = match params {
            CreateParams::Heap(p) => StorageInstance::Heap(
                HeapBackend::construct(p).map_err(|e| Error::Create(Box::new(e)))?,
            ),
            CreateParams::Shmem(p) => StorageInstance::Shmem(
                ShmemBackend::construct(p).map_err(|e| Error::Create(Box::new(e)))?,
            ),
            CreateParams::File(p) => StorageInstance::File(
                FileBackend::construct(p).map_err(|e| Error::Create(Box::new(e)))?,
            ),
            CreateParams::Virtual => StorageInstance::Virtual(
                VirtualBackend::construct().map_err(|e| Error::Create(Box::new(e)))?,
            ),
        };
        Ok(instance)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StorageInstance::Heap(_) => "heap",
            StorageInstance::Shmem(_) => "shmem",
            StorageInstance::File(_) => "file",
            StorageInstance::Virtual(_) => "virtual",
        }
    }

    pub fn size_max(&self) -> MaxSize {
        match self {
            StorageInstance::Heap(b) => b.size_max(),
            StorageInstance::Shmem(b) => b.size_max(),
            StorageInstance::File(b) => b.size_max(),
            StorageInstance::Virtual(b) => b.size_max(),
        }
    }

    pub fn size_used(&self) -> Size {
        match self {
            StorageInstance::Heap(b) => b.size_used(),
            StorageInstance::Shmem(b) => b.size_used(),
            StorageInstance::File(b) => b.size_used(),
            StorageInstance::Virtual(b) => b.size_used(),
        }
    }

    /// Segment creation parameters vary only for the heap backend (the
    /// `mlock` flag) and the file backend (the `on_remove` policy); the
    /// other backends are driven purely by `size`.
    pub fn segment_create(
        &mut self,
        size: Size,
        heap_params: HeapSegmentCreateParams,
        on_remove: OnRemove,
    ) -> Result<SegmentId, Error> {
        match self {
            StorageInstance::Heap(b) => b.segment_create(size, heap_params),
            StorageInstance::Shmem(b) => b.segment_create(size),
            StorageInstance::File(b) => b.segment_create(size, on_remove),
            StorageInstance::Virtual(b) => b.segment_create(size),
        }
    }

    pub fn segment_remove(
        &mut self,
        segment_id: SegmentId,
        params: SegmentRemoveParams,
    ) -> Result<Size, Error> {
        match self {
            StorageInstance::Heap(b) => b.segment_remove(segment_id),
            StorageInstance::Shmem(b) => b.segment_remove(segment_id),
            StorageInstance::File(b) => b.segment_remove(
                segment_id,
                FileSegmentRemoveParams {
                    force_removal: params.force_removal,
                },
            ),
            StorageInstance::Virtual(b) => b.segment_remove(segment_id),
        }
    }

    pub fn chunk_description(
        &self,
        segment_id: SegmentId,
        range: Range,
    ) -> Result<ChunkDescription, Error> {
        match self {
            StorageInstance::Heap(b) => b.chunk_description(segment_id, range),
            StorageInstance::Shmem(b) => b.chunk_description(segment_id, range),
            StorageInstance::File(b) => b.chunk_description(segment_id, range),
            StorageInstance::Virtual(b) => b.chunk_description(segment_id, range),
        }
    }

    pub fn file_read(
        &mut self,
        segment_id: SegmentId,
        offset: Offset,
        path: &std::path::Path,
        range: Range,
    ) -> Result<u64, Error> {
        match self {
            StorageInstance::Heap(b) => b.file_read(segment_id, offset, path, range),
            StorageInstance::Shmem(b) => b.file_read(segment_id, offset, path, range),
            StorageInstance::File(b) => b.file_read(segment_id, offset, path, range),
            StorageInstance::Virtual(_) => Err(Error::VirtualUnavailable("file_read")),
        }
    }

    pub fn file_write(
        &self,
        segment_id: SegmentId,
        offset: Offset,
        path: &std::path::Path,
        range: Range,
    ) -> Result<u64, Error> {
        match self {
            StorageInstance::Heap(b) => b.file_write(segment_id, offset, path, range),
            StorageInstance::Shmem(b) => b.file_write(segment_id, offset, path, range),
            StorageInstance::File(b) => b.file_write(segment_id, offset, path, range),
            StorageInstance::Virtual(_) => Err(Error::VirtualUnavailable("file_write")),
        }
    }
}
