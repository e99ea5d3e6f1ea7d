//! Storage kernel (§4.B), storage backends (§4.A), and chunk
//! materialization (§4.C): the per-process container of heap / shared
//! memory / file / virtual storage instances that the block-device and
//! distributor layers address by `(storage_id, segment_id)`.

#![deny(unsafe_op_in_unsafe_fn)]

pub mod backends;
pub mod chunk;
pub mod client;
pub mod error;
pub mod kernel;

pub use backends::{
    ChunkDescription, CreateParams, FileCreateParams, HeapCreateParams, HeapSegmentCreateParams,
    OnRemove, SegmentRemoveParams, ShmemCreateParams, StorageInstance,
};
pub use chunk::ChunkState;
pub use client::KernelClient;
pub use error::Error;
pub use kernel::{ReadToken, SegmentHandle, StorageHandle, StorageKernel, WriteToken};
