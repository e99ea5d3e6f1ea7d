//! Collection distributor (§4.F) and collection state (§4.E): splits a
//! requested size as-equally-as-possible across storages with remaining
//! capacity, and tracks the resulting `(range, storage, segment)` bindings
//! per collection.
//!
//! Grounded on `original_source/iov_backend/` (`UsedStorages`, `State`,
//! `AsEqualAsPossible`).

mod distributor;
mod error;
mod state;
mod used_storages;

pub use distributor::{as_equal_as_possible, as_equal_as_possible_sizes};
pub use error::Error;
pub use state::{State, StorageClient};
pub use used_storages::{UsedStorageRecord, UsedStorages};
