//! A thin [`StorageClient`] implementation backed by a [`StorageKernel`]
//! (§4.E/§4.F collaborator). `mcs-distributor::State` is written against
//! the `StorageClient` trait so it stays independent of any concrete
//! backend; this is the adapter that wires a real kernel into it, the way
//! `original_source/iov_backend/src/provider/State.cpp`'s caller passes a
//! live `storages_clients` callback bundle rather than a mock.

use std::sync::Arc;

use mcs_distributor::StorageClient;
use mcs_types::{MaxSize, SegmentId, Size, StorageId};

use crate::backends::{HeapSegmentCreateParams, OnRemove, SegmentRemoveParams};
use crate::error::Error;
use crate::kernel::StorageKernel;

/// Adapts a [`StorageKernel`] to [`StorageClient`]. Segments are created
/// with default heap parameters and `OnRemove::Remove`, matching the
/// distributor's own contract that a segment it created is fully released
/// on `segment_remove`.
pub struct KernelClient {
    kernel: Arc<StorageKernel>,
}

impl KernelClient {
    pub fn new(kernel: Arc<StorageKernel>) -> Self {
        KernelClient { kernel }
    }
}

impl StorageClient for KernelClient {
    type Error = Error;

    fn capacities(&self, storage_ids: &[StorageId]) -> Vec<(StorageId, MaxSize)> {
        let token = self.kernel.read_access();
        storage_ids
            .iter()
            .filter_map(|&storage_id| {
                let max = self.kernel.size_max(&token, storage_id).ok()?;
                let used = self.kernel.size_used(&token, storage_id).ok()?;
                let remaining = match max {
                    MaxSize::Unlimited => MaxSize::Unlimited,
                    MaxSize::Limit(max) => MaxSize::Limit(max - used),
                };
                Some((storage_id, remaining))
            })
            .collect()
    }

    fn segment_create(&self, storage_id: StorageId, size: Size) -> Result<SegmentId, Self::Error> {
        let mut token = self.kernel.write_access();
        self.kernel.segment_create(
            &mut token,
            storage_id,
            size,
            HeapSegmentCreateParams::default(),
            OnRemove::Remove,
        )
    }

    fn segment_remove(&self, storage_id: StorageId, segment_id: SegmentId) -> Result<Size, Self::Error> {
        let mut token = self.kernel.write_access();
        self.kernel
            .segment_remove(&mut token, storage_id, segment_id, SegmentRemoveParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{CreateParams, HeapCreateParams};
    use mcs_types::MaxSize;

    #[test]
    fn capacities_skips_unknown_storage_ids() {
        let kernel = StorageKernel::new();
        let storage_id = {
            let mut token = kernel.write_access();
            kernel
                .create(
                    &mut token,
                    CreateParams::Heap(HeapCreateParams {
                        max_size: MaxSize::Limit(Size::new(1024)),
                    }),
                )
                .unwrap()
        };
        let client = KernelClient::new(kernel);

        let capacities = client.capacities(&[storage_id, StorageId::new(999)]);
        assert_eq!(capacities, vec![(storage_id, MaxSize::Limit(Size::new(1024)))]);
    }

    #[test]
    fn capacities_reports_remaining_not_total() {
        let kernel = StorageKernel::new();
        let storage_id = {
            let mut token = kernel.write_access();
            kernel
                .create(
                    &mut token,
                    CreateParams::Heap(HeapCreateParams {
                        max_size: MaxSize::Limit(Size::new(100)),
                    }),
                )
                .unwrap()
        };
        let client = KernelClient::new(kernel);
        client.segment_create(storage_id, Size::new(50)).unwrap();

        let capacities = client.capacities(&[storage_id]);
        assert_eq!(capacities, vec![(storage_id, MaxSize::Limit(Size::new(50)))]);
    }

    #[test]
    fn segment_create_then_remove_round_trips() {
        let kernel = StorageKernel::new();
        let storage_id = {
            let mut token = kernel.write_access();
            kernel
                .create(&mut token, CreateParams::Heap(HeapCreateParams { max_size: MaxSize::Unlimited }))
                .unwrap()
        };
        let client = KernelClient::new(kernel);

        let segment_id = client.segment_create(storage_id, Size::new(32)).unwrap();
        let freed = client.segment_remove(storage_id, segment_id).unwrap();
        assert_eq!(freed, Size::new(32));
    }
}
