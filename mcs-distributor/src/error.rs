use mcs_types::{CommonError, MaxSize, Range, Size};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("requested {requested} bytes but only {available} are available across the given storages")]
    InsufficientCapacity { requested: Size, available: MaxSize },

    #[error("used-storages range is empty")]
    RangeEmpty,

    #[error("sub-range {sub_range} is not contained in collection range {collection_range}")]
    SubRangeNotContained {
        sub_range: Range,
        collection_range: Range,
    },

    #[error("{failed} of {attempted} per-storage removals failed while deleting the collection: {details}")]
    AggregateDeleteFailure {
        attempted: usize,
        failed: usize,
        details: String,
    },
}

impl Error {
    pub fn aggregate_delete_failure(attempted: usize, failures: &[String]) -> Self {
        Error::AggregateDeleteFailure {
            attempted,
            failed: failures.len(),
            details: failures.join("; "),
        }
    }
}
