use mcs_types::{BlockId, CommonError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("block {0} is not owned by any storage")]
    BlockNotInAnyStorage(BlockId),
}
