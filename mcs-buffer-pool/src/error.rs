#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("buffer pool acquire timed out")]
    Timeout,

    #[error("buffer pool acquire was interrupted")]
    Interrupted,

    #[error("buffer pool has been marked failed: {0}")]
    PoolFailed(String),
}
