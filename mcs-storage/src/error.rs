use std::path::PathBuf;

use mcs_types::{CommonError, SegmentId};

/// Errors raised by the storage kernel, its backends, and chunk
/// materialization (§4.A-§4.C, §4.H). Domain-specific variants nest a
/// [`CommonError`] via `#[from]` so call sites can match on the shared
/// taxonomy without caring which crate raised it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("access token does not belong to this storage kernel instance")]
    AccessTokenMismatch,

    #[error("unknown segment id: {0}")]
    UnknownSegmentId(SegmentId),

    #[error("failed to construct storage: {0}")]
    Create(#[source] Box<Error>),

    #[error("prefix {path:?} is not usable: {reason}")]
    UnsupportedMount { path: PathBuf, reason: String },

    #[error("prefix {path:?} contains a file that is not a segment: {entry:?}")]
    PrefixContainsNonSegmentFile { path: PathBuf, entry: PathBuf },

    #[error("storage prefix {0:?} does not exist")]
    PrefixDoesNotExist(PathBuf),

    #[error("virtual backend: {0} is not available in this build")]
    VirtualUnavailable(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Nix(#[from] nix::Error),
}
