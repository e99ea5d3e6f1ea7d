use crate::scalar::Size;

/// What kind of id a [`CommonError::UnknownId`] or [`CommonError::DuplicateId`]
/// refers to, so the rendered message is self-explanatory without a debugger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdKind {
    Storage,
    Segment,
    Block,
    Collection,
}

impl std::fmt::Display for IdKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IdKind::Storage => "storage",
            IdKind::Segment => "segment",
            IdKind::Block => "block",
            IdKind::Collection => "collection",
        };
        write!(f, "{s}")
    }
}

/// Error kinds shared across every `mcs-*` crate (§7 of the design). Each
/// crate's own `Error` type wraps this one via `#[from]`/`#[source]` and adds
/// whatever domain-specific variants it needs (e.g. the file-backend
/// recovery errors, which only `mcs-storage` can raise).
#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("allocation of {requested} bytes failed: {used} of {max} already used")]
    BadAlloc {
        requested: Size,
        used: Size,
        max: Size,
    },

    #[error("unknown {kind} id: {id}")]
    UnknownId { kind: IdKind, id: String },

    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: IdKind, id: String },

    #[error("range extends beyond the addressable size")]
    OutOfRange,

    #[error("operation was interrupted")]
    Interrupted,

    #[error("operation timed out")]
    Timeout,

    #[error("ranges are not touching: {small} does not end where {large} begins")]
    NotTouching { small: String, large: String },

    #[error("access token does not belong to this kernel instance")]
    AccessTokenMismatch,
}

impl CommonError {
    pub fn unknown(kind: IdKind, id: impl std::fmt::Display) -> Self {
        CommonError::UnknownId {
            kind,
            id: id.to_string(),
        }
    }

    pub fn duplicate(kind: IdKind, id: impl std::fmt::Display) -> Self {
        CommonError::DuplicateId {
            kind,
            id: id.to_string(),
        }
    }

    pub fn not_touching(small: impl std::fmt::Display, large: impl std::fmt::Display) -> Self {
        CommonError::NotTouching {
            small: small.to_string(),
            large: large.to_string(),
        }
    }
}
