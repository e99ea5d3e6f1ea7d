//! Scalar value types and the shared error taxonomy used across the mcs
//! storage fabric. Every type here derives `Serialize`/`Deserialize`; the
//! round-trip law `decode(encode(x)) == x` is exercised by the `tests`
//! module of each file rather than asserted generically, since there is no
//! prescribed wire encoding (§6) — `serde_json` stands in for "any
//! encoding" in the tests.

mod access;
mod error;
mod ids;
mod max_size;
mod scalar;

pub use access::{Access, AccessMode, Const, Mutable};
pub use error::{CommonError, IdKind};
pub use ids::{BlockId, CollectionId, SegmentId, StorageId};
pub use max_size::MaxSize;
pub use scalar::{Offset, Range, ReversedRangeError, Size};
