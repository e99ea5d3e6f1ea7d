use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            pub const fn new(v: u64) -> Self {
                $name(v)
            }

            pub const fn as_u64(self) -> u64 {
                self.0
            }

            /// The next id after this one; ids in this fabric are
            /// monotonically allocated and never reused.
            pub fn next(self) -> Self {
                $name(self.0 + 1)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                $name(v)
            }
        }
    };
}

id_newtype!(StorageId, "Opaque handle, unique within one storage kernel process; never reused after removal.");
id_newtype!(SegmentId, "Unique within a single storage instance; assigned monotonically by that backend.");
id_newtype!(BlockId, "Globally ordered within one meta-data instance; never reused after removal.");

/// Opaque string chosen by the caller; unique within one collection-state
/// instance. Unlike the other ids this one is not kernel-assigned, so it is
/// a thin wrapper over `String` rather than the `u64` id newtype family.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CollectionId(String);

impl CollectionId {
    pub fn new(id: impl Into<String>) -> Self {
        CollectionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CollectionId {
    fn from(v: &str) -> Self {
        CollectionId(v.to_owned())
    }
}

impl From<String> for CollectionId {
    fn from(v: String) -> Self {
        CollectionId(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_json() {
        let id = StorageId::new(7);
        let encoded = serde_json::to_string(&id).unwrap();
        let decoded: StorageId = serde_json::from_str(&encoded).unwrap();
        assert_eq!(id, decoded);
    }

    #[test]
    fn next_is_strictly_monotonic() {
        let id = BlockId::new(3);
        assert!(id.next() > id);
    }
}
