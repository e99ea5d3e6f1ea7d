use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scalar::Size;

/// `{Unlimited, Limit(Size)}` with lattice semantics: `Unlimited` absorbs
/// addition and is always the greater value.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum MaxSize {
    Unlimited,
    Limit(Size),
}

impl MaxSize {
    pub fn is_unlimited(self) -> bool {
        matches!(self, MaxSize::Unlimited)
    }

    /// Panics if `self` is `Unlimited`; mirrors the source's
    /// precondition-checked `limit()` accessor.
    pub fn limit(self) -> Size {
        match self {
            MaxSize::Limit(s) => s,
            MaxSize::Unlimited => panic!("MaxSize::limit called on Unlimited"),
        }
    }

    /// Whether `requested` fits below this max when added to `used`.
    pub fn accommodates(self, used: Size, requested: Size) -> bool {
        match self {
            MaxSize::Unlimited => true,
            MaxSize::Limit(max) => used + requested <= max,
        }
    }
}

impl PartialEq for MaxSize {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MaxSize::Unlimited, MaxSize::Unlimited) => true,
            (MaxSize::Limit(a), MaxSize::Limit(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for MaxSize {}

impl PartialOrd for MaxSize {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MaxSize {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (MaxSize::Unlimited, MaxSize::Unlimited) => Ordering::Equal,
            (MaxSize::Unlimited, MaxSize::Limit(_)) => Ordering::Greater,
            (MaxSize::Limit(_), MaxSize::Unlimited) => Ordering::Less,
            (MaxSize::Limit(a), MaxSize::Limit(b)) => a.cmp(b),
        }
    }
}

impl std::ops::Add for MaxSize {
    type Output = MaxSize;
    fn add(self, rhs: MaxSize) -> MaxSize {
        match (self, rhs) {
            (MaxSize::Unlimited, _) | (_, MaxSize::Unlimited) => MaxSize::Unlimited,
            (MaxSize::Limit(a), MaxSize::Limit(b)) => MaxSize::Limit(a + b),
        }
    }
}

impl fmt::Display for MaxSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxSize::Unlimited => write!(f, "unlimited"),
            MaxSize::Limit(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_dominates_addition() {
        let sum = MaxSize::Unlimited + MaxSize::Limit(Size::new(5));
        assert!(sum.is_unlimited());
    }

    #[test]
    fn unlimited_is_not_less_than_itself() {
        assert!(!(MaxSize::Unlimited < MaxSize::Unlimited));
    }

    #[test]
    fn ordering_matches_lattice() {
        assert!(MaxSize::Limit(Size::new(1)) < MaxSize::Limit(Size::new(2)));
        assert!(MaxSize::Limit(Size::new(100)) < MaxSize::Unlimited);
    }
}
