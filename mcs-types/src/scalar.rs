use std::fmt;

use serde::{Deserialize, Serialize};

/// An unsigned count of bytes.
///
/// Construction goes through [`Size::new`] rather than a public tuple field
/// so that every arithmetic operation stays inside this module's `impl`s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Size(u64);

impl Size {
    pub const ZERO: Size = Size(0);

    pub const fn new(bytes: u64) -> Self {
        Size(bytes)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for Size {
    type Output = Size;
    fn add(self, rhs: Size) -> Size {
        Size(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Size {
    type Output = Size;
    fn sub(self, rhs: Size) -> Size {
        Size(self.0 - rhs.0)
    }
}

impl std::ops::Div for Size {
    type Output = u64;
    fn div(self, rhs: Size) -> u64 {
        self.0 / rhs.0
    }
}

impl std::ops::Rem for Size {
    type Output = u64;
    fn rem(self, rhs: Size) -> u64 {
        self.0 % rhs.0
    }
}

impl std::ops::Mul<u64> for Size {
    type Output = Size;
    fn mul(self, rhs: u64) -> Size {
        Size(self.0 * rhs)
    }
}

impl From<u64> for Size {
    fn from(v: u64) -> Self {
        Size(v)
    }
}

/// An unsigned byte offset, distinct from [`Size`] so the two cannot be
/// confused at a call site even though both wrap a `u64`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Offset(u64);

impl Offset {
    pub const ZERO: Offset = Offset(0);

    pub const fn new(bytes: u64) -> Self {
        Offset(bytes)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add<Size> for Offset {
    type Output = Offset;
    fn add(self, rhs: Size) -> Offset {
        Offset(self.0 + rhs.as_u64())
    }
}

impl std::ops::Sub for Offset {
    type Output = Size;
    /// Panics if `rhs > self`; `Offset - Offset` is only defined when
    /// non-negative, matching the source's `Size` friend-subtraction.
    fn sub(self, rhs: Offset) -> Size {
        Size::new(self.0 - rhs.0)
    }
}

impl From<u64> for Offset {
    fn from(v: u64) -> Self {
        Offset(v)
    }
}

/// A half-open `[begin, end)` byte range. `begin <= end` always holds for a
/// successfully constructed `Range`; [`Range::new`] is the only constructor
/// and rejects a reversed pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Range {
    begin: Offset,
    end: Offset,
}

#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
#[error("reversed range: begin ({begin}) > end ({end})")]
pub struct ReversedRangeError {
    pub begin: Offset,
    pub end: Offset,
}

impl Range {
    pub fn new(begin: Offset, end: Offset) -> Result<Self, ReversedRangeError> {
        if begin > end {
            return Err(ReversedRangeError { begin, end });
        }
        Ok(Range { begin, end })
    }

    /// Builds a range from a begin offset and a length; cannot be reversed.
    pub fn from_len(begin: Offset, len: Size) -> Self {
        Range {
            begin,
            end: begin + len,
        }
    }

    pub const fn begin(self) -> Offset {
        self.begin
    }

    pub const fn end(self) -> Offset {
        self.end
    }

    pub fn size(self) -> Size {
        self.end - self.begin
    }

    pub fn is_empty(self) -> bool {
        self.begin == self.end
    }

    pub fn contains(self, offset: Offset) -> bool {
        self.begin <= offset && offset < self.end
    }

    /// Two ranges "touch" when one's end is the other's begin, i.e. they
    /// could be merged into a single contiguous range without overlap.
    pub fn touches(self, other: Range) -> bool {
        self.end == other.begin || other.end == self.begin
    }

    pub fn overlaps(self, other: Range) -> bool {
        self.begin < other.end && other.begin < self.end
    }

    /// `Some` intersection range, `None` if the two ranges do not overlap.
    pub fn intersection(self, other: Range) -> Option<Range> {
        let begin = self.begin.max(other.begin);
        let end = self.end.min(other.end);
        if begin < end {
            Some(Range { begin, end })
        } else {
            None
        }
    }

    /// Shift both endpoints forward by `offset`.
    pub fn shift(self, offset: Offset) -> Range {
        Range {
            begin: Offset::new(self.begin.as_u64() + offset.as_u64()),
            end: Offset::new(self.end.as_u64() + offset.as_u64()),
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_reversed_range() {
        assert!(Range::new(Offset::new(5), Offset::new(2)).is_err());
        assert!(Range::new(Offset::new(2), Offset::new(5)).is_ok());
        assert!(Range::new(Offset::new(3), Offset::new(3)).is_ok());
    }

    #[test]
    fn size_and_intersection() {
        let a = Range::new(Offset::new(0), Offset::new(10)).unwrap();
        let b = Range::new(Offset::new(5), Offset::new(15)).unwrap();
        assert_eq!(a.size(), Size::new(10));
        let i = a.intersection(b).unwrap();
        assert_eq!(i, Range::new(Offset::new(5), Offset::new(10)).unwrap());
    }

    #[test]
    fn round_trip_through_json() {
        let r = Range::new(Offset::new(1), Offset::new(4)).unwrap();
        let encoded = serde_json::to_string(&r).unwrap();
        let decoded: Range = serde_json::from_str(&encoded).unwrap();
        assert_eq!(r, decoded);
    }
}
