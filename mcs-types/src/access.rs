//! The `{Const, Mutable}` access-mode tag, modelled as a sealed pair of
//! zero-sized marker types rather than a runtime enum so that
//! `ChunkDescription<Const>` and `ChunkDescription<Mutable>` are distinct,
//! non-interchangeable types at compile time — the same guarantee the
//! source gets from a template parameter.

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Const {}
    impl Sealed for super::Mutable {}
}

/// A compile-time access-mode tag. Implemented only by [`Const`] and
/// [`Mutable`]; not implementable outside this crate.
pub trait Access: sealed::Sealed + Clone + Copy + std::fmt::Debug + 'static {
    const MODE: AccessMode;
}

/// Read-only access.
#[derive(Clone, Copy, Debug)]
pub struct Const;

/// Read-write access.
#[derive(Clone, Copy, Debug)]
pub struct Mutable;

impl Access for Const {
    const MODE: AccessMode = AccessMode::Const;
}

impl Access for Mutable {
    const MODE: AccessMode = AccessMode::Mutable;
}

/// Runtime counterpart of [`Access`], used where the mode must cross a
/// serialization boundary (it cannot be recovered from a phantom type once
/// encoded).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AccessMode {
    Const,
    Mutable,
}
