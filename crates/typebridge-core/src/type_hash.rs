//! Deterministic hash-based type identity.
//!
//! This module provides [`TypeHash`], a 64-bit hash computed from a type name.
//! It is the identity token the translation engine accepts next to a name, so
//! that repeated lookups of an already-translated type can skip the string
//! index entirely.
//!
//! # Hash Computation
//!
//! Uses XXHash64 with a domain-specific mixing constant so that type hashes do
//! not collide with the raw xxh64 of the same bytes used elsewhere.
//!
//! # Examples
//!
//! ```
//! use typebridge_core::TypeHash;
//!
//! let a = TypeHash::from_name("_EXCEPTION_RECORD");
//! let b = TypeHash::from_name("_EXCEPTION_RECORD");
//! assert_eq!(a, b);
//! assert_ne!(a, TypeHash::from_name("_CONTEXT"));
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
pub mod hash_constants {
    /// Domain marker for type hashes
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;
}

/// A deterministic 64-bit hash identifying a named type.
///
/// The same name always produces the same hash, so a caller can compute the
/// token before the type has been translated.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant. Anonymous types carry this hash.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a type hash from a type name.
    ///
    /// The empty name maps to [`TypeHash::EMPTY`].
    #[inline]
    pub fn from_name(name: &str) -> Self {
        if name.is_empty() {
            return Self::EMPTY;
        }
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Check if this is an empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
