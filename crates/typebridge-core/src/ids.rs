//! Handles into the datatype arena.

use std::fmt;

/// Stable handle to a translated [`Datatype`](crate::Datatype).
///
/// Handles index the type cache's arena. A handle stays valid, and keeps
/// pointing at the same type, for the lifetime of the cache. That stability is
/// what lets a struct placeholder be referenced by its own fields before the
/// fields have been filled in.
///
/// # Example
///
/// ```
/// use typebridge_core::TypeId;
///
/// let id = TypeId::new(3);
/// assert_eq!(id.index(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    /// Create a handle for the given arena slot.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Get the arena slot.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type_{}", self.0)
    }
}

impl From<u32> for TypeId {
    fn from(index: u32) -> Self {
        Self::new(index)
    }
}

impl From<TypeId> for u32 {
    fn from(id: TypeId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_id_display() {
        assert_eq!(format!("{}", TypeId::new(5)), "type_5");
    }

    #[test]
    fn type_id_conversions() {
        let id: TypeId = 7u32.into();
        let raw: u32 = id.into();
        assert_eq!(raw, 7);
    }
}
