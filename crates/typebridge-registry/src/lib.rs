//! Type cache for typebridge.
//!
//! [`TypeCache`] is the single owner of translated datatypes. The translation
//! engine registers every type it builds here, and callers read them back
//! through the [`TypeId`](typebridge_core::TypeId) handles it hands out.

mod cache;

pub use cache::TypeCache;
