//! Core types for typebridge.
//!
//! This crate holds the vocabulary shared by the rest of the workspace:
//!
//! - [`TypeInfo`] - foreign type descriptors and the [`TypeInfoSource`] boundary
//! - [`Datatype`] - translated types, addressed by [`TypeId`]
//! - [`ConventionRegistry`] / [`ProtoModel`] - calling-convention models
//! - [`ArchConfig`] - per-target constants
//! - [`TranslateError`] / [`DocumentError`] - error types
//! - [`TypeHash`] - name-derived identity token

mod arch;
mod convention;
mod datatype;
mod error;
mod ids;
mod type_hash;
pub mod type_info;

pub use arch::{ALLOCA_PROBE, ArchConfig, FAST_CONVENTION, RefreshMode};
pub use convention::{ConventionRegistry, ProtoModel};
pub use datatype::{CODE_TYPE_SIZE, Datatype, DatatypeKind, FuncSignature, MetaType, TypeField};
pub use error::{DocumentError, TranslateError};
pub use ids::TypeId;
pub use type_hash::{TypeHash, hash_constants};
pub use type_info::{
    ArrayInfo, CallingConvCode, DeclaredConvention, FuncInfo, StructFieldInfo, TypeInfo,
    TypeInfoDatabase, TypeInfoKind, TypeInfoSource,
};
