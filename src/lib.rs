//! typebridge - disassembler type descriptors to decompiler datatypes.
//!
//! The workspace is split the way the data flows:
//!
//! - [`core`] - descriptors, datatypes, calling-convention models, errors
//! - [`registry`] - the canonical type cache
//! - [`translate`] - the translation engine, signature builder, prototype
//!   model and signature refresh
//!
//! # Example
//!
//! ```
//! use typebridge::prelude::*;
//!
//! let db = TypeInfoDatabase::new().with_address(
//!     0x401000,
//!     TypeInfo::function(
//!         "add",
//!         FuncInfo::new()
//!             .with_return(TypeInfo::integer("int", 4))
//!             .with_param("lhs", TypeInfo::integer("int", 4))
//!             .with_param("rhs", TypeInfo::integer("int", 4)),
//!     ),
//! );
//! let mut manager = TypeManager::x86(db);
//!
//! // The prototype as first recovered: two unnamed ints.
//! let recovered = FuncInfo::new()
//!     .with_return(TypeInfo::integer("int", 4))
//!     .with_param("", TypeInfo::integer("int", 4))
//!     .with_param("", TypeInfo::integer("int", 4));
//! let sig = manager.parse_func(&recovered).unwrap();
//! let mut function = Function::new(
//!     "add",
//!     0x401000,
//!     FuncProto::from_signature(&sig, manager.cache()),
//! );
//!
//! assert_eq!(manager.update(&mut function), Ok(RefreshOutcome::Updated));
//! assert_eq!(function.proto.param_names(), vec!["lhs", "rhs"]);
//! ```

pub use typebridge_core as core;
pub use typebridge_registry as registry;
pub use typebridge_translate as translate;

pub use typebridge_core::{TranslateError, TypeHash, TypeId};
pub use typebridge_registry::TypeCache;
pub use typebridge_translate::{SharedTypeManager, TypeManager};

// Re-export main types
pub mod prelude {
    pub use typebridge_core::{
        ArchConfig, CallingConvCode, ConventionRegistry, Datatype, DatatypeKind,
        DeclaredConvention, DocumentError, FuncInfo, FuncSignature, MetaType, ProtoModel,
        RefreshMode, TranslateError, TypeField, TypeHash, TypeId, TypeInfo, TypeInfoDatabase,
        TypeInfoKind, TypeInfoSource,
    };
    pub use typebridge_registry::TypeCache;
    pub use typebridge_translate::{
        Element, FuncProto, Function, ParamFlags, ParameterPieces, ProtoParam, PrototypePieces,
        RefreshOutcome, SharedTypeManager, Storage, TypeManager,
    };
}
