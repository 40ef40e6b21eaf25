//! Descriptor translation and signature refresh.
//!
//! - [`TypeManager`] - translates foreign descriptors into cached datatypes
//! - [`TypeManager::parse_func`] - builds function signatures with
//!   calling-convention fallback
//! - [`TypeManager::update`] - refreshes a function prototype from the type at
//!   its address
//! - [`FuncProto`] / [`PrototypePieces`] - the host prototype model
//! - [`Element`] - prototype exchange document
//! - [`SharedTypeManager`] - the engine behind a mutex

mod document;
mod manager;
mod proto;
mod refresh;
mod shared;
mod signature;

pub use document::Element;
pub use manager::{TypeManager, VOID_NAME};
pub use proto::{
    FuncProto, Function, ParamFlags, ParameterPieces, ProtoParam, PrototypePieces, Storage,
};
pub use refresh::RefreshOutcome;
pub use shared::SharedTypeManager;
