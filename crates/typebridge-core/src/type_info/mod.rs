//! Foreign type descriptors.
//!
//! A [`TypeInfo`] describes one type the way the disassembler database sees
//! it. Descriptors are transient: a source materializes them on demand and the
//! translation engine drops them once the corresponding
//! [`Datatype`](crate::Datatype) has been built.
//!
//! Descriptor trees are finite. A type that refers back to itself does so
//! through [`TypeInfoKind::Named`], a by-name reference the engine resolves
//! through the cache first and through the source only on a miss.
//!
//! # Example
//!
//! ```
//! use typebridge_core::{TypeInfo, TypeInfoKind};
//!
//! // struct node { struct node *next; int value; };
//! let node = TypeInfo::structure("node", 16)
//!     .with_field(0, "next", TypeInfo::pointer("node *", 8, TypeInfo::named("node")))
//!     .with_field(8, "value", TypeInfo::integer("int", 4));
//!
//! assert!(matches!(node.kind, TypeInfoKind::Struct(ref fields) if fields.len() == 2));
//! ```

mod convention;
mod source;

pub use convention::{CM_CC_MASK, CallingConvCode, DeclaredConvention};
pub use source::{TypeInfoDatabase, TypeInfoSource};

use crate::TranslateError;

/// A foreign type descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    /// Type name as recorded by the analysis source. May be empty.
    pub name: String,
    /// Size in bytes. Zero is allowed for void and unsized arrays.
    pub size: u64,
    /// Kind-specific payload.
    pub kind: TypeInfoKind,
}

/// The closed set of descriptor shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeInfoKind {
    /// Pointer to the boxed descriptor.
    Pointer(Box<TypeInfo>),
    /// Boolean.
    Bool,
    /// Wide/unicode character.
    Unicode,
    /// Narrow character.
    Char,
    /// Integer.
    Integer,
    /// Floating point.
    Float,
    /// Aggregate with ordered fields.
    Struct(Vec<StructFieldInfo>),
    /// Void.
    Void,
    /// Function signature.
    Function(FuncInfo),
    /// Array of an element type.
    Array(ArrayInfo),
    /// Anything the source cannot classify. Only the size is meaningful.
    Other,
    /// Reference to the descriptor named `TypeInfo::name`, materialized lazily.
    Named,
}

/// One field of a struct descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct StructFieldInfo {
    /// Byte offset from the start of the struct.
    pub offset: i32,
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: TypeInfo,
}

/// Array payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayInfo {
    /// Element type.
    pub element: Box<TypeInfo>,
    /// Number of elements. Zero marks an unsized (flexible) array.
    pub count: u64,
}

/// Function signature payload.
///
/// `prototype[0]` is the return type, `prototype[1..]` are the parameters.
/// An empty prototype means the source has no prototype information.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FuncInfo {
    /// Return type followed by parameter types.
    pub prototype: Vec<TypeInfo>,
    /// Declared calling convention.
    pub convention: DeclaredConvention,
    /// Whether the function takes a variable argument list.
    pub dotdotdot: bool,
    /// Parameter names, in parameter order.
    pub param_names: Vec<String>,
}

impl TypeInfo {
    /// Create a descriptor from its parts.
    pub fn new(name: impl Into<String>, size: u64, kind: TypeInfoKind) -> Self {
        Self {
            name: name.into(),
            size,
            kind,
        }
    }

    /// Pointer descriptor.
    pub fn pointer(name: impl Into<String>, size: u64, pointee: TypeInfo) -> Self {
        Self::new(name, size, TypeInfoKind::Pointer(Box::new(pointee)))
    }

    /// Boolean descriptor.
    pub fn boolean(name: impl Into<String>, size: u64) -> Self {
        Self::new(name, size, TypeInfoKind::Bool)
    }

    /// Unicode character descriptor.
    pub fn unicode(name: impl Into<String>, size: u64) -> Self {
        Self::new(name, size, TypeInfoKind::Unicode)
    }

    /// Narrow character descriptor.
    pub fn char(name: impl Into<String>, size: u64) -> Self {
        Self::new(name, size, TypeInfoKind::Char)
    }

    /// Integer descriptor.
    pub fn integer(name: impl Into<String>, size: u64) -> Self {
        Self::new(name, size, TypeInfoKind::Integer)
    }

    /// Floating point descriptor.
    pub fn float(name: impl Into<String>, size: u64) -> Self {
        Self::new(name, size, TypeInfoKind::Float)
    }

    /// Struct descriptor without fields. Add fields with [`with_field`](Self::with_field).
    pub fn structure(name: impl Into<String>, size: u64) -> Self {
        Self::new(name, size, TypeInfoKind::Struct(Vec::new()))
    }

    /// Void descriptor.
    pub fn void(name: impl Into<String>, size: u64) -> Self {
        Self::new(name, size, TypeInfoKind::Void)
    }

    /// Function descriptor.
    pub fn function(name: impl Into<String>, func: FuncInfo) -> Self {
        Self::new(name, 0, TypeInfoKind::Function(func))
    }

    /// Array descriptor. `size` is the total byte size.
    pub fn array(name: impl Into<String>, size: u64, element: TypeInfo, count: u64) -> Self {
        Self::new(
            name,
            size,
            TypeInfoKind::Array(ArrayInfo {
                element: Box::new(element),
                count,
            }),
        )
    }

    /// Unclassified descriptor.
    pub fn other(name: impl Into<String>, size: u64) -> Self {
        Self::new(name, size, TypeInfoKind::Other)
    }

    /// By-name reference to another descriptor.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, 0, TypeInfoKind::Named)
    }

    /// Append a field to a struct descriptor. No-op on other kinds.
    pub fn with_field(mut self, offset: i32, name: impl Into<String>, ty: TypeInfo) -> Self {
        if let TypeInfoKind::Struct(fields) = &mut self.kind {
            fields.push(StructFieldInfo {
                offset,
                name: name.into(),
                ty,
            });
        }
        self
    }

    // === Downcasting ===

    /// Get the pointee of a pointer descriptor.
    pub fn as_pointer(&self) -> Option<&TypeInfo> {
        match &self.kind {
            TypeInfoKind::Pointer(pointee) => Some(pointee),
            _ => None,
        }
    }

    /// Get the payload of a function descriptor.
    pub fn as_function(&self) -> Option<&FuncInfo> {
        match &self.kind {
            TypeInfoKind::Function(func) => Some(func),
            _ => None,
        }
    }

    /// Check if this is a by-name reference.
    pub fn is_named_ref(&self) -> bool {
        matches!(self.kind, TypeInfoKind::Named)
    }

    /// Short name of the descriptor kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            TypeInfoKind::Pointer(_) => "pointer",
            TypeInfoKind::Bool => "bool",
            TypeInfoKind::Unicode => "unicode",
            TypeInfoKind::Char => "char",
            TypeInfoKind::Integer => "integer",
            TypeInfoKind::Float => "float",
            TypeInfoKind::Struct(_) => "struct",
            TypeInfoKind::Void => "void",
            TypeInfoKind::Function(_) => "function",
            TypeInfoKind::Array(_) => "array",
            TypeInfoKind::Other => "other",
            TypeInfoKind::Named => "named",
        }
    }
}

impl FuncInfo {
    /// Create a function payload with no prototype information.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the return type, inserting it at position 0.
    pub fn with_return(mut self, ty: TypeInfo) -> Self {
        if self.prototype.is_empty() {
            self.prototype.push(ty);
        } else {
            self.prototype[0] = ty;
        }
        self
    }

    /// Append a named parameter.
    ///
    /// A `void` return is inserted first when no return type has been set.
    pub fn with_param(mut self, name: impl Into<String>, ty: TypeInfo) -> Self {
        if self.prototype.is_empty() {
            self.prototype.push(TypeInfo::void("void", 0));
        }
        self.prototype.push(ty);
        self.param_names.push(name.into());
        self
    }

    /// Replace the parameter name list without touching the prototype.
    pub fn with_param_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.param_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the declared calling convention.
    pub fn with_convention(mut self, convention: DeclaredConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Mark the function as variadic.
    pub fn variadic(mut self) -> Self {
        self.dotdotdot = true;
        self
    }

    /// Return type descriptor, if the prototype is known.
    pub fn return_type(&self) -> Option<&TypeInfo> {
        self.prototype.first()
    }

    /// Parameter descriptors.
    pub fn params(&self) -> &[TypeInfo] {
        self.prototype.get(1..).unwrap_or(&[])
    }

    /// Read the declared calling-convention model name.
    pub fn calling_convention(&self) -> Result<&str, TranslateError> {
        self.convention.model_name()
    }
}
