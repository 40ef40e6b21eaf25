//! Internal datatypes.
//!
//! A [`Datatype`] is the decompiler-side representation of one type. Datatypes
//! live in the type cache arena and refer to one another through [`TypeId`]
//! handles, never by ownership, so a struct can contain a pointer to itself.

use std::fmt;
use std::sync::Arc;

use crate::{ProtoModel, TypeHash, TypeId};

/// Size reported for function-signature types.
pub const CODE_TYPE_SIZE: u64 = 1;

/// Coarse classification of a datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaType {
    Void,
    Bool,
    Int,
    Float,
    Ptr,
    Array,
    Struct,
    Code,
    Unknown,
}

impl MetaType {
    /// Lower-case name of the classification.
    pub const fn name(self) -> &'static str {
        match self {
            MetaType::Void => "void",
            MetaType::Bool => "bool",
            MetaType::Int => "int",
            MetaType::Float => "float",
            MetaType::Ptr => "ptr",
            MetaType::Array => "array",
            MetaType::Struct => "struct",
            MetaType::Code => "code",
            MetaType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MetaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A translated type.
#[derive(Debug, Clone, PartialEq)]
pub struct Datatype {
    /// Name copied from the source descriptor. Empty for anonymous types.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Identity token derived from the name.
    pub type_hash: TypeHash,
    /// Kind-specific payload.
    pub kind: DatatypeKind,
}

/// Kind-specific payload of a [`Datatype`].
#[derive(Debug, Clone, PartialEq)]
pub enum DatatypeKind {
    /// Pointer. The datatype's size is the address width.
    Pointer {
        /// Pointed-to type.
        pointee: TypeId,
        /// Addressable unit size of the pointed-to space.
        word_size: u32,
    },
    Bool,
    /// Wide character. Behaves as an integer for arithmetic.
    Unicode,
    Char,
    Int,
    Float,
    /// Aggregate. Empty while the struct is still being translated.
    Struct {
        /// Fields in declaration order.
        fields: Vec<TypeField>,
    },
    Void,
    /// Function signature.
    Code(FuncSignature),
    /// Fixed-size array.
    Array {
        /// Element type.
        element: TypeId,
        /// Number of elements.
        count: u64,
    },
    /// Opaque type of known size.
    Unknown,
}

/// A struct field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeField {
    /// Byte offset from the start of the struct.
    pub offset: i32,
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: TypeId,
}

/// A function signature: convention model, return type and parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncSignature {
    /// Calling-convention model.
    pub model: Arc<ProtoModel>,
    /// Return type.
    pub output: TypeId,
    /// Parameter types in order. Repeated types are kept per position.
    pub inputs: Vec<TypeId>,
    /// Whether the function is variadic.
    pub dotdotdot: bool,
}

impl Datatype {
    /// Create a datatype from its parts. The identity hash is derived from `name`.
    pub fn new(name: impl Into<String>, size: u64, kind: DatatypeKind) -> Self {
        let name = name.into();
        Self {
            type_hash: TypeHash::from_name(&name),
            name,
            size,
            kind,
        }
    }

    /// Pointer of `addr_size` bytes.
    pub fn pointer(name: impl Into<String>, addr_size: u32, pointee: TypeId, word_size: u32) -> Self {
        Self::new(
            name,
            u64::from(addr_size),
            DatatypeKind::Pointer { pointee, word_size },
        )
    }

    /// Boolean.
    pub fn boolean(name: impl Into<String>, size: u64) -> Self {
        Self::new(name, size, DatatypeKind::Bool)
    }

    /// Unicode character.
    pub fn unicode(name: impl Into<String>, size: u64) -> Self {
        Self::new(name, size, DatatypeKind::Unicode)
    }

    /// Narrow character.
    pub fn char(name: impl Into<String>, size: u64) -> Self {
        Self::new(name, size, DatatypeKind::Char)
    }

    /// Integer.
    pub fn int(name: impl Into<String>, size: u64) -> Self {
        Self::new(name, size, DatatypeKind::Int)
    }

    /// Floating point.
    pub fn float(name: impl Into<String>, size: u64) -> Self {
        Self::new(name, size, DatatypeKind::Float)
    }

    /// Struct with no fields yet.
    pub fn structure(name: impl Into<String>, size: u64) -> Self {
        Self::new(name, size, DatatypeKind::Struct { fields: Vec::new() })
    }

    /// Void.
    pub fn void(name: impl Into<String>, size: u64) -> Self {
        Self::new(name, size, DatatypeKind::Void)
    }

    /// Function signature.
    pub fn code(name: impl Into<String>, signature: FuncSignature) -> Self {
        Self::new(name, CODE_TYPE_SIZE, DatatypeKind::Code(signature))
    }

    /// Array occupying `size` bytes.
    pub fn array(name: impl Into<String>, size: u64, element: TypeId, count: u64) -> Self {
        Self::new(name, size, DatatypeKind::Array { element, count })
    }

    /// Opaque type.
    pub fn unknown(name: impl Into<String>, size: u64) -> Self {
        Self::new(name, size, DatatypeKind::Unknown)
    }

    /// Coarse classification.
    pub fn metatype(&self) -> MetaType {
        match self.kind {
            DatatypeKind::Pointer { .. } => MetaType::Ptr,
            DatatypeKind::Bool => MetaType::Bool,
            DatatypeKind::Unicode | DatatypeKind::Char | DatatypeKind::Int => MetaType::Int,
            DatatypeKind::Float => MetaType::Float,
            DatatypeKind::Struct { .. } => MetaType::Struct,
            DatatypeKind::Void => MetaType::Void,
            DatatypeKind::Code(_) => MetaType::Code,
            DatatypeKind::Array { .. } => MetaType::Array,
            DatatypeKind::Unknown => MetaType::Unknown,
        }
    }

    // === Accessors ===

    /// Pointed-to type of a pointer.
    pub fn pointee(&self) -> Option<TypeId> {
        match self.kind {
            DatatypeKind::Pointer { pointee, .. } => Some(pointee),
            _ => None,
        }
    }

    /// Fields of a struct.
    pub fn fields(&self) -> Option<&[TypeField]> {
        match &self.kind {
            DatatypeKind::Struct { fields } => Some(fields),
            _ => None,
        }
    }

    /// Signature of a code type.
    pub fn signature(&self) -> Option<&FuncSignature> {
        match &self.kind {
            DatatypeKind::Code(sig) => Some(sig),
            _ => None,
        }
    }

    /// Element type and count of an array.
    pub fn array_element(&self) -> Option<(TypeId, u64)> {
        match self.kind {
            DatatypeKind::Array { element, count } => Some((element, count)),
            _ => None,
        }
    }

    /// Types this one embeds by value.
    ///
    /// Pointer targets are excluded: a pointer only needs its target's name,
    /// not its layout.
    pub fn value_dependencies(&self) -> Vec<TypeId> {
        match &self.kind {
            DatatypeKind::Struct { fields } => fields.iter().map(|f| f.ty).collect(),
            DatatypeKind::Array { element, .. } => vec![*element],
            DatatypeKind::Code(sig) => std::iter::once(sig.output)
                .chain(sig.inputs.iter().copied())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Check if this is an anonymous type.
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "<anonymous {}:{}>", self.metatype(), self.size)
        } else {
            f.write_str(&self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_follows_name() {
        let dt = Datatype::int("DWORD", 4);
        assert_eq!(dt.type_hash, TypeHash::from_name("DWORD"));
        assert!(Datatype::int("", 4).type_hash.is_empty());
    }

    #[test]
    fn pointer_size_is_address_width() {
        let ptr = Datatype::pointer("char *", 8, TypeId::new(0), 1);
        assert_eq!(ptr.size, 8);
        assert_eq!(ptr.pointee(), Some(TypeId::new(0)));
        assert_eq!(ptr.metatype(), MetaType::Ptr);
    }

    #[test]
    fn character_types_are_integers() {
        assert_eq!(Datatype::unicode("wchar_t", 2).metatype(), MetaType::Int);
        assert_eq!(Datatype::char("char", 1).metatype(), MetaType::Int);
    }

    #[test]
    fn value_dependencies_skip_pointers() {
        let ptr = Datatype::pointer("node *", 8, TypeId::new(1), 1);
        assert!(ptr.value_dependencies().is_empty());

        let arr = Datatype::array("int[4]", 16, TypeId::new(2), 4);
        assert_eq!(arr.value_dependencies(), vec![TypeId::new(2)]);
    }

    #[test]
    fn display_names_anonymous_types() {
        assert_eq!(Datatype::int("int", 4).to_string(), "int");
        assert_eq!(Datatype::unknown("", 3).to_string(), "<anonymous unknown:3>");
    }
}
