//! Error types for typebridge.
//!
//! ## Error Hierarchy
//!
//! ```text
//! TranslateError (translation and signature refresh)
//! └── DocumentError  - Prototype exchange document errors
//! ```
//!
//! `UnknownType` and `SymbolIsNotAFunction` reach the caller of `find` and
//! `update`. `UnknownCallingConvention` is only produced when reading a
//! descriptor's convention and never leaves the signature builder.

use thiserror::Error;

// ============================================================================
// Translation Errors
// ============================================================================

/// Errors raised while translating descriptors or refreshing signatures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslateError {
    /// No descriptor exists for the requested type name.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// The descriptor recorded for a function is neither a function nor a
    /// pointer to one.
    #[error("symbol is not a function: {0}")]
    SymbolIsNotAFunction(String),

    /// The descriptor's calling convention cannot be mapped to a model name.
    #[error("unknown calling convention: {0}")]
    UnknownCallingConvention(String),

    /// The prototype exchange document could not be produced or restored.
    #[error(transparent)]
    Document(#[from] DocumentError),
}

// ============================================================================
// Document Errors
// ============================================================================

/// Errors raised while reading or writing a prototype exchange document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    /// The XML text is malformed.
    #[error("malformed document: {0}")]
    Xml(String),

    /// The document has no root element.
    #[error("document has no root element")]
    Empty,

    /// An element was found where another was expected.
    #[error("unexpected element <{found}>, expected <{expected}>")]
    UnexpectedElement {
        /// The element that was expected.
        expected: String,
        /// The element that was found.
        found: String,
    },

    /// A required attribute is missing.
    #[error("<{element}> is missing attribute '{attribute}'")]
    MissingAttribute {
        /// The element name.
        element: String,
        /// The missing attribute name.
        attribute: String,
    },

    /// An attribute value could not be parsed.
    #[error("<{element}> has invalid {attribute}=\"{value}\"")]
    InvalidAttribute {
        /// The element name.
        element: String,
        /// The attribute name.
        attribute: String,
        /// The offending value.
        value: String,
    },

    /// The document names a calling-convention model that is not registered.
    #[error("unknown prototype model: {0}")]
    UnknownModel(String),

    /// The document references a type handle the cache does not hold.
    #[error("unknown type id: {0}")]
    UnknownTypeId(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_error_display() {
        assert_eq!(
            TranslateError::UnknownType("FILE".to_string()).to_string(),
            "unknown type: FILE"
        );
        assert_eq!(
            TranslateError::SymbolIsNotAFunction("g_table".to_string()).to_string(),
            "symbol is not a function: g_table"
        );
    }

    #[test]
    fn document_error_converts() {
        let err: TranslateError = DocumentError::UnknownModel("__vectorcall".to_string()).into();
        assert!(matches!(err, TranslateError::Document(_)));
        assert_eq!(err.to_string(), "unknown prototype model: __vectorcall");
    }

    #[test]
    fn missing_attribute_display() {
        let err = DocumentError::MissingAttribute {
            element: "param".to_string(),
            attribute: "name".to_string(),
        };
        assert_eq!(err.to_string(), "<param> is missing attribute 'name'");
    }
}
