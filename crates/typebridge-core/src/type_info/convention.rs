//! Calling conventions as declared by the analysis source.
//!
//! The disassembler stores a calling convention as a one-byte code whose high
//! nibble selects the convention. Only a handful of codes correspond to a
//! named prototype model; everything else reads as
//! [`TranslateError::UnknownCallingConvention`].

use num_enum::TryFromPrimitive;

use crate::TranslateError;

/// Mask selecting the convention bits of a raw code.
pub const CM_CC_MASK: u8 = 0xF0;

/// Raw calling-convention codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum CallingConvCode {
    Invalid = 0x00,
    Unknown = 0x10,
    VoidArg = 0x20,
    Cdecl = 0x30,
    Ellipsis = 0x40,
    Stdcall = 0x50,
    Pascal = 0x60,
    Fastcall = 0x70,
    Thiscall = 0x80,
    Manual = 0x90,
    Spoiled = 0xA0,
    SpecialE = 0xD0,
    SpecialP = 0xE0,
    Special = 0xF0,
}

impl CallingConvCode {
    /// Decode the convention bits of a raw code.
    pub fn from_raw(raw: u8) -> Option<Self> {
        Self::try_from(raw & CM_CC_MASK).ok()
    }

    /// The prototype model name this code maps to, if any.
    pub const fn model_name(self) -> Option<&'static str> {
        match self {
            CallingConvCode::Cdecl | CallingConvCode::Ellipsis => Some("__cdecl"),
            CallingConvCode::Stdcall => Some("__stdcall"),
            CallingConvCode::Pascal => Some("__pascal"),
            CallingConvCode::Fastcall => Some("__fastcall"),
            CallingConvCode::Thiscall => Some("__thiscall"),
            _ => None,
        }
    }
}

/// Calling convention attached to a function descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeclaredConvention {
    /// The source recorded nothing.
    #[default]
    Unspecified,
    /// Raw convention code.
    Code(u8),
    /// Explicit model name.
    Named(String),
}

impl DeclaredConvention {
    /// Read the model name.
    ///
    /// Fails with `UnknownCallingConvention` when nothing was declared or the
    /// code has no model.
    pub fn model_name(&self) -> Result<&str, TranslateError> {
        match self {
            DeclaredConvention::Unspecified => Err(TranslateError::UnknownCallingConvention(
                "unspecified".to_string(),
            )),
            DeclaredConvention::Code(raw) => CallingConvCode::from_raw(*raw)
                .and_then(CallingConvCode::model_name)
                .ok_or_else(|| TranslateError::UnknownCallingConvention(format!("{raw:#04x}"))),
            DeclaredConvention::Named(name) => Ok(name.as_str()),
        }
    }
}

impl From<CallingConvCode> for DeclaredConvention {
    fn from(code: CallingConvCode) -> Self {
        DeclaredConvention::Code(code as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_code_masks_low_bits() {
        assert_eq!(CallingConvCode::from_raw(0x53), Some(CallingConvCode::Stdcall));
        assert_eq!(CallingConvCode::from_raw(0x70), Some(CallingConvCode::Fastcall));
    }

    #[test]
    fn unassigned_nibble_is_none() {
        assert_eq!(CallingConvCode::from_raw(0xB0), None);
        assert_eq!(CallingConvCode::from_raw(0xC0), None);
    }

    #[test]
    fn code_model_names() {
        assert_eq!(CallingConvCode::Cdecl.model_name(), Some("__cdecl"));
        assert_eq!(CallingConvCode::Ellipsis.model_name(), Some("__cdecl"));
        assert_eq!(CallingConvCode::Thiscall.model_name(), Some("__thiscall"));
        assert_eq!(CallingConvCode::Manual.model_name(), None);
    }

    #[test]
    fn declared_convention_reading() {
        assert_eq!(
            DeclaredConvention::from(CallingConvCode::Stdcall).model_name(),
            Ok("__stdcall")
        );
        assert_eq!(
            DeclaredConvention::Named("__vectorcall".to_string()).model_name(),
            Ok("__vectorcall")
        );
        assert!(matches!(
            DeclaredConvention::Unspecified.model_name(),
            Err(TranslateError::UnknownCallingConvention(_))
        ));
        assert!(matches!(
            DeclaredConvention::Code(0x90).model_name(),
            Err(TranslateError::UnknownCallingConvention(_))
        ));
    }
}
