//! Signature refresh.
//!
//! [`TypeManager::update`] re-derives a function's signature from the type
//! recorded at its entry address and merges it into the function's existing
//! prototype. The derived signature is transient and is not registered.
//!
//! With [`RefreshMode::NamesOnly`] only parameter names change; types, storage
//! and flags of the existing prototype are kept. With
//! [`RefreshMode::FullSignature`] the slot types come from the derived
//! signature and existing slots keep their storage. Either way names are only
//! written when the descriptor names exactly as many parameters as the
//! prototype has input slots, and never over a slot flagged
//! [`ParamFlags::NAME_LOCK`].

use std::sync::Arc;

use tracing::{debug, warn};

use typebridge_core::{FuncInfo, RefreshMode, TranslateError, TypeInfo, TypeInfoKind, TypeInfoSource};

use crate::document::Element;
use crate::proto::{Function, ParamFlags, ParameterPieces, PrototypePieces};
use crate::TypeManager;

/// Result of a signature refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No type is recorded at the function's address. Nothing changed.
    NoTypeInfo,
    /// The prototype was rewritten.
    Updated,
    /// The name count did not match the input slots; names were left alone.
    NamesSkipped,
}

impl<S: TypeInfoSource> TypeManager<S> {
    /// Refresh a function's prototype from the type recorded at its address.
    ///
    /// # Errors
    ///
    /// - [`TranslateError::SymbolIsNotAFunction`] if the recorded type is
    ///   neither a function nor a pointer to one.
    /// - [`TranslateError::UnknownType`] if a type in the signature cannot be
    ///   found.
    /// - [`TranslateError::Document`] if the injection marker cannot be
    ///   attached.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn update(&mut self, function: &mut Function) -> Result<RefreshOutcome, TranslateError> {
        let Some(info) = self.source.build_at(function.address) else {
            debug!(function = %function.name, address = function.address, "no type info");
            return Ok(RefreshOutcome::NoTypeInfo);
        };

        let info = self.unwrap_pointer(info)?;
        let TypeInfoKind::Function(func) = &info.kind else {
            let name = if info.name.is_empty() {
                function.name.clone()
            } else {
                info.name.clone()
            };
            return Err(TranslateError::SymbolIsNotAFunction(name));
        };

        let signature = self.parse_func(func)?;
        let mut pieces = match self.arch.refresh_mode {
            RefreshMode::NamesOnly => function.proto.get_pieces(),
            RefreshMode::FullSignature => {
                let existing = function.proto.get_pieces();
                PrototypePieces {
                    model: Arc::clone(&signature.model),
                    output: signature.output,
                    inputs: signature
                        .inputs
                        .iter()
                        .enumerate()
                        .map(|(i, &ty)| {
                            let old = existing.inputs.get(i);
                            ParameterPieces {
                                name: old.map(|p| p.name.clone()).unwrap_or_default(),
                                ty,
                                flags: ParamFlags::TYPE_LOCK
                                    | old.map_or(ParamFlags::empty(), |p| {
                                        p.flags & ParamFlags::NAME_LOCK
                                    }),
                            }
                        })
                        .collect(),
                    dotdotdot: signature.dotdotdot,
                }
            }
        };

        let outcome = if rename_inputs(&mut pieces, func) {
            function.proto.set_pieces(pieces, &self.cache);
            RefreshOutcome::Updated
        } else {
            warn!(
                function = %function.name,
                names = func.param_names.len(),
                slots = pieces.inputs.len(),
                "parameter count mismatch, keeping names"
            );
            if self.arch.refresh_mode == RefreshMode::FullSignature {
                function.proto.set_pieces(pieces, &self.cache);
            }
            RefreshOutcome::NamesSkipped
        };

        if let Some(handler) = self.arch.inject_for(&function.name) {
            let handler = handler.to_string();
            self.set_inject_attribute(function, &handler)?;
        }

        Ok(outcome)
    }

    /// Attach an injection marker to a function's prototype.
    ///
    /// The prototype is saved to an exchange document, the `<inject>` element
    /// is appended, and the prototype is restored from the re-parsed text.
    pub fn set_inject_attribute(
        &self,
        function: &mut Function,
        handler: &str,
    ) -> Result<(), TranslateError> {
        let mut document = function.proto.save_document(&self.cache);
        document.children.retain(|child| child.name != "inject");
        document.children.push(Element::new("inject").with_text(handler));

        let text = document.to_xml()?;
        let parsed = Element::parse(&text)?;
        function
            .proto
            .restore_document(&parsed, &self.conventions, &self.cache)?;
        debug!(function = %function.name, handler, "injection attached");
        Ok(())
    }

    /// Strip one pointer level, materializing a by-name pointee.
    fn unwrap_pointer(&self, info: TypeInfo) -> Result<TypeInfo, TranslateError> {
        match info.kind {
            TypeInfoKind::Pointer(pointee) if pointee.is_named_ref() => {
                self.materialize(&pointee.name)
            }
            TypeInfoKind::Pointer(pointee) => Ok(*pointee),
            _ => Ok(info),
        }
    }
}

/// Overwrite input names in order, leaving name-locked slots alone.
///
/// Returns `false` if the counts differ.
fn rename_inputs(pieces: &mut PrototypePieces, func: &FuncInfo) -> bool {
    if func.param_names.len() != pieces.inputs.len() {
        return false;
    }
    for (input, name) in pieces.inputs.iter_mut().zip(&func.param_names) {
        if !input.flags.contains(ParamFlags::NAME_LOCK) {
            input.name.clone_from(name);
        }
    }
    true
}
