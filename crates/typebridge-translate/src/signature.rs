//! Function signature builder.
//!
//! Turns a function descriptor into a [`FuncSignature`]. The calling
//! convention is resolved in three steps and the last one cannot fail:
//!
//! 1. the declared model name, or the architecture's fast convention if the
//!    descriptor declares none the engine can read;
//! 2. the architecture's default convention, if step 1 named an unregistered
//!    model;
//! 3. the registry's own default model.

use std::sync::Arc;

use tracing::debug;

use typebridge_core::{FuncInfo, FuncSignature, ProtoModel, TranslateError, TypeInfoSource};

use crate::TypeManager;

impl<S: TypeInfoSource> TypeManager<S> {
    /// Build a signature from a function descriptor.
    ///
    /// Return and parameter types go through the cache, so repeated parameter
    /// types share one instance while staying one entry per position. An
    /// empty prototype yields a `void` return and no parameters.
    ///
    /// The signature itself is not registered; see
    /// [`translate`](Self::translate) for named function types.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn parse_func(&mut self, func: &FuncInfo) -> Result<FuncSignature, TranslateError> {
        let (output, inputs) = match func.prototype.split_first() {
            None => (self.void_type(), Vec::new()),
            Some((ret, params)) => {
                let output = self.resolve(ret)?;
                let mut inputs = Vec::with_capacity(params.len());
                for param in params {
                    inputs.push(self.resolve(param)?);
                }
                (output, inputs)
            }
        };

        Ok(FuncSignature {
            model: self.convention_for(func),
            output,
            inputs,
            dotdotdot: func.dotdotdot,
        })
    }

    /// Resolve the calling-convention model of a function descriptor.
    pub fn convention_for(&self, func: &FuncInfo) -> Arc<ProtoModel> {
        let declared = match func.calling_convention() {
            Ok(name) => name,
            Err(err) => {
                debug!(%err, fallback = %self.arch.fast_convention, "guessing calling convention");
                self.arch.fast_convention.as_str()
            }
        };

        if let Some(model) = self.conventions.get_model(declared) {
            return model;
        }
        debug!(
            declared,
            fallback = %self.arch.default_convention,
            "calling convention not registered"
        );
        self.conventions
            .model_or_default(&self.arch.default_convention)
    }
}
