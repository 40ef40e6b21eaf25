//! Calling-convention models and their registry.
//!
//! A [`ProtoModel`] names a calling convention and describes where it puts
//! parameters. Models are registered up front and never change afterwards;
//! the [`ConventionRegistry`] always holds one designated default model, so a
//! lookup that falls back to the default cannot fail.

use std::sync::Arc;

use rustc_hash::FxHashMap;

/// A named calling-convention model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoModel {
    /// Model name, e.g. `__stdcall`.
    pub name: String,
    /// Stack pointer change across a call, including the return address.
    pub extrapop: i32,
    /// Registers that receive the leading parameters, in order.
    pub input_registers: Vec<String>,
    /// Register holding the return value.
    pub output_register: Option<String>,
    /// Stack offset of the first stack-passed parameter.
    pub stack_offset: i64,
    /// Alignment of stack parameter slots.
    pub stack_align: u64,
    /// Whether the callee pops its own stack parameters.
    pub callee_cleanup: bool,
}

impl ProtoModel {
    /// Create a model with no register parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extrapop: 0,
            input_registers: Vec::new(),
            output_register: None,
            stack_offset: 0,
            stack_align: 1,
            callee_cleanup: false,
        }
    }

    // === Builder Methods ===

    /// Set the stack pointer change across a call.
    pub fn with_extrapop(mut self, extrapop: i32) -> Self {
        self.extrapop = extrapop;
        self
    }

    /// Set the parameter registers.
    pub fn with_input_registers<I, S>(mut self, registers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_registers = registers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the return register.
    pub fn with_output_register(mut self, register: impl Into<String>) -> Self {
        self.output_register = Some(register.into());
        self
    }

    /// Set the stack layout of stack-passed parameters.
    pub fn with_stack(mut self, offset: i64, align: u64) -> Self {
        self.stack_offset = offset;
        self.stack_align = align.max(1);
        self
    }

    /// Mark the callee as responsible for popping stack parameters.
    pub fn with_callee_cleanup(mut self) -> Self {
        self.callee_cleanup = true;
        self
    }
}

/// Registry of calling-convention models.
#[derive(Debug, Clone)]
pub struct ConventionRegistry {
    models: FxHashMap<String, Arc<ProtoModel>>,
    default: Arc<ProtoModel>,
}

impl ConventionRegistry {
    /// Create a registry whose default (and only) model is `default`.
    pub fn new(default: ProtoModel) -> Self {
        let default = Arc::new(default);
        let mut models = FxHashMap::default();
        models.insert(default.name.clone(), Arc::clone(&default));
        Self { models, default }
    }

    /// Register a model.
    ///
    /// Returns `false`, leaving the existing model in place, if the name is
    /// already registered.
    pub fn register(&mut self, model: ProtoModel) -> bool {
        if self.models.contains_key(&model.name) {
            return false;
        }
        self.models.insert(model.name.clone(), Arc::new(model));
        true
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_model(mut self, model: ProtoModel) -> Self {
        self.register(model);
        self
    }

    /// Check if a model with this name is registered.
    pub fn has_model(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Get a model by name.
    pub fn get_model(&self, name: &str) -> Option<Arc<ProtoModel>> {
        self.models.get(name).cloned()
    }

    /// Get a model by name, or the default model if it is not registered.
    pub fn model_or_default(&self, name: &str) -> Arc<ProtoModel> {
        self.get_model(name)
            .unwrap_or_else(|| Arc::clone(&self.default))
    }

    /// The designated default model.
    pub fn default_model(&self) -> &Arc<ProtoModel> {
        &self.default
    }

    /// Name of the designated default model.
    pub fn default_name(&self) -> &str {
        &self.default.name
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Always `false`: the default model is always present.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Registered model names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    // ==========================================================================
    // Presets
    // ==========================================================================

    /// 32-bit x86 models. Default `__cdecl`.
    pub fn x86() -> Self {
        Self::new(
            ProtoModel::new("__cdecl")
                .with_extrapop(4)
                .with_output_register("eax")
                .with_stack(4, 4),
        )
        .with_model(
            ProtoModel::new("__stdcall")
                .with_extrapop(4)
                .with_callee_cleanup()
                .with_output_register("eax")
                .with_stack(4, 4),
        )
        .with_model(
            ProtoModel::new("__fastcall")
                .with_extrapop(4)
                .with_callee_cleanup()
                .with_input_registers(["ecx", "edx"])
                .with_output_register("eax")
                .with_stack(4, 4),
        )
        .with_model(
            ProtoModel::new("__thiscall")
                .with_extrapop(4)
                .with_callee_cleanup()
                .with_input_registers(["ecx"])
                .with_output_register("eax")
                .with_stack(4, 4),
        )
        .with_model(
            ProtoModel::new("__pascal")
                .with_extrapop(4)
                .with_callee_cleanup()
                .with_output_register("eax")
                .with_stack(4, 4),
        )
    }

    /// 64-bit Windows x86 models. Default `__fastcall`.
    pub fn x86_64() -> Self {
        Self::new(
            ProtoModel::new("__fastcall")
                .with_extrapop(8)
                .with_input_registers(["rcx", "rdx", "r8", "r9"])
                .with_output_register("rax")
                .with_stack(0x28, 8),
        )
        .with_model(
            ProtoModel::new("__thiscall")
                .with_extrapop(8)
                .with_input_registers(["rcx", "rdx", "r8", "r9"])
                .with_output_register("rax")
                .with_stack(0x28, 8),
        )
    }
}
