//! Host-side function prototypes.
//!
//! A [`FuncProto`] is the decompiler's view of a function's calling interface:
//! the convention model, one [`ProtoParam`] slot for the return value and one
//! per input, each with a type, a name, a storage location and lock flags.
//!
//! [`PrototypePieces`] is the storage-free decomposition of a prototype used to
//! rewrite it: callers take the pieces with [`FuncProto::get_pieces`], edit
//! types or names, and write them back with [`FuncProto::set_pieces`]. Slots
//! that survive the round trip keep their storage.

use std::sync::Arc;

use bitflags::bitflags;

use typebridge_core::{FuncSignature, MetaType, ProtoModel, TypeId};
use typebridge_registry::TypeCache;

bitflags! {
    /// Per-slot prototype flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParamFlags: u32 {
        /// The slot's type is fixed and must not be re-derived.
        const TYPE_LOCK = 1;
        /// The slot's name is fixed.
        const NAME_LOCK = 1 << 1;
        /// The slot is a hidden pointer to the return value.
        const HIDDEN_RETURN = 1 << 2;
        /// The slot holds a pointer to the value rather than the value.
        const INDIRECT_STORAGE = 1 << 3;
    }
}

/// Where a slot's value lives.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Storage {
    /// Not assigned yet (or a void return).
    #[default]
    Unassigned,
    /// A register.
    Register {
        /// Register name.
        name: String,
        /// Bytes used.
        size: u64,
    },
    /// A stack slot, relative to the stack pointer on entry.
    Stack {
        /// Byte offset.
        offset: i64,
        /// Bytes used.
        size: u64,
    },
}

/// One prototype slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoParam {
    pub name: String,
    pub ty: TypeId,
    pub storage: Storage,
    pub flags: ParamFlags,
}

/// Storage-free description of a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterPieces {
    pub name: String,
    pub ty: TypeId,
    pub flags: ParamFlags,
}

/// Storage-free decomposition of a prototype.
#[derive(Debug, Clone, PartialEq)]
pub struct PrototypePieces {
    pub model: Arc<ProtoModel>,
    pub output: TypeId,
    pub inputs: Vec<ParameterPieces>,
    pub dotdotdot: bool,
}

/// A function prototype.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncProto {
    /// Calling-convention model.
    pub model: Arc<ProtoModel>,
    /// Return slot. Its name is always empty.
    pub output: ProtoParam,
    /// Input slots in order.
    pub inputs: Vec<ProtoParam>,
    /// Whether the function is variadic.
    pub dotdotdot: bool,
    /// Injection handler attached to calls of this function.
    pub inject: Option<String>,
}

impl FuncProto {
    /// Prototype for a signature, with storage assigned by its model.
    ///
    /// All slots are unnamed and type-locked.
    pub fn from_signature(signature: &FuncSignature, cache: &TypeCache) -> Self {
        let pieces = PrototypePieces {
            model: Arc::clone(&signature.model),
            output: signature.output,
            inputs: signature
                .inputs
                .iter()
                .map(|&ty| ParameterPieces {
                    name: String::new(),
                    ty,
                    flags: ParamFlags::TYPE_LOCK,
                })
                .collect(),
            dotdotdot: signature.dotdotdot,
        };
        let output = output_slot(&pieces.model, pieces.output, ParamFlags::TYPE_LOCK, cache);
        let storage = assign_input_storage(&pieces.model, &pieces.inputs, cache);
        let inputs = pieces
            .inputs
            .into_iter()
            .zip(storage)
            .map(|(p, storage)| ProtoParam {
                name: p.name,
                ty: p.ty,
                storage,
                flags: p.flags,
            })
            .collect();

        Self {
            model: pieces.model,
            output,
            inputs,
            dotdotdot: pieces.dotdotdot,
            inject: None,
        }
    }

    /// Number of input slots.
    pub fn num_params(&self) -> usize {
        self.inputs.len()
    }

    /// Input slot names in order.
    pub fn param_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|p| p.name.as_str()).collect()
    }

    /// Decompose into pieces.
    pub fn get_pieces(&self) -> PrototypePieces {
        PrototypePieces {
            model: Arc::clone(&self.model),
            output: self.output.ty,
            inputs: self
                .inputs
                .iter()
                .map(|p| ParameterPieces {
                    name: p.name.clone(),
                    ty: p.ty,
                    flags: p.flags,
                })
                .collect(),
            dotdotdot: self.dotdotdot,
        }
    }

    /// Rebuild from pieces.
    ///
    /// Input slots that already existed keep their storage, new ones get
    /// storage from the model, and surplus slots are dropped. The return slot
    /// keeps its storage while its type is unchanged. The injection marker is
    /// kept.
    pub fn set_pieces(&mut self, pieces: PrototypePieces, cache: &TypeCache) {
        let fresh = assign_input_storage(&pieces.model, &pieces.inputs, cache);
        let existing = std::mem::take(&mut self.inputs);

        self.inputs = pieces
            .inputs
            .into_iter()
            .zip(fresh)
            .enumerate()
            .map(|(i, (p, fresh))| ProtoParam {
                name: p.name,
                ty: p.ty,
                storage: existing.get(i).map_or(fresh, |old| old.storage.clone()),
                flags: p.flags,
            })
            .collect();

        if self.output.ty != pieces.output {
            self.output = output_slot(&pieces.model, pieces.output, self.output.flags, cache);
        }
        self.model = pieces.model;
        self.dotdotdot = pieces.dotdotdot;
    }
}

/// The prototype of a function body.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Symbol name.
    pub name: String,
    /// Entry address.
    pub address: u64,
    /// Current prototype.
    pub proto: FuncProto,
}

impl Function {
    pub fn new(name: impl Into<String>, address: u64, proto: FuncProto) -> Self {
        Self {
            name: name.into(),
            address,
            proto,
        }
    }
}

// ============================================================================
// Storage assignment
// ============================================================================

fn output_slot(model: &ProtoModel, ty: TypeId, flags: ParamFlags, cache: &TypeCache) -> ProtoParam {
    let is_void = cache
        .get(ty)
        .is_none_or(|dt| dt.metatype() == MetaType::Void);
    let storage = match (&model.output_register, is_void) {
        (Some(register), false) => Storage::Register {
            name: register.clone(),
            size: cache.size_of(ty),
        },
        _ => Storage::Unassigned,
    };
    ProtoParam {
        name: String::new(),
        ty,
        storage,
        flags,
    }
}

/// Leading inputs go to the model's registers, the rest to aligned stack slots.
fn assign_input_storage(
    model: &ProtoModel,
    inputs: &[ParameterPieces],
    cache: &TypeCache,
) -> Vec<Storage> {
    let mut registers = model.input_registers.iter();
    let mut offset = model.stack_offset;

    inputs
        .iter()
        .map(|p| {
            let size = cache.size_of(p.ty);
            match registers.next() {
                Some(register) => Storage::Register {
                    name: register.clone(),
                    size,
                },
                None => {
                    let slot = Storage::Stack { offset, size };
                    let align = model.stack_align;
                    offset += (size.max(1).div_ceil(align) * align) as i64;
                    slot
                }
            }
        })
        .collect()
}
