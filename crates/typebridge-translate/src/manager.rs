//! TypeManager - the descriptor translation engine.
//!
//! [`TypeManager`] owns the [`TypeCache`], the calling-convention registry and
//! the descriptor source. Lookups check the cache first and only ask the
//! source for a descriptor on a miss; every type built from a descriptor is
//! registered exactly once, under the descriptor's name.
//!
//! # Cycles
//!
//! A struct is registered as an empty placeholder before any of its fields
//! are resolved. A field that refers back to the struct (through a pointer)
//! therefore finds the placeholder in the cache instead of recursing, and the
//! struct's fields are set in one batch once every field type is known. If a
//! field cannot be resolved, the placeholder and everything registered after
//! it are dropped again, so the failure repeats on the next lookup instead of
//! yielding an empty struct.
//!
//! Every other kind that refers to further types (pointers, arrays, function
//! types, by-name references) has no placeholder to stop at. Their names are
//! tracked while they are being translated, and meeting one of them again
//! fails with [`TranslateError::UnknownType`].
//!
//! # Example
//!
//! ```
//! use typebridge_core::{TypeInfo, TypeInfoDatabase};
//! use typebridge_translate::TypeManager;
//!
//! let db = TypeInfoDatabase::new().with_type(
//!     TypeInfo::structure("node", 16)
//!         .with_field(0, "next", TypeInfo::pointer("node *", 8, TypeInfo::named("node")))
//!         .with_field(8, "value", TypeInfo::integer("int", 4)),
//! );
//!
//! let mut manager = TypeManager::x86_64(db);
//! let node = manager.find_by_name("node").unwrap();
//! let next = manager.cache().get(node).unwrap().fields().unwrap()[0].ty;
//! assert_eq!(manager.cache().get(next).unwrap().pointee(), Some(node));
//! ```

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use typebridge_core::{
    ArchConfig, ConventionRegistry, Datatype, StructFieldInfo, TranslateError, TypeField,
    TypeHash, TypeId, TypeInfo, TypeInfoKind, TypeInfoSource,
};
use typebridge_registry::TypeCache;

/// Name of the canonical void type.
pub const VOID_NAME: &str = "void";

/// Translation engine over a descriptor source `S`.
#[derive(Debug)]
pub struct TypeManager<S> {
    pub(crate) arch: ArchConfig,
    pub(crate) conventions: ConventionRegistry,
    pub(crate) cache: TypeCache,
    pub(crate) source: S,
    /// Names of non-struct types currently being translated.
    pub(crate) in_flight: FxHashSet<String>,
}

impl<S: TypeInfoSource> TypeManager<S> {
    /// Create an engine with an empty cache.
    pub fn new(arch: ArchConfig, conventions: ConventionRegistry, source: S) -> Self {
        Self {
            arch,
            conventions,
            cache: TypeCache::new(),
            source,
            in_flight: FxHashSet::default(),
        }
    }

    /// Engine configured for 32-bit x86.
    pub fn x86(source: S) -> Self {
        Self::new(ArchConfig::x86(), ConventionRegistry::x86(), source)
    }

    /// Engine configured for 64-bit x86.
    pub fn x86_64(source: S) -> Self {
        Self::new(ArchConfig::x86_64(), ConventionRegistry::x86_64(), source)
    }

    // === Accessors ===

    /// Target configuration.
    pub fn arch(&self) -> &ArchConfig {
        &self.arch
    }

    /// Calling-convention models.
    pub fn conventions(&self) -> &ConventionRegistry {
        &self.conventions
    }

    /// Translated types.
    pub fn cache(&self) -> &TypeCache {
        &self.cache
    }

    /// Descriptor source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get a translated type by handle.
    pub fn get(&self, id: TypeId) -> Option<&Datatype> {
        self.cache.get(id)
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    /// Find a type by name and identity token, translating it on a cache miss.
    ///
    /// # Errors
    ///
    /// Returns [`TranslateError::UnknownType`] if the type is not cached and
    /// the source has no descriptor for it.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn find(&mut self, name: &str, hash: TypeHash) -> Result<TypeId, TranslateError> {
        if let Some(id) = self.cache.find_by_id(name, hash) {
            trace!(name, %id, "cache hit");
            return Ok(id);
        }
        debug!(name, "cache miss, building descriptor");
        let info = self
            .source
            .build(name)
            .ok_or_else(|| TranslateError::UnknownType(name.to_string()))?;
        self.translate(&info)
    }

    /// [`find`](Self::find) with the identity token derived from `name`.
    pub fn find_by_name(&mut self, name: &str) -> Result<TypeId, TranslateError> {
        self.find(name, TypeHash::from_name(name))
    }

    /// Cached type for a descriptor, translating it on a miss.
    pub fn resolve(&mut self, info: &TypeInfo) -> Result<TypeId, TranslateError> {
        match self.cache.lookup(&info.name) {
            Some(id) => Ok(id),
            None => self.translate(info),
        }
    }

    /// The canonical void type.
    pub fn void_type(&mut self) -> TypeId {
        let size = u64::from(self.arch.addr_size);
        self.cache.intern(Datatype::void(VOID_NAME, size))
    }

    // ==========================================================================
    // Translation
    // ==========================================================================

    /// Build the internal type for a descriptor and register it.
    ///
    /// If a type of the same name was registered meanwhile (for example by a
    /// nested translation), that type is returned and the new one discarded.
    ///
    /// # Errors
    ///
    /// Returns [`TranslateError::UnknownType`] if a referenced type has no
    /// descriptor, or if a non-struct type refers back to itself.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn translate(&mut self, info: &TypeInfo) -> Result<TypeId, TranslateError> {
        if info.name.is_empty() || matches!(info.kind, TypeInfoKind::Struct(_)) {
            return self.translate_kind(info);
        }
        if !self.in_flight.insert(info.name.clone()) {
            debug!(name = %info.name, "type refers back to itself");
            return Err(TranslateError::UnknownType(info.name.clone()));
        }
        let result = self.translate_kind(info);
        self.in_flight.remove(&info.name);
        result
    }

    fn translate_kind(&mut self, info: &TypeInfo) -> Result<TypeId, TranslateError> {
        trace!(name = %info.name, kind = info.kind_name(), "translating");
        let addr_size = self.arch.addr_size;
        let word_size = self.arch.word_size;

        let datatype = match &info.kind {
            TypeInfoKind::Pointer(pointee) => {
                let target = self.resolve(pointee)?;
                Datatype::pointer(&info.name, addr_size, target, word_size)
            }
            TypeInfoKind::Bool => Datatype::boolean(&info.name, info.size),
            TypeInfoKind::Unicode => Datatype::unicode(&info.name, info.size),
            TypeInfoKind::Char => Datatype::char(&info.name, info.size),
            TypeInfoKind::Integer => Datatype::int(&info.name, info.size),
            TypeInfoKind::Float => Datatype::float(&info.name, info.size),
            TypeInfoKind::Struct(fields) => {
                if let Some(existing) = self.cache.lookup(&info.name) {
                    return Ok(existing);
                }
                let mark = self.cache.len();
                let id = self.cache.declare_struct(&info.name, info.size);
                // The placeholder stops any cycle through this struct, so the
                // fields start with a fresh in-flight set.
                let outer = std::mem::take(&mut self.in_flight);
                let resolved = self.resolve_fields(fields);
                self.in_flight = outer;
                let resolved = match resolved {
                    Ok(resolved) => resolved,
                    Err(err) => {
                        debug!(name = %info.name, "struct field unresolved, dropping placeholder");
                        self.cache.truncate(mark);
                        return Err(err);
                    }
                };
                self.cache.set_fields(id, resolved);
                trace!(layout = %self.cache.describe(id), "struct complete");
                return Ok(id);
            }
            TypeInfoKind::Void => {
                let size = if info.size == 0 {
                    u64::from(addr_size)
                } else {
                    info.size
                };
                Datatype::void(&info.name, size)
            }
            TypeInfoKind::Function(func) => {
                let signature = self.parse_func(func)?;
                Datatype::code(&info.name, signature)
            }
            TypeInfoKind::Array(array) => {
                let element = self.resolve(&array.element)?;
                if info.size == 0 {
                    debug!(name = %info.name, "zero-sized array becomes a pointer");
                    Datatype::pointer(&info.name, addr_size, element, word_size)
                } else {
                    Datatype::array(&info.name, info.size, element, array.count)
                }
            }
            TypeInfoKind::Other => Datatype::unknown(&info.name, info.size),
            TypeInfoKind::Named => {
                let target = self.materialize(&info.name)?;
                // The descriptor behind the reference carries the same name,
                // which is already marked in flight.
                if target.name == info.name {
                    return self.translate_kind(&target);
                }
                return self.translate(&target);
            }
        };

        Ok(self.cache.intern(datatype))
    }

    fn resolve_fields(
        &mut self,
        fields: &[StructFieldInfo],
    ) -> Result<Vec<TypeField>, TranslateError> {
        fields
            .iter()
            .map(|field| {
                Ok(TypeField {
                    offset: field.offset,
                    name: field.name.clone(),
                    ty: self.resolve(&field.ty)?,
                })
            })
            .collect()
    }

    /// Ask the source for the descriptor behind a by-name reference.
    pub(crate) fn materialize(&self, name: &str) -> Result<TypeInfo, TranslateError> {
        match self.source.build(name) {
            Some(info) if info.is_named_ref() && info.name == name => {
                Err(TranslateError::UnknownType(name.to_string()))
            }
            Some(info) => Ok(info),
            None => Err(TranslateError::UnknownType(name.to_string())),
        }
    }
}
