//! TypeCache - canonical store of translated datatypes.
//!
//! This module provides [`TypeCache`], the arena that owns every
//! [`Datatype`] the translation engine builds and guarantees that each type
//! name maps to exactly one instance.
//!
//! # Storage Model
//!
//! - **Arena**: datatypes live in a `Vec` and are addressed by [`TypeId`].
//!   Handles are never invalidated, so a struct's own fields can point at it
//!   while it is still being filled in.
//! - **Name index**: `name -> TypeId`. Anonymous (empty-name) types are stored
//!   but never indexed, so two anonymous types are never merged.
//! - **Hash index**: `TypeHash -> TypeId`, the fast path for callers that
//!   already hold an identity token.
//!
//! Registration is get-or-insert. Registering a name that already exists
//! returns the existing handle and drops the new value; nothing is ever
//! replaced. Struct placeholders are the one exception to immutability: they
//! are declared empty and populated in place by [`TypeCache::set_fields`].
//! A translation that fails before its placeholder is populated is undone
//! with [`TypeCache::truncate`], so an unfinished struct is never left behind
//! under its name.
//!
//! # Thread Safety
//!
//! `TypeCache` is **not thread-safe**. A placeholder is only valid while the
//! translation that declared it is running, so callers sharing a cache across
//! threads must hold one lock for a whole lookup, not per cache call.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use typebridge_core::{Datatype, DatatypeKind, TypeField, TypeHash, TypeId};

/// Canonical name-to-datatype store.
#[derive(Debug, Default)]
pub struct TypeCache {
    /// All datatypes, indexed by `TypeId`.
    types: Vec<Datatype>,

    /// Named types (PRIMARY index).
    by_name: FxHashMap<String, TypeId>,

    /// Identity-token index for named types.
    by_hash: FxHashMap<TypeHash, TypeId>,

    /// Struct placeholders whose fields have not been set yet.
    in_progress: FxHashSet<TypeId>,
}

impl TypeCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    /// Get a datatype by handle.
    pub fn get(&self, id: TypeId) -> Option<&Datatype> {
        self.types.get(id.index() as usize)
    }

    /// Look up a named type.
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        if name.is_empty() {
            return None;
        }
        self.by_name.get(name).copied()
    }

    /// Look up a named type by identity token.
    pub fn lookup_hash(&self, hash: TypeHash) -> Option<TypeId> {
        if hash.is_empty() {
            return None;
        }
        self.by_hash.get(&hash).copied()
    }

    /// Look up by identity token first, then by name.
    ///
    /// A hash hit is only accepted if the stored name matches, so a colliding
    /// or stale token degrades to a name lookup instead of a wrong answer.
    pub fn find_by_id(&self, name: &str, hash: TypeHash) -> Option<TypeId> {
        let fast = self
            .lookup_hash(hash)
            .filter(|id| self.get(*id).is_some_and(|dt| dt.name == name));
        fast.or_else(|| self.lookup(name))
    }

    /// Check if a named type is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Size in bytes of a datatype, 0 for an unknown handle.
    pub fn size_of(&self, id: TypeId) -> u64 {
        self.get(id).map_or(0, |dt| dt.size)
    }

    /// Name of a datatype, empty for an unknown handle.
    pub fn name_of(&self, id: TypeId) -> &str {
        self.get(id).map_or("", |dt| dt.name.as_str())
    }

    /// Check if a struct placeholder is still waiting for its fields.
    pub fn is_in_progress(&self, id: TypeId) -> bool {
        self.in_progress.contains(&id)
    }

    /// Number of stored datatypes, anonymous ones included.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate over all datatypes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &Datatype)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, dt)| (TypeId::new(i as u32), dt))
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Register a datatype, or return the handle already registered under its name.
    pub fn intern(&mut self, datatype: Datatype) -> TypeId {
        if let Some(existing) = self.lookup(&datatype.name) {
            debug!(name = %datatype.name, id = %existing, "type already registered, keeping existing");
            return existing;
        }
        self.push(datatype)
    }

    /// Declare an empty struct placeholder, or return the existing type of that name.
    ///
    /// The placeholder stays in progress until [`set_fields`](Self::set_fields).
    pub fn declare_struct(&mut self, name: &str, size: u64) -> TypeId {
        if let Some(existing) = self.lookup(name) {
            return existing;
        }
        let id = self.push(Datatype::structure(name, size));
        self.in_progress.insert(id);
        id
    }

    /// Populate a struct in place, in one batch.
    ///
    /// A zero struct size is replaced by the extent of the fields. Returns
    /// `false` if `id` is not a struct.
    pub fn set_fields(&mut self, id: TypeId, fields: Vec<TypeField>) -> bool {
        let extent = fields
            .iter()
            .map(|f| i64::from(f.offset).max(0) as u64 + self.size_of(f.ty))
            .max()
            .unwrap_or(0);

        let Some(datatype) = self.types.get_mut(id.index() as usize) else {
            return false;
        };
        let DatatypeKind::Struct { fields: slot } = &mut datatype.kind else {
            return false;
        };
        *slot = fields;
        if datatype.size == 0 {
            datatype.size = extent;
        }
        self.in_progress.remove(&id);
        true
    }

    /// Drop every datatype registered at or after position `len`.
    ///
    /// Used to undo a translation that failed part way: the handles it handed
    /// out were never returned to a caller, and their names become unknown
    /// again.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.types.len() {
            return;
        }
        for (index, datatype) in self.types.drain(len..).enumerate() {
            let id = TypeId::new((len + index) as u32);
            if self.by_name.get(&datatype.name) == Some(&id) {
                self.by_name.remove(&datatype.name);
            }
            if self.by_hash.get(&datatype.type_hash) == Some(&id) {
                self.by_hash.remove(&datatype.type_hash);
            }
            self.in_progress.remove(&id);
        }
        debug!(len, "cache truncated");
    }

    /// Drop the earliest unfinished struct placeholder and everything after it.
    ///
    /// Returns `true` if anything was removed.
    pub fn discard_in_progress(&mut self) -> bool {
        let Some(first) = self.in_progress.iter().min().copied() else {
            return false;
        };
        self.truncate(first.index() as usize);
        true
    }

    fn push(&mut self, datatype: Datatype) -> TypeId {
        let id = TypeId::new(self.types.len() as u32);
        if !datatype.is_anonymous() {
            self.by_name.insert(datatype.name.clone(), id);
            self.by_hash.insert(datatype.type_hash, id);
        }
        self.types.push(datatype);
        id
    }

    // ==========================================================================
    // Ordering & Rendering
    // ==========================================================================

    /// All types ordered so that every type follows the types it embeds by value.
    ///
    /// Pointer targets are not dependencies, which is what makes
    /// self-referencing structs orderable. Types on a by-value cycle are
    /// emitted together in registration order.
    pub fn dependency_order(&self) -> Vec<TypeId> {
        let mut graph: DiGraph<TypeId, ()> = DiGraph::with_capacity(self.types.len(), 0);
        let nodes: Vec<NodeIndex> = self.iter().map(|(id, _)| graph.add_node(id)).collect();

        for (id, datatype) in self.iter() {
            for dep in datatype.value_dependencies() {
                if let Some(&target) = nodes.get(dep.index() as usize) {
                    graph.add_edge(nodes[id.index() as usize], target, ());
                }
            }
        }

        // tarjan_scc yields components dependencies-first for user -> dependency edges.
        let mut order = Vec::with_capacity(self.types.len());
        for mut component in tarjan_scc(&graph) {
            component.sort_unstable();
            order.extend(component.into_iter().map(|n| graph[n]));
        }
        order
    }

    /// One-line C-like description of a datatype.
    pub fn describe(&self, id: TypeId) -> String {
        let Some(datatype) = self.get(id) else {
            return format!("<invalid {id}>");
        };
        match &datatype.kind {
            DatatypeKind::Pointer { pointee, .. } => {
                format!("{} = {} *", datatype, self.display_name(*pointee))
            }
            DatatypeKind::Struct { fields } => {
                let body: Vec<String> = fields
                    .iter()
                    .map(|f| format!("{} {} @{};", self.display_name(f.ty), f.name, f.offset))
                    .collect();
                format!("struct {} {{ {} }}", datatype, body.join(" "))
            }
            DatatypeKind::Array { element, count } => {
                format!("{} = {}[{}]", datatype, self.display_name(*element), count)
            }
            DatatypeKind::Code(sig) => {
                let mut params: Vec<String> =
                    sig.inputs.iter().map(|p| self.display_name(*p)).collect();
                if sig.dotdotdot {
                    params.push("...".to_string());
                }
                format!(
                    "{} = {} {}({})",
                    datatype,
                    self.display_name(sig.output),
                    sig.model.name,
                    params.join(", ")
                )
            }
            _ => format!("{} : {}{}", datatype, datatype.metatype(), datatype.size * 8),
        }
    }

    fn display_name(&self, id: TypeId) -> String {
        self.get(id)
            .map_or_else(|| format!("<invalid {id}>"), |dt| dt.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use typebridge_core::{FuncSignature, ProtoModel};

    #[test]
    fn new_cache_is_empty() {
        let cache = TypeCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
        assert!(cache.lookup("int").is_none());
    }

    #[test]
    fn intern_returns_existing_handle() {
        let mut cache = TypeCache::new();
        let first = cache.intern(Datatype::int("int", 4));
        let second = cache.intern(Datatype::int("int", 8));

        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_of(first), 4);
    }

    #[test]
    fn anonymous_types_are_never_merged() {
        let mut cache = TypeCache::new();
        let a = cache.intern(Datatype::unknown("", 4));
        let b = cache.intern(Datatype::unknown("", 4));

        assert_ne!(a, b);
        assert_eq!(cache.len(), 2);
        assert!(cache.lookup("").is_none());
    }

    #[test]
    fn find_by_id_fast_path_and_fallback() {
        let mut cache = TypeCache::new();
        let id = cache.intern(Datatype::int("DWORD", 4));

        assert_eq!(cache.find_by_id("DWORD", TypeHash::from_name("DWORD")), Some(id));
        // Wrong token still resolves through the name.
        assert_eq!(cache.find_by_id("DWORD", TypeHash(42)), Some(id));
        // A token pointing at another name is not trusted.
        assert_eq!(cache.find_by_id("WORD", TypeHash::from_name("DWORD")), None);
    }

    #[test]
    fn struct_placeholder_filled_in_place() {
        let mut cache = TypeCache::new();
        let node = cache.declare_struct("node", 16);
        assert!(cache.is_in_progress(node));

        let next = cache.intern(Datatype::pointer("node *", 8, node, 1));
        let value = cache.intern(Datatype::int("int", 4));
        assert!(cache.set_fields(
            node,
            vec![
                TypeField { offset: 0, name: "next".into(), ty: next },
                TypeField { offset: 8, name: "value".into(), ty: value },
            ],
        ));

        assert!(!cache.is_in_progress(node));
        assert_eq!(cache.lookup("node"), Some(node));
        assert_eq!(cache.get(node).and_then(|dt| dt.fields()).map(<[_]>::len), Some(2));
        assert_eq!(cache.get(next).and_then(|dt| dt.pointee()), Some(node));
    }

    #[test]
    fn set_fields_computes_missing_size() {
        let mut cache = TypeCache::new();
        let s = cache.declare_struct("pair", 0);
        let int = cache.intern(Datatype::int("int", 4));
        cache.set_fields(
            s,
            vec![
                TypeField { offset: 0, name: "a".into(), ty: int },
                TypeField { offset: 4, name: "b".into(), ty: int },
            ],
        );
        assert_eq!(cache.size_of(s), 8);
    }

    #[test]
    fn set_fields_rejects_non_struct() {
        let mut cache = TypeCache::new();
        let int = cache.intern(Datatype::int("int", 4));
        assert!(!cache.set_fields(int, Vec::new()));
        assert!(!cache.set_fields(TypeId::new(99), Vec::new()));
    }

    #[test]
    fn declare_struct_reuses_existing_name() {
        let mut cache = TypeCache::new();
        let a = cache.declare_struct("S", 4);
        let b = cache.declare_struct("S", 4);
        assert_eq!(a, b);
    }

    #[test]
    fn truncate_forgets_names_of_removed_types() {
        let mut cache = TypeCache::new();
        let int = cache.intern(Datatype::int("int", 4));
        let mark = cache.len();
        let s = cache.declare_struct("S", 8);
        cache.intern(Datatype::pointer("S *", 8, s, 1));

        cache.truncate(mark);

        assert_eq!(cache.len(), 1);
        assert!(cache.lookup("S").is_none());
        assert!(cache.lookup("S *").is_none());
        assert!(cache.lookup_hash(TypeHash::from_name("S")).is_none());
        assert!(!cache.is_in_progress(s));
        assert_eq!(cache.lookup("int"), Some(int));

        // The freed slot is handed out again under a fresh declaration.
        assert_eq!(cache.declare_struct("S", 8), s);
        assert!(cache.is_in_progress(s));
    }

    #[test]
    fn discard_in_progress_drops_unfinished_placeholders() {
        let mut cache = TypeCache::new();
        let done = cache.declare_struct("done", 0);
        cache.set_fields(done, Vec::new());
        assert!(!cache.discard_in_progress());

        let outer = cache.declare_struct("outer", 16);
        cache.declare_struct("inner", 8);
        assert!(cache.discard_in_progress());

        assert_eq!(cache.len(), 1);
        assert!(cache.lookup("outer").is_none());
        assert!(cache.lookup("inner").is_none());
        assert!(!cache.is_in_progress(outer));
        assert_eq!(cache.lookup("done"), Some(done));
    }

    #[test]
    fn dependency_order_puts_fields_first() {
        let mut cache = TypeCache::new();
        let outer = cache.declare_struct("outer", 8);
        let inner = cache.declare_struct("inner", 4);
        let int = cache.intern(Datatype::int("int", 4));
        cache.set_fields(inner, vec![TypeField { offset: 0, name: "x".into(), ty: int }]);
        let ptr = cache.intern(Datatype::pointer("outer *", 4, outer, 1));
        cache.set_fields(
            outer,
            vec![
                TypeField { offset: 0, name: "in".into(), ty: inner },
                TypeField { offset: 4, name: "self".into(), ty: ptr },
            ],
        );

        let order = cache.dependency_order();
        let pos = |id: TypeId| order.iter().position(|x| *x == id).unwrap();
        assert_eq!(order.len(), cache.len());
        assert!(pos(int) < pos(inner));
        assert!(pos(inner) < pos(outer));
        assert!(pos(ptr) < pos(outer));
    }

    #[test]
    fn describe_renders_kinds() {
        let mut cache = TypeCache::new();
        let int = cache.intern(Datatype::int("int", 4));
        let arr = cache.intern(Datatype::array("int[4]", 16, int, 4));
        let sig = FuncSignature {
            model: Arc::new(ProtoModel::new("__cdecl")),
            output: int,
            inputs: vec![int, int],
            dotdotdot: true,
        };
        let code = cache.intern(Datatype::code("printf_t", sig));

        assert_eq!(cache.describe(int), "int : int32");
        assert_eq!(cache.describe(arr), "int[4] = int[4]");
        assert_eq!(cache.describe(code), "printf_t = int __cdecl(int, int, ...)");
        assert_eq!(cache.describe(TypeId::new(77)), "<invalid type_77>");
    }
}
