//! Descriptor source boundary.

use rustc_hash::FxHashMap;

use super::TypeInfo;

/// Materializes descriptors from the analysis source.
///
/// Both lookups return `None` when the source has nothing recorded; callers
/// decide whether that is an error.
pub trait TypeInfoSource {
    /// Resolve a type by name.
    fn build(&self, name: &str) -> Option<TypeInfo>;

    /// Resolve the type recorded at a code or data address.
    fn build_at(&self, address: u64) -> Option<TypeInfo>;
}

impl<T: TypeInfoSource + ?Sized> TypeInfoSource for &T {
    fn build(&self, name: &str) -> Option<TypeInfo> {
        (**self).build(name)
    }

    fn build_at(&self, address: u64) -> Option<TypeInfo> {
        (**self).build_at(address)
    }
}

impl<T: TypeInfoSource + ?Sized> TypeInfoSource for Box<T> {
    fn build(&self, name: &str) -> Option<TypeInfo> {
        (**self).build(name)
    }

    fn build_at(&self, address: u64) -> Option<TypeInfo> {
        (**self).build_at(address)
    }
}

/// In-memory descriptor source keyed by type name and by address.
#[derive(Debug, Clone, Default)]
pub struct TypeInfoDatabase {
    types: FxHashMap<String, TypeInfo>,
    addresses: FxHashMap<u64, TypeInfo>,
}

impl TypeInfoDatabase {
    /// Create an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a named type. Replaces any previous descriptor of that name.
    pub fn insert(&mut self, info: TypeInfo) {
        self.types.insert(info.name.clone(), info);
    }

    /// Record the type at an address.
    pub fn insert_at(&mut self, address: u64, info: TypeInfo) {
        self.addresses.insert(address, info);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_type(mut self, info: TypeInfo) -> Self {
        self.insert(info);
        self
    }

    /// Builder form of [`insert_at`](Self::insert_at).
    pub fn with_address(mut self, address: u64, info: TypeInfo) -> Self {
        self.insert_at(address, info);
        self
    }

    /// Number of named types.
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Number of typed addresses.
    pub fn address_count(&self) -> usize {
        self.addresses.len()
    }
}

impl TypeInfoSource for TypeInfoDatabase {
    fn build(&self, name: &str) -> Option<TypeInfo> {
        self.types.get(name).cloned()
    }

    fn build_at(&self, address: u64) -> Option<TypeInfo> {
        self.addresses.get(&address).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_and_address() {
        let db = TypeInfoDatabase::new()
            .with_type(TypeInfo::integer("DWORD", 4))
            .with_address(0x401000, TypeInfo::integer("int", 4));

        assert_eq!(db.build("DWORD").map(|t| t.size), Some(4));
        assert!(db.build("WORD").is_none());
        assert_eq!(db.build_at(0x401000).map(|t| t.name), Some("int".to_string()));
        assert!(db.build_at(0x402000).is_none());
    }

    #[test]
    fn insert_replaces_same_name() {
        let mut db = TypeInfoDatabase::new();
        db.insert(TypeInfo::integer("size_t", 4));
        db.insert(TypeInfo::integer("size_t", 8));
        assert_eq!(db.type_count(), 1);
        assert_eq!(db.build("size_t").map(|t| t.size), Some(8));
    }

    #[test]
    fn source_through_reference() {
        fn lookup(source: impl TypeInfoSource) -> Option<TypeInfo> {
            source.build("BYTE")
        }
        let db = TypeInfoDatabase::new().with_type(TypeInfo::integer("BYTE", 1));
        assert!(lookup(&db).is_some());
        assert_eq!(db.address_count(), 0);
    }
}
