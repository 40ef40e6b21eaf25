//! Lock-guarded engine for multi-threaded hosts.
//!
//! A struct placeholder is only valid while the translation that declared it
//! is running, so the whole of each [`find`](SharedTypeManager::find) or
//! [`update`](SharedTypeManager::update) runs under one lock. No caller can
//! observe a half-built struct.
//!
//! If a thread panics while holding the lock, the next caller recovers the
//! engine and drops whatever the interrupted translation left unfinished
//! before using it.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use typebridge_core::{TranslateError, TypeHash, TypeId, TypeInfoSource};

use crate::proto::Function;
use crate::refresh::RefreshOutcome;
use crate::TypeManager;

/// Cloneable handle to a [`TypeManager`] behind a mutex.
#[derive(Debug)]
pub struct SharedTypeManager<S> {
    inner: Arc<Mutex<TypeManager<S>>>,
}

impl<S> Clone for SharedTypeManager<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: TypeInfoSource> SharedTypeManager<S> {
    /// Wrap an engine for sharing between threads.
    pub fn new(manager: TypeManager<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    /// Locked [`TypeManager::find`].
    pub fn find(&self, name: &str, hash: TypeHash) -> Result<TypeId, TranslateError> {
        self.lock().find(name, hash)
    }

    /// Locked [`TypeManager::find_by_name`].
    pub fn find_by_name(&self, name: &str) -> Result<TypeId, TranslateError> {
        self.lock().find_by_name(name)
    }

    /// Locked [`TypeManager::update`].
    pub fn update(&self, function: &mut Function) -> Result<RefreshOutcome, TranslateError> {
        self.lock().update(function)
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut TypeManager<S>) -> R) -> R {
        f(&mut self.lock())
    }

    // A panic mid-translation can leave struct placeholders and in-flight
    // names behind; both are discarded before the engine is handed out again.
    fn lock(&self) -> MutexGuard<'_, TypeManager<S>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            let mut manager = poisoned.into_inner();
            if manager.cache.discard_in_progress() {
                warn!("dropped unfinished types after a panic");
            }
            manager.in_flight.clear();
            self.inner.clear_poison();
            manager
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use typebridge_core::{TypeInfo, TypeInfoDatabase};

    #[test]
    fn concurrent_find_yields_one_instance() {
        let db = TypeInfoDatabase::new().with_type(
            TypeInfo::structure("list", 16)
                .with_field(0, "next", TypeInfo::pointer("list *", 8, TypeInfo::named("list")))
                .with_field(8, "data", TypeInfo::integer("int", 4)),
        );
        let shared = SharedTypeManager::new(TypeManager::x86_64(db));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || shared.find_by_name("list").unwrap())
            })
            .collect();
        let ids: Vec<TypeId> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        shared.with(|m| {
            assert_eq!(m.cache().len(), 3);
            assert!(!m.cache().is_in_progress(ids[0]));
        });
    }

    #[test]
    fn panic_mid_translation_leaves_no_placeholder() {
        let db = TypeInfoDatabase::new().with_type(
            TypeInfo::structure("list", 16)
                .with_field(0, "next", TypeInfo::pointer("list *", 8, TypeInfo::named("list")))
                .with_field(8, "data", TypeInfo::integer("int", 4)),
        );
        let shared = SharedTypeManager::new(TypeManager::x86_64(db));

        let crashed = shared.clone();
        let result = thread::spawn(move || {
            let _: () = crashed.with(|m| {
                m.cache.declare_struct("list", 16);
                m.in_flight.insert("list *".to_string());
                panic!("translation interrupted");
            });
        })
        .join();
        assert!(result.is_err());

        let list = shared.find_by_name("list").unwrap();
        shared.with(|m| {
            assert!(!m.cache().is_in_progress(list));
            assert_eq!(m.get(list).unwrap().fields().map(<[_]>::len), Some(2));
            assert!(m.in_flight.is_empty());
        });
    }
}
