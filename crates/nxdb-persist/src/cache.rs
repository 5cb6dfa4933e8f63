//! Type caches, the catalog that memoizes them, and per-operation identity
//! caches.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

use nxdb_types::NodeId;
use tracing::debug;

use crate::config::PersistConfig;
use crate::descriptor::{MemberDescriptor, TypeDescription};
use crate::error::{PersistError, PersistResult};
use crate::{Persistent, Shared};

type ErasedCache = Arc<dyn Any + Send + Sync>;

// ---------------------------------------------------------------------------
// TypeCache
// ---------------------------------------------------------------------------

/// The resolved member set of one persistent type.
///
/// Built at most once per type per [`TypeCatalog`]; immutable afterwards.
pub struct TypeCache<T> {
    type_name: &'static str,
    members: Vec<MemberDescriptor<T>>,
}

impl<T: Persistent> TypeCache<T> {
    /// Run the type's registration and validate it.
    pub(crate) fn build() -> PersistResult<Self> {
        let mut description = TypeDescription::<T>::new();
        T::describe(&mut description);
        let type_name = description.type_name();
        let members = description.finish()?;
        Ok(Self { type_name, members })
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Members in registration order.
    pub fn members(&self) -> &[MemberDescriptor<T>] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&MemberDescriptor<T>> {
        self.members.iter().find(|m| m.name() == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name() == name)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<T> fmt::Debug for TypeCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCache")
            .field("type_name", &self.type_name)
            .field("members", &self.members)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// TypeCatalog
// ---------------------------------------------------------------------------

/// Memoized type caches, keyed by type.
///
/// Shared between threads through an `Arc`. Concurrent first requests for
/// the same type build it once: the build runs under the write lock and
/// re-checks the map before building.
#[derive(Default)]
pub struct TypeCatalog {
    entries: RwLock<HashMap<TypeId, ErasedCache>>,
    builds: AtomicUsize,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The type cache for `T`, building it on first request.
    pub fn get<T: Persistent>(&self) -> PersistResult<Arc<TypeCache<T>>> {
        let key = TypeId::of::<T>();
        if let Some(entry) = self.entries.read().expect("lock poisoned").get(&key) {
            return downcast(Arc::clone(entry));
        }

        let mut entries = self.entries.write().expect("lock poisoned");
        if let Some(entry) = entries.get(&key) {
            return downcast(Arc::clone(entry));
        }
        let cache = Arc::new(TypeCache::<T>::build()?);
        self.builds.fetch_add(1, Ordering::Relaxed);
        debug!(
            type_name = cache.type_name(),
            members = cache.len(),
            "built type cache"
        );
        entries.insert(key, Arc::clone(&cache) as ErasedCache);
        Ok(cache)
    }

    /// Whether a cache for `T` has been built.
    pub fn contains<T: Persistent>(&self) -> bool {
        self.entries
            .read()
            .expect("lock poisoned")
            .contains_key(&TypeId::of::<T>())
    }

    /// Number of type caches built over the catalog's lifetime, including
    /// rebuilds after [`reset`](Self::reset).
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    /// Drop every cached type. Caches already handed out stay valid.
    pub fn reset(&self) {
        let mut entries = self.entries.write().expect("lock poisoned");
        debug!(dropped = entries.len(), "type catalog reset");
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCatalog")
            .field("types", &self.len())
            .field("builds", &self.builds())
            .finish()
    }
}

fn downcast<T: Persistent>(entry: ErasedCache) -> PersistResult<Arc<TypeCache<T>>> {
    entry.downcast::<TypeCache<T>>().map_err(|_| {
        PersistError::InvalidValue(format!(
            "catalog entry for {} has the wrong type",
            std::any::type_name::<T>()
        ))
    })
}

// ---------------------------------------------------------------------------
// IdentityCache
// ---------------------------------------------------------------------------

/// Element identity to already-materialized object, for one operation.
///
/// Objects are held weakly; the cache never keeps an object alive. Every
/// operation takes `&mut self`, so one cache serves one call chain at a
/// time.
pub struct IdentityCache {
    catalog: Arc<TypeCatalog>,
    config: PersistConfig,
    objects: HashMap<NodeId, Weak<dyn Any + Send + Sync>>,
    visiting: HashSet<usize>,
}

impl IdentityCache {
    pub fn new(catalog: Arc<TypeCatalog>, config: PersistConfig) -> Self {
        Self {
            catalog,
            config,
            objects: HashMap::new(),
            visiting: HashSet::new(),
        }
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &PersistConfig {
        &self.config
    }

    /// The type cache for `T`, through the shared catalog.
    pub fn type_cache<T: Persistent>(&self) -> PersistResult<Arc<TypeCache<T>>> {
        self.catalog.get::<T>()
    }

    /// The live object materialized from `id`, if it is a `T`.
    pub fn get<T: Persistent>(&self, id: NodeId) -> Option<Shared<T>> {
        self.objects
            .get(&id)?
            .upgrade()?
            .downcast::<RwLock<T>>()
            .ok()
    }

    /// Record `object` as the materialization of `id`.
    pub fn insert<T: Persistent>(&mut self, id: NodeId, object: &Shared<T>) {
        let erased: Arc<dyn Any + Send + Sync> = Arc::clone(object) as Arc<dyn Any + Send + Sync>;
        self.objects.insert(id, Arc::downgrade(&erased));
    }

    pub fn forget(&mut self, id: NodeId) {
        self.objects.remove(&id);
    }

    /// Number of tracked identities whose objects are still alive.
    pub fn len(&self) -> usize {
        self.objects.values().filter(|w| w.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.visiting.clear();
    }

    /// Mark an object as being serialized. `false` if it already is.
    pub(crate) fn enter(&mut self, object: usize) -> bool {
        self.visiting.insert(object)
    }

    pub(crate) fn leave(&mut self, object: usize) {
        self.visiting.remove(&object);
    }
}

impl fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityCache")
            .field("objects", &self.objects.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Address of a shared object, used as its identity while serializing.
pub(crate) fn object_key<T>(object: &Shared<T>) -> usize {
    Arc::as_ptr(object) as *const () as usize
}
