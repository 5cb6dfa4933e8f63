//! The persistence surface callers use: one identity scope per call, or a
//! [`Session`] that shares one across calls.

use std::sync::Arc;

use nxdb_tree::Element;

use crate::cache::{IdentityCache, TypeCatalog};
use crate::config::PersistConfig;
use crate::conversion::SerializedForm;
use crate::error::PersistResult;
use crate::persister::Persister;
use crate::{shared, Persistent, Shared};

/// Entry point for fetching and storing objects.
///
/// Cheap to clone; clones share the type catalog.
#[derive(Clone, Debug, Default)]
pub struct Persistence {
    catalog: Arc<TypeCatalog>,
    config: PersistConfig,
}

impl Persistence {
    pub fn new(config: PersistConfig) -> Self {
        Self::with_catalog(Arc::new(TypeCatalog::new()), config)
    }

    /// Share an existing catalog, e.g. between several databases.
    pub fn with_catalog(catalog: Arc<TypeCatalog>, config: PersistConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &PersistConfig {
        &self.config
    }

    /// Load `target` from `element`. See [`Persister::fetch`].
    pub fn fetch<T: Persistent>(&self, element: &Element, target: &mut T) -> PersistResult<()> {
        self.session().fetch(element, target)
    }

    pub fn serialize<T: Persistent>(&self, source: Option<&T>) -> PersistResult<Option<SerializedForm>> {
        self.session().serialize(source)
    }

    pub fn store<T: Persistent>(
        &self,
        element: &Element,
        form: Option<&SerializedForm>,
        source: Option<&T>,
    ) -> PersistResult<()> {
        self.session().store(element, form, source)
    }

    /// Materialize a new shared object from `element`.
    pub fn fetch_object<T: Persistent + Default>(&self, element: &Element) -> PersistResult<Shared<T>> {
        self.session().fetch_object(element)
    }

    /// A fresh identity scope spanning several calls.
    pub fn session(&self) -> Session {
        Session {
            cache: IdentityCache::new(Arc::clone(&self.catalog), self.config.clone()),
        }
    }
}

/// Several persistence calls sharing one [`IdentityCache`]: fetching the
/// same element twice within a session yields the same object.
#[derive(Debug)]
pub struct Session {
    cache: IdentityCache,
}

impl Session {
    pub fn fetch<T: Persistent>(&mut self, element: &Element, target: &mut T) -> PersistResult<()> {
        Persister::<T>::for_type(&self.cache)?.fetch(element, target, &mut self.cache)
    }

    pub fn serialize<T: Persistent>(&mut self, source: Option<&T>) -> PersistResult<Option<SerializedForm>> {
        Persister::<T>::for_type(&self.cache)?.serialize(source, &mut self.cache)
    }

    pub fn store<T: Persistent>(
        &mut self,
        element: &Element,
        form: Option<&SerializedForm>,
        source: Option<&T>,
    ) -> PersistResult<()> {
        Persister::<T>::for_type(&self.cache)?.store(element, form, source, &mut self.cache)
    }

    /// Serialize then store `source` into `element`.
    pub fn save<T: Persistent>(&mut self, element: &Element, source: &T) -> PersistResult<()> {
        let persister = Persister::<T>::for_type(&self.cache)?;
        let form = persister.serialize(Some(source), &mut self.cache)?;
        persister.store(element, form.as_ref(), Some(source), &mut self.cache)
    }

    /// The object materialized from `element` in this session, or a new one
    /// fetched into `T::default()`.
    pub fn fetch_object<T: Persistent + Default>(&mut self, element: &Element) -> PersistResult<Shared<T>> {
        if let Some(existing) = self.cache.get::<T>(element.id()) {
            return Ok(existing);
        }
        let persister = Persister::<T>::for_type(&self.cache)?;
        let object = shared(T::default());
        self.cache.insert(element.id(), &object);
        let fetched = {
            let mut target = object.write().expect("lock poisoned");
            persister.fetch(element, &mut *target, &mut self.cache)
        };
        match fetched {
            Ok(()) => Ok(object),
            Err(e) => {
                self.cache.forget(element.id());
                Err(e)
            }
        }
    }

    pub fn identity_cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Forget every materialized object.
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
