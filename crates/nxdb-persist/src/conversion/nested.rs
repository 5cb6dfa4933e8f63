use std::fmt;
use std::marker::PhantomData;

use nxdb_tree::Element;
use tracing::debug;

use crate::cache::{object_key, IdentityCache};
use crate::conversion::{Conversion, Serialized};
use crate::error::{PersistError, PersistResult};
use crate::persister::Persister;
use crate::{shared, Persistent, Shared};

/// A persistent child object stored in a child element.
///
/// The member value is `Option<Shared<C>>`. Fetch reuses an object already
/// materialized from the same element in the identity cache; otherwise it
/// builds a fresh `C::default()` and fetches into that. The member's current
/// object is never modified by a fetch. A missing child element clears the
/// member to `None`.
pub struct Nested<C> {
    name: String,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Persistent + Default> Nested<C> {
    /// Stored in the child element `name`.
    pub fn element(name: &str) -> Self {
        Self {
            name: name.to_string(),
            _marker: PhantomData,
        }
    }
}

impl<C> fmt::Debug for Nested<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nested")
            .field("name", &self.name)
            .field("type", &std::any::type_name::<C>())
            .finish()
    }
}

impl<C: Persistent + Default> Conversion<Option<Shared<C>>> for Nested<C> {
    fn fetch(
        &self,
        element: &Element,
        _current: &Option<Shared<C>>,
        cache: &mut IdentityCache,
    ) -> PersistResult<Option<Option<Shared<C>>>> {
        let Some(child) = element.child(&self.name)? else {
            return Ok(None);
        };
        if let Some(existing) = cache.get::<C>(child.id()) {
            debug!(node = %child.id(), "reusing materialized object");
            return Ok(Some(Some(existing)));
        }

        let persister = Persister::new(cache.type_cache::<C>()?);
        let object = shared(C::default());
        cache.insert(child.id(), &object);
        let fetched = {
            let mut target = object.write().expect("lock poisoned");
            persister.fetch(&child, &mut *target, cache)
        };
        match fetched {
            Ok(()) => Ok(Some(Some(object))),
            Err(e) => {
                cache.forget(child.id());
                Err(e)
            }
        }
    }

    fn cleared(&self) -> Option<Option<Shared<C>>> {
        Some(None)
    }

    fn serialize(&self, value: &Option<Shared<C>>, cache: &mut IdentityCache) -> PersistResult<Serialized> {
        let Some(object) = value else {
            return Ok(Serialized::Absent);
        };
        let key = object_key(object);
        if !cache.enter(key) {
            return Err(PersistError::CyclicReference {
                type_name: std::any::type_name::<C>(),
            });
        }
        let form = cache.type_cache::<C>().and_then(|types| {
            let source = object.read().expect("lock poisoned");
            Persister::new(types).serialize(Some(&*source), cache)
        });
        cache.leave(key);
        Ok(match form? {
            Some(form) => Serialized::Object(form),
            None => Serialized::Absent,
        })
    }

    fn store(
        &self,
        element: &Element,
        serialized: &Serialized,
        value: &Option<Shared<C>>,
        cache: &mut IdentityCache,
    ) -> PersistResult<()> {
        match (serialized, value) {
            (Serialized::Absent, _) => {
                element.remove_children(&self.name)?;
                Ok(())
            }
            (Serialized::Object(form), Some(object)) => {
                let child = element.ensure_child(&self.name)?;
                let persister = Persister::new(cache.type_cache::<C>()?);
                {
                    let source = object.read().expect("lock poisoned");
                    persister.store(&child, Some(form), Some(&*source), cache)?;
                }
                cache.insert(child.id(), object);
                Ok(())
            }
            (Serialized::Object(_), None) => Ok(()),
            (other, _) => Err(PersistError::InvalidValue(format!(
                "nested object cannot store {other:?}"
            ))),
        }
    }
}
