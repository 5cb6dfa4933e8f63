use std::fmt;
use std::marker::PhantomData;

use nxdb_tree::Element;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::IdentityCache;
use crate::conversion::{Conversion, Serialized};
use crate::error::{PersistError, PersistResult};

type FetchFn<V> = Box<dyn Fn(&Element) -> PersistResult<Option<V>> + Send + Sync>;
type SerializeFn<V> = Box<dyn Fn(&V) -> PersistResult<Serialized> + Send + Sync>;
type StoreFn = Box<dyn Fn(&Element, &Serialized) -> PersistResult<()> + Send + Sync>;

/// A conversion built from caller-supplied functions.
pub struct Custom<V> {
    fetch: FetchFn<V>,
    serialize: SerializeFn<V>,
    store: StoreFn,
}

impl<V: 'static> Custom<V> {
    pub fn new<F, S, W>(fetch: F, serialize: S, store: W) -> Self
    where
        F: Fn(&Element) -> PersistResult<Option<V>> + Send + Sync + 'static,
        S: Fn(&V) -> PersistResult<Serialized> + Send + Sync + 'static,
        W: Fn(&Element, &Serialized) -> PersistResult<()> + Send + Sync + 'static,
    {
        Self {
            fetch: Box::new(fetch),
            serialize: Box::new(serialize),
            store: Box::new(store),
        }
    }
}

impl<V> fmt::Debug for Custom<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Custom")
    }
}

impl<V: 'static> Conversion<V> for Custom<V> {
    fn fetch(&self, element: &Element, _current: &V, _cache: &mut IdentityCache) -> PersistResult<Option<V>> {
        (self.fetch)(element)
    }

    fn serialize(&self, value: &V, _cache: &mut IdentityCache) -> PersistResult<Serialized> {
        (self.serialize)(value)
    }

    fn store(
        &self,
        element: &Element,
        serialized: &Serialized,
        _value: &V,
        _cache: &mut IdentityCache,
    ) -> PersistResult<()> {
        (self.store)(element, serialized)
    }
}

/// Any serde value, stored as JSON text in a child element.
pub struct Json<V> {
    name: String,
    _marker: PhantomData<fn() -> V>,
}

impl<V: Serialize + DeserializeOwned> Json<V> {
    pub fn element(name: &str) -> Self {
        Self {
            name: name.to_string(),
            _marker: PhantomData,
        }
    }
}

impl<V> fmt::Debug for Json<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Json").field("name", &self.name).finish()
    }
}

impl<V> Conversion<V> for Json<V>
where
    V: Serialize + DeserializeOwned + 'static,
{
    fn fetch(&self, element: &Element, _current: &V, _cache: &mut IdentityCache) -> PersistResult<Option<V>> {
        let Some(child) = element.child(&self.name)? else {
            return Ok(None);
        };
        let text = child.text()?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| PersistError::InvalidValue(format!("invalid JSON: {e}")))
    }

    fn serialize(&self, value: &V, _cache: &mut IdentityCache) -> PersistResult<Serialized> {
        serde_json::to_string(value)
            .map(Serialized::Text)
            .map_err(|e| PersistError::InvalidValue(format!("cannot encode JSON: {e}")))
    }

    fn store(
        &self,
        element: &Element,
        serialized: &Serialized,
        _value: &V,
        _cache: &mut IdentityCache,
    ) -> PersistResult<()> {
        match serialized {
            Serialized::Text(text) => element.ensure_child(&self.name)?.set_text(text)?,
            Serialized::Absent => {
                element.remove_children(&self.name)?;
            }
            other => {
                return Err(PersistError::InvalidValue(format!(
                    "JSON member cannot store {other:?}"
                )))
            }
        }
        Ok(())
    }
}
