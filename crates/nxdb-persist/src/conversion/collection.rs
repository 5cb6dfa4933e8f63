use std::fmt;
use std::marker::PhantomData;

use nxdb_tree::Element;

use crate::cache::IdentityCache;
use crate::conversion::{Conversion, ScalarValue, Serialized};
use crate::error::{PersistError, PersistResult};

const DEFAULT_ITEM: &str = "item";

/// A list of scalars stored as repeated item elements under one container
/// child:
///
/// ```text
/// <tags><item>a</item><item>b</item></tags>
/// ```
///
/// A missing container and an empty one both fetch as an empty list.
pub struct ScalarList<S> {
    container: String,
    item: String,
    _marker: PhantomData<fn() -> S>,
}

impl<S: ScalarValue> ScalarList<S> {
    pub fn element(container: &str) -> Self {
        Self {
            container: container.to_string(),
            item: DEFAULT_ITEM.to_string(),
            _marker: PhantomData,
        }
    }

    /// Use `item` as the repeated element name instead of `item`.
    pub fn with_item(mut self, item: &str) -> Self {
        self.item = item.to_string();
        self
    }
}

impl<S> fmt::Debug for ScalarList<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarList")
            .field("container", &self.container)
            .field("item", &self.item)
            .finish()
    }
}

impl<S: ScalarValue> Conversion<Vec<S>> for ScalarList<S> {
    fn fetch(&self, element: &Element, _current: &Vec<S>, _cache: &mut IdentityCache) -> PersistResult<Option<Vec<S>>> {
        let Some(container) = element.child(&self.container)? else {
            return Ok(None);
        };
        let mut values = Vec::new();
        for item in container.children(&self.item)? {
            let value = S::from_text(&item.text()?).map_err(PersistError::InvalidValue)?;
            values.push(value);
        }
        Ok(Some(values))
    }

    fn cleared(&self) -> Option<Vec<S>> {
        Some(Vec::new())
    }

    fn serialize(&self, value: &Vec<S>, _cache: &mut IdentityCache) -> PersistResult<Serialized> {
        Ok(Serialized::List(value.iter().filter_map(ScalarValue::to_text).collect()))
    }

    fn store(
        &self,
        element: &Element,
        serialized: &Serialized,
        _value: &Vec<S>,
        _cache: &mut IdentityCache,
    ) -> PersistResult<()> {
        match serialized {
            Serialized::List(items) => {
                element.ensure_child(&self.container)?.replace_children(&self.item, items)?;
            }
            Serialized::Absent => {
                element.remove_children(&self.container)?;
            }
            other => {
                return Err(PersistError::InvalidValue(format!(
                    "scalar list cannot store {other:?}"
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use nxdb_tree::InMemoryTree;

    use crate::cache::TypeCatalog;
    use crate::config::PersistConfig;

    fn setup() -> (Element, IdentityCache) {
        let tree = Arc::new(InMemoryTree::with_root("root"));
        let id = tree.root_element().unwrap();
        (
            Element::new(tree, id).unwrap(),
            IdentityCache::new(Arc::new(TypeCatalog::new()), PersistConfig::default()),
        )
    }

    #[test]
    fn list_round_trip_keeps_order() {
        let (e, mut cache) = setup();
        let conv = ScalarList::<i32>::element("nums");
        let value = vec![3, 1, 2];
        let s = conv.serialize(&value, &mut cache).unwrap();
        conv.store(&e, &s, &value, &mut cache).unwrap();
        let fetched = conv.fetch(&e, &Vec::new(), &mut cache).unwrap();
        assert_eq!(fetched, Some(vec![3, 1, 2]));
    }

    #[test]
    fn restore_replaces_previous_items() {
        let (e, mut cache) = setup();
        let conv = ScalarList::<String>::element("tags").with_item("tag");
        for value in [vec!["a".to_string(), "b".to_string()], vec!["c".to_string()]] {
            let s = conv.serialize(&value, &mut cache).unwrap();
            conv.store(&e, &s, &value, &mut cache).unwrap();
        }
        let container = e.child("tags").unwrap().unwrap();
        assert_eq!(container.children("tag").unwrap().len(), 1);
        assert_eq!(e.children("tags").unwrap().len(), 1);
    }

    #[test]
    fn missing_container_clears_to_empty() {
        let (e, mut cache) = setup();
        let conv = ScalarList::<i32>::element("nums");
        assert_eq!(conv.fetch(&e, &vec![9], &mut cache).unwrap(), None);
        assert_eq!(Conversion::<Vec<i32>>::cleared(&conv), Some(Vec::new()));
    }

    #[test]
    fn empty_list_fetches_as_empty() {
        let (e, mut cache) = setup();
        let conv = ScalarList::<i32>::element("nums");
        let s = conv.serialize(&Vec::new(), &mut cache).unwrap();
        conv.store(&e, &s, &Vec::new(), &mut cache).unwrap();
        assert_eq!(conv.fetch(&e, &vec![9], &mut cache).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn bad_item_fails() {
        let (e, mut cache) = setup();
        let container = e.append_child("nums").unwrap();
        container.append_child("item").unwrap().set_text("x").unwrap();
        let conv = ScalarList::<i32>::element("nums");
        assert!(conv.fetch(&e, &Vec::new(), &mut cache).is_err());
    }
}
