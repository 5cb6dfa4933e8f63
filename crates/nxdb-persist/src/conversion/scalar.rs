use nxdb_tree::Element;

use crate::cache::IdentityCache;
use crate::conversion::{Conversion, Serialized};
use crate::error::{PersistError, PersistResult};

/// A value with a canonical text form.
pub trait ScalarValue: Sized + Send + Sync + 'static {
    /// Text form; `None` stores as "no value".
    fn to_text(&self) -> Option<String>;

    fn from_text(text: &str) -> Result<Self, String>;

    /// The value read back when nothing was stored. `None` for types with no
    /// "no value" state.
    fn absent() -> Option<Self> {
        None
    }
}

macro_rules! scalar_via_parse {
    ($($t:ty),* $(,)?) => {
        $(
            impl ScalarValue for $t {
                fn to_text(&self) -> Option<String> {
                    Some(self.to_string())
                }

                fn from_text(text: &str) -> Result<Self, String> {
                    text.trim()
                        .parse::<$t>()
                        .map_err(|e| format!("cannot parse {:?} as {}: {e}", text, stringify!($t)))
                }
            }
        )*
    };
}

scalar_via_parse!(i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64, bool, char);

impl ScalarValue for String {
    fn to_text(&self) -> Option<String> {
        Some(self.clone())
    }

    fn from_text(text: &str) -> Result<Self, String> {
        Ok(text.to_string())
    }
}

impl<S: ScalarValue> ScalarValue for Option<S> {
    fn to_text(&self) -> Option<String> {
        self.as_ref().and_then(ScalarValue::to_text)
    }

    fn from_text(text: &str) -> Result<Self, String> {
        S::from_text(text).map(Some)
    }

    fn absent() -> Option<Self> {
        Some(None)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Place {
    Attribute(String),
    Element(String),
    Text,
}

/// A scalar member stored in one place of the element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scalar {
    place: Place,
}

impl Scalar {
    /// Stored in the attribute `name`.
    pub fn attribute(name: &str) -> Self {
        Self {
            place: Place::Attribute(name.to_string()),
        }
    }

    /// Stored as the text of the child element `name`.
    pub fn element(name: &str) -> Self {
        Self {
            place: Place::Element(name.to_string()),
        }
    }

    /// Stored as the element's own text content. Empty text reads as no
    /// value.
    pub fn text() -> Self {
        Self { place: Place::Text }
    }

    fn read(&self, element: &Element) -> PersistResult<Option<String>> {
        Ok(match &self.place {
            Place::Attribute(name) => element.attribute(name)?,
            Place::Element(name) => match element.child(name)? {
                Some(child) => Some(child.text()?),
                None => None,
            },
            Place::Text => Some(element.text()?).filter(|t| !t.is_empty()),
        })
    }
}

impl<V: ScalarValue> Conversion<V> for Scalar {
    fn fetch(&self, element: &Element, _current: &V, _cache: &mut IdentityCache) -> PersistResult<Option<V>> {
        match self.read(element)? {
            Some(text) => V::from_text(&text).map(Some).map_err(PersistError::InvalidValue),
            None => Ok(None),
        }
    }

    fn cleared(&self) -> Option<V> {
        V::absent()
    }

    fn serialize(&self, value: &V, _cache: &mut IdentityCache) -> PersistResult<Serialized> {
        Ok(match value.to_text() {
            Some(text) => Serialized::Text(text),
            None => Serialized::Absent,
        })
    }

    fn store(
        &self,
        element: &Element,
        serialized: &Serialized,
        _value: &V,
        _cache: &mut IdentityCache,
    ) -> PersistResult<()> {
        match (serialized, &self.place) {
            (Serialized::Text(text), Place::Attribute(name)) => element.set_attribute(name, text)?,
            (Serialized::Text(text), Place::Element(name)) => element.ensure_child(name)?.set_text(text)?,
            (Serialized::Text(text), Place::Text) => element.set_text(text)?,
            (Serialized::Absent, Place::Attribute(name)) => element.remove_attribute(name)?,
            (Serialized::Absent, Place::Element(name)) => {
                element.remove_children(name)?;
            }
            (Serialized::Absent, Place::Text) => element.set_text("")?,
            (other, _) => {
                return Err(PersistError::InvalidValue(format!(
                    "scalar cannot store {other:?}"
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

    fn element() -> Element {
        let tree = Arc::new(InMemoryTree::with_root("root"));
        let id = tree.root_element().unwrap();
        Element::new(tree, id).unwrap()
    }

    fn cache() -> IdentityCache {
        IdentityCache::new(Arc::new(TypeCatalog::new()), PersistConfig::default())
    }

    fn store_value<V: ScalarValue>(conv: &Scalar, e: &Element, v: V) {
        let mut c = cache();
        let s = conv.serialize(&v, &mut c).unwrap();
        conv.store(e, &s, &v, &mut c).unwrap();
    }

    #[test]
    fn scalar_parse_errors_are_invalid_values() {
        assert!(i32::from_text("abc").is_err());
        assert_eq!(i32::from_text(" 12 ").unwrap(), 12);
        assert!(bool::from_text("true").unwrap());
    }

    #[test]
    fn option_none_has_no_text() {
        assert_eq!(None::<i32>.to_text(), None);
        assert_eq!(Some(4i32).to_text().as_deref(), Some("4"));
    }

    #[test]
    fn only_optional_scalars_clear() {
        let conv = Scalar::attribute("n");
        assert_eq!(Conversion::<Option<i32>>::cleared(&conv), Some(None));
        assert_eq!(Conversion::<i32>::cleared(&conv), None);
    }

    #[test]
    fn attribute_place_round_trip() {
        let e = element();
        let conv = Scalar::attribute("n");
        store_value(&conv, &e, 42i64);
        assert_eq!(e.attribute("n").unwrap().as_deref(), Some("42"));
        let fetched: Option<i64> = conv.fetch(&e, &0, &mut cache()).unwrap();
        assert_eq!(fetched, Some(42));
    }

    #[test]
    fn element_place_round_trip() {
        let e = element();
        let conv = Scalar::element("title");
        store_value(&conv, &e, "Dune".to_string());
        let fetched: Option<String> = conv.fetch(&e, &String::new(), &mut cache()).unwrap();
        assert_eq!(fetched.as_deref(), Some("Dune"));
    }

    #[test]
    fn text_place_empty_reads_as_none() {
        let e = element();
        let fetched: Option<String> = Scalar::text().fetch(&e, &String::new(), &mut cache()).unwrap();
        assert!(fetched.is_none());
    }

    #[test]
    fn absent_removes_attribute() {
        let e = element();
        let conv = Scalar::attribute("n");
        store_value(&conv, &e, Some(1));
        store_value(&conv, &e, None::<i32>);
        assert!(e.attribute("n").unwrap().is_none());
    }

    #[test]
    fn unparsable_text_fails_fetch() {
        let e = element();
        e.set_attribute("n", "x").unwrap();
        let err = Conversion::<i32>::fetch(&Scalar::attribute("n"), &e, &0, &mut cache()).unwrap_err();
        assert!(matches!(err, PersistError::InvalidValue(_)));
    }
}
