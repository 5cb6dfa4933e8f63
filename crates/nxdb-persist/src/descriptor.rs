//! Member descriptors and the registration API that produces them.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;

use nxdb_tree::Element;

use crate::cache::IdentityCache;
use crate::conversion::{Conversion, Serialized};
use crate::error::{PersistError, PersistResult};
use crate::Persistent;

/// A candidate value computed during the first pass of a fetch.
pub(crate) type Candidate = Box<dyn Any + Send>;

/// Fetch/store/required flags of one member.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberFlags {
    pub fetch: bool,
    pub store: bool,
    pub required: bool,
}

impl Default for MemberFlags {
    fn default() -> Self {
        Self {
            fetch: true,
            store: true,
            required: false,
        }
    }
}

/// Shape of a member's accessor pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessorKind {
    Field,
    Property,
    Getter,
    Setter,
}

impl AccessorKind {
    pub fn can_read(&self) -> bool {
        !matches!(self, Self::Setter)
    }

    pub fn can_write(&self) -> bool {
        !matches!(self, Self::Getter)
    }
}

impl fmt::Display for AccessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Field => "field",
            Self::Property => "property",
            Self::Getter => "read-only getter",
            Self::Setter => "write-only setter",
        };
        f.write_str(s)
    }
}

/// How a member's value is read from and written to its owner.
pub enum Accessor<T, V> {
    /// Direct borrow of a field.
    Field {
        get: Box<dyn Fn(&T) -> &V + Send + Sync>,
        get_mut: Box<dyn Fn(&mut T) -> &mut V + Send + Sync>,
    },
    /// By-value getter and setter.
    Property {
        get: Box<dyn Fn(&T) -> V + Send + Sync>,
        set: Box<dyn Fn(&mut T, V) + Send + Sync>,
    },
    Getter(Box<dyn Fn(&T) -> V + Send + Sync>),
    Setter(Box<dyn Fn(&mut T, V) + Send + Sync>),
}

impl<T, V> Accessor<T, V> {
    pub fn kind(&self) -> AccessorKind {
        match self {
            Self::Field { .. } => AccessorKind::Field,
            Self::Property { .. } => AccessorKind::Property,
            Self::Getter(_) => AccessorKind::Getter,
            Self::Setter(_) => AccessorKind::Setter,
        }
    }

    /// Run `f` on the member's current value. `None` if not readable.
    fn read<R>(&self, owner: &T, f: impl FnOnce(&V) -> R) -> Option<R> {
        match self {
            Self::Field { get, .. } => Some(f(get(owner))),
            Self::Property { get, .. } | Self::Getter(get) => {
                let value = get(owner);
                Some(f(&value))
            }
            Self::Setter(_) => None,
        }
    }

    /// Assign a new value. Returns `false` if not writable.
    fn write(&self, owner: &mut T, value: V) -> bool {
        match self {
            Self::Field { get_mut, .. } => {
                *get_mut(owner) = value;
                true
            }
            Self::Property { set, .. } | Self::Setter(set) => {
                set(owner, value);
                true
            }
            Self::Getter(_) => false,
        }
    }
}

/// Type-erased member behavior: an accessor bound to a conversion.
pub(crate) trait MemberBinding<T>: Send + Sync {
    fn accessor_kind(&self) -> AccessorKind;

    fn fetch_candidate(
        &self,
        element: &Element,
        target: &T,
        cache: &mut IdentityCache,
    ) -> PersistResult<Option<Candidate>>;

    fn cleared_candidate(&self) -> Option<Candidate>;

    fn assign(&self, target: &mut T, candidate: Candidate) -> PersistResult<()>;

    fn serialize(&self, source: &T, cache: &mut IdentityCache) -> PersistResult<Serialized>;

    fn store(
        &self,
        element: &Element,
        serialized: &Serialized,
        source: &T,
        cache: &mut IdentityCache,
    ) -> PersistResult<()>;
}

struct Bound<T, V, C> {
    accessor: Accessor<T, V>,
    conversion: C,
}

fn not_readable() -> PersistError {
    PersistError::InvalidValue("member is not readable".into())
}

impl<T, V, C> MemberBinding<T> for Bound<T, V, C>
where
    T: Send + Sync,
    V: Send + 'static,
    C: Conversion<V>,
{
    fn accessor_kind(&self) -> AccessorKind {
        self.accessor.kind()
    }

    fn fetch_candidate(
        &self,
        element: &Element,
        target: &T,
        cache: &mut IdentityCache,
    ) -> PersistResult<Option<Candidate>> {
        let conversion = &self.conversion;
        let fetched = self
            .accessor
            .read(target, |current| conversion.fetch(element, current, cache))
            .ok_or_else(not_readable)??;
        Ok(fetched.map(|value| Box::new(value) as Candidate))
    }

    fn cleared_candidate(&self) -> Option<Candidate> {
        self.conversion.cleared().map(|value| Box::new(value) as Candidate)
    }

    fn assign(&self, target: &mut T, candidate: Candidate) -> PersistResult<()> {
        let value = candidate
            .downcast::<V>()
            .map_err(|_| PersistError::InvalidValue("candidate has the wrong type".into()))?;
        if self.accessor.write(target, *value) {
            Ok(())
        } else {
            Err(PersistError::InvalidValue("member is not writable".into()))
        }
    }

    fn serialize(&self, source: &T, cache: &mut IdentityCache) -> PersistResult<Serialized> {
        let conversion = &self.conversion;
        self.accessor
            .read(source, |value| conversion.serialize(value, cache))
            .ok_or_else(not_readable)?
    }

    fn store(
        &self,
        element: &Element,
        serialized: &Serialized,
        source: &T,
        cache: &mut IdentityCache,
    ) -> PersistResult<()> {
        let conversion = &self.conversion;
        self.accessor
            .read(source, |value| conversion.store(element, serialized, value, cache))
            .ok_or_else(not_readable)?
    }
}

// ---------------------------------------------------------------------------
// MemberDescriptor
// ---------------------------------------------------------------------------

/// Metadata and conversion strategy for one persistent member.
///
/// Immutable once the owning [`TypeCache`](crate::TypeCache) is built.
pub struct MemberDescriptor<T> {
    name: String,
    flags: MemberFlags,
    binding: Box<dyn MemberBinding<T>>,
}

impl<T> MemberDescriptor<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> MemberFlags {
        self.flags
    }

    pub fn accessor_kind(&self) -> AccessorKind {
        self.binding.accessor_kind()
    }

    pub(crate) fn fetch_candidate(
        &self,
        element: &Element,
        target: &T,
        cache: &mut IdentityCache,
    ) -> PersistResult<Option<Candidate>> {
        self.binding.fetch_candidate(element, target, cache)
    }

    /// Candidate assigned when the element holds nothing for this member.
    pub(crate) fn cleared_candidate(&self) -> Option<Candidate> {
        self.binding.cleared_candidate()
    }

    pub(crate) fn assign(&self, target: &mut T, candidate: Candidate) -> PersistResult<()> {
        self.binding.assign(target, candidate)
    }

    pub(crate) fn serialize(&self, source: &T, cache: &mut IdentityCache) -> PersistResult<Serialized> {
        self.binding.serialize(source, cache)
    }

    pub(crate) fn store(
        &self,
        element: &Element,
        serialized: &Serialized,
        source: &T,
        cache: &mut IdentityCache,
    ) -> PersistResult<()> {
        self.binding.store(element, serialized, source, cache)
    }
}

impl<T> fmt::Debug for MemberDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("accessor", &self.binding.accessor_kind())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Registration API
// ---------------------------------------------------------------------------

/// Flag setters for the member that was just registered.
pub struct MemberOptions<'a> {
    flags: &'a mut MemberFlags,
}

impl MemberOptions<'_> {
    pub fn fetch(self, fetch: bool) -> Self {
        self.flags.fetch = fetch;
        self
    }

    pub fn store(self, store: bool) -> Self {
        self.flags.store = store;
        self
    }

    pub fn required(self) -> Self {
        self.flags.required = true;
        self
    }
}

/// Collects the member registrations of one type.
///
/// Passed to [`Persistent::describe`]. Members keep registration order,
/// which is the order fetch and serialize visit them.
pub struct TypeDescription<T> {
    type_name: &'static str,
    members: Vec<MemberDescriptor<T>>,
}

impl<T: Persistent> TypeDescription<T> {
    pub(crate) fn new() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            members: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Register a member with an explicit accessor.
    pub fn member<V, C>(
        &mut self,
        name: &str,
        accessor: Accessor<T, V>,
        conversion: C,
    ) -> MemberOptions<'_>
    where
        V: Send + 'static,
        C: Conversion<V>,
    {
        self.members.push(MemberDescriptor {
            name: name.to_string(),
            flags: MemberFlags::default(),
            binding: Box::new(Bound {
                accessor,
                conversion,
            }),
        });
        let last = self.members.len() - 1;
        MemberOptions {
            flags: &mut self.members[last].flags,
        }
    }

    /// Register a field, read and written through borrows.
    pub fn field<V, C, G, M>(&mut self, name: &str, get: G, get_mut: M, conversion: C) -> MemberOptions<'_>
    where
        V: Send + 'static,
        C: Conversion<V>,
        G: Fn(&T) -> &V + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut V + Send + Sync + 'static,
    {
        self.member(
            name,
            Accessor::Field {
                get: Box::new(get),
                get_mut: Box::new(get_mut),
            },
            conversion,
        )
    }

    /// Register a property with a by-value getter and a setter.
    pub fn property<V, C, G, S>(&mut self, name: &str, get: G, set: S, conversion: C) -> MemberOptions<'_>
    where
        V: Send + 'static,
        C: Conversion<V>,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.member(
            name,
            Accessor::Property {
                get: Box::new(get),
                set: Box::new(set),
            },
            conversion,
        )
    }

    /// Register a read-only member. Only valid with `fetch(false)`.
    pub fn getter<V, C, G>(&mut self, name: &str, get: G, conversion: C) -> MemberOptions<'_>
    where
        V: Send + 'static,
        C: Conversion<V>,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.member(name, Accessor::Getter(Box::new(get)), conversion)
    }

    /// Register a write-only member. Never valid for fetch or store, since
    /// both need the current value.
    pub fn setter<V, C, S>(&mut self, name: &str, set: S, conversion: C) -> MemberOptions<'_>
    where
        V: Send + 'static,
        C: Conversion<V>,
        S: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.member(name, Accessor::Setter(Box::new(set)), conversion)
    }

    /// Validate every registration and hand out the descriptors.
    pub(crate) fn finish(self) -> PersistResult<Vec<MemberDescriptor<T>>> {
        let mut seen = HashSet::new();
        for member in &self.members {
            if !seen.insert(member.name.as_str()) {
                return Err(PersistError::DuplicateMember {
                    type_name: self.type_name,
                    member: member.name.clone(),
                });
            }
            let kind = member.accessor_kind();
            let flags = member.flags;
            let reason = if flags.fetch && !(kind.can_read() && kind.can_write()) {
                Some(format!("fetch needs a readable and writable member, found {kind}"))
            } else if flags.store && !kind.can_read() {
                Some(format!("store needs a readable member, found {kind}"))
            } else if flags.required && !flags.fetch {
                Some("required members must be fetched".to_string())
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(PersistError::UnsupportedMemberKind {
                    type_name: self.type_name,
                    member: member.name.clone(),
                    reason,
                });
            }
        }
        Ok(self.members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::Scalar;

    #[derive(Default)]
    struct Sample {
        a: i32,
        b: String,
    }

    impl Persistent for Sample {
        fn describe(d: &mut TypeDescription<Self>) {
            d.field("a", |s| &s.a, |s| &mut s.a, Scalar::attribute("a"));
        }
    }

    fn description() -> TypeDescription<Sample> {
        TypeDescription::new()
    }

    #[test]
    fn default_flags_fetch_and_store() {
        let flags = MemberFlags::default();
        assert!(flags.fetch && flags.store && !flags.required);
    }

    #[test]
    fn options_adjust_last_member() {
        let mut d = description();
        d.field("a", |s| &s.a, |s| &mut s.a, Scalar::attribute("a"))
            .required()
            .store(false);
        let members = d.finish().unwrap();
        assert_eq!(members[0].flags(), MemberFlags { fetch: true, store: false, required: true });
    }

    #[test]
    fn registration_order_is_kept() {
        let mut d = description();
        d.field("b", |s| &s.b, |s| &mut s.b, Scalar::element("b"));
        d.field("a", |s| &s.a, |s| &mut s.a, Scalar::attribute("a"));
        let names: Vec<_> = d.finish().unwrap().iter().map(|m| m.name().to_string()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn getter_with_fetch_is_unsupported() {
        let mut d = description();
        d.getter("double", |s: &Sample| s.a * 2, Scalar::attribute("double"));
        let err = d.finish().unwrap_err();
        assert!(matches!(err, PersistError::UnsupportedMemberKind { ref member, .. } if member == "double"));
    }

    #[test]
    fn getter_store_only_is_fine() {
        let mut d = description();
        d.getter("double", |s: &Sample| s.a * 2, Scalar::attribute("double"))
            .fetch(false);
        assert!(d.finish().is_ok());
    }

    #[test]
    fn setter_is_unsupported_for_store() {
        let mut d = description();
        d.setter("a", |s: &mut Sample, v: i32| s.a = v, Scalar::attribute("a"))
            .fetch(false);
        let err = d.finish().unwrap_err();
        assert!(matches!(err, PersistError::UnsupportedMemberKind { .. }));
    }

    #[test]
    fn duplicate_member_rejected() {
        let mut d = description();
        d.field("a", |s| &s.a, |s| &mut s.a, Scalar::attribute("a"));
        d.field("a", |s| &s.a, |s| &mut s.a, Scalar::attribute("a2"));
        assert!(matches!(d.finish().unwrap_err(), PersistError::DuplicateMember { .. }));
    }

    #[test]
    fn property_accessor_kind() {
        let mut d = description();
        d.property(
            "b",
            |s: &Sample| s.b.clone(),
            |s: &mut Sample, v: String| s.b = v,
            Scalar::element("b"),
        );
        let members = d.finish().unwrap();
        assert_eq!(members[0].accessor_kind(), AccessorKind::Property);
    }
}
