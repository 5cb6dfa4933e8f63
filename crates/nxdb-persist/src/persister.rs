//! The fetch/serialize/store protocol for one persistent type.

use std::sync::Arc;

use nxdb_tree::Element;
use tracing::debug;

use crate::cache::{IdentityCache, TypeCache};
use crate::conversion::{SerializedForm, SerializedValue};
use crate::descriptor::{Candidate, MemberDescriptor};
use crate::error::{PersistError, PersistResult};
use crate::Persistent;

/// Runs the persistence protocol against a resolved [`TypeCache`].
///
/// Holds no state of its own beyond the type cache; identity is tracked by
/// the [`IdentityCache`] passed to each call.
pub struct Persister<T> {
    types: Arc<TypeCache<T>>,
}

impl<T: Persistent> Persister<T> {
    pub fn new(types: Arc<TypeCache<T>>) -> Self {
        Self { types }
    }

    /// Resolve `T` through the cache's catalog.
    pub fn for_type(cache: &IdentityCache) -> PersistResult<Self> {
        cache.type_cache::<T>().map(Self::new)
    }

    pub fn types(&self) -> &Arc<TypeCache<T>> {
        &self.types
    }

    /// Load `target`'s fetched members from `element`.
    ///
    /// Every candidate is computed before any member is assigned. If a
    /// conversion fails or a required member has no value, `target` is left
    /// untouched. A member the element holds nothing for is cleared when its
    /// conversion has a "no value" state (`None`, an empty list) and kept
    /// otherwise.
    pub fn fetch(&self, element: &Element, target: &mut T, cache: &mut IdentityCache) -> PersistResult<()> {
        let type_name = self.types.type_name();
        let members = self.types.members();

        let mut candidates: Vec<(usize, Candidate)> = Vec::with_capacity(members.len());
        for (index, member) in members.iter().enumerate() {
            let flags = member.flags();
            if !flags.fetch {
                continue;
            }
            let candidate = member
                .fetch_candidate(element, target, cache)
                .map_err(|e| e.in_member(type_name, member.name()))?;
            match candidate {
                Some(candidate) => candidates.push((index, candidate)),
                None if flags.required => {
                    return Err(PersistError::MissingRequiredMember {
                        type_name,
                        member: member.name().to_string(),
                    })
                }
                None => {
                    if let Some(cleared) = member.cleared_candidate() {
                        candidates.push((index, cleared));
                    }
                }
            }
        }

        let assigned = candidates.len();
        for (index, candidate) in candidates {
            let member = &members[index];
            member
                .assign(target, candidate)
                .map_err(|e| e.in_member(type_name, member.name()))?;
        }
        debug!(type_name, node = %element.id(), assigned, "fetched object");
        Ok(())
    }

    /// Compute the serialized form of `source` without touching storage.
    /// `None` when there is no source.
    pub fn serialize(&self, source: Option<&T>, cache: &mut IdentityCache) -> PersistResult<Option<SerializedForm>> {
        let Some(source) = source else {
            return Ok(None);
        };
        let type_name = self.types.type_name();
        let mut values = Vec::new();
        for (index, member) in self.types.members().iter().enumerate() {
            if !member.flags().store {
                continue;
            }
            let value = member
                .serialize(source, cache)
                .map_err(|e| e.in_member(type_name, member.name()))?;
            values.push(SerializedValue {
                member: member.name().to_string(),
                index,
                value,
            });
        }
        Ok(Some(SerializedForm { type_name, values }))
    }

    /// Write a serialized form into `element`.
    ///
    /// An absent form or an absent source stores nothing. A form produced for another type is
    /// rejected unless the cache's configuration allows lenient forms, in
    /// which case values are matched to members by name and unknown values
    /// are skipped.
    pub fn store(
        &self,
        element: &Element,
        form: Option<&SerializedForm>,
        source: Option<&T>,
        cache: &mut IdentityCache,
    ) -> PersistResult<()> {
        let (Some(form), Some(source)) = (form, source) else {
            return Ok(());
        };
        let type_name = self.types.type_name();
        let same_type = form.type_name == type_name;
        if !same_type && cache.config().strict_forms {
            return Err(PersistError::FormMismatch {
                expected: type_name,
                actual: form.type_name.to_string(),
            });
        }

        let mut stored = 0usize;
        for value in &form.values {
            let Some(member) = self.resolve(value, same_type) else {
                debug!(type_name, member = %value.member, "skipping unknown member");
                continue;
            };
            if !member.flags().store {
                continue;
            }
            member
                .store(element, &value.value, source, cache)
                .map_err(|e| e.in_member(type_name, member.name()))?;
            stored += 1;
        }
        debug!(type_name, node = %element.id(), stored, "stored object");
        Ok(())
    }

    /// The member a serialized value belongs to: by index for forms of this
    /// type, by name otherwise.
    fn resolve(&self, value: &SerializedValue, same_type: bool) -> Option<&MemberDescriptor<T>> {
        if same_type {
            if let Some(member) = self.types.members().get(value.index) {
                if member.name() == value.member {
                    return Some(member);
                }
            }
        }
        self.types.member(&value.member)
    }
}

impl<T> Clone for Persister<T> {
    fn clone(&self) -> Self {
        Self {
            types: Arc::clone(&self.types),
        }
    }
}
