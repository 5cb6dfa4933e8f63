use std::collections::BTreeMap;

use nxdb_types::Sequence;

/// Everything an engine sees while evaluating one query: variable
/// bindings, the default and named collections, and the initial context.
///
/// Built fresh for every evaluation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecutionContext {
    variables: BTreeMap<String, Sequence>,
    default_collection: Sequence,
    collections: BTreeMap<String, Sequence>,
    initial_context: Option<Sequence>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_variable(&mut self, name: &str, value: Sequence) {
        self.variables.insert(name.to_string(), value);
    }

    pub fn variable(&self, name: &str) -> Option<&Sequence> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &Sequence)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn bind_default_collection(&mut self, value: Sequence) {
        self.default_collection = value;
    }

    /// The unnamed collection; empty when none was bound.
    pub fn default_collection(&self) -> &Sequence {
        &self.default_collection
    }

    pub fn bind_collection(&mut self, name: &str, value: Sequence) {
        self.collections.insert(name.to_string(), value);
    }

    pub fn collection(&self, name: &str) -> Option<&Sequence> {
        self.collections.get(name)
    }

    /// Set the initial context. It may hold any number of items, none
    /// included.
    pub fn set_initial_context(&mut self, value: Option<Sequence>) {
        self.initial_context = value;
    }

    pub fn initial_context(&self) -> Option<&Sequence> {
        self.initial_context.as_ref()
    }

    /// The value of `.`: the initial context when set, otherwise the default
    /// collection.
    pub fn context_value(&self) -> Sequence {
        match &self.initial_context {
            Some(value) => value.clone(),
            None => self.default_collection.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nxdb_types::Item;

    #[test]
    fn context_value_falls_back_to_default_collection() {
        let mut ctx = ExecutionContext::new();
        ctx.bind_default_collection(Sequence::from(vec![1, 2]));
        assert_eq!(ctx.context_value(), Sequence::from(vec![1, 2]));

        ctx.set_initial_context(Some(Sequence::from(vec![Item::Integer(3), Item::Integer(4)])));
        assert_eq!(ctx.context_value(), Sequence::from(vec![3, 4]));

        ctx.set_initial_context(Some(Sequence::empty()));
        assert!(ctx.context_value().is_empty());
    }
}
