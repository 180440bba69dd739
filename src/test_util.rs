//! Utilities for tests!

use crate::{
    select::FeatureTable,
    toolchain::{Name, Toolchain},
    variables::VariableScope,
};
use indexmap::{IndexMap, IndexSet};
use std::hash::Hash;

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Parse a toolchain declaration from TOML
pub fn toolchain(source: &str) -> Toolchain {
    toml::from_str(source).expect("Invalid toolchain declaration")
}

/// Parse a toolchain declaration and build its feature table
pub fn table(source: &str) -> FeatureTable {
    FeatureTable::new(toolchain(source)).expect("Invalid toolchain")
}

/// Build a scope of bare string bindings
pub fn scope<const N: usize>(
    bindings: [(&str, &str); N],
) -> VariableScope<'static> {
    let mut scope = VariableScope::new();
    for (name, value) in bindings {
        scope.insert_string(name, value);
    }
    scope
}

/// Helper for building an IndexMap
pub fn map<'a, K: Eq + Hash + PartialEq + From<&'a str>, V, const N: usize>(
    items: [(&'a str, V); N],
) -> IndexMap<K, V> {
    items.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Helper for building an IndexSet
pub fn set<'a, V: From<&'a str> + Hash + Eq, const N: usize>(
    items: [&'a str; N],
) -> IndexSet<V> {
    items.into_iter().map(V::from).collect()
}
