//! Shared helpers for integration tests. Toolchain declarations are written
//! as TOML and deserialized into the declaration model, the same road any
//! loader takes.

use toolchain_select::{FeatureTable, Toolchain, VariableScope};

/// Parse a toolchain declaration and build its feature table
pub fn table(source: &str) -> FeatureTable {
    let toolchain: Toolchain =
        toml::from_str(source).expect("Invalid toolchain declaration");
    FeatureTable::new(toolchain).expect("Invalid toolchain")
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
