//! Expansion of templates, flag groups, flag sets, and env sets against a
//! variable scope. All expansion is deterministic: identical inputs produce
//! identical command lines and environments.

use crate::{
    artifacts::ArtifactExpander,
    error::ExpansionError,
    template::{Chunk, Template},
    toolchain::{EnvSet, FlagGroup, FlagSet, WithFeatureSet},
    variables::VariableScope,
};
use indexmap::{IndexMap, IndexSet};
use log::warn;

impl Template {
    /// Expand to a single string. Every referenced variable must have a
    /// scalar view.
    pub fn expand(
        &self,
        scope: &VariableScope,
        expander: Option<&dyn ArtifactExpander>,
    ) -> Result<String, ExpansionError> {
        let mut output = String::new();
        for chunk in self.chunks() {
            match chunk {
                Chunk::Literal(text) => output.push_str(text),
                Chunk::Variable(name) => output.push_str(
                    &scope.get(name, expander)?.string_view(name)?,
                ),
            }
        }
        Ok(output)
    }
}

impl WithFeatureSet {
    /// Satisfied iff the enabled set contains every `features` entry and
    /// none of the `not_features`
    pub fn is_satisfied_by(&self, enabled: &IndexSet<String>) -> bool {
        self.features.iter().all(|feature| enabled.contains(feature))
            && self
                .not_features
                .iter()
                .all(|feature| !enabled.contains(feature))
    }
}

/// An empty predicate list is trivially satisfied; otherwise at least one
/// predicate must match
pub(crate) fn with_features_satisfied(
    with_features: &[WithFeatureSet],
    enabled: &IndexSet<String>,
) -> bool {
    with_features.is_empty()
        || with_features
            .iter()
            .any(|with_feature| with_feature.is_satisfied_by(enabled))
}

impl FlagGroup {
    /// Expand this group into `out`. A failed gate skips the group
    /// silently; an unresolvable variable inside an expanded flag is an
    /// error.
    pub(crate) fn expand(
        &self,
        scope: &VariableScope,
        expander: Option<&dyn ArtifactExpander>,
        out: &mut Vec<String>,
    ) -> Result<(), ExpansionError> {
        if !self.gates_open(scope, expander)? {
            return Ok(());
        }
        match &self.iterate_over {
            Some(variable) => {
                let elements = scope
                    .get(variable, expander)?
                    .sequence_view(variable, expander)?;
                for element in elements {
                    // Shadow the iterated name with the current element
                    let nested = scope.nested(variable.clone(), element);
                    self.expand_children(&nested, expander, out)?;
                }
                Ok(())
            }
            None => self.expand_children(scope, expander, out),
        }
    }

    /// Evaluate the conditional gates in declared order. A gate whose
    /// variable is unavailable fails the gate, it doesn't raise.
    fn gates_open(
        &self,
        scope: &VariableScope,
        expander: Option<&dyn ArtifactExpander>,
    ) -> Result<bool, ExpansionError> {
        if !self
            .expand_if_all_available
            .iter()
            .all(|variable| scope.is_available(variable, expander))
        {
            return Ok(false);
        }
        if self
            .expand_if_none_available
            .iter()
            .any(|variable| scope.is_available(variable, expander))
        {
            return Ok(false);
        }
        if let Some(variable) = &self.expand_if_true {
            match scope.get(variable, expander) {
                Ok(value) if value.is_truthy() => {}
                _ => return Ok(false),
            }
        }
        if let Some(variable) = &self.expand_if_false {
            match scope.get(variable, expander) {
                Ok(value) if !value.is_truthy() => {}
                _ => return Ok(false),
            }
        }
        if let Some(equal) = &self.expand_if_equal {
            match scope.get(&equal.variable, expander) {
                Ok(value) => {
                    if value.string_view(&equal.variable)? != equal.value {
                        return Ok(false);
                    }
                }
                Err(_) => return Ok(false),
            }
        }
        Ok(true)
    }

    fn expand_children(
        &self,
        scope: &VariableScope,
        expander: Option<&dyn ArtifactExpander>,
        out: &mut Vec<String>,
    ) -> Result<(), ExpansionError> {
        for group in &self.flag_groups {
            group.expand(scope, expander, out)?;
        }
        for flag in &self.flags {
            match flag.expand(scope, expander) {
                // Each flag contributes exactly one command line entry
                Ok(value) => out.push(value),
                Err(error) => {
                    if let ExpansionError::TypeMismatch {
                        name,
                        expected: "string",
                        found: "sequence",
                    } = &error
                    {
                        if self.iterate_over.is_none() {
                            warn!(
                                "Flag group references sequence variable \
                                '{name}' without iterate_over; implicit \
                                iteration is not supported"
                            );
                        }
                    }
                    return Err(error);
                }
            }
        }
        Ok(())
    }
}

impl FlagSet {
    /// Expand every flag group in declared order, unless the action doesn't
    /// match or a gate fails
    pub(crate) fn expand(
        &self,
        action: &str,
        scope: &VariableScope,
        enabled: &IndexSet<String>,
        expander: Option<&dyn ArtifactExpander>,
        out: &mut Vec<String>,
    ) -> Result<(), ExpansionError> {
        if !self
            .expand_if_all_available
            .iter()
            .all(|variable| scope.is_available(variable, expander))
        {
            return Ok(());
        }
        if !with_features_satisfied(&self.with_features, enabled) {
            return Ok(());
        }
        if !self.actions.contains(action) {
            return Ok(());
        }
        for group in &self.flag_groups {
            group.expand(scope, expander, out)?;
        }
        Ok(())
    }
}

impl EnvSet {
    /// Append this set's entries to the environment under construction.
    /// Later entries overwrite earlier values for the same key.
    pub(crate) fn expand(
        &self,
        action: &str,
        scope: &VariableScope,
        enabled: &IndexSet<String>,
        environment: &mut IndexMap<String, String>,
    ) -> Result<(), ExpansionError> {
        if !self.actions.contains(action) {
            return Ok(());
        }
        if !with_features_satisfied(&self.with_features, enabled) {
            return Ok(());
        }
        for entry in &self.env_entries {
            environment
                .insert(entry.key.clone(), entry.value.expand(scope, None)?);
        }
        Ok(())
    }
}
