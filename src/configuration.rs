//! Resolved feature configurations: the result object callers query for
//! command lines, environments, and tool choices, plus the memo cache that
//! deduplicates resolution work per requested set.

use crate::{
    artifacts::ArtifactExpander,
    error::{CollidingProvidesError, ExpansionError},
    expand::with_features_satisfied,
    select::{SelectableId, TableInner},
    toolchain::{Selectable, Tool},
    variables::VariableScope,
};
use indexmap::{IndexMap, IndexSet};
use std::sync::{Arc, Mutex, PoisonError};

/// The outcome of resolving one requested selectable set: which selectables
/// are enabled, and everything derivable from that. Immutable and cheap to
/// share across threads.
#[derive(Debug)]
pub struct FeatureConfiguration {
    table: Arc<TableInner>,
    /// Enabled selectables in declaration order
    enabled: Vec<SelectableId>,
    /// Names of all enabled selectables, in declaration order. Action
    /// config names participate so `with_features` can reference them.
    enabled_names: IndexSet<String>,
    /// Enabled action configs, keyed by action name
    action_configs: IndexMap<String, SelectableId>,
}

impl FeatureConfiguration {
    pub(crate) fn new(
        table: Arc<TableInner>,
        enabled: Vec<SelectableId>,
    ) -> Self {
        let mut enabled_names = IndexSet::new();
        let mut action_configs = IndexMap::new();
        for &id in &enabled {
            let selectable = &table.selectables[id];
            enabled_names.insert(selectable.name().to_string());
            if let Selectable::ActionConfig(config) = selectable {
                action_configs.insert(config.action_name.clone(), id);
            }
        }
        Self {
            table,
            enabled,
            enabled_names,
            action_configs,
        }
    }

    /// Is the named selectable enabled?
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled_names.contains(name)
    }

    /// Names of all enabled selectables, in declaration order
    pub fn enabled_feature_names(&self) -> &IndexSet<String> {
        &self.enabled_names
    }

    /// Does an enabled action config claim this action?
    pub fn action_is_configured(&self, action: &str) -> bool {
        self.action_configs.contains_key(action)
    }

    /// Build the full command line for an action: the action config's flags
    /// first (when configured), then each enabled feature's flags in
    /// declaration order
    pub fn command_line(
        &self,
        action: &str,
        scope: &VariableScope,
        expander: Option<&dyn ArtifactExpander>,
    ) -> Result<Vec<String>, ExpansionError> {
        Ok(self
            .expansions_by_selectable(action, scope, expander)?
            .into_iter()
            .flat_map(|(_, flags)| flags)
            .collect())
    }

    /// The same computation as [Self::command_line], bucketed per
    /// selectable. Concatenating the buckets in order reproduces the
    /// command line exactly.
    pub fn per_feature_expansions(
        &self,
        action: &str,
        scope: &VariableScope,
        expander: Option<&dyn ArtifactExpander>,
    ) -> Result<Vec<(String, Vec<String>)>, ExpansionError> {
        self.expansions_by_selectable(action, scope, expander)
    }

    fn expansions_by_selectable(
        &self,
        action: &str,
        scope: &VariableScope,
        expander: Option<&dyn ArtifactExpander>,
    ) -> Result<Vec<(String, Vec<String>)>, ExpansionError> {
        let mut buckets = Vec::new();
        if let Some(&id) = self.action_configs.get(action) {
            if let Selectable::ActionConfig(config) =
                &self.table.selectables[id]
            {
                let mut flags = Vec::new();
                for flag_set in &config.flag_sets {
                    flag_set.expand(
                        action,
                        scope,
                        &self.enabled_names,
                        expander,
                        &mut flags,
                    )?;
                }
                buckets.push((config.config_name.to_string(), flags));
            }
        }
        for &id in &self.enabled {
            if let Selectable::Feature(feature) = &self.table.selectables[id]
            {
                let mut flags = Vec::new();
                for flag_set in &feature.flag_sets {
                    flag_set.expand(
                        action,
                        scope,
                        &self.enabled_names,
                        expander,
                        &mut flags,
                    )?;
                }
                buckets.push((feature.name.to_string(), flags));
            }
        }
        Ok(buckets)
    }

    /// Build the environment for an action by merging each enabled
    /// feature's matching env sets in declaration order; later keys
    /// overwrite earlier ones
    pub fn environment_variables(
        &self,
        action: &str,
        scope: &VariableScope,
    ) -> Result<IndexMap<String, String>, ExpansionError> {
        let mut environment = IndexMap::new();
        for &id in &self.enabled {
            if let Selectable::Feature(feature) = &self.table.selectables[id]
            {
                for env_set in &feature.env_sets {
                    env_set.expand(
                        action,
                        scope,
                        &self.enabled_names,
                        &mut environment,
                    )?;
                }
            }
        }
        Ok(environment)
    }

    /// Pick the tool for a configured action: the first tool in declared
    /// order whose `with_features` match the enabled set
    pub fn tool_for_action(&self, action: &str) -> Result<&Tool, ExpansionError> {
        let &id = self.action_configs.get(action).ok_or_else(|| {
            ExpansionError::ActionNotConfigured(action.to_owned())
        })?;
        let config = match &self.table.selectables[id] {
            Selectable::ActionConfig(config) => config,
            // The action map is built from action configs only
            Selectable::Feature(_) => unreachable!(),
        };
        config
            .tools
            .iter()
            .find(|tool| {
                with_features_satisfied(
                    &tool.with_features,
                    &self.enabled_names,
                )
            })
            .ok_or_else(|| {
                ExpansionError::NoMatchingTool(action.to_owned())
            })
    }
}

const CACHE_CAPACITY: usize = 10_000;

/// Memoizes resolved configurations per requested-name set (sorted and
/// deduplicated). Hits refresh the entry's position so eviction drops the
/// least recently used set. Resolution is pure, so racing computations of
/// the same key are harmless; collisions are propagated, never cached.
#[derive(Debug, Default)]
pub(crate) struct ConfigurationCache {
    entries: Mutex<IndexMap<Vec<String>, Arc<FeatureConfiguration>>>,
}

impl ConfigurationCache {
    pub(crate) fn get_or_compute(
        &self,
        key: Vec<String>,
        compute: impl FnOnce(
            &[String],
        )
            -> Result<FeatureConfiguration, CollidingProvidesError>,
    ) -> Result<Arc<FeatureConfiguration>, CollidingProvidesError> {
        {
            let mut entries = self
                .entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(configuration) = entries.shift_remove(&key) {
                entries.insert(key, Arc::clone(&configuration));
                return Ok(configuration);
            }
        }

        // Compute without holding the lock
        let configuration = Arc::new(compute(&key)?);
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= CACHE_CAPACITY && !entries.contains_key(&key) {
            entries.shift_remove_index(0);
        }
        let stored = entries
            .entry(key)
            .or_insert(configuration)
            .clone();
        Ok(stored)
    }
}
