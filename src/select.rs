//! The immutable feature table and the selection resolver. The table
//! validates a toolchain declaration once, resolves all cross-references to
//! stable indices, and then serves resolved configurations on demand.

use crate::{
    artifacts::ArtifactCategory,
    configuration::{ConfigurationCache, FeatureConfiguration},
    error::{CollidingProvidesError, ConfigError},
    toolchain::{
        ArtifactNamePattern, FlagGroup, Name, Selectable, Toolchain,
    },
    variables::VariableScope,
};
use indexmap::{IndexMap, IndexSet};
use log::{debug, trace};
use std::{collections::VecDeque, path::Path, sync::Arc};

/// Selectables are stored in one vector (declaration order: features first,
/// then action configs) and referenced by index everywhere else. This keeps
/// the cyclic implies/requires graph free of ownership cycles.
pub(crate) type SelectableId = usize;

/// Validated toolchain data, shared between the table and every
/// configuration resolved from it
#[derive(Debug)]
pub(crate) struct TableInner {
    pub(crate) selectables: Vec<Selectable>,
    by_name: IndexMap<Name, SelectableId>,
    /// Forward implies edges, per selectable
    implies: Vec<IndexSet<SelectableId>>,
    /// Selectables naming this one in their implies list
    implied_by: Vec<IndexSet<SelectableId>>,
    /// Disjunction of conjunctions, resolved to indices
    requires: Vec<Vec<IndexSet<SelectableId>>>,
    /// Selectables naming this one in any requires group
    required_by: Vec<IndexSet<SelectableId>>,
    /// Symbols claimed by each selectable
    provides: Vec<Vec<String>>,
}

/// An immutable feature table built from a toolchain declaration. Resolving
/// a requested set into a [FeatureConfiguration] is memoized per set, so
/// repeated requests are cheap.
#[derive(Debug)]
pub struct FeatureTable {
    inner: Arc<TableInner>,
    artifact_name_patterns: Vec<ArtifactNamePattern>,
    defaults: Vec<SelectableId>,
    cache: ConfigurationCache,
}

impl FeatureTable {
    /// Validate a declaration and cross-link it. Any inconsistency (dangling
    /// name, duplicate, malformed flag group) fails construction.
    pub fn new(toolchain: Toolchain) -> Result<Self, ConfigError> {
        let Toolchain {
            features,
            action_configs,
            artifact_name_patterns,
        } = toolchain;

        let mut selectables: Vec<Selectable> =
            Vec::with_capacity(features.len() + action_configs.len());
        selectables.extend(features.into_iter().map(Selectable::Feature));
        for mut config in action_configs {
            // Flag sets in an action config inherit the config's action
            for flag_set in &mut config.flag_sets {
                if !flag_set.actions.is_empty() {
                    return Err(ConfigError::ActionConfigFlagSetHasActions(
                        config.config_name.clone(),
                    ));
                }
                flag_set.actions.insert(config.action_name.clone());
            }
            selectables.push(Selectable::ActionConfig(config));
        }

        let mut by_name = IndexMap::new();
        let mut actions: IndexMap<String, SelectableId> = IndexMap::new();
        for (id, selectable) in selectables.iter().enumerate() {
            let name = selectable.name();
            if name.is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if by_name.insert(name.clone(), id).is_some() {
                return Err(ConfigError::DuplicateSelectable(name.clone()));
            }
            if let Selectable::ActionConfig(config) = selectable {
                if actions
                    .insert(config.action_name.clone(), id)
                    .is_some()
                {
                    return Err(ConfigError::DuplicateActionConfig(
                        config.action_name.clone(),
                    ));
                }
            }
            for flag_set in selectable.flag_sets() {
                for group in &flag_set.flag_groups {
                    validate_flag_group(group)?;
                }
            }
        }

        let count = selectables.len();
        let mut implies = vec![IndexSet::new(); count];
        let mut implied_by = vec![IndexSet::new(); count];
        let mut requires = vec![Vec::new(); count];
        let mut required_by = vec![IndexSet::new(); count];
        let mut provides = vec![Vec::new(); count];
        for (id, selectable) in selectables.iter().enumerate() {
            let resolve = |referenced: &Name| {
                by_name.get(referenced).copied().ok_or_else(|| {
                    ConfigError::UnknownSelectable {
                        referrer: selectable.name().clone(),
                        referenced: referenced.clone(),
                    }
                })
            };
            for implied in selectable.implies() {
                let target = resolve(implied)?;
                implies[id].insert(target);
                implied_by[target].insert(id);
            }
            for group in selectable.requires() {
                let mut resolved = IndexSet::new();
                for required in group {
                    let target = resolve(required)?;
                    resolved.insert(target);
                    required_by[target].insert(id);
                }
                requires[id].push(resolved);
            }
            provides[id] = selectable.provides().to_vec();
        }

        let defaults = selectables
            .iter()
            .enumerate()
            .filter(|(_, selectable)| selectable.enabled_by_default())
            .map(|(id, _)| id)
            .collect();

        debug!(
            "Built feature table with {} selectables ({} action configs)",
            count,
            actions.len()
        );
        Ok(Self {
            inner: Arc::new(TableInner {
                selectables,
                by_name,
                implies,
                implied_by,
                requires,
                required_by,
                provides,
            }),
            artifact_name_patterns,
            defaults,
            cache: ConfigurationCache::default(),
        })
    }

    /// Resolve the configuration for a set of requested selectable names.
    /// Unknown names are ignored (they may come from a newer toolchain
    /// version). A provides collision is the only error; a requested
    /// selectable whose requirements can't be met is simply not enabled.
    pub fn configuration(
        &self,
        requested: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Arc<FeatureConfiguration>, CollidingProvidesError> {
        let mut key: Vec<String> =
            requested.into_iter().map(Into::into).collect();
        key.sort_unstable();
        key.dedup();
        self.cache.get_or_compute(key, |names| {
            SelectionResolver::new(&self.inner, names).resolve()
        })
    }

    /// Names of the selectables the toolchain enables by default, in
    /// declaration order
    pub fn default_selectable_names(&self) -> Vec<&str> {
        self.defaults
            .iter()
            .map(|&id| self.inner.selectables[id].name().as_str())
            .collect()
    }

    /// Compute the concrete name for an output artifact of the given
    /// category. The pattern may reference `output_name`, `base_name` and
    /// `output_directory`; a leading `/` in the expansion is stripped.
    pub fn artifact_name_for_category(
        &self,
        category: ArtifactCategory,
        output_name: &str,
    ) -> Result<String, ConfigError> {
        let pattern = self
            .artifact_name_patterns
            .iter()
            .find(|pattern| {
                pattern.category_name == category.category_name()
            })
            .ok_or_else(|| {
                ConfigError::MissingArtifactPattern(
                    category.category_name().to_owned(),
                )
            })?;

        let path = Path::new(output_name);
        let base_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let output_directory = path
            .parent()
            .map(|directory| directory.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut scope = VariableScope::new();
        scope.insert_string("output_name", output_name);
        scope.insert_string("base_name", base_name);
        scope.insert_string("output_directory", output_directory);

        let expansion = pattern.pattern.expand(&scope, None)?;
        Ok(expansion
            .strip_prefix('/')
            .unwrap_or(&expansion)
            .to_owned())
    }
}

/// Flags and nested groups are mutually exclusive, at every nesting level
fn validate_flag_group(group: &FlagGroup) -> Result<(), ConfigError> {
    if !group.flags.is_empty() && !group.flag_groups.is_empty() {
        return Err(ConfigError::MixedFlagGroup);
    }
    for nested in &group.flag_groups {
        validate_flag_group(nested)?;
    }
    Ok(())
}

/// Computes the enabled set for one requested-name set: saturate along
/// implies edges, then prune anything whose requirements can't hold, until
/// the set is stable.
struct SelectionResolver<'a> {
    table: &'a Arc<TableInner>,
    requested: IndexSet<SelectableId>,
    enabled: IndexSet<SelectableId>,
}

impl<'a> SelectionResolver<'a> {
    fn new(table: &'a Arc<TableInner>, requested_names: &[String]) -> Self {
        let requested = requested_names
            .iter()
            .filter_map(|name| {
                let id = table.by_name.get(name.as_str()).copied();
                if id.is_none() {
                    trace!(
                        "Ignoring unknown requested selectable '{name}'"
                    );
                }
                id
            })
            .collect();
        Self {
            table,
            requested,
            enabled: IndexSet::new(),
        }
    }

    fn resolve(mut self) -> Result<FeatureConfiguration, CollidingProvidesError> {
        for id in self.requested.clone() {
            self.enable_transitively(id);
        }
        self.prune();

        // Report in declaration order, not discovery order
        let mut enabled: Vec<SelectableId> =
            self.enabled.iter().copied().collect();
        enabled.sort_unstable();

        self.check_provides(&enabled)?;
        trace!(
            "Enabled selectables: {:?}",
            enabled
                .iter()
                .map(|&id| self.table.selectables[id].name().as_str())
                .collect::<Vec<_>>()
        );
        Ok(FeatureConfiguration::new(Arc::clone(self.table), enabled))
    }

    /// DFS along implies edges
    fn enable_transitively(&mut self, id: SelectableId) {
        if !self.enabled.insert(id) {
            return;
        }
        let table = self.table;
        trace!("Enabling '{}'", table.selectables[id].name());
        for &implied in &table.implies[id] {
            self.enable_transitively(implied);
        }
    }

    /// Repeatedly drop enabled selectables that aren't satisfied, rechecking
    /// everything adjacent to each removal. Each iteration either removes a
    /// selectable or drains the queue, so this terminates.
    fn prune(&mut self) {
        let mut queue: VecDeque<SelectableId> =
            self.enabled.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            if !self.enabled.contains(&id) || self.is_satisfied(id) {
                continue;
            }
            let table = self.table;
            trace!(
                "Disabling '{}': requirements not satisfied",
                table.selectables[id].name()
            );
            self.enabled.swap_remove(&id);
            // Anything that implies, requires, or is implied by the removed
            // selectable may have just lost its own justification
            for &neighbor in table.implied_by[id]
                .iter()
                .chain(&table.required_by[id])
                .chain(&table.implies[id])
            {
                queue.push_back(neighbor);
            }
        }
    }

    fn is_satisfied(&self, id: SelectableId) -> bool {
        (self.requested.contains(&id)
            || self.table.implied_by[id]
                .iter()
                .any(|implier| self.enabled.contains(implier)))
            && self.table.implies[id]
                .iter()
                .all(|implied| self.enabled.contains(implied))
            && self.requires_met(id)
    }

    /// Empty requires list is trivially met; otherwise at least one
    /// conjunction must be fully enabled
    fn requires_met(&self, id: SelectableId) -> bool {
        let groups = &self.table.requires[id];
        groups.is_empty()
            || groups.iter().any(|group| {
                group.iter().all(|required| self.enabled.contains(required))
            })
    }

    /// At most one enabled selectable may provide any symbol
    fn check_provides(
        &self,
        enabled: &[SelectableId],
    ) -> Result<(), CollidingProvidesError> {
        let mut providers: IndexMap<&str, Vec<SelectableId>> =
            IndexMap::new();
        for &id in enabled {
            for symbol in &self.table.provides[id] {
                providers.entry(symbol.as_str()).or_default().push(id);
            }
        }
        for (symbol, ids) in providers {
            if ids.len() > 1 {
                return Err(CollidingProvidesError {
                    symbol: symbol.to_owned(),
                    providers: ids
                        .iter()
                        .map(|&id| {
                            self.table.selectables[id].name().as_str()
                        })
                        .collect::<Vec<_>>()
                        .join(" "),
                });
            }
        }
        Ok(())
    }
}
