//! The toolchain declaration model: features and action configs
//! (collectively *selectables*), the flag/env sets they carry, and the
//! artifact name patterns. This is plain data as handed over by whatever
//! loader populated it (a protobuf bridge in production, TOML in tests);
//! cross-references are still by name. [crate::select::FeatureTable]
//! validates the declaration and resolves names to indices.

use crate::{error::ConfigError, template::Template};
use derive_more::{Deref, Display, From};
use indexmap::IndexSet;
use serde::Deserialize;
use std::{borrow::Borrow, str::FromStr};

/// A complete toolchain declaration. Declaration order is semantic: enabled
/// selectables are always reported in the order they appear here, features
/// first, then action configs.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Toolchain {
    pub features: Vec<Feature>,
    pub action_configs: Vec<ActionConfig>,
    pub artifact_name_patterns: Vec<ArtifactNamePattern>,
}

/// A selectable name. Newtype allows us to apply validation during
/// deserialization.
#[derive(
    Clone,
    Debug,
    Default,
    Deref,
    Display,
    From,
    Hash,
    Eq,
    Ord,
    PartialEq,
    PartialOrd,
)]
pub struct Name(pub String);

impl Name {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for Name {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        Ok(Self(name.into()))
    }
}

/// A named bundle of flag-sets and env-sets, plus its edges in the
/// implies/requires/provides graph
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Feature {
    pub name: Name,
    /// Whether this feature is part of the toolchain's default selection
    pub enabled: bool,
    pub flag_sets: Vec<FlagSet>,
    pub env_sets: Vec<EnvSet>,
    /// Selectables force-enabled along with this one
    pub implies: IndexSet<Name>,
    /// Disjunction of conjunctions: at least one inner set must be fully
    /// enabled for this feature to survive pruning
    pub requires: Vec<IndexSet<Name>>,
    /// Symbols claimed by this feature; at most one enabled selectable may
    /// provide any symbol
    pub provides: Vec<String>,
}

/// A named bundle of flag-sets keyed to one build action, plus the policy
/// for picking the tool that runs it
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ActionConfig {
    pub config_name: Name,
    pub action_name: String,
    /// Whether this config is part of the toolchain's default selection
    pub enabled: bool,
    /// Candidate tools in preference order; the first one whose
    /// `with_features` match the enabled set wins
    pub tools: Vec<Tool>,
    /// Flag sets here must not declare actions; they implicitly apply to
    /// `action_name`
    pub flag_sets: Vec<FlagSet>,
    pub implies: IndexSet<Name>,
    pub requires: Vec<IndexSet<Name>>,
    pub provides: Vec<String>,
}

/// Either kind of selectable. Both participate identically in the
/// implies/requires/provides graph.
#[derive(Clone, Debug, PartialEq)]
pub enum Selectable {
    Feature(Feature),
    ActionConfig(ActionConfig),
}

impl Selectable {
    pub fn name(&self) -> &Name {
        match self {
            Self::Feature(feature) => &feature.name,
            Self::ActionConfig(config) => &config.config_name,
        }
    }

    pub(crate) fn enabled_by_default(&self) -> bool {
        match self {
            Self::Feature(feature) => feature.enabled,
            Self::ActionConfig(config) => config.enabled,
        }
    }

    pub(crate) fn implies(&self) -> &IndexSet<Name> {
        match self {
            Self::Feature(feature) => &feature.implies,
            Self::ActionConfig(config) => &config.implies,
        }
    }

    pub(crate) fn requires(&self) -> &[IndexSet<Name>] {
        match self {
            Self::Feature(feature) => &feature.requires,
            Self::ActionConfig(config) => &config.requires,
        }
    }

    pub(crate) fn provides(&self) -> &[String] {
        match self {
            Self::Feature(feature) => &feature.provides,
            Self::ActionConfig(config) => &config.provides,
        }
    }

    pub(crate) fn flag_sets(&self) -> &[FlagSet] {
        match self {
            Self::Feature(feature) => &feature.flag_sets,
            Self::ActionConfig(config) => &config.flag_sets,
        }
    }
}

/// A gated, action-scoped list of flag groups
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FlagSet {
    /// Actions this flag set applies to. Empty only inside an action
    /// config, where the config's action is implied.
    pub actions: IndexSet<String>,
    pub with_features: Vec<WithFeatureSet>,
    /// Skip the whole set unless every named variable is available
    pub expand_if_all_available: IndexSet<String>,
    pub flag_groups: Vec<FlagGroup>,
}

/// A gated list of flag templates OR nested flag groups (never both),
/// optionally iterating over a sequence variable
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FlagGroup {
    pub flags: Vec<Template>,
    pub flag_groups: Vec<FlagGroup>,
    /// Expand the children once per element of this sequence variable, with
    /// the name rebound to the current element
    pub iterate_over: Option<String>,
    pub expand_if_all_available: IndexSet<String>,
    pub expand_if_none_available: IndexSet<String>,
    pub expand_if_true: Option<String>,
    pub expand_if_false: Option<String>,
    pub expand_if_equal: Option<VariableWithValue>,
}

/// The `expand_if_equal` gate: a variable name and the literal its string
/// view must equal
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct VariableWithValue {
    pub variable: String,
    pub value: String,
}

/// A predicate over the enabled feature set: all of `features` enabled and
/// none of `not_features`
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WithFeatureSet {
    pub features: IndexSet<String>,
    pub not_features: IndexSet<String>,
}

/// A gated, action-scoped list of environment entries
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EnvSet {
    pub actions: IndexSet<String>,
    pub with_features: Vec<WithFeatureSet>,
    pub env_entries: Vec<EnvEntry>,
}

/// One environment binding: a fixed key and a value template
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EnvEntry {
    pub key: String,
    pub value: Template,
}

/// A tool candidate for an action config
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Tool {
    pub tool_path: String,
    pub with_features: Vec<WithFeatureSet>,
    /// Opaque requirements forwarded to the execution layer
    pub execution_requirements: IndexSet<String>,
}

/// Template for naming output artifacts of one category
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ArtifactNamePattern {
    pub category_name: String,
    pub pattern: Template,
}
