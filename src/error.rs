use crate::toolchain::Name;
use thiserror::Error;

/// A fatal error raised while building a feature table from a toolchain
/// declaration. Any of these indicates the toolchain itself is broken, so
/// construction aborts and the caller gets a human-readable description.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Selectable names (features and action configs together) must be
    /// unique
    #[error("Duplicate selectable named '{0}'")]
    DuplicateSelectable(Name),

    /// Each action can be claimed by at most one action config
    #[error("Multiple action configs for action '{0}'")]
    DuplicateActionConfig(String),

    /// An `implies` or `requires` entry didn't resolve to a defined
    /// selectable
    #[error("Selectable '{referrer}' references unknown selectable '{referenced}'")]
    UnknownSelectable { referrer: Name, referenced: Name },

    /// Flag sets inside an action config automatically apply to the
    /// config's action, so declaring an action list there is a mistake
    #[error(
        "Action config '{0}' declares actions in a flag set; flag sets in \
        an action config automatically apply to the config's action"
    )]
    ActionConfigFlagSetHasActions(Name),

    #[error("A flag group must not contain both flags and nested flag groups")]
    MixedFlagGroup,

    #[error("Invalid name: empty string")]
    EmptyName,

    #[error("No artifact name pattern defined for category '{0}'")]
    MissingArtifactPattern(String),

    /// An artifact name pattern failed to expand against the name scope
    #[error(transparent)]
    Expansion(#[from] ExpansionError),

    #[error(transparent)]
    Template(#[from] TemplateParseError),
}

/// A malformed flag/env/artifact-name template. Carries the offending
/// string and the byte position of the error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("Invalid template '{input}': {message} at byte {position}")]
pub struct TemplateParseError {
    pub input: String,
    pub position: usize,
    pub message: &'static str,
}

/// An error raised while expanding templates against a variable scope.
/// These indicate a logic bug in the toolchain or the caller (a missing
/// variable, a type confusion), so callers treat them as unrecoverable
/// rather than handling them locally.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExpansionError {
    #[error("Cannot find variable named '{0}'")]
    UndefinedVariable(String),

    #[error("Cannot expand variable '{name}': expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Structure '{structure}' doesn't have a field named '{field}'")]
    MissingField { structure: String, field: String },

    /// Tool selection was requested for an action with no enabled action
    /// config
    #[error("Action '{0}' is not configured")]
    ActionNotConfigured(String),

    /// The action is configured, but none of its tools' `with_feature`
    /// predicates match the enabled feature set
    #[error("No tool for action '{0}' matches the enabled features")]
    NoMatchingTool(String),
}

/// Two or more enabled selectables claim the same `provides` symbol. This is
/// a *checked* error: callers may surface it and continue analysis, so it's
/// kept separate from the unrecoverable expansion faults.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("Symbol '{symbol}' is provided by all of the following: {providers}")]
pub struct CollidingProvidesError {
    pub symbol: String,
    /// Space-joined names of the colliding selectables, in declaration order
    pub providers: String,
}
