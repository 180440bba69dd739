//! Feature selection and command-line expansion for C/C++ toolchains.
//!
//! A toolchain declaration enumerates *features* and *action configs*
//! (collectively *selectables*) with their `implies`/`requires`/`provides`
//! relationships, plus per-action flag templates and environment bindings
//! that reference build variables. [FeatureTable] validates the declaration
//! once; [FeatureTable::configuration] then resolves a requested selectable
//! set into a [FeatureConfiguration], which produces deterministic command
//! lines, environments, and tool choices for any build action by expanding
//! templates against a [VariableScope].

pub mod artifacts;
mod cereal;
pub mod configuration;
pub mod error;
mod expand;
pub mod select;
pub mod template;
#[cfg(test)]
mod test_util;
pub mod toolchain;
pub mod variables;

pub use crate::{
    artifacts::{Artifact, ArtifactCategory, ArtifactExpander},
    configuration::FeatureConfiguration,
    error::{
        CollidingProvidesError, ConfigError, ExpansionError,
        TemplateParseError,
    },
    select::FeatureTable,
    template::Template,
    toolchain::Toolchain,
    variables::{VariableScope, VariableValue},
};
