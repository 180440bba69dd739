//! Serde glue for the declaration model

use crate::{template::Template, toolchain::Name};
use serde::{de, Deserialize, Deserializer};

// Deserialize Name using its FromStr, so invalid names are rejected at the
// boundary
impl<'de> Deserialize<'de> for Name {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// Deserialize Template by parsing the raw string, so malformed templates
// fail the load instead of the first expansion
impl<'de> Deserialize<'de> for Template {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
