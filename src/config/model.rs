// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::unit::UnitKind;

/// Top-level roster as read from a TOML file, before validation.
///
/// This is a direct mapping of the on-disk format:
///
/// ```toml
/// [default]
/// kind = "process"
/// dir = "/srv/work"
///
/// [target."/local/alpha"]
/// dir = "/srv/alpha"
///
/// [target."/pool/db1"]
/// kind = "docker"
/// env = { POOL = "db" }
/// ```
///
/// All sections are optional; an empty roster is valid (a broadcast over it
/// dispatches nothing).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Defaults from `[default]`, applied to entries that do not override
    /// them.
    #[serde(default)]
    pub default: DefaultSection,

    /// All targets from `[target."<address>"]`.
    ///
    /// Keys are the *addresses* (e.g. `"/pool/db1"`).
    #[serde(default)]
    pub target: BTreeMap<String, TargetConfig>,
}

/// A validated roster.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so every address held
/// here is known to be a well-formed namespace path.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    default: DefaultSection,
    target: BTreeMap<String, TargetConfig>,
}

impl ConfigFile {
    /// Construct without re-running validation. Only `validate.rs` calls
    /// this, after the checks have passed.
    pub(crate) fn new_unchecked(
        default: DefaultSection,
        target: BTreeMap<String, TargetConfig>,
    ) -> Self {
        Self { default, target }
    }

    /// Defaults from `[default]`.
    pub fn default_section(&self) -> &DefaultSection {
        &self.default
    }

    /// All targets, keyed by address. `BTreeMap` keeps the roster in a
    /// stable lexicographic order.
    pub fn targets(&self) -> &BTreeMap<String, TargetConfig> {
        &self.target
    }
}

/// `[default]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultSection {
    /// Default unit kind for entries that do not set one. When absent the
    /// roster-wide default is `process`.
    #[serde(default)]
    pub kind: Option<UnitKind>,

    /// Default working directory for entries that do not set one.
    #[serde(default)]
    pub dir: Option<String>,
}

/// `[target."<address>"]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetConfig {
    /// Which unit variant runs commands at this address (`"process"` or
    /// `"docker"`). Falls back to `default.kind`.
    #[serde(default)]
    pub kind: Option<UnitKind>,

    /// Working directory for commands at this address. Falls back to
    /// `default.dir`.
    #[serde(default)]
    pub dir: Option<String>,

    /// Environment merged *under* the command's own env; on key collision
    /// the command wins.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}
