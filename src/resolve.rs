// src/resolve.rs

//! Target addresses and pattern resolution over the roster.

use std::fmt;
use std::sync::Arc;

use globset::GlobBuilder;

use crate::config::model::ConfigFile;
use crate::errors::{FanrunError, Result};

/// The address of one execution endpoint, e.g. `/pool/db1`.
///
/// Opaque to the dispatch layer; the unit factory decides what lives behind
/// it. Cloning is cheap, so drivers carry their target across task
/// boundaries freely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target(Arc<str>);

impl Target {
    pub fn new(addr: impl AsRef<str>) -> Self {
        Self(Arc::from(addr.as_ref()))
    }

    pub fn addr(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolves a path pattern to the concrete targets it addresses.
///
/// `resolve_all` is the broadcast entry point: it returns a point-in-time
/// snapshot of every known target, taken once before dispatch begins.
/// Targets appearing later are never picked up mid-dispatch.
pub trait TargetResolver: Send + Sync {
    fn resolve(&self, pattern: &str) -> Result<Vec<Target>>;
    fn resolve_all(&self) -> Result<Vec<Target>>;
}

/// Resolver over the static roster loaded from the config file.
///
/// Addresses keep their roster (lexicographic) order, so resolution is
/// deterministic for a given config.
#[derive(Debug, Clone)]
pub struct RosterResolver {
    addrs: Vec<Target>,
}

impl RosterResolver {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self {
            addrs: cfg.targets().keys().map(Target::new).collect(),
        }
    }
}

impl TargetResolver for RosterResolver {
    fn resolve(&self, pattern: &str) -> Result<Vec<Target>> {
        // `*` stays inside one namespace level; `**` crosses levels.
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| FanrunError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?
            .compile_matcher();

        let matched: Vec<Target> = self
            .addrs
            .iter()
            .filter(|t| matcher.is_match(t.addr()))
            .cloned()
            .collect();

        if matched.is_empty() {
            return Err(FanrunError::NoMatch(pattern.to_string()));
        }
        Ok(matched)
    }

    fn resolve_all(&self) -> Result<Vec<Target>> {
        Ok(self.addrs.clone())
    }
}
