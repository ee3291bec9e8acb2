// src/config/validate.rs

use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{FanrunError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::FanrunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.default, raw.target))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_addresses(cfg)?;
    validate_env_keys(cfg)?;
    Ok(())
}

fn validate_addresses(cfg: &RawConfigFile) -> Result<()> {
    // Unit kinds are strongly typed and validated during deserialization,
    // so addresses are the only stringly part left to check.
    let well_formed = address_regex();
    for addr in cfg.target.keys() {
        if !well_formed.is_match(addr) {
            return Err(FanrunError::ConfigError(format!(
                "target address '{}' is not a well-formed namespace path (expected e.g. \"/pool/worker1\")",
                addr
            )));
        }
    }
    Ok(())
}

fn validate_env_keys(cfg: &RawConfigFile) -> Result<()> {
    for (addr, entry) in cfg.target.iter() {
        for key in entry.env.keys() {
            if key.is_empty() || key.contains('=') {
                return Err(FanrunError::ConfigError(format!(
                    "target '{}' has unusable env key '{}'",
                    addr, key
                )));
            }
        }
    }
    Ok(())
}

/// An address is one or more `/`-separated non-empty segments with a
/// leading slash, e.g. `/local/alpha`.
fn address_regex() -> Regex {
    // The pattern is a literal; it cannot fail to compile.
    Regex::new(r"^(/[A-Za-z0-9._-]+)+$").unwrap()
}
