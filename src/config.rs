//! Key-lifecycle configuration.
//!
//! Loaded from JSON; every field has a default so an empty object `{}` is a
//! valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DualVaultError, Result};

/// Default key-pair validity window in days.
pub const DEFAULT_VALIDITY_DAYS: u32 = 365;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct DualVaultConfig {
    /// Validity window applied when a key pair is generated without an
    /// explicit one, or imported without its window.
    pub default_validity_days: u32,
    /// Prefix of generated key ids (`{prefix}-{uuid}`).
    pub key_id_prefix: String,
}

impl Default for DualVaultConfig {
    fn default() -> Self {
        Self {
            default_validity_days: DEFAULT_VALIDITY_DAYS,
            key_id_prefix: "kyber".to_string(),
        }
    }
}

impl DualVaultConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| DualVaultError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DualVaultError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_validity_days == 0 {
            return Err(DualVaultError::Config(
                "defaultValidityDays must be positive".into(),
            ));
        }
        if self.key_id_prefix.is_empty() || self.key_id_prefix.contains(':') {
            return Err(DualVaultError::Config(
                "keyIdPrefix must be non-empty and must not contain ':'".into(),
            ));
        }
        Ok(())
    }
}
