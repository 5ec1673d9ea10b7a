//! Ledger configuration schema and loading.
//!
//! A `LedgerConfig` is deserialized from TOML.  Only `[ledger]` is required;
//! `[signature]` turns on HMAC mode, `[retention]` enables the purge
//! operation, and `[risk]` overrides the report thresholds.
//!
//! ```toml
//! [ledger]
//! hash_algorithm = "sha-256"
//! data_dir = "./ledger-data"
//! default_chain = "main"
//!
//! [signature]
//! secret_env = "LEDGER_HMAC_SECRET"
//!
//! [retention]
//! days = 365
//!
//! [risk]
//! high_above = 5
//! medium_above = 2
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ledger_contracts::{ChainId, LedgerError, LedgerResult};
use ledger_core::SignatureKey;
use ledger_verify::RiskThresholds;

/// The only hash algorithm the ledger implements.
pub const SHA_256: &str = "sha-256";

/// Shortest secret accepted from the environment.
pub const MIN_SECRET_BYTES: usize = 16;

/// Longest retention period accepted, in days (100 years).
pub const MAX_RETENTION_DAYS: u32 = 36_500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerSection {
    /// Must be `"sha-256"`.
    #[serde(default = "default_hash_algorithm")]
    pub hash_algorithm: String,

    /// Directory for the JSON-lines store.
    pub data_dir: PathBuf,

    /// Chain used when a command does not name one.
    #[serde(default = "default_chain")]
    pub default_chain: String,
}

/// Where the HMAC secret comes from.  The secret itself never appears in the
/// config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignatureSection {
    /// Environment variable holding the secret (hex, or raw bytes).
    pub secret_env: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionSection {
    /// Entries older than this many days may be purged.
    pub days: u32,
}

/// The top-level structure deserialized from a TOML config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    pub ledger: LedgerSection,
    pub signature: Option<SignatureSection>,
    pub retention: Option<RetentionSection>,
    #[serde(default)]
    pub risk: RiskThresholds,
}

fn default_hash_algorithm() -> String {
    SHA_256.to_string()
}

fn default_chain() -> String {
    "main".to_string()
}

impl LedgerConfig {
    /// A config with only the required section filled in.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            ledger: LedgerSection {
                hash_algorithm: default_hash_algorithm(),
                data_dir: data_dir.into(),
                default_chain: default_chain(),
            },
            signature: None,
            retention: None,
            risk: RiskThresholds::default(),
        }
    }

    /// Parse `s` as TOML and validate it.
    ///
    /// Returns `LedgerError::Config` if the TOML is malformed, does not match
    /// the schema, or fails validation.
    pub fn from_toml_str(s: &str) -> LedgerResult<Self> {
        let config: LedgerConfig = toml::from_str(s).map_err(|e| LedgerError::Config {
            reason: format!("failed to parse ledger TOML: {}", e),
        })?;
        config.validate()?;
        debug!(data_dir = %config.ledger.data_dir.display(), "ledger config parsed");
        Ok(config)
    }

    /// Read the file at `path` and parse it as ledger configuration.
    pub fn from_file(path: &Path) -> LedgerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| LedgerError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        let config = Self::from_toml_str(&contents)?;
        info!(path = %path.display(), "loaded ledger config");
        Ok(config)
    }

    fn validate(&self) -> LedgerResult<()> {
        if !self.ledger.hash_algorithm.eq_ignore_ascii_case(SHA_256) {
            return Err(LedgerError::Config {
                reason: format!(
                    "unsupported hash_algorithm '{}': only '{}' is implemented",
                    self.ledger.hash_algorithm, SHA_256
                ),
            });
        }

        ChainId::new(self.ledger.default_chain.clone()).map_err(|e| LedgerError::Config {
            reason: format!("invalid default_chain: {e}"),
        })?;

        if let Some(sig) = &self.signature {
            if sig.secret_env.trim().is_empty() {
                return Err(LedgerError::Config {
                    reason: "signature.secret_env must name an environment variable".to_string(),
                });
            }
        }

        if let Some(retention) = &self.retention {
            if retention.days == 0 {
                return Err(LedgerError::Config {
                    reason: "retention.days must be at least 1".to_string(),
                });
            }
            if retention.days > MAX_RETENTION_DAYS {
                return Err(LedgerError::Config {
                    reason: format!(
                        "retention.days ({}) must not exceed {}",
                        retention.days, MAX_RETENTION_DAYS
                    ),
                });
            }
        }

        if self.risk.medium_above >= self.risk.high_above {
            return Err(LedgerError::Config {
                reason: format!(
                    "risk.medium_above ({}) must be below risk.high_above ({})",
                    self.risk.medium_above, self.risk.high_above
                ),
            });
        }

        Ok(())
    }

    /// The validated default chain.
    pub fn default_chain(&self) -> LedgerResult<ChainId> {
        ChainId::new(self.ledger.default_chain.clone())
    }

    pub fn retention_days(&self) -> Option<u32> {
        self.retention.as_ref().map(|r| r.days)
    }

    /// Resolve the HMAC key from the environment.
    ///
    /// `Ok(None)` when signature mode is not configured.  Call once at
    /// startup; the key is then passed down explicitly.
    pub fn resolve_signature_key(&self) -> LedgerResult<Option<SignatureKey>> {
        self.resolve_signature_key_with(|name| std::env::var(name).ok())
    }

    /// Like [`resolve_signature_key`](Self::resolve_signature_key), reading
    /// variables through `lookup`.
    pub fn resolve_signature_key_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> LedgerResult<Option<SignatureKey>> {
        let Some(sig) = &self.signature else {
            return Ok(None);
        };

        let raw = lookup(&sig.secret_env).ok_or_else(|| LedgerError::Config {
            reason: format!(
                "signature mode is configured but environment variable '{}' is not set",
                sig.secret_env
            ),
        })?;
        let raw = raw.trim();

        let bytes = match hex::decode(raw) {
            Ok(decoded) if decoded.len() >= MIN_SECRET_BYTES => decoded,
            _ => raw.as_bytes().to_vec(),
        };
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(LedgerError::Config {
                reason: format!(
                    "secret in '{}' is too short: need at least {} bytes",
                    sig.secret_env, MIN_SECRET_BYTES
                ),
            });
        }

        info!(secret_env = %sig.secret_env, key_bytes = bytes.len(), "signature mode enabled");
        SignatureKey::from_bytes(bytes).map(Some)
    }
}
