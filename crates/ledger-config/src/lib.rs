//! # ledger-config
//!
//! TOML configuration for the audit ledger.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use ledger_config::LedgerConfig;
//!
//! let config = LedgerConfig::from_file(Path::new("ledger.toml"))?;
//! let key = config.resolve_signature_key()?;
//! ```

pub mod config;

pub use config::{
    LedgerConfig, LedgerSection, RetentionSection, SignatureSection, MAX_RETENTION_DAYS, SHA_256,
};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use ledger_contracts::LedgerError;

    use crate::LedgerConfig;

    fn config_error(toml: &str) -> String {
        match LedgerConfig::from_toml_str(toml).unwrap_err() {
            LedgerError::Config { reason } => reason,
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    // ── 1. minimal config ─────────────────────────────────────────────────────

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = LedgerConfig::from_toml_str(
            r#"
            [ledger]
            data_dir = "/var/lib/ledger"
        "#,
        )
        .unwrap();

        assert_eq!(config.ledger.hash_algorithm, "sha-256");
        assert_eq!(config.default_chain().unwrap().as_str(), "main");
        assert!(config.signature.is_none());
        assert_eq!(config.retention_days(), None);
        assert_eq!(config.risk.high_above, 5);
        assert_eq!(config.risk.medium_above, 2);
        assert!(config.resolve_signature_key().unwrap().is_none());
    }

    // ── 2. full config ────────────────────────────────────────────────────────

    #[test]
    fn test_full_config() {
        let config = LedgerConfig::from_toml_str(
            r#"
            [ledger]
            hash_algorithm = "SHA-256"
            data_dir = "./data"
            default_chain = "auth-events"

            [signature]
            secret_env = "TEST_LEDGER_SECRET"

            [retention]
            days = 90

            [risk]
            high_above = 10
            medium_above = 4
        "#,
        )
        .unwrap();

        assert_eq!(config.default_chain().unwrap().as_str(), "auth-events");
        assert_eq!(config.retention_days(), Some(90));
        assert_eq!(config.risk.high_above, 10);
    }

    // ── 3. rejected configs ───────────────────────────────────────────────────

    #[test]
    fn test_malformed_toml() {
        assert!(config_error("[ledger").contains("failed to parse"));
    }

    #[test]
    fn test_unknown_hash_algorithm() {
        let reason = config_error(
            r#"
            [ledger]
            data_dir = "d"
            hash_algorithm = "md5"
        "#,
        );
        assert!(reason.contains("md5"), "{reason}");
    }

    #[test]
    fn test_inverted_thresholds() {
        let reason = config_error(
            r#"
            [ledger]
            data_dir = "d"
            [risk]
            high_above = 2
            medium_above = 5
        "#,
        );
        assert!(reason.contains("medium_above"), "{reason}");
    }

    #[test]
    fn test_zero_retention() {
        let reason = config_error(
            r#"
            [ledger]
            data_dir = "d"
            [retention]
            days = 0
        "#,
        );
        assert!(reason.contains("retention.days"), "{reason}");
    }

    #[test]
    fn test_retention_beyond_maximum() {
        let reason = config_error(
            r#"
            [ledger]
            data_dir = "d"
            [retention]
            days = 4000000000
        "#,
        );
        assert!(reason.contains("must not exceed"), "{reason}");
    }

    #[test]
    fn test_bad_default_chain() {
        let reason = config_error(
            r#"
            [ledger]
            data_dir = "d"
            default_chain = "../escape"
        "#,
        );
        assert!(reason.contains("default_chain"), "{reason}");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let reason = config_error(
            r#"
            [ledger]
            data_dir = "d"
            secret = "inline secrets are not allowed"
        "#,
        );
        assert!(reason.contains("secret"), "{reason}");
    }

    // ── 4. secret resolution ──────────────────────────────────────────────────

    fn signed_config() -> LedgerConfig {
        LedgerConfig::from_toml_str(
            r#"
            [ledger]
            data_dir = "d"
            [signature]
            secret_env = "LEDGER_SECRET"
        "#,
        )
        .unwrap()
    }

    #[test]
    fn test_secret_from_hex() {
        let key = signed_config()
            .resolve_signature_key_with(|_| Some("00112233445566778899aabbccddeeff".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(key.len(), 16);
    }

    #[test]
    fn test_secret_from_raw_text() {
        let key = signed_config()
            .resolve_signature_key_with(|_| Some("correct horse battery staple".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(key.len(), "correct horse battery staple".len());
    }

    #[test]
    fn test_missing_or_short_secret() {
        let config = signed_config();
        let missing = config.resolve_signature_key_with(|_| None).unwrap_err();
        assert!(missing.to_string().contains("LEDGER_SECRET"));

        let short = config
            .resolve_signature_key_with(|_| Some("tiny".to_string()))
            .unwrap_err();
        assert!(short.to_string().contains("too short"));
    }
}
