//! HMAC-SHA256 signatures over an entry's business fields.
//!
//! The signature is independent of chain position: it covers what happened,
//! who did it, from where, and when, but not `chain_id`, `sequence`, or the
//! hashes.  Someone able to rewrite the whole chain consistently still cannot
//! produce valid signatures without the key.
//!
//! Signature input layout (version 1):
//!   1. signature version as 8-byte little-endian
//!   2. id (hyphenated UUID)
//!   3. action
//!   4. performed_by
//!   5. details  (presence byte, then value)
//!   6. origin   (presence byte, then value)
//!   7. occurred_at as RFC 3339 with nanoseconds and `Z`

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use ledger_contracts::{report::SignatureCheck, LedgerEntry, LedgerError, LedgerResult};

use crate::linker::{canonical_timestamp, CanonicalBytes};

type HmacSha256 = Hmac<Sha256>;

/// The only signature payload layout this crate produces or accepts.
pub const SIGNATURE_VERSION: u32 = 1;

/// Shared HMAC secret.  Loaded once at startup, never stored with the ledger.
#[derive(Clone)]
pub struct SignatureKey(Vec<u8>);

impl SignatureKey {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> LedgerResult<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(LedgerError::Signature {
                reason: "signature key must not be empty".to_string(),
            });
        }
        Ok(Self(bytes))
    }

    pub fn from_hex(s: &str) -> LedgerResult<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| LedgerError::Signature {
            reason: format!("signature key is not valid hex: {e}"),
        })?;
        Self::from_bytes(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SignatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureKey([REDACTED; {} bytes])", self.0.len())
    }
}

/// Signs entries and checks their signatures.
#[derive(Clone)]
pub struct EntrySigner {
    mac: HmacSha256,
}

impl EntrySigner {
    pub fn new(key: &SignatureKey) -> LedgerResult<Self> {
        let mac = HmacSha256::new_from_slice(&key.0).map_err(|e| LedgerError::Signature {
            reason: format!("unusable HMAC key: {e}"),
        })?;
        Ok(Self { mac })
    }

    fn payload(entry: &LedgerEntry, version: u32) -> Vec<u8> {
        let mut payload = CanonicalBytes::default();
        payload
            .number(u64::from(version))
            .text(&entry.id.hyphenated().to_string())
            .text(&entry.action)
            .text(&entry.performed_by)
            .optional(entry.details.as_deref())
            .optional(entry.origin.as_deref())
            .text(&canonical_timestamp(&entry.occurred_at));
        payload.into_inner()
    }

    fn compute(&self, entry: &LedgerEntry, version: u32) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(&Self::payload(entry, version));
        mac.finalize().into_bytes().to_vec()
    }

    /// Compute the hex signature for `entry` under the current version.
    pub fn sign(&self, entry: &LedgerEntry) -> String {
        hex::encode(self.compute(entry, SIGNATURE_VERSION))
    }

    /// Fill in `signature` and `signature_version` on `entry`.
    pub fn seal(&self, entry: &mut LedgerEntry) {
        entry.signature = Some(self.sign(entry));
        entry.signature_version = Some(SIGNATURE_VERSION);
    }

    /// Recompute the expected signature and compare in constant time.
    ///
    /// Missing metadata counts as a mismatch.
    pub fn verify(&self, entry: &LedgerEntry) -> SignatureCheck {
        let Some(stored) = entry.signature.as_deref() else {
            return SignatureCheck::mismatch("entry carries no signature");
        };
        let version = match entry.signature_version {
            Some(SIGNATURE_VERSION) => SIGNATURE_VERSION,
            Some(other) => {
                return SignatureCheck::mismatch(format!("unsupported signature version {other}"))
            }
            None => return SignatureCheck::mismatch("entry carries no signature version"),
        };
        let Ok(provided) = hex::decode(stored) else {
            return SignatureCheck::mismatch("stored signature is not valid hex");
        };

        let expected = self.compute(entry, version);
        if bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            SignatureCheck::valid()
        } else {
            SignatureCheck::mismatch("signature does not match entry contents")
        }
    }
}

impl fmt::Debug for EntrySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntrySigner").finish_non_exhaustive()
    }
}
