//! Crypto error taxonomy.
//!
//! Configuration failures (key material) are separated from per-record
//! decryption failures because they demand opposite handling: the former
//! must abort startup, the latter must never abort anything.

use thiserror::Error;

/// Errors from tenant-scoped field encryption.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The global master secret is absent or not a 64-character hex string.
    /// Fatal configuration error; the service must not start without it.
    #[error("invalid master key material: {0}")]
    InvalidMasterKey(String),

    /// No per-tenant secret has been provisioned for this district.
    /// Fatal configuration error for any operation touching that tenant.
    #[error("no tenant secret provisioned for district {0}")]
    UnprovisionedTenant(String),

    /// The blob is not valid base64 or is too short for either wire format.
    /// Per-record failure.
    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// Authentication failed on the primary format and the legacy fallback
    /// did not yield valid UTF-8. Wrong tenant, tampering, or corruption.
    /// Per-record failure; callers report the field as unavailable.
    #[error("decryption failed")]
    DecryptFailed,

    /// AEAD encryption itself failed. Not expected in practice.
    #[error("encryption failed: {0}")]
    EncryptFailed(String),
}

impl CryptoError {
    /// Whether this error is a fatal configuration problem rather than a
    /// per-record failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidMasterKey(_) | Self::UnprovisionedTenant(_)
        )
    }
}
