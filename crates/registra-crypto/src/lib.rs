//! # registra-crypto — Tenant-Scoped Field Encryption
//!
//! Every personal-data column in the registry is ciphertext at rest,
//! encrypted under a key derived from the owning district. This crate
//! provides that primitive and nothing else.
//!
//! ## Key Derivation
//!
//! A per-district secret is combined with the global master secret via
//! HMAC-SHA256 to a 256-bit field key. The district identifier alone is
//! never used as key material; it participates only as associated data so
//! ciphertext is bound to its tenant.
//!
//! ## Wire Formats
//!
//! - Primary: AES-256-GCM, `nonce(12) ‖ tag(16) ‖ ciphertext`, base64.
//! - Legacy (decrypt only): AES-256-CTR, `iv(16) ‖ ciphertext`, base64,
//!   accepted for records written before authenticated encryption was
//!   adopted. The authenticated path is always attempted first.
//!
//! ## Failure Policy
//!
//! Missing or malformed key material is a fatal configuration error.
//! A ciphertext that fails both formats (malformed, tampered, or encrypted
//! for a different tenant) is a per-record [`CryptoError::DecryptFailed`];
//! callers surface it as "field unavailable" and never abort a batch on it.

pub mod error;
pub mod field;
pub mod keys;

pub use error::CryptoError;
pub use field::FieldCipher;
pub use keys::{Keyring, MasterSecret, TenantSecret};
