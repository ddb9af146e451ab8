//! Key material: master secret, per-tenant secrets, derived field keys.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use parking_lot::RwLock;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// The global master secret (256-bit).
///
/// Loaded once from configuration. Combined with a per-district secret to
/// derive field keys; never used to encrypt directly.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct MasterSecret(pub(crate) [u8; 32]);

impl MasterSecret {
    /// Parse from a 64-character hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| CryptoError::InvalidMasterKey(format!("not hex: {e}")))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            CryptoError::InvalidMasterKey(format!("expected 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Generate a random master secret. Development/test use only — derived
    /// keys do not survive a restart.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterSecret(..)")
    }
}

/// A per-district tenant secret.
///
/// Provisioned when the district is created; random, not derived from the
/// district identifier.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct TenantSecret(pub(crate) [u8; 32]);

impl TenantSecret {
    /// Generate a fresh random tenant secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| CryptoError::InvalidMasterKey(format!("not hex: {e}")))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            CryptoError::InvalidMasterKey(format!("expected 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Hex form for persistence in the key store.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for TenantSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TenantSecret(..)")
    }
}

/// A derived 256-bit field key. Zeroized on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub(crate) struct FieldKey(pub(crate) [u8; 32]);

/// Derive the field key for one tenant: HMAC-SHA256(master, tenant secret).
///
/// One-way in both directions: neither secret is recoverable from the key,
/// and the district identifier is deliberately not an input.
pub(crate) fn derive_field_key(master: &MasterSecret, tenant: &TenantSecret) -> FieldKey {
    let mut mac = HmacSha256::new_from_slice(master.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(tenant.as_bytes());
    let digest = mac.finalize().into_bytes();
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    FieldKey(key)
}

/// Registry of per-district tenant secrets.
#[derive(Debug, Default)]
pub struct Keyring {
    secrets: RwLock<HashMap<String, TenantSecret>>,
}

impl Keyring {
    /// Empty keyring.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision (or replace) the secret for a district.
    pub fn provision(&self, district: impl Into<String>, secret: TenantSecret) {
        self.secrets.write().insert(district.into(), secret);
    }

    /// Look up the secret for a district.
    pub fn secret_for(&self, district: &str) -> Result<TenantSecret, CryptoError> {
        self.secrets
            .read()
            .get(district)
            .cloned()
            .ok_or_else(|| CryptoError::UnprovisionedTenant(district.to_string()))
    }

    /// Districts currently provisioned.
    pub fn districts(&self) -> Vec<String> {
        self.secrets.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_from_hex_roundtrip() {
        let hex64 = "ab".repeat(32);
        let master = MasterSecret::from_hex(&hex64).unwrap();
        assert_eq!(master.as_bytes(), &[0xab; 32]);
    }

    #[test]
    fn master_from_hex_rejects_wrong_length() {
        let err = MasterSecret::from_hex("abcd").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidMasterKey(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn master_from_hex_rejects_non_hex() {
        assert!(MasterSecret::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn derivation_is_deterministic() {
        let master = MasterSecret([7u8; 32]);
        let tenant = TenantSecret([9u8; 32]);
        assert_eq!(
            derive_field_key(&master, &tenant).0,
            derive_field_key(&master, &tenant).0
        );
    }

    #[test]
    fn derivation_separates_tenants() {
        let master = MasterSecret([7u8; 32]);
        let a = derive_field_key(&master, &TenantSecret([1u8; 32]));
        let b = derive_field_key(&master, &TenantSecret([2u8; 32]));
        assert_ne!(a.0, b.0);
    }

    #[test]
    fn keyring_unprovisioned_is_configuration_error() {
        let ring = Keyring::new();
        let err = ring.secret_for("D-MISSING").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn keyring_provision_and_lookup() {
        let ring = Keyring::new();
        ring.provision("D1", TenantSecret([3u8; 32]));
        assert!(ring.secret_for("D1").is_ok());
        assert_eq!(ring.districts(), vec!["D1".to_string()]);
    }
}
