//! The field cipher: encrypt/decrypt one personal-data field for one tenant.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;

use crate::error::CryptoError;
use crate::keys::{derive_field_key, FieldKey, MasterSecret, TenantSecret};

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

/// AES-GCM nonce length (96 bits).
const NONCE_LEN: usize = 12;
/// AES-GCM authentication tag length (128 bits).
const TAG_LEN: usize = 16;
/// Legacy format IV length.
const LEGACY_IV_LEN: usize = 16;

/// Tenant-scoped authenticated field encryption.
///
/// Holds only the master secret; per-call tenant secrets come from the
/// caller (normally via [`crate::Keyring`]), so the cipher itself is
/// stateless across tenants.
pub struct FieldCipher {
    master: MasterSecret,
}

impl FieldCipher {
    /// Build a cipher around the configured master secret.
    pub fn new(master: MasterSecret) -> Self {
        Self { master }
    }

    /// Encrypt a field for the given district.
    ///
    /// Output is base64 of `nonce(12) ‖ tag(16) ‖ ciphertext`. The district
    /// identifier is bound in as associated data, so even two districts that
    /// were misprovisioned with the same secret cannot read each other's
    /// fields.
    pub fn encrypt(
        &self,
        plaintext: &str,
        district: &str,
        tenant: &TenantSecret,
    ) -> Result<String, CryptoError> {
        let key = derive_field_key(&self.master, tenant);
        let cipher = Aes256Gcm::new((&key.0).into());

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: district.as_bytes(),
                },
            )
            .map_err(|e| CryptoError::EncryptFailed(e.to_string()))?;

        // aes-gcm appends the tag; the wire layout wants nonce ‖ tag ‖ ct.
        let (ct, tag) = sealed.split_at(sealed.len() - TAG_LEN);
        let mut blob = Vec::with_capacity(NONCE_LEN + TAG_LEN + ct.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(tag);
        blob.extend_from_slice(ct);
        Ok(BASE64.encode(blob))
    }

    /// Decrypt a field for the given district.
    ///
    /// Attempts the authenticated format first, then the legacy
    /// non-authenticated format for records predating AEAD adoption.
    pub fn decrypt(
        &self,
        blob: &str,
        district: &str,
        tenant: &TenantSecret,
    ) -> Result<String, CryptoError> {
        let bytes = BASE64
            .decode(blob.trim())
            .map_err(|e| CryptoError::MalformedCiphertext(format!("not base64: {e}")))?;

        let key = derive_field_key(&self.master, tenant);

        if bytes.len() >= NONCE_LEN + TAG_LEN {
            if let Ok(plain) = self.decrypt_primary(&bytes, district, &key) {
                return Ok(plain);
            }
        }
        if bytes.len() >= LEGACY_IV_LEN {
            if let Ok(plain) = decrypt_legacy(&bytes, &key) {
                return Ok(plain);
            }
        }
        if bytes.len() < LEGACY_IV_LEN {
            return Err(CryptoError::MalformedCiphertext(format!(
                "blob too short for any format: {} bytes",
                bytes.len()
            )));
        }
        Err(CryptoError::DecryptFailed)
    }

    fn decrypt_primary(
        &self,
        bytes: &[u8],
        district: &str,
        key: &FieldKey,
    ) -> Result<String, CryptoError> {
        let cipher = Aes256Gcm::new((&key.0).into());
        let nonce = Nonce::from_slice(&bytes[..NONCE_LEN]);
        let tag = &bytes[NONCE_LEN..NONCE_LEN + TAG_LEN];
        let ct = &bytes[NONCE_LEN + TAG_LEN..];

        // Reassemble into the ct ‖ tag layout aes-gcm expects.
        let mut sealed = Vec::with_capacity(ct.len() + TAG_LEN);
        sealed.extend_from_slice(ct);
        sealed.extend_from_slice(tag);

        let plain = cipher
            .decrypt(
                nonce,
                Payload {
                    msg: &sealed,
                    aad: district.as_bytes(),
                },
            )
            .map_err(|_| CryptoError::DecryptFailed)?;
        String::from_utf8(plain).map_err(|_| CryptoError::DecryptFailed)
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FieldCipher(..)")
    }
}

/// Decrypt the legacy `iv(16) ‖ ciphertext` AES-256-CTR format.
///
/// No authentication tag exists, so a wrong key yields keystream garbage;
/// the UTF-8 check is the only (best-effort) integrity signal.
fn decrypt_legacy(bytes: &[u8], key: &FieldKey) -> Result<String, CryptoError> {
    let (iv, ct) = bytes.split_at(LEGACY_IV_LEN);
    let mut cipher = Aes256Ctr::new((&key.0).into(), iv.into());
    let mut plain = ct.to_vec();
    cipher.apply_keystream(&mut plain);
    String::from_utf8(plain).map_err(|_| CryptoError::DecryptFailed)
}

/// Encrypt in the legacy format. Test-only: exists so the fallback path can
/// be exercised against genuine legacy blobs.
#[cfg(test)]
fn encrypt_legacy(plaintext: &str, key: &FieldKey) -> String {
    let mut iv = [0u8; LEGACY_IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    let mut ct = plaintext.as_bytes().to_vec();
    let mut cipher = Aes256Ctr::new((&key.0).into(), (&iv).into());
    cipher.apply_keystream(&mut ct);
    let mut blob = Vec::with_capacity(LEGACY_IV_LEN + ct.len());
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ct);
    BASE64.encode(blob)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> FieldCipher {
        FieldCipher::new(MasterSecret::generate())
    }

    #[test]
    fn roundtrip_same_tenant() {
        let c = cipher();
        let tenant = TenantSecret::generate();
        let blob = c.encrypt("Maria Okafor", "D1", &tenant).unwrap();
        assert_eq!(c.decrypt(&blob, "D1", &tenant).unwrap(), "Maria Okafor");
    }

    #[test]
    fn roundtrip_empty_and_unicode() {
        let c = cipher();
        let tenant = TenantSecret::generate();
        for s in ["", "ß∂ƒ© 名前", "line\nbreak"] {
            let blob = c.encrypt(s, "D1", &tenant).unwrap();
            assert_eq!(c.decrypt(&blob, "D1", &tenant).unwrap(), s);
        }
    }

    #[test]
    fn cross_tenant_decrypt_fails() {
        let c = cipher();
        let t1 = TenantSecret::generate();
        let t2 = TenantSecret::generate();
        let blob = c.encrypt("confidential", "D1", &t1).unwrap();
        let err = c.decrypt(&blob, "D2", &t2).unwrap_err();
        assert!(matches!(err, CryptoError::DecryptFailed));
        assert!(!err.is_configuration());
    }

    #[test]
    fn same_secret_different_district_fails() {
        // District is bound as associated data even when secrets collide.
        let c = cipher();
        let tenant = TenantSecret([5u8; 32]);
        let blob = c.encrypt("confidential", "D1", &tenant).unwrap();
        assert!(c.decrypt(&blob, "D2", &tenant).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let c = cipher();
        let tenant = TenantSecret::generate();
        let blob = c.encrypt("confidential", "D1", &tenant).unwrap();
        let mut bytes = BASE64.decode(&blob).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let tampered = BASE64.encode(bytes);
        assert!(c.decrypt(&tampered, "D1", &tenant).is_err());
    }

    #[test]
    fn not_base64_is_malformed() {
        let c = cipher();
        let tenant = TenantSecret::generate();
        let err = c.decrypt("%%% not base64 %%%", "D1", &tenant).unwrap_err();
        assert!(matches!(err, CryptoError::MalformedCiphertext(_)));
    }

    #[test]
    fn too_short_is_malformed() {
        let c = cipher();
        let tenant = TenantSecret::generate();
        let err = c
            .decrypt(&BASE64.encode([0u8; 4]), "D1", &tenant)
            .unwrap_err();
        assert!(matches!(err, CryptoError::MalformedCiphertext(_)));
    }

    #[test]
    fn legacy_format_decrypts_via_fallback() {
        let master = MasterSecret::generate();
        let tenant = TenantSecret::generate();
        let key = derive_field_key(&master, &tenant);
        let blob = encrypt_legacy("pre-AEAD record", &key);

        let c = FieldCipher::new(master);
        assert_eq!(c.decrypt(&blob, "D1", &tenant).unwrap(), "pre-AEAD record");
    }

    #[test]
    fn legacy_wrong_tenant_usually_fails() {
        // Without a tag the only signal is UTF-8 validity; use a plaintext
        // long enough that random keystream output is virtually never valid.
        let master = MasterSecret::generate();
        let key = derive_field_key(&master, &TenantSecret::generate());
        let blob = encrypt_legacy(&"legacy-field-".repeat(16), &key);

        let c = FieldCipher::new(master);
        assert!(c
            .decrypt(&blob, "D1", &TenantSecret::generate())
            .is_err());
    }

    #[test]
    fn nonce_is_random_per_encryption() {
        let c = cipher();
        let tenant = TenantSecret::generate();
        let a = c.encrypt("same plaintext", "D1", &tenant).unwrap();
        let b = c.encrypt("same plaintext", "D1", &tenant).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn primary_layout_is_nonce_tag_ciphertext() {
        let c = cipher();
        let tenant = TenantSecret::generate();
        let blob = c.encrypt("abc", "D1", &tenant).unwrap();
        let bytes = BASE64.decode(blob).unwrap();
        assert_eq!(bytes.len(), NONCE_LEN + TAG_LEN + 3);
    }
}
