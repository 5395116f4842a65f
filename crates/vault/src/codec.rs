//! ChaCha20-Poly1305 codec for API keys at rest.

#[allow(deprecated)] // upstream generic-array 0.x deprecation
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use {
    base64::{Engine, engine::general_purpose::STANDARD},
    rand::RngCore,
    zeroize::Zeroizing,
};

use crate::error::VaultError;

/// Nonce size for ChaCha20-Poly1305 (12 bytes).
const NONCE_LEN: usize = 12;

/// Poly1305 tag size (16 bytes).
const TAG_LEN: usize = 16;

/// Delimiter between the base64 parts of a stored blob.
const PART_SEP: char = ':';

/// Parse a 64-char hex string into the 32-byte codec key.
pub fn key_from_hex(hex: &str) -> Result<[u8; 32], VaultError> {
    let hex = hex.trim();
    if hex.len() != 64 {
        return Err(VaultError::InvalidKey(format!(
            "expected 64 hex chars, got {}",
            hex.len()
        )));
    }
    let mut key = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let text = std::str::from_utf8(chunk)
            .map_err(|_| VaultError::InvalidKey("non-ascii hex".into()))?;
        key[i] = u8::from_str_radix(text, 16)
            .map_err(|_| VaultError::InvalidKey(format!("invalid hex at byte {i}")))?;
    }
    Ok(key)
}

/// Encrypts and decrypts credential strings under one process-wide key.
///
/// Blob layout: `b64(nonce):b64(tag):b64(ciphertext)`. Two encryptions of
/// the same plaintext differ because the nonce is random per call.
#[derive(Clone)]
pub struct SecretCodec {
    key: [u8; 32],
}

impl std::fmt::Debug for SecretCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCodec").finish_non_exhaustive()
    }
}

impl SecretCodec {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn from_hex(hex: &str) -> Result<Self, VaultError> {
        Ok(Self::new(key_from_hex(hex)?))
    }

    /// Seal a plaintext credential into a storage blob.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let cipher = ChaCha20Poly1305::new((&self.key).into());

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        #[allow(deprecated)]
        let nonce = Nonce::from_slice(&nonce_bytes);

        // The aead API appends the tag to the ciphertext; split it back out
        // so the stored blob carries nonce, tag, and ciphertext separately.
        let mut sealed = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| VaultError::CipherError(e.to_string()))?;
        let tag = sealed.split_off(sealed.len() - TAG_LEN);

        Ok(format!(
            "{}{PART_SEP}{}{PART_SEP}{}",
            STANDARD.encode(nonce_bytes),
            STANDARD.encode(tag),
            STANDARD.encode(sealed),
        ))
    }

    /// Open a storage blob back into the plaintext credential.
    ///
    /// Fails with [`VaultError::MalformedSecret`] when the blob does not
    /// split into three parts, and [`VaultError::AuthenticationFailed`] when
    /// the tag check fails. No partial plaintext is ever returned.
    pub fn decrypt(&self, blob: &str) -> Result<String, VaultError> {
        let mut parts = blob.split(PART_SEP);
        let (Some(nonce_b64), Some(tag_b64), Some(ct_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(VaultError::MalformedSecret);
        };
        if nonce_b64.is_empty() || tag_b64.is_empty() {
            return Err(VaultError::MalformedSecret);
        }

        let nonce_bytes = STANDARD.decode(nonce_b64)?;
        let tag = STANDARD.decode(tag_b64)?;
        let ct = STANDARD.decode(ct_b64)?;
        if nonce_bytes.len() != NONCE_LEN || tag.len() != TAG_LEN {
            return Err(VaultError::MalformedSecret);
        }

        #[allow(deprecated)]
        let nonce = Nonce::from_slice(&nonce_bytes);
        let cipher = ChaCha20Poly1305::new((&self.key).into());

        let mut sealed = ct;
        sealed.extend_from_slice(&tag);

        let plaintext = Zeroizing::new(
            cipher
                .decrypt(nonce, sealed.as_slice())
                .map_err(|_| VaultError::AuthenticationFailed)?,
        );
        std::str::from_utf8(&plaintext)
            .map(ToOwned::to_owned)
            .map_err(|_| VaultError::NotUtf8)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> SecretCodec {
        SecretCodec::new([0x42u8; 32])
    }

    #[test]
    fn round_trip() {
        let c = codec();
        let blob = c.encrypt("sk-test-1234").unwrap();
        assert_eq!(c.decrypt(&blob).unwrap(), "sk-test-1234");
    }

    #[test]
    fn blob_has_three_base64_parts() {
        let blob = codec().encrypt("secret").unwrap();
        let parts: Vec<&str> = blob.split(':').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| STANDARD.decode(p).is_ok()));
    }

    #[test]
    fn same_plaintext_produces_different_blobs() {
        let c = codec();
        let a = c.encrypt("same input").unwrap();
        let b = c.encrypt("same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails_closed() {
        let blob = codec().encrypt("secret").unwrap();
        let other = SecretCodec::new([0x43u8; 32]);
        assert!(matches!(
            other.decrypt(&blob),
            Err(VaultError::AuthenticationFailed)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_closed() {
        let c = codec();
        let blob = c.encrypt("secret").unwrap();
        // Flip one base64 character of the ciphertext part.
        let mut chars: Vec<char> = blob.chars().collect();
        let last = chars.len() - 2;
        chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();
        let result = c.decrypt(&tampered);
        assert!(matches!(
            result,
            Err(VaultError::AuthenticationFailed) | Err(VaultError::Base64(_))
        ));
    }

    #[test]
    fn missing_parts_are_malformed() {
        let c = codec();
        for blob in ["", "abc", "abc:def", "::", "a:b:c:d"] {
            let result = c.decrypt(blob);
            assert!(
                matches!(
                    result,
                    Err(VaultError::MalformedSecret) | Err(VaultError::Base64(_))
                ),
                "blob {blob:?} should not decrypt"
            );
        }
    }

    #[test]
    fn empty_plaintext_round_trip() {
        let c = codec();
        let blob = c.encrypt("").unwrap();
        assert_eq!(c.decrypt(&blob).unwrap(), "");
    }

    #[test]
    fn key_from_hex_parses() {
        let key = key_from_hex(&"ab".repeat(32)).unwrap();
        assert_eq!(key, [0xabu8; 32]);
    }

    #[test]
    fn key_from_hex_rejects_bad_input() {
        assert!(key_from_hex("deadbeef").is_err());
        assert!(key_from_hex(&"zz".repeat(32)).is_err());
    }
}
