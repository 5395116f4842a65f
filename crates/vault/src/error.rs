//! Vault error types.

/// Errors produced by credential codec operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// The stored blob does not have the `nonce:tag:ciphertext` shape.
    #[error("malformed secret blob")]
    MalformedSecret,

    /// The Poly1305 tag check failed — tampered data or wrong key.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The configured encryption key is not 32 hex-decoded bytes.
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    /// Encryption failed inside the cipher.
    #[error("cipher error: {0}")]
    CipherError(String),

    /// Base64 decoding failed.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decrypted bytes are not valid UTF-8.
    #[error("decrypted secret is not valid utf-8")]
    NotUtf8,
}
