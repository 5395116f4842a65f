//! Credential encryption-at-rest using ChaCha20-Poly1305.
//!
//! API keys are sealed under a process-wide 256-bit key with a fresh random
//! 96-bit nonce per call. The stored blob is `b64(nonce):b64(tag):b64(ct)` so
//! that any bit-flip fails closed at the Poly1305 tag check. [`mask`] produces
//! the display form shown in config listings.

pub mod codec;
pub mod error;
pub mod mask;

pub use {
    codec::{SecretCodec, key_from_hex},
    error::VaultError,
    mask::mask,
};
