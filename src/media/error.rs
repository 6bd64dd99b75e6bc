// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the media fetch/verify/decrypt pipeline
//!
//! Each variant pins the failure to one pipeline stage so tests can assert
//! that corrupting a given hash/tag is caught at that stage and not a later
//! one. Failures are scoped to a single media item; the aggregate result of
//! a fan-out carries one entry per item.

use thiserror::Error;

/// Per-item failure in the media pipeline
#[derive(Error, Debug)]
pub enum MediaError {
    /// The CDN download failed (connect error, non-success status, body
    /// read error, or timeout)
    #[error("media download failed for {url}: {reason}")]
    Download {
        url: String,
        reason: String,
    },

    /// SHA-256 of the downloaded blob does not match `encrypted_hash`
    #[error("encrypted blob hash mismatch (transport integrity)")]
    TransportIntegrity,

    /// The truncated HMAC trailer does not authenticate iv || ciphertext
    #[error("media authentication tag mismatch")]
    Authentication,

    /// CBC decryption failed (bad padding or ciphertext not block-aligned)
    #[error("media decryption failed: {0}")]
    Decrypt(String),

    /// SHA-256 of the decrypted plaintext does not match `plaintext_hash`
    #[error("decrypted media hash mismatch (plaintext integrity)")]
    PlaintextIntegrity,

    /// RSA-OAEP unwrap of `encryption_key` or `hmac_key` failed
    #[error("media key unwrap failed: {0}")]
    KeyUnwrap(String),

    /// A descriptor field was missing, not base64, or the wrong length
    #[error("malformed media field '{field}': {reason}")]
    Malformed {
        field: &'static str,
        reason: String,
    },
}
