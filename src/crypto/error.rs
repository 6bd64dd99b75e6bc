// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the Flow exchange crypto pipeline
//!
//! Every failure on the request/response path maps to one of these variants:
//! - **SignatureInvalid**: HMAC check over the raw body rejected the request
//! - **EnvelopeMalformed**: a wire field was missing, non-string, empty, or
//!   the wrong length after base64 decoding
//! - **KeyUnwrapFailed**: RSA-OAEP unwrap of the symmetric key failed
//! - **PayloadDecryptFailed**: AEAD authentication tag mismatch
//! - **PayloadEncryptFailed**: response encryption failed
//!
//! Unwrap and decrypt failures stay distinct for diagnostics, but callers
//! treat both as a plain rejection. Messages never carry key material or
//! plaintext.

use thiserror::Error;

/// Errors produced while authenticating, decrypting, or re-encrypting a
/// Flow data-exchange request
#[derive(Error, Debug)]
pub enum FlowCryptoError {
    /// The `X-Hub-Signature-256` header was missing, malformed, or did not
    /// match the HMAC of the raw request body
    #[error("request signature verification failed")]
    SignatureInvalid,

    /// A wire field failed validation before any decryption was attempted
    #[error("malformed envelope field '{field}': {reason}")]
    EnvelopeMalformed {
        /// Which envelope field failed validation
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// RSA-OAEP decryption of the wrapped symmetric key failed
    #[error("symmetric key unwrap failed: {0}")]
    KeyUnwrapFailed(String),

    /// AES-GCM rejected the payload (wrong key, tampered ciphertext, or
    /// tag mismatch) - no partial plaintext is ever returned
    #[error("payload decryption failed: authentication tag mismatch")]
    PayloadDecryptFailed,

    /// Encrypting the composed response failed
    #[error("payload encryption failed: {0}")]
    PayloadEncryptFailed(String),
}
