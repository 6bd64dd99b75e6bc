// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! RSA Key Unwrapping (hybrid encryption, asymmetric half)
//!
//! The platform wraps the per-request AES key under our RSA public key using
//! OAEP padding (SHA-256 digest, MGF1-SHA256, empty label). This module owns
//! the matching private key for the lifetime of the process and exposes the
//! single unwrap operation.
//!
//! ## Security Considerations
//!
//! - The private key is loaded once at startup, from `FLOW_PRIVATE_KEY_FILE`
//!   (a path to a PEM file) or `FLOW_PRIVATE_KEY` (inline PEM text)
//! - A key that fails to parse is fatal at startup, never per-request
//! - The key is NEVER logged, serialized, or exposed through `Debug`
//! - Wrapped input must be exactly the modulus length; anything else is
//!   rejected before the OAEP operation runs

use anyhow::{anyhow, Context, Result};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey};
use sha2::Sha256;
use std::env;
use std::fmt;
use tracing::info;

use super::error::FlowCryptoError;

/// Process-lifetime holder of the RSA private key used to unwrap symmetric
/// keys from inbound envelopes and media descriptors
pub struct KeyUnwrapper {
    private_key: RsaPrivateKey,
}

// Deliberately opaque: the key must never leak through debug logging
impl fmt::Debug for KeyUnwrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyUnwrapper")
            .field("modulus_bytes", &self.private_key.size())
            .finish_non_exhaustive()
    }
}

impl KeyUnwrapper {
    /// Parse a PEM-encoded RSA private key (PKCS#8 or PKCS#1)
    pub fn from_pem(pem: &str) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| anyhow!("failed to parse RSA private key PEM: {}", e))?;

        Ok(Self { private_key })
    }

    /// Build directly from an already-parsed key (used by tests)
    pub fn from_key(private_key: RsaPrivateKey) -> Self {
        Self { private_key }
    }

    /// Load the private key from the process environment
    ///
    /// Reads `FLOW_PRIVATE_KEY_FILE` (path to PEM) first, falling back to
    /// `FLOW_PRIVATE_KEY` (inline PEM). Only the modulus size is logged,
    /// never any key bytes.
    ///
    /// # Errors
    ///
    /// Fails when neither variable is set, the file cannot be read, or the
    /// PEM does not parse. Callers treat this as fatal at startup.
    pub fn load_from_env() -> Result<Self> {
        let pem = if let Ok(path) = env::var("FLOW_PRIVATE_KEY_FILE") {
            std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read private key file {}", path))?
        } else {
            env::var("FLOW_PRIVATE_KEY").map_err(|_| {
                anyhow!("neither FLOW_PRIVATE_KEY_FILE nor FLOW_PRIVATE_KEY is set")
            })?
        };

        let unwrapper = Self::from_pem(&pem)?;
        info!(
            "✅ RSA private key loaded ({}-bit modulus)",
            unwrapper.modulus_size() * 8
        );
        Ok(unwrapper)
    }

    /// Modulus length in bytes; every wrapped key must decode to exactly
    /// this many bytes
    pub fn modulus_size(&self) -> usize {
        self.private_key.size()
    }

    /// Unwrap an RSA-OAEP wrapped symmetric key
    ///
    /// # Arguments
    ///
    /// * `wrapped` - raw wrapped-key bytes (already base64-decoded)
    ///
    /// # Returns
    ///
    /// The raw symmetric key: 16 bytes (AES-128) or 32 bytes (AES-256)
    ///
    /// # Errors
    ///
    /// - `EnvelopeMalformed` when the input is not modulus-length
    /// - `KeyUnwrapFailed` when OAEP decryption fails or the unwrapped key
    ///   has an unusable length
    pub fn unwrap_key(&self, wrapped: &[u8]) -> Result<Vec<u8>, FlowCryptoError> {
        // 1. Length gate before touching the private key
        let expected = self.modulus_size();
        if wrapped.len() != expected {
            return Err(FlowCryptoError::EnvelopeMalformed {
                field: "encrypted_aes_key",
                reason: format!(
                    "wrapped key is {} bytes, expected {} (RSA modulus length)",
                    wrapped.len(),
                    expected
                ),
            });
        }

        // 2. OAEP with SHA-256 for both the digest and MGF1, empty label
        let padding = Oaep::new::<Sha256>();
        let key = self
            .private_key
            .decrypt(padding, wrapped)
            .map_err(|e| FlowCryptoError::KeyUnwrapFailed(e.to_string()))?;

        // 3. Only AES-128 and AES-256 key sizes are usable downstream
        if key.len() != 16 && key.len() != 32 {
            return Err(FlowCryptoError::KeyUnwrapFailed(format!(
                "unwrapped key is {} bytes, expected 16 or 32",
                key.len()
            )));
        }

        Ok(key)
    }
}
