// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Payload Codec for Flow Data Exchange
//!
//! AEAD encrypt/decrypt of the JSON envelope under the per-request symmetric
//! key unwrapped from the envelope's `encrypted_aes_key` field.
//!
//! **Wire format** (both directions):
//! ```text
//! [ciphertext (variable) | authentication tag (16 bytes)]
//! ```
//!
//! - Algorithm: AES-128-GCM or AES-256-GCM, selected by key length
//! - Nonce: the envelope's `initial_vector` bytes used as-is (12 or 16 bytes)
//! - Tag: 128-bit, appended to the ciphertext (standard AEAD framing, never
//!   carried as a separate field)
//! - No Additional Authenticated Data
//!
//! The response travels under the SAME key but with every nonce byte
//! inverted ([`flip_nonce`]); the inversion is the only mechanism that keeps
//! the response nonce distinct from the request nonce, so it must be
//! bit-exact. The encrypted response is the bare base64 string - the HTTP
//! response body is exactly that string with no JSON wrapper.

use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::aes::{Aes128, Aes256};
use aes_gcm::AesGcm;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::fmt;

use super::error::FlowCryptoError;

/// GCM authentication tag length in bytes
pub const TAG_LEN: usize = 16;

type Aes128GcmIv12 = AesGcm<Aes128, U12>;
type Aes128GcmIv16 = AesGcm<Aes128, U16>;
type Aes256GcmIv12 = AesGcm<Aes256, U12>;
type Aes256GcmIv16 = AesGcm<Aes256, U16>;

/// Derive the response nonce from the request nonce by inverting every byte
///
/// Involution: `flip_nonce(&flip_nonce(x)) == x`. The round trip of the
/// whole exchange depends on this being exact, byte for byte.
pub fn flip_nonce(nonce: &[u8]) -> Vec<u8> {
    nonce.iter().map(|b| b ^ 0xFF).collect()
}

/// Short-lived holder of the unwrapped AES key and the request nonce
///
/// Owned by the request handler and passed explicitly between the decrypt
/// and encrypt halves of one exchange; dropped when the exchange ends. This
/// is deliberately a value, not shared state, so key material cannot
/// outlive the call that unwrapped it.
pub struct PayloadKey {
    key: Vec<u8>,
    request_nonce: Vec<u8>,
}

// Key bytes stay out of debug output
impl fmt::Debug for PayloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadKey")
            .field("key_bytes", &self.key.len())
            .field("nonce_bytes", &self.request_nonce.len())
            .finish_non_exhaustive()
    }
}

impl PayloadKey {
    /// Bind an unwrapped AES key to the request nonce
    ///
    /// # Errors
    ///
    /// `EnvelopeMalformed` when the key is not 16/32 bytes or the nonce is
    /// not 12/16 bytes
    pub fn new(key: Vec<u8>, request_nonce: Vec<u8>) -> Result<Self, FlowCryptoError> {
        if key.len() != 16 && key.len() != 32 {
            return Err(FlowCryptoError::EnvelopeMalformed {
                field: "encrypted_aes_key",
                reason: format!("unwrapped key is {} bytes, expected 16 or 32", key.len()),
            });
        }
        if request_nonce.len() != 12 && request_nonce.len() != 16 {
            return Err(FlowCryptoError::EnvelopeMalformed {
                field: "initial_vector",
                reason: format!(
                    "nonce is {} bytes, expected 12 or 16",
                    request_nonce.len()
                ),
            });
        }
        Ok(Self { key, request_nonce })
    }

    /// The nonce the request was encrypted under
    pub fn request_nonce(&self) -> &[u8] {
        &self.request_nonce
    }

    /// Decrypt the request payload and parse it as JSON
    ///
    /// The input must carry the appended 16-byte authentication tag. Tag
    /// failure never yields partial plaintext.
    ///
    /// # Errors
    ///
    /// - `EnvelopeMalformed` when the ciphertext is shorter than the tag or
    ///   the verified plaintext is not valid JSON
    /// - `PayloadDecryptFailed` on tag mismatch
    pub fn decrypt_request(
        &self,
        ciphertext_and_tag: &[u8],
    ) -> Result<serde_json::Value, FlowCryptoError> {
        if ciphertext_and_tag.len() < TAG_LEN {
            return Err(FlowCryptoError::EnvelopeMalformed {
                field: "encrypted_flow_data",
                reason: format!(
                    "ciphertext is {} bytes, shorter than the {}-byte tag",
                    ciphertext_and_tag.len(),
                    TAG_LEN
                ),
            });
        }

        let plaintext = self.open(&self.request_nonce, ciphertext_and_tag)?;

        serde_json::from_slice(&plaintext).map_err(|e| FlowCryptoError::EnvelopeMalformed {
            field: "decrypted_payload",
            reason: format!("not a valid JSON document: {}", e),
        })
    }

    /// Encrypt the composed response under the flipped request nonce
    ///
    /// Returns the base64 of ciphertext+tag; the HTTP response body is
    /// exactly this string.
    pub fn encrypt_response(
        &self,
        response: &serde_json::Value,
    ) -> Result<String, FlowCryptoError> {
        let plaintext = serde_json::to_vec(response)
            .map_err(|e| FlowCryptoError::PayloadEncryptFailed(e.to_string()))?;

        let response_nonce = flip_nonce(&self.request_nonce);
        let sealed = self.seal(&response_nonce, &plaintext)?;

        Ok(BASE64.encode(sealed))
    }

    fn open(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, FlowCryptoError> {
        match (self.key.len(), nonce.len()) {
            (16, 12) => open_with::<Aes128GcmIv12>(&self.key, nonce, ciphertext),
            (16, 16) => open_with::<Aes128GcmIv16>(&self.key, nonce, ciphertext),
            (32, 12) => open_with::<Aes256GcmIv12>(&self.key, nonce, ciphertext),
            (32, 16) => open_with::<Aes256GcmIv16>(&self.key, nonce, ciphertext),
            // Unreachable: lengths are validated in new()
            _ => Err(FlowCryptoError::PayloadDecryptFailed),
        }
    }

    fn seal(&self, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, FlowCryptoError> {
        match (self.key.len(), nonce.len()) {
            (16, 12) => seal_with::<Aes128GcmIv12>(&self.key, nonce, plaintext),
            (16, 16) => seal_with::<Aes128GcmIv16>(&self.key, nonce, plaintext),
            (32, 12) => seal_with::<Aes256GcmIv12>(&self.key, nonce, plaintext),
            (32, 16) => seal_with::<Aes256GcmIv16>(&self.key, nonce, plaintext),
            _ => Err(FlowCryptoError::PayloadEncryptFailed(
                "unsupported key/nonce length".to_string(),
            )),
        }
    }
}

fn open_with<A>(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, FlowCryptoError>
where
    A: Aead + KeyInit,
{
    let cipher = A::new_from_slice(key).map_err(|_| FlowCryptoError::PayloadDecryptFailed)?;
    cipher
        .decrypt(
            GenericArray::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: b"",
            },
        )
        .map_err(|_| FlowCryptoError::PayloadDecryptFailed)
}

fn seal_with<A>(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, FlowCryptoError>
where
    A: Aead + KeyInit,
{
    let cipher = A::new_from_slice(key)
        .map_err(|e| FlowCryptoError::PayloadEncryptFailed(e.to_string()))?;
    cipher
        .encrypt(
            GenericArray::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad: b"",
            },
        )
        .map_err(|e| FlowCryptoError::PayloadEncryptFailed(e.to_string()))
}
