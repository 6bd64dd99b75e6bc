//! Media fetch-verify-decrypt pipeline
//!
//! Downloads end-to-end-encrypted blobs referenced by decrypted payloads and
//! verifies integrity at three points before releasing plaintext:
//!
//! 1. SHA-256 of the downloaded blob against `encrypted_hash` (transport)
//! 2. HMAC-SHA256 over iv || ciphertext, truncated to the 10-byte trailer
//!    carried at the end of the blob (authentication)
//! 3. SHA-256 of the decrypted plaintext against `plaintext_hash` (defense
//!    against key confusion)
//!
//! The 10-byte (80-bit) MAC truncation is dictated by the platform's
//! documented media-encryption scheme and must match exactly for
//! interoperability.
//!
//! Items fan out concurrently under a semaphore bound; a failure in one item
//! never cancels its siblings, and nothing here retries.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures::future::join_all;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::descriptor::MediaDescriptor;
use super::error::MediaError;
use crate::crypto::{FlowCryptoError, KeyUnwrapper};

type HmacSha256 = Hmac<Sha256>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Length of the truncated MAC carried at the end of every media blob
const MAC_TRAILER_LEN: usize = 10;

/// Tuning for the media pipeline
#[derive(Debug, Clone)]
pub struct MediaFetchConfig {
    /// Bound on each item's download, connect to last body byte
    pub download_timeout_secs: u64,
    /// How many items of one payload may be in flight at once
    pub max_concurrent_items: usize,
}

impl Default for MediaFetchConfig {
    fn default() -> Self {
        Self {
            download_timeout_secs: 30,
            max_concurrent_items: 4,
        }
    }
}

/// A fully-verified, decrypted media item ready for persistence
#[derive(Clone)]
pub struct DecryptedMedia {
    pub media_id: String,
    pub file_name: String,
    /// Hint inferred from the file-name extension, when recognized
    pub content_type: Option<&'static str>,
    pub plaintext: Vec<u8>,
}

// User content stays out of debug output
impl fmt::Debug for DecryptedMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedMedia")
            .field("media_id", &self.media_id)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("plaintext_bytes", &self.plaintext.len())
            .finish()
    }
}

/// Outcome of one item in a fan-out, success or failure
#[derive(Debug)]
pub struct MediaOutcome {
    pub media_id: String,
    pub result: Result<DecryptedMedia, MediaError>,
}

/// Downloads, verifies, and decrypts media items referenced by decrypted
/// payloads
pub struct MediaIntegrityFetcher {
    client: Client,
    unwrapper: Arc<KeyUnwrapper>,
    limiter: Arc<Semaphore>,
    config: MediaFetchConfig,
}

impl MediaIntegrityFetcher {
    pub fn new(unwrapper: Arc<KeyUnwrapper>, config: MediaFetchConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("failed to build HTTP client");

        let limiter = Arc::new(Semaphore::new(config.max_concurrent_items.max(1)));

        Self {
            client,
            unwrapper,
            limiter,
            config,
        }
    }

    /// Run every descriptor through the pipeline concurrently
    ///
    /// Concurrency is bounded by `max_concurrent_items`; the aggregate
    /// completes when all items finish, one outcome per descriptor in input
    /// order. Per-item failures are recorded, logged, and do not touch
    /// sibling items.
    pub async fn fetch_all(&self, descriptors: Vec<MediaDescriptor>) -> Vec<MediaOutcome> {
        let futures: Vec<_> = descriptors
            .into_iter()
            .map(|descriptor| {
                let limiter = Arc::clone(&self.limiter);
                async move {
                    // The semaphore is never closed; a failed acquire only
                    // means the item runs unthrottled
                    let _permit = limiter.acquire_owned().await.ok();

                    let result = self.fetch_and_decrypt(&descriptor).await;
                    match &result {
                        Ok(media) => debug!(
                            "media item {} verified ({} bytes)",
                            media.media_id,
                            media.plaintext.len()
                        ),
                        Err(e) => warn!("media item {} rejected: {}", descriptor.media_id, e),
                    }

                    MediaOutcome {
                        media_id: descriptor.media_id.clone(),
                        result,
                    }
                }
            })
            .collect();

        join_all(futures).await
    }

    /// Fetch and decrypt a single media item, verifying integrity at each
    /// stage; the first failing stage is terminal for this item
    pub async fn fetch_and_decrypt(
        &self,
        descriptor: &MediaDescriptor,
    ) -> Result<DecryptedMedia, MediaError> {
        // 1. Download the encrypted blob
        let blob = self.download(&descriptor.cdn_url).await?;

        // 2. Transport integrity: hash of exactly what was downloaded
        verify_sha256(
            &blob,
            &descriptor.encrypted_hash,
            "encrypted_hash",
            MediaError::TransportIntegrity,
        )?;

        // 3. Split off the 10-byte truncated MAC trailer
        let (ciphertext, trailer) = split_blob(&blob)?;

        // 4. Authenticate iv || ciphertext under the unwrapped HMAC key
        let iv = decode_field("iv", &descriptor.iv, Some(16))?;
        let hmac_key = self.unwrap_media_key("hmac_key", &descriptor.hmac_key)?;
        verify_truncated_mac(&hmac_key, &iv, ciphertext, trailer)?;

        // 5. Decrypt under the unwrapped AES key
        let encryption_key = self.unwrap_media_key("encryption_key", &descriptor.encryption_key)?;
        let plaintext = decrypt_cbc(&encryption_key, &iv, ciphertext)?;

        // 6. Plaintext integrity: catches a valid-looking decrypt under a
        // confused key even after the MAC passed
        verify_sha256(
            &plaintext,
            &descriptor.plaintext_hash,
            "plaintext_hash",
            MediaError::PlaintextIntegrity,
        )?;

        Ok(DecryptedMedia {
            media_id: descriptor.media_id.clone(),
            file_name: descriptor.file_name.clone(),
            content_type: content_type_hint(&descriptor.file_name),
            plaintext,
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!("timed out after {}s", self.config.download_timeout_secs)
            } else {
                e.to_string()
            };
            MediaError::Download {
                url: url.to_string(),
                reason,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::Download {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let bytes = response.bytes().await.map_err(|e| MediaError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(bytes.to_vec())
    }

    fn unwrap_media_key(
        &self,
        field: &'static str,
        wrapped_b64: &str,
    ) -> Result<Vec<u8>, MediaError> {
        let wrapped = decode_field(field, wrapped_b64, None)?;
        self.unwrapper
            .unwrap_key(&wrapped)
            .map_err(|e| match e {
                FlowCryptoError::EnvelopeMalformed { reason, .. } => {
                    MediaError::Malformed { field, reason }
                }
                other => MediaError::KeyUnwrap(other.to_string()),
            })
    }
}

fn decode_field(
    field: &'static str,
    value: &str,
    expected_len: Option<usize>,
) -> Result<Vec<u8>, MediaError> {
    let bytes = BASE64.decode(value).map_err(|e| MediaError::Malformed {
        field,
        reason: format!("not valid base64: {}", e),
    })?;

    if let Some(expected) = expected_len {
        if bytes.len() != expected {
            return Err(MediaError::Malformed {
                field,
                reason: format!("{} bytes, expected {}", bytes.len(), expected),
            });
        }
    }

    Ok(bytes)
}

fn verify_sha256(
    data: &[u8],
    expected_b64: &str,
    field: &'static str,
    mismatch: MediaError,
) -> Result<(), MediaError> {
    let expected = decode_field(field, expected_b64, Some(32))?;
    let digest = Sha256::digest(data);

    if digest.as_slice() == expected.as_slice() {
        Ok(())
    } else {
        Err(mismatch)
    }
}

/// The last 10 bytes of the blob are the truncated MAC; a blob that cannot
/// carry both a trailer and at least one cipher block is invalid
fn split_blob(blob: &[u8]) -> Result<(&[u8], &[u8]), MediaError> {
    if blob.len() <= MAC_TRAILER_LEN {
        return Err(MediaError::Malformed {
            field: "cdn_blob",
            reason: format!(
                "{} bytes, too short to carry a {}-byte trailer and ciphertext",
                blob.len(),
                MAC_TRAILER_LEN
            ),
        });
    }
    Ok(blob.split_at(blob.len() - MAC_TRAILER_LEN))
}

fn verify_truncated_mac(
    hmac_key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    trailer: &[u8],
) -> Result<(), MediaError> {
    let mut mac = HmacSha256::new_from_slice(hmac_key)
        .map_err(|e| MediaError::KeyUnwrap(format!("HMAC key rejected: {}", e)))?;
    mac.update(iv);
    mac.update(ciphertext);
    let full = mac.finalize().into_bytes();

    if bool::from(full.as_slice()[..MAC_TRAILER_LEN].ct_eq(trailer)) {
        Ok(())
    } else {
        Err(MediaError::Authentication)
    }
}

fn decrypt_cbc(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, MediaError> {
    match key.len() {
        16 => Aes128CbcDec::new_from_slices(key, iv)
            .map_err(|e| MediaError::Decrypt(e.to_string()))?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| MediaError::Decrypt("invalid PKCS7 padding".to_string())),
        32 => Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|e| MediaError::Decrypt(e.to_string()))?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| MediaError::Decrypt("invalid PKCS7 padding".to_string())),
        other => Err(MediaError::KeyUnwrap(format!(
            "encryption key is {} bytes, expected 16 or 32",
            other
        ))),
    }
}

fn content_type_hint(file_name: &str) -> Option<&'static str> {
    let extension = file_name.rsplit('.').next()?.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "mp4" => Some("video/mp4"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}
