// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// End-to-end tests for the media fetch-verify-decrypt pipeline against a
// local in-process HTTP server. Each of the three integrity points is
// corrupted independently to prove rejection happens at that stage and not
// a later one.

use aes::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flow_exchange_node::crypto::KeyUnwrapper;
use flow_exchange_node::media::{
    MediaDescriptor, MediaError, MediaFetchConfig, MediaIntegrityFetcher,
};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

const PLAINTEXT: &[u8] = b"decrypted media payload - a small test document";

struct MediaFixture {
    fetcher: MediaIntegrityFetcher,
    public_key: RsaPublicKey,
    enc_key: [u8; 32],
    hmac_key: [u8; 32],
    iv: [u8; 16],
}

impl MediaFixture {
    fn new() -> Self {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let public_key = RsaPublicKey::from(&private_key);
        let fetcher = MediaIntegrityFetcher::new(
            Arc::new(KeyUnwrapper::from_key(private_key)),
            MediaFetchConfig {
                download_timeout_secs: 5,
                max_concurrent_items: 2,
            },
        );

        Self {
            fetcher,
            public_key,
            enc_key: [0x11; 32],
            hmac_key: [0x22; 32],
            iv: [0x33; 16],
        }
    }

    /// Build a platform-format blob: CBC ciphertext + 10-byte MAC trailer
    fn blob(&self) -> Vec<u8> {
        let ciphertext = Aes256CbcEnc::new_from_slices(&self.enc_key, &self.iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(PLAINTEXT);

        let mut mac = HmacSha256::new_from_slice(&self.hmac_key).unwrap();
        mac.update(&self.iv);
        mac.update(&ciphertext);
        let tag = mac.finalize().into_bytes();

        let mut blob = ciphertext;
        blob.extend_from_slice(&tag[..10]);
        blob
    }

    fn wrap(&self, key: &[u8]) -> String {
        BASE64.encode(
            self.public_key
                .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key)
                .unwrap(),
        )
    }

    fn descriptor(&self, media_id: &str, cdn_url: String, blob: &[u8]) -> MediaDescriptor {
        MediaDescriptor {
            media_id: media_id.to_string(),
            cdn_url,
            file_name: "report.pdf".to_string(),
            encrypted_hash: BASE64.encode(Sha256::digest(blob)),
            iv: BASE64.encode(self.iv),
            encryption_key: self.wrap(&self.enc_key),
            hmac_key: self.wrap(&self.hmac_key),
            plaintext_hash: BASE64.encode(Sha256::digest(PLAINTEXT)),
        }
    }
}

/// Serve one blob over HTTP on an ephemeral local port
async fn serve_blob(blob: Vec<u8>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let blob = blob.clone();
            tokio::spawn(async move {
                // Drain the request head before answering
                let mut received = Vec::new();
                let mut buffer = [0u8; 1024];
                loop {
                    match socket.read(&mut buffer).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            received.extend_from_slice(&buffer[..n]);
                            if received.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                    }
                }

                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    blob.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&blob).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}/media.enc", addr)
}

/// Test 1: an untampered blob passes all three integrity points and yields
/// the exact original plaintext
#[tokio::test]
async fn test_valid_blob_decrypts_exactly() {
    let fixture = MediaFixture::new();
    let blob = fixture.blob();
    let url = serve_blob(blob.clone()).await;
    let descriptor = fixture.descriptor("m-ok", url, &blob);

    let media = fixture.fetcher.fetch_and_decrypt(&descriptor).await.unwrap();
    assert_eq!(media.plaintext, PLAINTEXT);
    assert_eq!(media.file_name, "report.pdf");
    assert_eq!(media.content_type, Some("application/pdf"));
}

/// Test 2: corrupting `encrypted_hash` is caught at the transport stage
#[tokio::test]
async fn test_transport_hash_corruption_caught_first() {
    let fixture = MediaFixture::new();
    let blob = fixture.blob();
    let url = serve_blob(blob.clone()).await;

    let mut descriptor = fixture.descriptor("m-transport", url, &blob);
    descriptor.encrypted_hash = BASE64.encode(Sha256::digest(b"some other blob"));

    let result = fixture.fetcher.fetch_and_decrypt(&descriptor).await;
    assert!(matches!(result, Err(MediaError::TransportIntegrity)));
}

/// Test 3: a blob whose MAC trailer is wrong - but whose transport hash is
/// consistent with the corrupted bytes - fails at the authentication stage,
/// not before and not after
#[tokio::test]
async fn test_mac_corruption_caught_at_authentication() {
    let fixture = MediaFixture::new();
    let mut blob = fixture.blob();
    let last = blob.len() - 1;
    blob[last] ^= 0x80;

    let url = serve_blob(blob.clone()).await;
    // Descriptor hash matches the corrupted blob, so transport passes
    let descriptor = fixture.descriptor("m-mac", url, &blob);

    let result = fixture.fetcher.fetch_and_decrypt(&descriptor).await;
    assert!(matches!(result, Err(MediaError::Authentication)));
}

/// Test 4: corrupting only `plaintext_hash` is caught at the final stage,
/// after download, MAC, and decryption all passed
#[tokio::test]
async fn test_plaintext_hash_corruption_caught_last() {
    let fixture = MediaFixture::new();
    let blob = fixture.blob();
    let url = serve_blob(blob.clone()).await;

    let mut descriptor = fixture.descriptor("m-plain", url, &blob);
    descriptor.plaintext_hash = BASE64.encode(Sha256::digest(b"not the plaintext"));

    let result = fixture.fetcher.fetch_and_decrypt(&descriptor).await;
    assert!(matches!(result, Err(MediaError::PlaintextIntegrity)));
}

/// Test 5: one failing item does not abort its siblings in a fan-out
#[tokio::test]
async fn test_sibling_isolation_in_fan_out() {
    let fixture = MediaFixture::new();
    let blob = fixture.blob();
    let url_good = serve_blob(blob.clone()).await;
    let url_bad = serve_blob(blob.clone()).await;

    let good = fixture.descriptor("m-good", url_good, &blob);
    let mut bad = fixture.descriptor("m-bad", url_bad, &blob);
    bad.plaintext_hash = BASE64.encode(Sha256::digest(b"wrong"));

    let outcomes = fixture.fetcher.fetch_all(vec![bad, good]).await;
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].media_id, "m-bad");
    assert!(outcomes[0].result.is_err());
    assert_eq!(outcomes[1].media_id, "m-good");
    assert_eq!(outcomes[1].result.as_ref().unwrap().plaintext, PLAINTEXT);
}

/// Test 6: an unreachable CDN is a download failure, scoped to the item
#[tokio::test]
async fn test_unreachable_cdn_is_download_failure() {
    let fixture = MediaFixture::new();
    let blob = fixture.blob();

    // Bind then immediately drop the listener so the port refuses
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let descriptor = fixture.descriptor("m-gone", format!("http://{}/x", addr), &blob);
    let result = fixture.fetcher.fetch_and_decrypt(&descriptor).await;
    assert!(matches!(result, Err(MediaError::Download { .. })));
}

/// Test 7: a wrapped key of the wrong modulus length is malformed, caught
/// before any OAEP operation runs
#[tokio::test]
async fn test_wrong_length_wrapped_key_rejected() {
    let fixture = MediaFixture::new();
    let blob = fixture.blob();
    let url = serve_blob(blob.clone()).await;

    let mut descriptor = fixture.descriptor("m-badkey", url, &blob);
    descriptor.hmac_key = BASE64.encode([0u8; 64]);

    let result = fixture.fetcher.fetch_and_decrypt(&descriptor).await;
    assert!(matches!(result, Err(MediaError::Malformed { .. })));
}
