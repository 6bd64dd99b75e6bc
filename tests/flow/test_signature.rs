// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Tests for callback signature verification over raw body bytes

use flow_exchange_node::crypto::verify_signature;
use hmac::{Hmac, Mac};
use sha2::Sha256;

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Test 1: exact body bytes verify
#[test]
fn test_valid_hmac_over_exact_body() {
    let secret = "app-secret";
    let body = br#"{"encrypted_flow_data":"YQ==","encrypted_aes_key":"Yg==","initial_vector":"Yw=="}"#;
    let header = sign(secret, body);

    assert!(verify_signature(secret, body, Some(&header)));
}

/// Test 2: flipping one byte of the body invalidates the signature
#[test]
fn test_single_body_byte_flip_rejected() {
    let secret = "app-secret";
    let body = b"{\"a\": 1}".to_vec();
    let header = sign(secret, &body);

    for index in 0..body.len() {
        let mut mutated = body.clone();
        mutated[index] ^= 0x01;
        assert!(
            !verify_signature(secret, &mutated, Some(&header)),
            "byte {} flip slipped through",
            index
        );
    }
}

/// Test 3: flipping one hex character of the header invalidates it
#[test]
fn test_single_header_character_flip_rejected() {
    let secret = "app-secret";
    let body = b"payload bytes";
    let header = sign(secret, body);
    let digest_start = "sha256=".len();

    for index in digest_start..header.len() {
        let mut chars: Vec<char> = header.chars().collect();
        chars[index] = if chars[index] == 'f' { '0' } else { 'f' };
        let mutated: String = chars.into_iter().collect();
        if mutated == header {
            continue;
        }
        assert!(!verify_signature(secret, body, Some(&mutated)));
    }
}

/// Test 4: whitespace around the body is part of the signed bytes
#[test]
fn test_body_is_not_normalized_before_verification() {
    let secret = "app-secret";
    let body = b"{\"a\": 1}";
    let header = sign(secret, body);

    assert!(!verify_signature(secret, b"{\"a\":1}", Some(&header)));
    assert!(!verify_signature(secret, b" {\"a\": 1}", Some(&header)));
}
