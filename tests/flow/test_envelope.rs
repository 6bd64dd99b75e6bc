// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Tests for envelope parsing, including the platform's non-canonical
// one-element-array field delivery

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flow_exchange_node::crypto::FlowCryptoError;
use flow_exchange_node::flow::EncryptedEnvelope;
use serde_json::json;

fn envelope_json(flow_data: serde_json::Value) -> Vec<u8> {
    json!({
        "encrypted_flow_data": flow_data,
        "encrypted_aes_key": BASE64.encode(b"wrapped-key-bytes"),
        "initial_vector": BASE64.encode(b"sixteen-byte-iv!"),
    })
    .to_string()
    .into_bytes()
}

/// Canonical delivery: every field is a bare base64 string
#[test]
fn test_canonical_string_fields() {
    let body = envelope_json(json!(BASE64.encode(b"ciphertext")));
    let envelope = EncryptedEnvelope::parse(&body).unwrap();
    let decoded = envelope.decode().unwrap();
    assert_eq!(decoded.ciphertext, b"ciphertext");
    assert_eq!(decoded.nonce, b"sixteen-byte-iv!");
}

/// Non-canonical delivery: the upstream platform has been observed wrapping
/// fields in single-element arrays; we normalize but do not document the
/// array form as part of the protocol
#[test]
fn test_non_canonical_single_element_array_tolerated() {
    let body = envelope_json(json!([BASE64.encode(b"ciphertext")]));
    let envelope = EncryptedEnvelope::parse(&body).unwrap();
    assert_eq!(envelope.decode().unwrap().ciphertext, b"ciphertext");
}

/// Arrays with more than one element are not a tolerated quirk
#[test]
fn test_longer_arrays_rejected() {
    let body = envelope_json(json!(["YQ==", "Yg=="]));
    assert!(EncryptedEnvelope::parse(&body).is_err());
}

/// Empty arrays are not a tolerated quirk either
#[test]
fn test_empty_array_rejected() {
    let body = envelope_json(json!([]));
    assert!(EncryptedEnvelope::parse(&body).is_err());
}

/// Numbers and objects in envelope fields are malformed, not coerced
#[test]
fn test_mistyped_fields_rejected() {
    for wrong in [json!(42), json!({"nested": "x"}), json!(null)] {
        let body = envelope_json(wrong);
        let result = EncryptedEnvelope::parse(&body);
        assert!(matches!(
            result,
            Err(FlowCryptoError::EnvelopeMalformed { field: "body", .. })
        ));
    }
}

/// A field that decodes to zero bytes fails the non-empty invariant
#[test]
fn test_zero_byte_field_rejected() {
    let body = json!({
        "encrypted_flow_data": "",
        "encrypted_aes_key": BASE64.encode(b"key"),
        "initial_vector": BASE64.encode(b"iv"),
    })
    .to_string();

    let envelope = EncryptedEnvelope::parse(body.as_bytes()).unwrap();
    assert!(matches!(
        envelope.decode(),
        Err(FlowCryptoError::EnvelopeMalformed { field: "encrypted_flow_data", .. })
    ));
}
