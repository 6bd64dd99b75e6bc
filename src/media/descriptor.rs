// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Media Descriptor Discovery
//!
//! Decrypted `data` trees may reference end-to-end-encrypted media anywhere
//! inside nested objects and arrays (media pickers deliver arrays of
//! uploads, forms nest them under component names). Discovery is a typed
//! recursive walk over [`serde_json::Value`] that collects every object
//! carrying both a media identifier and an encryption-metadata object, in
//! document order.
//!
//! Descriptors are transient: built per request, handed to the fetcher,
//! never persisted here.

use serde_json::{Map, Value};

/// One end-to-end-encrypted media item referenced by a decrypted payload
///
/// Hashes, iv, and the two wrapped keys are base64 strings exactly as found
/// in the tree; decoding happens in the fetcher so that a malformed field
/// fails that item alone.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaDescriptor {
    pub media_id: String,
    pub cdn_url: String,
    pub file_name: String,
    pub encrypted_hash: String,
    pub iv: String,
    /// RSA-OAEP wrapped AES key, base64
    pub encryption_key: String,
    /// RSA-OAEP wrapped HMAC key, base64
    pub hmac_key: String,
    pub plaintext_hash: String,
}

/// Collect every media descriptor reachable from `value`
pub fn collect_media_descriptors(value: &Value) -> Vec<MediaDescriptor> {
    let mut found = Vec::new();
    walk(value, &mut found);
    found
}

fn walk(value: &Value, found: &mut Vec<MediaDescriptor>) {
    match value {
        Value::Object(object) => {
            if let Some(descriptor) = descriptor_from_object(object) {
                found.push(descriptor);
            }
            for child in object.values() {
                walk(child, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, found);
            }
        }
        // Leaves carry no descriptors
        Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null => {}
    }
}

/// A descriptor candidate is an object with a string `media_id` and an
/// `encryption_metadata` object; anything missing or mistyped means this
/// object is not a media reference at all
fn descriptor_from_object(object: &Map<String, Value>) -> Option<MediaDescriptor> {
    let media_id = object.get("media_id")?.as_str()?;
    let metadata = object.get("encryption_metadata")?.as_object()?;

    let field = |map: &Map<String, Value>, key: &str| -> Option<String> {
        map.get(key).and_then(Value::as_str).map(str::to_string)
    };

    Some(MediaDescriptor {
        media_id: media_id.to_string(),
        cdn_url: field(object, "cdn_url")?,
        file_name: field(object, "file_name")?,
        encrypted_hash: field(metadata, "encrypted_hash")?,
        iv: field(metadata, "iv")?,
        encryption_key: field(metadata, "encryption_key")?,
        hmac_key: field(metadata, "hmac_key")?,
        plaintext_hash: field(metadata, "plaintext_hash")?,
    })
}
