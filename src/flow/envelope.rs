// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Wire types for the Flow data-exchange protocol
//!
//! [`EncryptedEnvelope`] is the outer JSON document the platform POSTs to
//! the endpoint. [`DecryptedRequest`] is what lives inside the AEAD payload;
//! it is produced only by the payload codec, never parsed straight from
//! untrusted input. [`ResponseEnvelope`] is the composer's output, consumed
//! by the codec's encrypt half.
//!
//! The platform occasionally delivers envelope fields as single-element
//! arrays of strings instead of bare strings. That shape is normalized here
//! but is NOT canonical - tests exercise it as a tolerated upstream quirk.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::crypto::FlowCryptoError;

/// Outer envelope of an inbound callback, as delivered on the wire
#[derive(Debug, Clone, Deserialize)]
pub struct EncryptedEnvelope {
    /// Base64 of AES-GCM ciphertext+tag
    #[serde(deserialize_with = "string_or_single_element")]
    pub encrypted_flow_data: String,
    /// Base64 of the RSA-OAEP wrapped AES key
    #[serde(deserialize_with = "string_or_single_element")]
    pub encrypted_aes_key: String,
    /// Base64 of the request nonce
    #[serde(deserialize_with = "string_or_single_element")]
    pub initial_vector: String,
}

/// The three envelope fields after base64 decoding
#[derive(Debug)]
pub struct DecodedEnvelope {
    pub ciphertext: Vec<u8>,
    pub wrapped_key: Vec<u8>,
    pub nonce: Vec<u8>,
}

impl EncryptedEnvelope {
    /// Parse the raw request body as an envelope
    pub fn parse(body: &[u8]) -> Result<Self, FlowCryptoError> {
        serde_json::from_slice(body).map_err(|e| FlowCryptoError::EnvelopeMalformed {
            field: "body",
            reason: format!("not a valid envelope document: {}", e),
        })
    }

    /// Decode all three fields, rejecting empty or non-base64 content
    pub fn decode(&self) -> Result<DecodedEnvelope, FlowCryptoError> {
        Ok(DecodedEnvelope {
            ciphertext: decode_b64("encrypted_flow_data", &self.encrypted_flow_data)?,
            wrapped_key: decode_b64("encrypted_aes_key", &self.encrypted_aes_key)?,
            nonce: decode_b64("initial_vector", &self.initial_vector)?,
        })
    }
}

fn decode_b64(field: &'static str, value: &str) -> Result<Vec<u8>, FlowCryptoError> {
    if value.is_empty() {
        return Err(FlowCryptoError::EnvelopeMalformed {
            field,
            reason: "field is empty".to_string(),
        });
    }

    let bytes = BASE64
        .decode(value)
        .map_err(|e| FlowCryptoError::EnvelopeMalformed {
            field,
            reason: format!("not valid base64: {}", e),
        })?;

    if bytes.is_empty() {
        return Err(FlowCryptoError::EnvelopeMalformed {
            field,
            reason: "decodes to zero bytes".to_string(),
        });
    }

    Ok(bytes)
}

/// Accept `"abc"` or `["abc"]` for an envelope field, normalizing to the
/// bare string; longer arrays are rejected
fn string_or_single_element<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => Ok(s),
        StringOrList::Many(mut items) if items.len() == 1 => Ok(items.remove(0)),
        StringOrList::Many(items) => Err(serde::de::Error::invalid_length(
            items.len(),
            &"a bare string or a single-element array",
        )),
    }
}

/// Action carried by a decrypted request
///
/// Closed enum so the dispatch in the composer is exhaustive; action strings
/// the protocol does not define land in `Unknown` with the raw value kept
/// for the degraded response and for logging.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum FlowAction {
    Init,
    Back,
    DataExchange,
    Ping,
    Error,
    Unknown(String),
}

impl From<String> for FlowAction {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "INIT" => FlowAction::Init,
            "BACK" => FlowAction::Back,
            "DATA_EXCHANGE" => FlowAction::DataExchange,
            "PING" => FlowAction::Ping,
            "ERROR" => FlowAction::Error,
            _ => FlowAction::Unknown(raw),
        }
    }
}

impl FlowAction {
    /// Wire spelling of the action, for log lines
    pub fn as_str(&self) -> &str {
        match self {
            FlowAction::Init => "INIT",
            FlowAction::Back => "BACK",
            FlowAction::DataExchange => "DATA_EXCHANGE",
            FlowAction::Ping => "PING",
            FlowAction::Error => "ERROR",
            FlowAction::Unknown(raw) => raw,
        }
    }
}

/// A fully-decrypted inbound request
///
/// Only ever constructed from plaintext the AEAD tag has already
/// authenticated.
#[derive(Debug, Clone, Deserialize)]
pub struct DecryptedRequest {
    pub action: FlowAction,
    #[serde(default)]
    pub screen: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub flow_token: Option<String>,
    #[serde(default)]
    pub flow_id: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "3.0".to_string()
}

impl DecryptedRequest {
    /// Bind the decrypted JSON document to the request schema
    pub fn from_value(value: Value) -> Result<Self, FlowCryptoError> {
        serde_json::from_value(value).map_err(|e| FlowCryptoError::EnvelopeMalformed {
            field: "decrypted_payload",
            reason: format!("does not match the request schema: {}", e),
        })
    }
}

/// The navigation/business response handed to the codec's encrypt half
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    pub data: Map<String, Value>,
}

impl ResponseEnvelope {
    /// Serialize for encryption
    pub fn to_value(&self) -> Value {
        // A struct of plain JSON types cannot fail to serialize
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
