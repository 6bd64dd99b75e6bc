// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Cryptographic primitives for the Flow exchange protocol
//!
//! Leaf modules, each owning one concern:
//! - [`signature`]: HMAC-SHA256 check of the callback signature header
//! - [`key_unwrap`]: RSA-OAEP unwrap of the per-request symmetric key
//! - [`payload`]: AES-GCM codec for the JSON envelope + nonce inversion
//! - [`error`]: the shared error taxonomy for all of the above

pub mod error;
pub mod key_unwrap;
pub mod payload;
pub mod signature;

pub use error::FlowCryptoError;
pub use key_unwrap::KeyUnwrapper;
pub use payload::{flip_nonce, PayloadKey, TAG_LEN};
pub use signature::{verify_signature, SIGNATURE_HEADER};
