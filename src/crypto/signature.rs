// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Callback Signature Verification
//!
//! Every inbound Flow callback carries an `X-Hub-Signature-256` header of the
//! form `sha256=<hex>`: the HMAC-SHA256 of the raw request body under the
//! pre-shared app secret. The check runs before any field of the body is
//! parsed, so the MAC covers the exact bytes the platform sent.
//!
//! A mismatch is a normal outcome (the caller answers 403), never a panic or
//! an error path. Anything that prevents the comparison - missing header,
//! missing `sha256=` prefix, odd-length or non-hex digest - also counts as a
//! failed verification (fail closed).

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body HMAC, lowercase as axum normalizes header names
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Verify the `sha256=<hex>` signature header against the raw body bytes
///
/// Computes HMAC-SHA256(app_secret, body) and compares it to the decoded
/// header value in constant time.
///
/// # Arguments
///
/// * `app_secret` - pre-shared application secret (not a per-request key)
/// * `body` - the raw request body, byte for byte as received
/// * `header_value` - the signature header, if the request carried one
///
/// # Returns
///
/// `true` only when the header parsed cleanly and the MAC matches
pub fn verify_signature(app_secret: &str, body: &[u8], header_value: Option<&str>) -> bool {
    // 1. Fail closed on a missing header or a missing scheme prefix
    let Some(header_value) = header_value else {
        return false;
    };
    let Some(hex_digest) = header_value.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };

    // 2. Decode the claimed digest; malformed hex counts as a mismatch
    let Ok(claimed) = hex::decode(hex_digest) else {
        return false;
    };

    // 3. Compute the expected MAC over the exact body bytes
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    // Constant-time comparison; length mismatch yields false without
    // short-circuiting on content
    expected.as_slice().ct_eq(claimed.as_slice()).into()
}
