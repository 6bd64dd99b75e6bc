// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP mapping for exchange failures
//!
//! The platform only acts on status codes, so rejections carry a bare
//! status and an empty body: 403 for a failed signature, 400 for anything
//! wrong with the envelope or its decryption, 500 when we could not
//! produce a response. Diagnostic detail stays in the server logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::crypto::FlowCryptoError;

/// Status code the platform should see for a given failure
pub fn status_for(error: &FlowCryptoError) -> StatusCode {
    match error {
        FlowCryptoError::SignatureInvalid => StatusCode::FORBIDDEN,
        FlowCryptoError::EnvelopeMalformed { .. }
        | FlowCryptoError::KeyUnwrapFailed(_)
        | FlowCryptoError::PayloadDecryptFailed => StatusCode::BAD_REQUEST,
        FlowCryptoError::PayloadEncryptFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Newtype so crypto errors can be returned straight from axum handlers
pub struct FlowErrorResponse(pub FlowCryptoError);

impl IntoResponse for FlowErrorResponse {
    fn into_response(self) -> Response {
        status_for(&self.0).into_response()
    }
}
