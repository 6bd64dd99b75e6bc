// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The exchange pipeline behind `POST /flows/receive`
//!
//! [`FlowExchange::run`] is the synchronous request/response half:
//! signature check, envelope decode, key unwrap, payload decrypt, compose,
//! re-encrypt. It is pure data transformation over immutable shared state
//! (the RSA key), so concurrent requests need no coordination.
//!
//! [`FlowExchange::dispatch_completed`] is the asynchronous half: the
//! encrypted response body is handed back for the HTTP reply while media
//! retrieval and sink notifications continue on a spawned task. The
//! platform gets its answer without waiting on any CDN.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::FlowNodeConfig;
use crate::crypto::{verify_signature, FlowCryptoError, KeyUnwrapper, PayloadKey};
use crate::dispatch::{FlowEventSink, MediaSink};
use crate::flow::{DecryptedRequest, EncryptedEnvelope, ResponseComposer, ResponseEnvelope};
use crate::media::{collect_media_descriptors, MediaIntegrityFetcher};

/// One fully-processed exchange, ready to answer and to fan out
pub struct CompletedExchange {
    /// Correlation id carried through every log line and sink call
    pub exchange_id: String,
    /// Base64 ciphertext+tag; the HTTP response body is exactly this
    pub response_body: String,
    pub request: DecryptedRequest,
    pub response: ResponseEnvelope,
}

/// The exchange service: owns the app secret, the RSA unwrapper, the
/// composer, the media fetcher, and the collaborator sinks
pub struct FlowExchange {
    app_secret: String,
    unwrapper: Arc<KeyUnwrapper>,
    composer: ResponseComposer,
    fetcher: MediaIntegrityFetcher,
    event_sink: Arc<dyn FlowEventSink>,
    media_sink: Arc<dyn MediaSink>,
}

impl FlowExchange {
    pub fn new(
        config: &FlowNodeConfig,
        unwrapper: Arc<KeyUnwrapper>,
        event_sink: Arc<dyn FlowEventSink>,
        media_sink: Arc<dyn MediaSink>,
    ) -> Self {
        let fetcher = MediaIntegrityFetcher::new(Arc::clone(&unwrapper), config.media.clone());

        Self {
            app_secret: config.app_secret.clone(),
            unwrapper,
            composer: ResponseComposer::new(config.fallback_screen.clone()),
            fetcher,
            event_sink,
            media_sink,
        }
    }

    /// Convenience constructor for a standalone node: logging sinks only
    pub fn with_logging_sinks(config: &FlowNodeConfig, unwrapper: Arc<KeyUnwrapper>) -> Self {
        let sink = Arc::new(crate::dispatch::LoggingSink);
        Self::new(config, unwrapper, sink.clone(), sink)
    }

    /// Run the synchronous request/response pipeline
    ///
    /// # Arguments
    ///
    /// * `body` - the raw request body, byte for byte (the signature covers
    ///   exactly these bytes)
    /// * `signature_header` - value of `X-Hub-Signature-256`, if present
    ///
    /// # Errors
    ///
    /// Typed [`FlowCryptoError`]s; the HTTP layer maps them to 403/400/500.
    pub fn run(
        &self,
        body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<CompletedExchange, FlowCryptoError> {
        // 1. Authenticate before parsing anything
        if !verify_signature(&self.app_secret, body, signature_header) {
            return Err(FlowCryptoError::SignatureInvalid);
        }

        // 2. Parse and base64-decode the envelope
        let envelope = EncryptedEnvelope::parse(body)?;
        let decoded = envelope.decode()?;

        // 3. Unwrap the symmetric key and bind it to the request nonce.
        // The PayloadKey lives on the stack of this call only.
        let aes_key = self.unwrapper.unwrap_key(&decoded.wrapped_key)?;
        let payload_key = PayloadKey::new(aes_key, decoded.nonce)?;

        // 4. Decrypt and bind to the request schema
        let plaintext = payload_key.decrypt_request(&decoded.ciphertext)?;
        let request = DecryptedRequest::from_value(plaintext)?;

        let exchange_id = Uuid::new_v4().to_string();
        debug!(
            "exchange {}: action={} screen={:?}",
            exchange_id,
            request.action.as_str(),
            request.screen
        );

        // 5. Compose the navigation answer
        let response = self.composer.compose(&request);

        // 6. Re-encrypt under the same key, flipped nonce
        let response_body = payload_key.encrypt_response(&response.to_value())?;

        Ok(CompletedExchange {
            exchange_id,
            response_body,
            request,
            response,
        })
    }

    /// Hand off the completed exchange: notify the event sink, then fetch
    /// and deliver any referenced media - all on a spawned task so the HTTP
    /// reply is never held up. Returns the response body to send.
    pub fn dispatch_completed(self: &Arc<Self>, exchange: CompletedExchange) -> String {
        let response_body = exchange.response_body.clone();
        let service = Arc::clone(self);

        tokio::spawn(async move {
            service
                .event_sink
                .exchange_completed(&exchange.exchange_id, &exchange.request, &exchange.response)
                .await;

            let descriptors =
                collect_media_descriptors(&Value::Object(exchange.request.data.clone()));
            if descriptors.is_empty() {
                return;
            }

            info!(
                "exchange {}: fetching {} media item(s)",
                exchange.exchange_id,
                descriptors.len()
            );

            let outcomes = service.fetcher.fetch_all(descriptors).await;
            for outcome in outcomes {
                match outcome.result {
                    Ok(media) => {
                        service
                            .media_sink
                            .media_ready(&exchange.exchange_id, media)
                            .await;
                    }
                    Err(error) => {
                        service
                            .media_sink
                            .media_failed(&exchange.exchange_id, &outcome.media_id, &error)
                            .await;
                    }
                }
            }
        });

        response_body
    }
}
