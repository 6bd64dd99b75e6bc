// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Downstream collaborator seams
//!
//! The exchange core does not persist anything. Completed exchanges and
//! decrypted media are handed to these traits; real deployments plug in
//! storage or queue implementations, the bundled [`LoggingSink`] only
//! leaves breadcrumbs so the node runs standalone.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::flow::{DecryptedRequest, ResponseEnvelope};
use crate::media::{DecryptedMedia, MediaError};

/// Receives every completed exchange for audit logging and business fan-out
#[async_trait]
pub trait FlowEventSink: Send + Sync {
    /// Called once per successful exchange, after the encrypted response
    /// has been produced
    async fn exchange_completed(
        &self,
        exchange_id: &str,
        request: &DecryptedRequest,
        response: &ResponseEnvelope,
    );
}

/// Receives verified media plaintext (or the per-item failure) for
/// persistence
#[async_trait]
pub trait MediaSink: Send + Sync {
    async fn media_ready(&self, exchange_id: &str, media: DecryptedMedia);

    async fn media_failed(&self, exchange_id: &str, media_id: &str, error: &MediaError);
}

/// Default sink: structured log lines only, no storage
#[derive(Debug, Default, Clone)]
pub struct LoggingSink;

#[async_trait]
impl FlowEventSink for LoggingSink {
    async fn exchange_completed(
        &self,
        exchange_id: &str,
        request: &DecryptedRequest,
        response: &ResponseEnvelope,
    ) {
        info!(
            "exchange {} completed: action={} screen={:?}",
            exchange_id,
            request.action.as_str(),
            response.screen
        );
    }
}

#[async_trait]
impl MediaSink for LoggingSink {
    async fn media_ready(&self, exchange_id: &str, media: DecryptedMedia) {
        info!(
            "exchange {}: media {} decrypted ({} bytes, {})",
            exchange_id,
            media.media_id,
            media.plaintext.len(),
            media.content_type.unwrap_or("unknown type")
        );
    }

    async fn media_failed(&self, exchange_id: &str, media_id: &str, error: &MediaError) {
        warn!(
            "exchange {}: media {} rejected: {}",
            exchange_id, media_id, error
        );
    }
}
