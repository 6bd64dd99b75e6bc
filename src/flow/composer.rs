// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Response Composer
//!
//! Pure state machine from a decrypted request to a response envelope,
//! keyed on the request's action. Free of crypto and of side effects:
//! persistence and business fan-out happen in the caller after the response
//! exists. The match over [`FlowAction`] is exhaustive, so the degraded
//! branch for unknown actions is compiler-checked rather than a runtime
//! default.

use serde_json::{Map, Value};

use super::envelope::{DecryptedRequest, FlowAction, ResponseEnvelope};

/// Screen name for a completed exchange hand-off
const TERMINAL_SCREEN: &str = "SUCCESS";

/// Maps decrypted requests to navigation/business responses
#[derive(Debug, Clone)]
pub struct ResponseComposer {
    fallback_screen: String,
}

impl ResponseComposer {
    /// `fallback_screen` is used when a navigation request carries no
    /// `next_screen` hint
    pub fn new(fallback_screen: impl Into<String>) -> Self {
        Self {
            fallback_screen: fallback_screen.into(),
        }
    }

    /// Compose the response for one decrypted request
    ///
    /// Never fails and never panics: protocol violations degrade to a
    /// recoverable response on the current screen.
    pub fn compose(&self, request: &DecryptedRequest) -> ResponseEnvelope {
        match &request.action {
            FlowAction::Init | FlowAction::Back => self.navigate(request),

            FlowAction::DataExchange => {
                if next_screen_of(&request.data).is_some() {
                    self.navigate(request)
                } else {
                    self.terminal(request)
                }
            }

            // Health probe: fixed body, no business side effects
            FlowAction::Ping => ResponseEnvelope {
                version: request.version.clone(),
                screen: None,
                data: object(&[("status", Value::String("active".to_string()))]),
            },

            // Client-side error notification: acknowledge only
            FlowAction::Error => ResponseEnvelope {
                version: request.version.clone(),
                screen: None,
                data: object(&[("acknowledged", Value::Bool(true))]),
            },

            FlowAction::Unknown(raw) => self.degraded(request, raw),
        }
    }

    /// INIT/BACK (and DATA_EXCHANGE with a navigation hint): echo the data
    /// back on the requested screen
    fn navigate(&self, request: &DecryptedRequest) -> ResponseEnvelope {
        let screen = next_screen_of(&request.data)
            .unwrap_or(&self.fallback_screen)
            .to_string();

        ResponseEnvelope {
            version: request.version.clone(),
            screen: Some(screen),
            data: request.data.clone(),
        }
    }

    /// Terminal DATA_EXCHANGE: build the hand-off payload the platform
    /// forwards to the business layer that sent the message
    fn terminal(&self, request: &DecryptedRequest) -> ResponseEnvelope {
        let mut params = Map::new();
        if let Some(token) = &request.flow_token {
            params.insert("flow_token".to_string(), Value::String(token.clone()));
        }
        if let Some(id) = &request.flow_id {
            params.insert("flow_id".to_string(), Value::String(id.clone()));
        }
        params.insert("flow_data".to_string(), Value::Object(request.data.clone()));

        let mut extension = Map::new();
        extension.insert("params".to_string(), Value::Object(params));

        ResponseEnvelope {
            version: request.version.clone(),
            screen: Some(TERMINAL_SCREEN.to_string()),
            data: object(&[("extension_message_response", Value::Object(extension))]),
        }
    }

    /// Protocol violation: answer on the current screen with an error
    /// message so the remote platform shows a recoverable state
    fn degraded(&self, request: &DecryptedRequest, raw_action: &str) -> ResponseEnvelope {
        let screen = request
            .screen
            .clone()
            .unwrap_or_else(|| self.fallback_screen.clone());

        let mut data = request.data.clone();
        data.insert(
            "error_message".to_string(),
            Value::String(format!("unsupported action '{}'", raw_action)),
        );

        ResponseEnvelope {
            version: request.version.clone(),
            screen: Some(screen),
            data,
        }
    }
}

fn next_screen_of(data: &Map<String, Value>) -> Option<&str> {
    data.get("next_screen").and_then(Value::as_str)
}

fn object(entries: &[(&str, Value)]) -> Map<String, Value> {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}
