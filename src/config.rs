// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node configuration
//!
//! Environment-driven, assembled once at startup. The RSA private key is
//! loaded separately by `crypto::key_unwrap` so key bytes never pass
//! through this struct.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `FLOW_APP_SECRET` | (required) | shared secret for the signature check |
//! | `FLOW_FALLBACK_SCREEN` | `WELCOME` | screen used when a request has no hint |
//! | `FLOW_MEDIA_TIMEOUT_SECS` | `30` | per-item download bound |
//! | `FLOW_MEDIA_CONCURRENCY` | `4` | media items in flight per payload |

use anyhow::{anyhow, Result};
use clap::Parser;
use std::env;

use crate::media::MediaFetchConfig;

/// Command-line flags for the node binary
#[derive(Debug, Parser)]
#[command(name = "flow-exchange-node", about = "Flow data-exchange endpoint")]
pub struct ServeArgs {
    /// Address to bind the HTTP listener on
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port for the HTTP listener
    #[arg(long, env = "API_PORT", default_value_t = 8080)]
    pub port: u16,
}

/// Runtime configuration for the exchange endpoint
#[derive(Debug, Clone)]
pub struct FlowNodeConfig {
    /// Pre-shared secret for `X-Hub-Signature-256` verification
    pub app_secret: String,
    /// Screen name used when a navigation request carries no `next_screen`
    pub fallback_screen: String,
    pub media: MediaFetchConfig,
}

impl FlowNodeConfig {
    /// Assemble configuration from the environment
    ///
    /// # Errors
    ///
    /// Fails when `FLOW_APP_SECRET` is missing or empty; everything else
    /// has a default.
    pub fn from_env() -> Result<Self> {
        let app_secret = env::var("FLOW_APP_SECRET")
            .map_err(|_| anyhow!("FLOW_APP_SECRET environment variable not set"))?;
        if app_secret.trim().is_empty() {
            return Err(anyhow!("FLOW_APP_SECRET is empty"));
        }

        let fallback_screen =
            env::var("FLOW_FALLBACK_SCREEN").unwrap_or_else(|_| "WELCOME".to_string());

        let download_timeout_secs = env::var("FLOW_MEDIA_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let max_concurrent_items = env::var("FLOW_MEDIA_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(4);

        Ok(Self {
            app_secret,
            fallback_screen,
            media: MediaFetchConfig {
                download_timeout_secs,
                max_concurrent_items,
            },
        })
    }
}
