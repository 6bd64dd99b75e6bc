// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod handlers;
pub mod http_server;

pub use errors::{status_for, FlowErrorResponse};
pub use handlers::{CompletedExchange, FlowExchange};
pub use http_server::{router, start_server, AppState};
