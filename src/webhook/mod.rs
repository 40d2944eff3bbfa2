//! Webhook ingestion for the call-center platform.
//!
//! ## Modules
//!
//! - [`routes`] - HTTP endpoints (`POST /webhooks/{event_type}`, `GET /health`)
//! - [`handler`] - delivery pipeline shared by the endpoints and the tests
//! - [`receiver`] - payload normalization and id synthesis
//! - [`security`] - HMAC signature verification
//! - [`errors`] - rejections and their HTTP mapping

pub mod errors;
pub mod handler;
pub mod receiver;
pub mod routes;
pub mod security;

use crate::dispatch::Dispatcher;

/// Per-worker state. Cloning is cheap; the dedup store inside the dispatcher
/// is shared by every worker.
#[derive(Clone)]
pub struct AppState {
    pub receiver: receiver::WebhookReceiver,
    pub dispatcher: Dispatcher,
    /// 🔒 SENSITIVE: when set, deliveries must be signed with it
    pub signing_secret: Option<String>,
}
