//! HTTP handlers for the pharmacy shift bot servers

pub mod health;
pub mod pharmacist_webhook;
pub mod store_webhook;

pub use health::health_check;
pub use pharmacist_webhook::handle_pharmacist_webhook;
pub use store_webhook::handle_store_webhook;

use serde::Serialize;

/// Response for webhook processing
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
}
