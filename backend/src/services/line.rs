//! LINE Messaging API client and webhook wire types
//!
//! Each client is bound to one channel (store or pharmacist) at
//! construction. The access token and webhook secret travel together, so
//! role selection happens exactly once per process and cannot drift per
//! call site.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::{BotRole, LineChannelConfig};
use crate::error::{AppError, AppResult, LineApiError};

const LINE_API_BASE: &str = "https://api.line.me/v2/bot";

/// LINE Messaging API client bound to a single channel
#[derive(Clone)]
pub struct LineClient {
    role: BotRole,
    access_token: String,
    channel_secret: String,
    http_client: reqwest::Client,
}

impl LineClient {
    /// Create a client for the given role's channel.
    ///
    /// Missing credentials are a warning here, not a failure: the server
    /// still starts, and sends fail with a configuration error instead of
    /// reaching the provider. Credential material itself is never logged.
    pub fn new(role: BotRole, channel: LineChannelConfig) -> Self {
        if channel.access_token.is_empty() {
            tracing::warn!("{} channel access token is not set", role.as_str());
        }
        if channel.channel_secret.is_empty() {
            tracing::warn!("{} channel secret is not set", role.as_str());
        }
        Self {
            role,
            access_token: channel.access_token,
            channel_secret: channel.channel_secret,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn role(&self) -> BotRole {
        self.role
    }

    /// Whether the channel has an access token for outbound messages
    pub fn is_configured(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Push messages to a user
    pub async fn push_message(&self, to: &str, messages: Vec<LineMessage>) -> AppResult<()> {
        let request = PushRequest {
            to: to.to_string(),
            messages,
        };
        self.post("message/push", &request).await
    }

    /// Reply to a webhook event
    pub async fn reply_message(
        &self,
        reply_token: &str,
        messages: Vec<LineMessage>,
    ) -> AppResult<()> {
        let request = ReplyRequest {
            reply_token: reply_token.to_string(),
            messages,
        };
        self.post("message/reply", &request).await
    }

    /// Fetch a user's profile (display name)
    pub async fn get_profile(&self, user_id: &str) -> AppResult<Profile> {
        if self.access_token.is_empty() {
            return Err(AppError::Configuration(format!(
                "{} channel access token is not set",
                self.role.as_str()
            )));
        }

        let response = self
            .http_client
            .get(format!("{}/profile/{}", LINE_API_BASE, user_id))
            .header("Authorization", format!("Bearer {}", self.access_token))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(self.provider_error(response).await);
        }

        let profile = response
            .json::<Profile>()
            .await
            .map_err(|e| self.transport_error(e))?;
        Ok(profile)
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> AppResult<()> {
        if self.access_token.is_empty() {
            return Err(AppError::Configuration(format!(
                "{} channel access token is not set",
                self.role.as_str()
            )));
        }

        let response = self
            .http_client
            .post(format!("{}/{}", LINE_API_BASE, path))
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.provider_error(response).await)
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> AppError {
        let detail = LineApiError {
            message: format!("{} channel request failed: {}", self.role.as_str(), e),
            status_code: None,
            response_body: None,
            request_id: None,
        };
        detail.log();
        AppError::LineApi(detail)
    }

    /// Build the structured provider error from a non-success response.
    /// Status code, request id, and body are each optional; whatever is
    /// present gets its own diagnostic log line.
    async fn provider_error(&self, response: reqwest::Response) -> AppError {
        let status = response.status();
        let request_id = response
            .headers()
            .get("x-line-request-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body_text = response.text().await.unwrap_or_default();
        let response_body = if body_text.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str(&body_text)
                    .unwrap_or(serde_json::Value::String(body_text)),
            )
        };

        let detail = LineApiError {
            message: format!("{} channel delivery rejected", self.role.as_str()),
            status_code: Some(status.as_u16()),
            response_body,
            request_id,
        };
        detail.log();
        AppError::LineApi(detail)
    }

    /// Verify an inbound webhook signature against this channel's secret.
    ///
    /// The signature is the base64 HMAC-SHA256 of the raw request body.
    pub fn verify_signature(&self, signature: &str, body: &[u8]) -> AppResult<()> {
        if self.channel_secret.is_empty() {
            return Err(AppError::Configuration(format!(
                "{} channel secret is not set",
                self.role.as_str()
            )));
        }

        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(self.channel_secret.as_bytes())
            .map_err(|_| AppError::Configuration("invalid channel secret".to_string()))?;
        mac.update(body);
        let expected = BASE64.encode(mac.finalize().into_bytes());

        if signature != expected {
            return Err(AppError::SignatureInvalid);
        }

        Ok(())
    }
}

// ============================================================================
// Outbound message types
// ============================================================================

/// LINE message payload
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum LineMessage {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "template")]
    Template {
        #[serde(rename = "altText")]
        alt_text: String,
        template: MessageTemplate,
    },
}

impl LineMessage {
    pub fn text(text: impl Into<String>) -> Self {
        LineMessage::Text { text: text.into() }
    }

    pub fn buttons(
        alt_text: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
        actions: Vec<TemplateAction>,
    ) -> Self {
        LineMessage::Template {
            alt_text: alt_text.into(),
            template: MessageTemplate::Buttons(ButtonsTemplate {
                title: title.into(),
                text: text.into(),
                actions,
            }),
        }
    }
}

/// Template container
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum MessageTemplate {
    #[serde(rename = "buttons")]
    Buttons(ButtonsTemplate),
}

/// Buttons template with postback actions
#[derive(Debug, Clone, Serialize)]
pub struct ButtonsTemplate {
    pub title: String,
    pub text: String,
    pub actions: Vec<TemplateAction>,
}

/// Template action
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum TemplateAction {
    #[serde(rename = "postback")]
    Postback { label: String, data: String },
}

impl TemplateAction {
    pub fn postback(label: impl Into<String>, data: impl Into<String>) -> Self {
        TemplateAction::Postback {
            label: label.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PushRequest {
    to: String,
    messages: Vec<LineMessage>,
}

#[derive(Debug, Serialize)]
struct ReplyRequest {
    #[serde(rename = "replyToken")]
    reply_token: String,
    messages: Vec<LineMessage>,
}

/// LINE user profile
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

// ============================================================================
// Inbound webhook types
// ============================================================================

/// LINE webhook request body
/// See: https://developers.line.biz/en/reference/messaging-api/#webhook-event-objects
#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    /// User ID of the bot that received the events
    pub destination: String,
    /// Array of webhook event objects
    pub events: Vec<WebhookEvent>,
}

/// LINE webhook event
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    /// Event type ("message", "postback", "follow", ...)
    #[serde(rename = "type")]
    pub event_type: String,
    /// Token for replying to this event
    #[serde(rename = "replyToken")]
    pub reply_token: Option<String>,
    /// Source of the event
    pub source: EventSource,
    /// Message object (message events only)
    pub message: Option<EventMessage>,
    /// Postback object (postback events only)
    pub postback: Option<Postback>,
    /// Time of the event in milliseconds
    pub timestamp: i64,
    /// Channel state: "active" or "standby"
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Webhook event ID (for deduplication)
    #[serde(rename = "webhookEventId")]
    pub webhook_event_id: Option<String>,
    /// Delivery context for redelivery handling
    #[serde(rename = "deliveryContext")]
    pub delivery_context: Option<DeliveryContext>,
}

fn default_mode() -> String {
    "active".to_string()
}

/// Event source
#[derive(Debug, Deserialize)]
pub struct EventSource {
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    #[serde(rename = "groupId")]
    pub group_id: Option<String>,
    #[serde(rename = "roomId")]
    pub room_id: Option<String>,
}

/// Event message
#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub id: String,
    pub text: Option<String>,
}

/// Postback payload
#[derive(Debug, Deserialize)]
pub struct Postback {
    pub data: String,
}

/// Delivery context for webhook events
#[derive(Debug, Deserialize)]
pub struct DeliveryContext {
    #[serde(rename = "isRedelivery")]
    pub is_redelivery: bool,
}
