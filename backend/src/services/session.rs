//! Redis-backed runtime state
//!
//! Two small stores share one connection manager:
//! - `RequestStore` keeps shift-request records, applicant sets, the
//!   fill claim, notification history, and reminder counters.
//! - `SessionStore` keeps the store-side guided request draft
//!   (date → time → head count) between webhook events.
//!
//! The fill claim is a `SET NX EX` key: the first confirmation for a
//! request wins it and every later confirmation observes the claim, which
//! is what makes the open→filled transition happen exactly once across
//! concurrent webhook deliveries.

use chrono::{Local, NaiveDate};
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};

use shared::models::{ShiftRequest, TimeSlot};

use crate::error::{AppError, AppResult};

/// TTL for request records, applicant sets, and notification history
const REQUEST_TTL_SECS: u64 = 86_400;
/// TTL for store-side drafts
const DRAFT_TTL_SECS: u64 = 3_600;
/// TTL for reminder counters
const REMINDER_TTL_SECS: u64 = 3_600;
/// Reminders stop after this many per request
pub const MAX_REMINDERS: i64 = 2;

/// Open a shared Redis connection manager
pub async fn connect(url: &str) -> AppResult<ConnectionManager> {
    let client = redis::Client::open(url)?;
    let manager = client.get_connection_manager().await?;
    Ok(manager)
}

fn request_key(request_id: &str) -> String {
    format!("request:{}", request_id)
}

fn applicants_key(request_id: &str) -> String {
    format!("request:{}:applicants", request_id)
}

fn fill_claim_key(request_id: &str) -> String {
    format!("request:{}:filled", request_id)
}

fn notification_key(kind: &str, request_id: &str) -> String {
    format!("notification:{}:{}", kind, request_id)
}

fn reminder_key(request_id: &str) -> String {
    format!("reminder:shift_request:{}", request_id)
}

fn draft_key(user_id: &str) -> String {
    format!("session:store:{}", user_id)
}

// ============================================================================
// Request records
// ============================================================================

/// Shift-request records and settlement state
#[derive(Clone)]
pub struct RequestStore {
    conn: ConnectionManager,
}

impl RequestStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Persist a request record (24 h TTL)
    pub async fn save_request(&self, request: &ShiftRequest) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(request)
            .map_err(|e| AppError::Internal(e.into()))?;
        redis::cmd("SET")
            .arg(request_key(&request.id))
            .arg(payload)
            .arg("EX")
            .arg(REQUEST_TTL_SECS)
            .query_async::<_, ()>(&mut conn)
            .await?;
        tracing::info!("Request saved: {}", request.id);
        Ok(())
    }

    /// Load a request record
    pub async fn get_request(&self, request_id: &str) -> AppResult<Option<ShiftRequest>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(request_key(request_id))
            .query_async(&mut conn)
            .await?;
        match raw {
            Some(json) => {
                let request = serde_json::from_str(&json)
                    .map_err(|e| AppError::Internal(e.into()))?;
                Ok(Some(request))
            }
            None => {
                tracing::warn!("Request not found: {}", request_id);
                Ok(None)
            }
        }
    }

    /// Record a pharmacist as an applicant for a request
    pub async fn add_applicant(&self, request_id: &str, user_id: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SADD")
            .arg(applicants_key(request_id))
            .arg(user_id)
            .query_async::<_, ()>(&mut conn)
            .await?;
        redis::cmd("EXPIRE")
            .arg(applicants_key(request_id))
            .arg(REQUEST_TTL_SECS)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    /// All applicants recorded for a request
    pub async fn applicants(&self, request_id: &str) -> AppResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(applicants_key(request_id))
            .query_async(&mut conn)
            .await?;
        Ok(members)
    }

    /// Claim the fill for a request. `SET NX EX` makes the first caller
    /// win; everyone after sees `false` and must treat the request as
    /// already filled.
    pub async fn try_mark_filled(&self, request_id: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let resp: Option<String> = redis::cmd("SET")
            .arg(fill_claim_key(request_id))
            .arg(Local::now().to_rfc3339())
            .arg("NX")
            .arg("EX")
            .arg(REQUEST_TTL_SECS)
            .query_async(&mut conn)
            .await?;
        Ok(resp.is_some())
    }

    /// Record notification history for a request (24 h TTL)
    pub async fn record_notification(
        &self,
        kind: &str,
        request_id: &str,
        payload: &serde_json::Value,
    ) -> AppResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(notification_key(kind, request_id))
            .arg(payload.to_string())
            .arg("EX")
            .arg(REQUEST_TTL_SECS)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Bump the reminder counter for a request. Returns `false` once the
    /// cap is reached, so callers skip further reminders.
    pub async fn try_count_reminder(&self, request_id: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let current: Option<i64> = redis::cmd("GET")
            .arg(reminder_key(request_id))
            .query_async(&mut conn)
            .await?;
        if current.unwrap_or(0) >= MAX_REMINDERS {
            tracing::info!("Maximum reminder count reached for request: {}", request_id);
            return Ok(false);
        }
        redis::cmd("INCR")
            .arg(reminder_key(request_id))
            .query_async::<_, ()>(&mut conn)
            .await?;
        redis::cmd("EXPIRE")
            .arg(reminder_key(request_id))
            .arg(REMINDER_TTL_SECS)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(true)
    }
}

// ============================================================================
// Store-side request drafts
// ============================================================================

/// Guided-form draft accumulated across store postback events
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreDraft {
    pub date: Option<NaiveDate>,
    pub time_slot: Option<TimeSlot>,
    pub required_count: Option<u8>,
}

impl StoreDraft {
    /// A draft is submittable once date and time slot are chosen; head
    /// count falls back to one.
    pub fn is_complete(&self) -> bool {
        self.date.is_some() && self.time_slot.is_some()
    }

    pub fn date_text(&self) -> String {
        self.date
            .map(|d| d.format("%Y/%m/%d").to_string())
            .unwrap_or_else(|| "未選択".to_string())
    }

    pub fn time_text(&self) -> String {
        self.time_slot
            .map(|t| t.label().to_string())
            .unwrap_or_else(|| "未選択".to_string())
    }

    pub fn count_text(&self) -> String {
        self.required_count
            .map(|c| format!("{}名", c))
            .unwrap_or_else(|| "未選択".to_string())
    }
}

/// Store-side draft sessions
#[derive(Clone)]
pub struct SessionStore {
    conn: ConnectionManager,
}

impl SessionStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Load the draft for a store user, `None` when no flow is in progress
    pub async fn get_draft(&self, user_id: &str) -> AppResult<Option<StoreDraft>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(draft_key(user_id))
            .query_async(&mut conn)
            .await?;
        match raw {
            Some(json) => {
                let draft = serde_json::from_str(&json)
                    .map_err(|e| AppError::Internal(e.into()))?;
                Ok(Some(draft))
            }
            None => Ok(None),
        }
    }

    pub async fn save_draft(&self, user_id: &str, draft: &StoreDraft) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(draft)
            .map_err(|e| AppError::Internal(e.into()))?;
        redis::cmd("SET")
            .arg(draft_key(user_id))
            .arg(payload)
            .arg("EX")
            .arg(DRAFT_TTL_SECS)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn clear_draft(&self, user_id: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(draft_key(user_id))
            .query_async::<_, ()>(&mut conn)
            .await?;
        tracing::info!("Cleared draft for store user {}", user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(request_key("req-1"), "request:req-1");
        assert_eq!(applicants_key("req-1"), "request:req-1:applicants");
        assert_eq!(fill_claim_key("req-1"), "request:req-1:filled");
        assert_eq!(
            notification_key("shift_request", "req-1"),
            "notification:shift_request:req-1"
        );
        assert_eq!(reminder_key("req-1"), "reminder:shift_request:req-1");
        assert_eq!(draft_key("U123"), "session:store:U123");
    }

    #[test]
    fn test_draft_completeness() {
        let mut draft = StoreDraft::default();
        assert!(!draft.is_complete());

        draft.date = NaiveDate::from_ymd_opt(2025, 7, 15);
        assert!(!draft.is_complete());

        draft.time_slot = Some(TimeSlot::Morning);
        assert!(draft.is_complete());
    }

    #[test]
    fn test_draft_serde_roundtrip() {
        let draft = StoreDraft {
            date: NaiveDate::from_ymd_opt(2025, 7, 15),
            time_slot: Some(TimeSlot::Afternoon),
            required_count: Some(2),
        };
        let json = serde_json::to_string(&draft).unwrap();
        let back: StoreDraft = serde_json::from_str(&json).unwrap();
        assert_eq!(back, draft);
    }

    #[test]
    fn test_draft_texts() {
        let draft = StoreDraft {
            date: NaiveDate::from_ymd_opt(2025, 7, 15),
            time_slot: Some(TimeSlot::Evening),
            required_count: Some(3),
        };
        assert_eq!(draft.date_text(), "2025/07/15");
        assert_eq!(draft.time_text(), "夜間 (17:00-21:00)");
        assert_eq!(draft.count_text(), "3名");

        let empty = StoreDraft::default();
        assert_eq!(empty.date_text(), "未選択");
        assert_eq!(empty.time_text(), "未選択");
        assert_eq!(empty.count_text(), "未選択");
    }
}
