//! Notification services for shift coordination
//!
//! `PharmacistNotifier` and `StoreNotifier` each construct their own
//! `LineClient` from the role-keyed channel lookup, so the pharmacist
//! channel credential can never be used for store traffic or vice versa.
//! Delivery failures are collected per recipient and surfaced to the
//! caller; nothing here retries.

use shared::models::{Pharmacist, ShiftRequest};

use crate::config::{BotRole, Config};
use crate::error::AppResult;
use crate::services::line::{LineClient, LineMessage, TemplateAction};

/// Why a pharmacist record was not sent a push message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientClass {
    /// Valid LINE user ID, send the notification
    Deliverable,
    /// No LINE user ID on record
    MissingId,
    /// LINE user ID present but malformed
    InvalidId,
    /// Development-environment placeholder ID
    TestId,
}

/// Decide whether a pharmacist record can receive a push message
pub fn classify_recipient(pharmacist: &Pharmacist, development: bool) -> RecipientClass {
    if pharmacist.line_user_id.is_empty() {
        return RecipientClass::MissingId;
    }
    if development && pharmacist.line_user_id.starts_with("U1234567890") {
        return RecipientClass::TestId;
    }
    if !pharmacist.has_valid_line_id() {
        return RecipientClass::InvalidId;
    }
    RecipientClass::Deliverable
}

/// A recipient the broadcast could not reach
#[derive(Debug, Clone)]
pub struct NotificationFailure {
    pub name: String,
    pub reason: String,
}

/// Outcome of a broadcast to a set of pharmacists
#[derive(Debug, Clone, Default)]
pub struct NotificationReport {
    pub total: usize,
    pub notified: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<NotificationFailure>,
}

impl NotificationReport {
    pub fn any_notified(&self) -> bool {
        self.notified > 0
    }

    fn record_failure(&mut self, name: &str, reason: impl Into<String>) {
        self.failed += 1;
        self.failures.push(NotificationFailure {
            name: name.to_string(),
            reason: reason.into(),
        });
    }
}

// ============================================================================
// Pharmacist-facing notifications
// ============================================================================

/// Sends shift-request notifications and acknowledgments to pharmacists
/// over the pharmacist channel.
#[derive(Clone)]
pub struct PharmacistNotifier {
    line: LineClient,
    development: bool,
}

impl PharmacistNotifier {
    /// Bind the pharmacist channel credential at construction
    pub fn new(config: &Config) -> Self {
        Self {
            line: LineClient::new(BotRole::Pharmacist, config.channel(BotRole::Pharmacist)),
            development: config.is_development(),
        }
    }

    /// Role of the bound channel (always the pharmacist channel)
    pub fn channel_role(&self) -> BotRole {
        self.line.role()
    }

    /// Broadcast a shift request to the given pharmacists.
    ///
    /// Records with missing, malformed, or development-placeholder LINE
    /// user IDs are skipped with a log line. Delivery failures are
    /// collected per pharmacist; the broadcast continues through the list.
    pub async fn notify_pharmacists_of_request(
        &self,
        pharmacists: &[Pharmacist],
        request: &ShiftRequest,
    ) -> NotificationReport {
        let mut report = NotificationReport {
            total: pharmacists.len(),
            ..Default::default()
        };

        let details = request_details(request);

        for pharmacist in pharmacists {
            match classify_recipient(pharmacist, self.development) {
                RecipientClass::MissingId => {
                    tracing::info!(
                        "Skipping notification for pharmacist {} (no LINE user ID)",
                        pharmacist.name
                    );
                    report.skipped += 1;
                }
                RecipientClass::InvalidId => {
                    tracing::info!(
                        "Skipping notification for pharmacist {} (invalid LINE user ID format)",
                        pharmacist.name
                    );
                    report.skipped += 1;
                }
                RecipientClass::TestId => {
                    tracing::info!(
                        "Skipping notification for pharmacist {} (test user ID in development)",
                        pharmacist.name
                    );
                    report.skipped += 1;
                }
                RecipientClass::Deliverable => {
                    let messages = vec![
                        LineMessage::text(details.clone()),
                        LineMessage::buttons(
                            "勤務依頼への応募",
                            "勤務依頼が届いています",
                            format!("{}さん\n新しい勤務依頼があります", pharmacist.name),
                            vec![
                                TemplateAction::postback(
                                    "✅ 応募する",
                                    format!("pharmacist_apply:{}", request.id),
                                ),
                                TemplateAction::postback(
                                    "❌ 辞退する",
                                    format!("pharmacist_decline:{}", request.id),
                                ),
                                TemplateAction::postback(
                                    "詳細を確認",
                                    format!("pharmacist_details:{}", request.id),
                                ),
                            ],
                        ),
                    ];

                    match self
                        .line
                        .push_message(&pharmacist.line_user_id, messages)
                        .await
                    {
                        Ok(()) => {
                            tracing::info!(
                                "Successfully notified pharmacist: {}",
                                pharmacist.name
                            );
                            report.notified += 1;
                        }
                        Err(e) => {
                            tracing::error!(
                                "Failed to notify pharmacist {}: {}",
                                pharmacist.name,
                                e
                            );
                            report.record_failure(&pharmacist.name, e.to_string());
                        }
                    }
                }
            }
        }

        tracing::info!(
            "Notification completed: total={} notified={} skipped={} failed={}",
            report.total,
            report.notified,
            report.skipped,
            report.failed
        );
        report
    }

    /// Tell the confirmed pharmacist the shift is theirs
    pub async fn send_shift_confirmed(
        &self,
        user_id: &str,
        request: &ShiftRequest,
    ) -> AppResult<()> {
        let text = format!(
            "【勤務確定】\n\
             {} {} {}\n\
             勤務が確定しました。\n\
             よろしくお願いします。",
            request.date.format("%m/%d"),
            request.time_slot.label(),
            request.store_name
        );
        self.line
            .push_message(user_id, vec![LineMessage::text(text)])
            .await
    }

    /// Tell a non-selected applicant the request went to someone else
    pub async fn send_decline_notice(&self, user_id: &str, request_id: &str) -> AppResult<()> {
        let text = format!(
            "❌ 勤務依頼の辞退通知\n\n\
             依頼ID: {}\n\
             他の薬剤師が確定しました。\n\
             ご応募ありがとうございました。\n\
             またの機会をお待ちしております。",
            request_id
        );
        self.line
            .push_message(user_id, vec![LineMessage::text(text)])
            .await
    }

    /// Remind an unresponsive pharmacist about an open request
    pub async fn send_reminder(&self, user_id: &str, request: &ShiftRequest) -> AppResult<()> {
        let text = format!(
            "【勤務依頼リマインダー】\n\
             {} {} {}\n\
             まだご回答いただいていません。\n\
             ご確認をお願いします。",
            request.date.format("%m/%d"),
            request.time_slot.label(),
            request.store_name
        );
        self.line
            .push_message(user_id, vec![LineMessage::text(text)])
            .await
    }
}

/// Application acknowledgment text (also used as the webhook reply)
pub fn application_ack_text(request: Option<&ShiftRequest>, request_id: &str) -> String {
    match request {
        Some(req) => format!(
            "✅ 応募を受け付けました！\n\n\
             🏪 店舗: {}\n\
             📅 日付: {}\n\
             ⏰ 時間帯: {}\n\n\
             店舗からの確定連絡をお待ちください。\n\
             確定次第、詳細をお知らせいたします。",
            req.store_name,
            req.date.format("%Y/%m/%d"),
            req.time_slot.label()
        ),
        None => format!(
            "✅ 応募を受け付けました！\n\
             依頼ID: {}\n\n\
             店舗からの確定連絡をお待ちください。\n\
             確定次第、詳細をお知らせいたします。",
            request_id
        ),
    }
}

/// Declination acknowledgment text (also used as the webhook reply)
pub fn declination_ack_text(request_id: &str) -> String {
    format!(
        "❌ 辞退を受け付けました。\n\
         依頼ID: {}\n\n\
         ご連絡ありがとうございました。\n\
         またの機会をお待ちしております。",
        request_id
    )
}

/// Request detail text (also used as the webhook reply)
pub fn details_text(request: Option<&ShiftRequest>, request_id: &str) -> String {
    match request {
        Some(req) => format!(
            "📋 勤務依頼の詳細\n\n\
             🏪 店舗: {}\n\
             📅 日付: {}\n\
             ⏰ 時間帯: {}\n\
             👥 必要人数: {}名\n\n\
             依頼ID: {}",
            req.store_name,
            req.date.format("%Y/%m/%d"),
            req.time_slot.label(),
            req.required_count,
            req.id
        ),
        None => format!(
            "❌ 依頼詳細の取得に失敗しました\n\n\
             依頼ID: {}\n\
             依頼内容が見つかりませんでした。\n\
             店舗にお問い合わせください。",
            request_id
        ),
    }
}

/// Detail text pushed with every shift-request broadcast
pub fn request_details(request: &ShiftRequest) -> String {
    format!(
        "📋 勤務依頼の詳細\n\
         ━━━━━━\n\
         🏪 店舗: {}\n\
         📅 日付: {}\n\
         ⏰ 時間帯: {}\n\
         👥 必要人数: {}名\n\
         ━━━━━━\n\
         この依頼に応募しますか？",
        request.store_name,
        request.date.format("%Y/%m/%d"),
        request.time_slot.label(),
        request.required_count
    )
}

// ============================================================================
// Store-facing notifications
// ============================================================================

/// Sends application and settlement notices to stores over the store
/// channel.
#[derive(Clone)]
pub struct StoreNotifier {
    line: LineClient,
}

impl StoreNotifier {
    /// Bind the store channel credential at construction
    pub fn new(config: &Config) -> Self {
        Self {
            line: LineClient::new(BotRole::Store, config.channel(BotRole::Store)),
        }
    }

    /// Role of the bound channel (always the store channel)
    pub fn channel_role(&self) -> BotRole {
        self.line.role()
    }

    /// Tell the store a pharmacist applied, with accept/reject buttons
    pub async fn notify_application(
        &self,
        store_user_id: &str,
        request_id: &str,
        pharmacist_user_id: &str,
        pharmacist_name: &str,
    ) -> AppResult<()> {
        let message = LineMessage::buttons(
            "薬剤師が応募しました！",
            "🎉 薬剤師が応募しました！",
            format!("{}さんが応募しています。\n依頼ID: {}", pharmacist_name, request_id),
            vec![
                TemplateAction::postback(
                    "承諾",
                    format!("pharmacist_confirm_accept:{}:{}", request_id, pharmacist_user_id),
                ),
                TemplateAction::postback(
                    "拒否",
                    format!("pharmacist_confirm_reject:{}:{}", request_id, pharmacist_user_id),
                ),
            ],
        );
        self.line.push_message(store_user_id, vec![message]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use shared::models::{ShiftRequestStatus, TimeSlot};

    fn pharmacist(line_user_id: &str) -> Pharmacist {
        Pharmacist {
            id: "pharm_001".to_string(),
            name: "田中薬剤師".to_string(),
            phone: "090-1234-5678".to_string(),
            line_user_id: line_user_id.to_string(),
            availability: vec![],
            rating: None,
            experience_years: None,
        }
    }

    fn request() -> ShiftRequest {
        let now = Utc::now();
        ShiftRequest {
            id: "store_req_002_20250715_090000".to_string(),
            store_number: "002".to_string(),
            store_name: "サンライズ薬局".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 7, 15).unwrap(),
            time_slot: TimeSlot::Morning,
            required_count: 2,
            notes: None,
            status: ShiftRequestStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_classify_recipient_missing_id() {
        assert_eq!(
            classify_recipient(&pharmacist(""), true),
            RecipientClass::MissingId
        );
    }

    #[test]
    fn test_classify_recipient_invalid_format() {
        assert_eq!(
            classify_recipient(&pharmacist("U123"), false),
            RecipientClass::InvalidId
        );
        assert_eq!(
            classify_recipient(&pharmacist("pharmacist_42"), false),
            RecipientClass::InvalidId
        );
    }

    #[test]
    fn test_classify_recipient_test_id_development_only() {
        let test_id = format!("U1234567890{}", "a".repeat(22));
        assert_eq!(
            classify_recipient(&pharmacist(&test_id), true),
            RecipientClass::TestId
        );
        // In production the same ID is treated as a normal deliverable ID.
        assert_eq!(
            classify_recipient(&pharmacist(&test_id), false),
            RecipientClass::Deliverable
        );
    }

    #[test]
    fn test_classify_recipient_deliverable() {
        let id = format!("U{}", "0af7c3".repeat(5) + "ab");
        assert_eq!(id.len(), 33);
        assert_eq!(
            classify_recipient(&pharmacist(&id), true),
            RecipientClass::Deliverable
        );
    }

    #[test]
    fn test_request_details_contents() {
        let details = request_details(&request());
        assert!(details.contains("サンライズ薬局"));
        assert!(details.contains("2025/07/15"));
        assert!(details.contains("午前 (9:00-13:00)"));
        assert!(details.contains("2名"));
    }

    #[test]
    fn test_report_aggregation() {
        let mut report = NotificationReport {
            total: 3,
            ..Default::default()
        };
        report.notified += 1;
        report.skipped += 1;
        report.record_failure("佐藤薬剤師", "delivery rejected");

        assert!(report.any_notified());
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].name, "佐藤薬剤師");
        assert_eq!(report.notified + report.skipped + report.failed, report.total);
    }
}
