//! Pharmacist bot webhook handler
//!
//! POST /pharmacist/line/webhook. Same shape as the store handler:
//! signature first, then parse, then dispatch; processing errors answer
//! 200 so the provider does not redeliver.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};

use shared::parse::{parse_pharmacist_registration, parse_pharmacist_response, PharmacistResponseKind};
use shared::validation::validate_phone;

use crate::error::AppResult;
use crate::handlers::WebhookResponse;
use crate::services::line::{LineMessage, WebhookEvent, WebhookRequest};
use crate::services::notification::{application_ack_text, declination_ack_text, details_text};
use crate::AppState;

/// Parsed pharmacist postback data. Both the prefixed (`pharmacist_apply:`)
/// and bare (`apply:`) forms are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PharmacistPostback {
    Apply(String),
    Decline(String),
    Details(String),
    Unknown(String),
}

impl PharmacistPostback {
    pub fn parse(data: &str) -> Self {
        for (prefixes, build) in [
            (
                ["pharmacist_apply:", "apply:"],
                PharmacistPostback::Apply as fn(String) -> Self,
            ),
            (
                ["pharmacist_decline:", "decline:"],
                PharmacistPostback::Decline as fn(String) -> Self,
            ),
            (
                ["pharmacist_details:", "details:"],
                PharmacistPostback::Details as fn(String) -> Self,
            ),
        ] {
            for prefix in prefixes {
                if let Some(request_id) = data.strip_prefix(prefix) {
                    return build(request_id.to_string());
                }
            }
        }
        PharmacistPostback::Unknown(data.to_string())
    }
}

/// Handle LINE webhook events for the pharmacist channel
pub async fn handle_pharmacist_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, (StatusCode, Json<WebhookResponse>)> {
    let signature = headers
        .get("x-line-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if let Err(e) = state.line.verify_signature(signature, &body) {
        tracing::warn!("Pharmacist webhook signature verification failed: {}", e);
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(WebhookResponse {
                success: false,
                message: "Invalid signature".to_string(),
            }),
        ));
    }

    let request: WebhookRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Failed to parse pharmacist webhook: {}", e);
            return Err((
                StatusCode::BAD_REQUEST,
                Json(WebhookResponse {
                    success: false,
                    message: format!("Invalid request body: {}", e),
                }),
            ));
        }
    };

    for event in &request.events {
        if event.mode == "standby" {
            tracing::debug!("Skipping pharmacist event in standby mode");
            continue;
        }
        if let Some(ctx) = &event.delivery_context {
            if ctx.is_redelivery {
                tracing::info!(
                    "Processing redelivered pharmacist event: {:?}",
                    event.webhook_event_id
                );
            }
        }

        if let Err(e) = dispatch_event(&state, event).await {
            tracing::error!("Failed to process pharmacist event: {}", e);
            if let Some(token) = &event.reply_token {
                let _ = state
                    .line
                    .reply_message(
                        token,
                        vec![LineMessage::text("エラーが発生しました。もう一度お試しください。")],
                    )
                    .await;
            }
        }
    }

    Ok(Json(WebhookResponse {
        success: true,
        message: "Webhook processed successfully".to_string(),
    }))
}

async fn dispatch_event(state: &AppState, event: &WebhookEvent) -> AppResult<()> {
    let Some(user_id) = event.source.user_id.as_deref() else {
        tracing::debug!("Pharmacist event without user source, skipping");
        return Ok(());
    };
    let reply_token = event.reply_token.as_deref();

    match event.event_type.as_str() {
        "follow" => {
            tracing::info!("New pharmacist user followed: {}", user_id);
            if let Some(token) = reply_token {
                state
                    .line
                    .reply_message(token, vec![LineMessage::text(guide_text())])
                    .await?;
            }
        }
        "message" => {
            let text = event
                .message
                .as_ref()
                .filter(|m| m.message_type == "text")
                .and_then(|m| m.text.as_deref());
            if let (Some(text), Some(token)) = (text, reply_token) {
                tracing::info!(
                    "Received text message from pharmacist user {}: {}",
                    user_id,
                    text
                );
                handle_text(state, token, user_id, text).await?;
            }
        }
        "postback" => {
            let data = event.postback.as_ref().map(|p| p.data.as_str());
            if let (Some(data), Some(token)) = (data, reply_token) {
                tracing::info!("Received pharmacist postback from {}: {}", user_id, data);
                handle_postback(state, token, user_id, PharmacistPostback::parse(data)).await?;
            }
        }
        other => {
            tracing::debug!("Ignoring pharmacist event type: {}", other);
        }
    }
    Ok(())
}

async fn handle_text(
    state: &AppState,
    reply_token: &str,
    user_id: &str,
    text: &str,
) -> AppResult<()> {
    // Registration messages carry a comma: "名前,電話番号"
    if text.contains(',') || text.contains('、') {
        return handle_registration(state, reply_token, user_id, text).await;
    }

    // Free-text answers to a request cannot be matched to one; point the
    // pharmacist back at the buttons on the notification.
    if let Some(response) = parse_pharmacist_response(text) {
        let reply = match response.kind {
            PharmacistResponseKind::Accepted | PharmacistResponseKind::Conditional => {
                "ご回答ありがとうございます。\n\
                 応募は通知メッセージの「✅ 応募する」ボタンからお願いします。"
            }
            PharmacistResponseKind::Declined => {
                "ご回答ありがとうございます。\n\
                 辞退は通知メッセージの「❌ 辞退する」ボタンからお願いします。"
            }
        };
        return state
            .line
            .reply_message(reply_token, vec![LineMessage::text(reply)])
            .await;
    }

    state
        .line
        .reply_message(reply_token, vec![LineMessage::text(guide_text())])
        .await
}

async fn handle_registration(
    state: &AppState,
    reply_token: &str,
    user_id: &str,
    text: &str,
) -> AppResult<()> {
    let Some(reg) = parse_pharmacist_registration(text) else {
        return state
            .line
            .reply_message(
                reply_token,
                vec![LineMessage::text(
                    "登録の形式が正しくありません。\n例: 田中薬剤師,090-1234-5678",
                )],
            )
            .await;
    };

    if let Err(e) = validate_phone(&reg.phone) {
        tracing::warn!("Pharmacist registration with invalid phone: {}", e);
        return state
            .line
            .reply_message(
                reply_token,
                vec![LineMessage::text(format!(
                    "{}さんの登録に失敗しました。名前・電話番号が正しいかご確認ください。",
                    reg.name
                ))],
            )
            .await;
    }

    match state
        .sheets
        .register_pharmacist_user_id(&reg.name, &reg.phone, user_id)
        .await
    {
        Ok(()) => {
            state
                .line
                .reply_message(
                    reply_token,
                    vec![LineMessage::text(format!(
                        "{}さんのLINE IDを自動登録しました。今後はBotから通知が届きます。",
                        reg.name
                    ))],
                )
                .await
        }
        Err(e) => {
            tracing::error!("Pharmacist registration failed: {}", e);
            state
                .line
                .reply_message(
                    reply_token,
                    vec![LineMessage::text(format!(
                        "{}さんの登録に失敗しました。名前・電話番号が正しいかご確認ください。",
                        reg.name
                    ))],
                )
                .await
        }
    }
}

async fn handle_postback(
    state: &AppState,
    reply_token: &str,
    user_id: &str,
    postback: PharmacistPostback,
) -> AppResult<()> {
    match postback {
        PharmacistPostback::Apply(request_id) => {
            tracing::info!(
                "Pharmacist apply button clicked: user_id={}, request_id={}",
                user_id,
                request_id
            );
            let ack = state.schedule.record_application(&request_id, user_id).await?;
            state
                .line
                .reply_message(
                    reply_token,
                    vec![LineMessage::text(application_ack_text(
                        ack.request.as_ref(),
                        &request_id,
                    ))],
                )
                .await
        }
        PharmacistPostback::Decline(request_id) => {
            tracing::info!(
                "Pharmacist decline button clicked: user_id={}, request_id={}",
                user_id,
                request_id
            );
            state
                .line
                .reply_message(
                    reply_token,
                    vec![LineMessage::text(declination_ack_text(&request_id))],
                )
                .await
        }
        PharmacistPostback::Details(request_id) => {
            tracing::info!(
                "Pharmacist details button clicked: user_id={}, request_id={}",
                user_id,
                request_id
            );
            let request = state.requests.get_request(&request_id).await?;
            state
                .line
                .reply_message(
                    reply_token,
                    vec![LineMessage::text(details_text(request.as_ref(), &request_id))],
                )
                .await
        }
        PharmacistPostback::Unknown(data) => {
            tracing::warn!("Unknown pharmacist postback data: {}", data);
            state
                .line
                .reply_message(reply_token, vec![LineMessage::text("不明なボタン操作です。")])
                .await
        }
    }
}

fn guide_text() -> &'static str {
    "🏥 薬局シフト管理Botへようこそ！\n\n\
     このBotは薬局の勤務シフト管理を効率化します。\n\n\
     📋 利用方法を選択してください：\n\n\
     🏪 【店舗の方】\n\
     • 店舗登録がお済みでない方\n\
     → 「店舗番号」＋「店舗名」を送信\n\
     • 勤務依頼の送信\n\
     →「勤務依頼」と送信\n\n\
     💊 【薬剤師の方】\n\
     • 登録がお済みでない方\n\
     → 「お名前」＋「電話番号」を送信\n\
     ・店舗からシフト依頼が届くまでお待ちください！\n\n\
     どちらを選択されますか？\n\
     登録は簡単で、すぐに利用開始できます！"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_postback_prefixed_forms() {
        assert_eq!(
            PharmacistPostback::parse("pharmacist_apply:req-1"),
            PharmacistPostback::Apply("req-1".to_string())
        );
        assert_eq!(
            PharmacistPostback::parse("pharmacist_decline:req-1"),
            PharmacistPostback::Decline("req-1".to_string())
        );
        assert_eq!(
            PharmacistPostback::parse("pharmacist_details:req-1"),
            PharmacistPostback::Details("req-1".to_string())
        );
    }

    #[test]
    fn test_parse_postback_bare_forms() {
        assert_eq!(
            PharmacistPostback::parse("apply:req-1"),
            PharmacistPostback::Apply("req-1".to_string())
        );
        assert_eq!(
            PharmacistPostback::parse("decline:req-1"),
            PharmacistPostback::Decline("req-1".to_string())
        );
        assert_eq!(
            PharmacistPostback::parse("details:req-1"),
            PharmacistPostback::Details("req-1".to_string())
        );
    }

    #[test]
    fn test_parse_postback_unknown() {
        assert!(matches!(
            PharmacistPostback::parse("select_date"),
            PharmacistPostback::Unknown(_)
        ));
        assert!(matches!(
            PharmacistPostback::parse(""),
            PharmacistPostback::Unknown(_)
        ));
    }

    #[test]
    fn test_ack_texts_used_for_replies() {
        let ack = application_ack_text(None, "req-1");
        assert!(ack.contains("応募を受け付けました"));
        assert!(ack.contains("req-1"));

        let decline = declination_ack_text("req-1");
        assert!(decline.contains("辞退を受け付けました"));

        let details = details_text(None, "req-1");
        assert!(details.contains("依頼詳細の取得に失敗しました"));
    }
}
