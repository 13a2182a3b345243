//! Store bot webhook handler
//!
//! POST /store/webhook. Signature verification happens before anything
//! else; a request that fails it never reaches a parser, the sheet, or a
//! notifier. Event processing errors are logged and answered 200 so the
//! provider does not redeliver.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{Duration, Local, NaiveDate};

use shared::models::TimeSlot;
use shared::parse::{parse_date_flexible, parse_shift_request, parse_store_registration};
use shared::validation::{validate_store_number, MAX_PHARMACISTS_PER_SHIFT};

use crate::error::{AppError, AppResult};
use crate::handlers::WebhookResponse;
use crate::services::line::{LineMessage, TemplateAction, WebhookEvent, WebhookRequest};
use crate::services::session::StoreDraft;
use crate::AppState;

// ============================================================================
// Message classification
// ============================================================================

/// What a store's text message asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCommand {
    /// Free-text shift request (or a request to open the guided form)
    ShiftRequest(String),
    /// `店舗登録 <number> <name>`
    Registration(String),
    /// Confirm the drafted request
    ConfirmYes,
    /// Discard the drafted request
    ConfirmNo,
    /// Cancel a published request by ID
    CancelRequest(String),
    /// Remind unresponsive pharmacists about a published request
    Remind(String),
    /// Anything else
    Other,
}

/// Classify a store text message into a command
pub fn classify_store_message(text: &str) -> StoreCommand {
    let trimmed = text.trim();

    if trimmed.starts_with("店舗登録") {
        return StoreCommand::Registration(trimmed.to_string());
    }
    if let Some(request_id) = trimmed
        .split_whitespace()
        .find(|t| t.starts_with("store_req_"))
    {
        if trimmed.contains("キャンセル") || trimmed.contains("取り消し") {
            return StoreCommand::CancelRequest(request_id.to_string());
        }
        if trimmed.contains("リマインド") || trimmed.contains("催促") {
            return StoreCommand::Remind(request_id.to_string());
        }
    }
    if ["はい", "確認", "確定"].contains(&trimmed) {
        return StoreCommand::ConfirmYes;
    }
    if ["いいえ", "キャンセル", "取り消し"].contains(&trimmed) {
        return StoreCommand::ConfirmNo;
    }
    if trimmed.contains("勤務依頼") || trimmed.contains("シフト") {
        return StoreCommand::ShiftRequest(trimmed.to_string());
    }
    StoreCommand::Other
}

/// Date options offered in the guided form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateChoice {
    Today,
    Tomorrow,
    DayAfterTomorrow,
    Custom,
}

/// Parsed store postback data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorePostback {
    SelectDate,
    SelectTime,
    SelectCount,
    DateChoice(DateChoice),
    TimeChoice(TimeSlot),
    CountChoice(u8),
    ConfirmAccept { request_id: String, user_id: String },
    ConfirmReject { request_id: String, user_id: String },
    Unknown(String),
}

impl StorePostback {
    pub fn parse(data: &str) -> Self {
        match data {
            "select_date" => return StorePostback::SelectDate,
            "select_time" => return StorePostback::SelectTime,
            "select_count" => return StorePostback::SelectCount,
            "date_today" => return StorePostback::DateChoice(DateChoice::Today),
            "date_tomorrow" => return StorePostback::DateChoice(DateChoice::Tomorrow),
            "date_day_after_tomorrow" => {
                return StorePostback::DateChoice(DateChoice::DayAfterTomorrow)
            }
            "date_custom" => return StorePostback::DateChoice(DateChoice::Custom),
            // Requests above the per-shift maximum are clamped.
            "count_4_plus" => return StorePostback::CountChoice(MAX_PHARMACISTS_PER_SHIFT),
            _ => {}
        }
        if let Some(slot) = TimeSlot::from_postback_code(data) {
            return StorePostback::TimeChoice(slot);
        }
        if let Some(n) = data
            .strip_prefix("count_")
            .and_then(|n| n.parse::<u8>().ok())
        {
            return StorePostback::CountChoice(n.min(MAX_PHARMACISTS_PER_SHIFT));
        }
        if let Some(rest) = data.strip_prefix("pharmacist_confirm_accept:") {
            if let Some((request_id, user_id)) = rest.split_once(':') {
                return StorePostback::ConfirmAccept {
                    request_id: request_id.to_string(),
                    user_id: user_id.to_string(),
                };
            }
        }
        if let Some(rest) = data.strip_prefix("pharmacist_confirm_reject:") {
            if let Some((request_id, user_id)) = rest.split_once(':') {
                return StorePostback::ConfirmReject {
                    request_id: request_id.to_string(),
                    user_id: user_id.to_string(),
                };
            }
        }
        StorePostback::Unknown(data.to_string())
    }
}

// ============================================================================
// Handler
// ============================================================================

/// Handle LINE webhook events for the store channel
pub async fn handle_store_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, (StatusCode, Json<WebhookResponse>)> {
    let signature = headers
        .get("x-line-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if let Err(e) = state.line.verify_signature(signature, &body) {
        tracing::warn!("Store webhook signature verification failed: {}", e);
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
            tracing::error!("Failed to parse store webhook: {}", e);
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
            tracing::debug!("Skipping store event in standby mode");
            continue;
        }
        if let Some(ctx) = &event.delivery_context {
            if ctx.is_redelivery {
                tracing::info!("Processing redelivered store event: {:?}", event.webhook_event_id);
            }
        }

        if let Err(e) = dispatch_event(&state, event).await {
            tracing::error!("Failed to process store event: {}", e);
            if let Some(token) = &event.reply_token {
                let _ = state
                    .line
                    .reply_message(
                        token,
                        vec![LineMessage::text("申し訳ございません。エラーが発生しました。")],
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
        tracing::debug!("Store event without user source, skipping");
        return Ok(());
    };
    let reply_token = event.reply_token.as_deref();

    match event.event_type.as_str() {
        "follow" => {
            if let Some(token) = reply_token {
                handle_follow(state, token, user_id).await?;
            }
        }
        "message" => {
            let text = event
                .message
                .as_ref()
                .filter(|m| m.message_type == "text")
                .and_then(|m| m.text.as_deref());
            if let (Some(text), Some(token)) = (text, reply_token) {
                tracing::info!("Received text message from store user {}: {}", user_id, text);
                handle_text(state, token, user_id, text).await?;
            }
        }
        "postback" => {
            let data = event.postback.as_ref().map(|p| p.data.as_str());
            if let (Some(data), Some(token)) = (data, reply_token) {
                tracing::info!("Received postback from store user {}: {}", user_id, data);
                handle_postback(state, token, user_id, StorePostback::parse(data)).await?;
            }
        }
        other => {
            tracing::debug!("Ignoring store event type: {}", other);
        }
    }
    Ok(())
}

async fn handle_follow(state: &AppState, reply_token: &str, user_id: &str) -> AppResult<()> {
    tracing::info!("New store user followed: {}", user_id);

    let greeting = match state.line.get_profile(user_id).await {
        Ok(profile) => format!("🏪 {}さん、薬局シフト管理Bot（店舗版）へようこそ！", profile.display_name),
        Err(e) => {
            tracing::warn!("Failed to fetch store user profile: {}", e);
            "🏪 薬局シフト管理Bot（店舗版）へようこそ！".to_string()
        }
    };

    let text = format!(
        "{}\n\n\
         このBotは薬局の勤務依頼管理を効率化します。\n\n\
         📋 利用可能な機能：\n\
         • 勤務依頼の送信\n\
         • 薬剤師の自動検索・通知\n\
         • 応募状況の管理\n\n\
         「勤務依頼」と入力して、最初の依頼を送信してください。\n\
         登録は簡単で、すぐに利用開始できます！",
        greeting
    );
    state
        .line
        .reply_message(reply_token, vec![LineMessage::text(text)])
        .await
}

async fn handle_text(
    state: &AppState,
    reply_token: &str,
    user_id: &str,
    text: &str,
) -> AppResult<()> {
    match classify_store_message(text) {
        StoreCommand::ShiftRequest(text) => {
            handle_shift_request_text(state, reply_token, user_id, &text).await
        }
        StoreCommand::Registration(text) => {
            handle_registration(state, reply_token, user_id, &text).await
        }
        StoreCommand::ConfirmYes => handle_confirm_yes(state, reply_token, user_id).await,
        StoreCommand::ConfirmNo => handle_confirm_no(state, reply_token, user_id).await,
        StoreCommand::CancelRequest(request_id) => {
            handle_cancel_request(state, reply_token, &request_id).await
        }
        StoreCommand::Remind(request_id) => {
            handle_remind(state, reply_token, &request_id).await
        }
        StoreCommand::Other => handle_other(state, reply_token, user_id, text).await,
    }
}

async fn handle_shift_request_text(
    state: &AppState,
    reply_token: &str,
    user_id: &str,
    text: &str,
) -> AppResult<()> {
    let Some(parsed) = parse_shift_request(text) else {
        // Not parseable as free text: open the guided form instead.
        return state
            .line
            .reply_message(reply_token, vec![shift_request_form()])
            .await;
    };

    let Some(store) = state.sheets.find_store_by_user_id(user_id).await? else {
        return state
            .line
            .reply_message(
                reply_token,
                vec![LineMessage::text(
                    "店舗情報の取得に失敗しました。\n\
                     「店舗登録 店舗番号 店舗名」の形式で店舗登録をお願いします。",
                )],
            )
            .await;
    };

    let request = match state
        .schedule
        .create_shift_request(
            &store.store,
            parsed.date,
            parsed.time_slot,
            parsed.required_count,
            parsed.notes,
        )
        .await
    {
        Ok(request) => request,
        Err(AppError::Validation(msg)) => {
            return state
                .line
                .reply_message(
                    reply_token,
                    vec![LineMessage::text(format!("依頼内容に誤りがあります: {}", msg))],
                )
                .await;
        }
        Err(e) => return Err(e),
    };

    let report = state.schedule.broadcast(&request).await?;

    let text = if report.any_notified() {
        format!(
            "シフト依頼を受け付けました。\n\
             依頼ID: {}\n\
             日時: {} {}\n\
             人数: {}名\n\
             薬剤師に通知しました。",
            request.id,
            request.date.format("%m/%d"),
            request.time_slot.label(),
            request.required_count
        )
    } else {
        "申し訳ございません。空き薬剤師が見つかりませんでした。".to_string()
    };
    state
        .line
        .reply_message(reply_token, vec![LineMessage::text(text)])
        .await
}

async fn handle_registration(
    state: &AppState,
    reply_token: &str,
    user_id: &str,
    text: &str,
) -> AppResult<()> {
    let Some(reg) = parse_store_registration(text) else {
        return state
            .line
            .reply_message(
                reply_token,
                vec![LineMessage::text(
                    "店舗登録の形式が正しくありません。\n\
                     例: 店舗登録 002 サンライズ薬局",
                )],
            )
            .await;
    };

    if let Err(e) = validate_store_number(&reg.number) {
        return state
            .line
            .reply_message(
                reply_token,
                vec![LineMessage::text(format!("店舗番号が正しくありません: {}", e))],
            )
            .await;
    }

    match state
        .sheets
        .register_store(&reg.number, &reg.name, user_id)
        .await
    {
        Ok(_) => {
            state
                .line
                .reply_message(
                    reply_token,
                    vec![LineMessage::text(format!(
                        "🏪 店舗登録が完了しました！\n\
                         店舗番号: {}\n\
                         店舗名: {}\n\n\
                         「勤務依頼」と入力して依頼を送信できます。",
                        reg.number, reg.name
                    ))],
                )
                .await
        }
        Err(e) => {
            tracing::error!("Store registration failed: {}", e);
            state
                .line
                .reply_message(
                    reply_token,
                    vec![LineMessage::text(
                        "店舗登録に失敗しました。しばらくしてからもう一度お試しください。",
                    )],
                )
                .await
        }
    }
}

async fn handle_confirm_yes(state: &AppState, reply_token: &str, user_id: &str) -> AppResult<()> {
    let draft = state.sessions.get_draft(user_id).await?.unwrap_or_default();
    let (Some(date), Some(time_slot)) = (draft.date, draft.time_slot) else {
        return state
            .line
            .reply_message(
                reply_token,
                vec![LineMessage::text(
                    "依頼内容が見つかりません。最初からやり直してください。",
                )],
            )
            .await;
    };

    let Some(store) = state.sheets.find_store_by_user_id(user_id).await? else {
        return state
            .line
            .reply_message(
                reply_token,
                vec![LineMessage::text(
                    "店舗情報の取得に失敗しました。\n\
                     「店舗登録 店舗番号 店舗名」の形式で店舗登録をお願いします。",
                )],
            )
            .await;
    };

    let required_count = draft.required_count.unwrap_or(1);
    let request = state
        .schedule
        .create_shift_request(&store.store, date, time_slot, required_count, None)
        .await?;
    let report = state.schedule.broadcast(&request).await?;

    state.sessions.clear_draft(user_id).await?;

    let text = if report.any_notified() {
        format!(
            "✅ 依頼を確定しました！\n\
             依頼ID: {}\n\
             日付: {}\n\
             時間帯: {}\n\
             人数: {}名\n\n\
             薬剤師に通知を送信しました。\n\
             応募があったらご連絡いたします。",
            request.id,
            request.date.format("%Y/%m/%d"),
            request.time_slot.label(),
            required_count
        )
    } else {
        format!(
            "⚠️ 依頼を確定しましたが、\n\
             空き薬剤師が見つかりませんでした。\n\
             依頼ID: {}\n\
             別の日時で再度お試しください。",
            request.id
        )
    };
    state
        .line
        .reply_message(reply_token, vec![LineMessage::text(text)])
        .await
}

async fn handle_confirm_no(state: &AppState, reply_token: &str, user_id: &str) -> AppResult<()> {
    state.sessions.clear_draft(user_id).await?;
    state
        .line
        .reply_message(
            reply_token,
            vec![LineMessage::text(
                "依頼をキャンセルしました。\n\
                 再度「勤務依頼」と入力して、最初からやり直してください。",
            )],
        )
        .await
}

async fn handle_cancel_request(
    state: &AppState,
    reply_token: &str,
    request_id: &str,
) -> AppResult<()> {
    match state.schedule.cancel_request(request_id).await {
        Ok(request) => {
            state
                .line
                .reply_message(
                    reply_token,
                    vec![LineMessage::text(format!(
                        "依頼をキャンセルしました。\n依頼ID: {}",
                        request.id
                    ))],
                )
                .await
        }
        Err(AppError::Conflict { .. }) => {
            state
                .line
                .reply_message(
                    reply_token,
                    vec![LineMessage::text(
                        "この依頼は既に確定またはキャンセル済みのため、取り消せません。",
                    )],
                )
                .await
        }
        Err(AppError::NotFound(_)) => {
            state
                .line
                .reply_message(
                    reply_token,
                    vec![LineMessage::text("該当する依頼が見つかりませんでした。")],
                )
                .await
        }
        Err(e) => Err(e),
    }
}

async fn handle_remind(
    state: &AppState,
    reply_token: &str,
    request_id: &str,
) -> AppResult<()> {
    let sent = state.schedule.send_reminders(request_id).await?;
    let text = if sent > 0 {
        format!("未回答の薬剤師{}名にリマインダーを送信しました。", sent)
    } else {
        "リマインダーは送信されませんでした。\n\
         （送信上限に達したか、未回答の薬剤師がいません。）"
            .to_string()
    };
    state
        .line
        .reply_message(reply_token, vec![LineMessage::text(text)])
        .await
}

async fn handle_other(
    state: &AppState,
    reply_token: &str,
    user_id: &str,
    text: &str,
) -> AppResult<()> {
    // A date typed after "日付を指定" lands here as plain text.
    if let Some(draft) = state.sessions.get_draft(user_id).await? {
        if draft.date.is_none() {
            if let Some(date) = parse_date_flexible(text) {
                return save_date_and_advance(state, reply_token, user_id, draft, date).await;
            }
        }
    }

    state
        .line
        .reply_message(
            reply_token,
            vec![LineMessage::text(
                "🏪 店舗ユーザー向けメニュー\n\n\
                 以下のコマンドが利用できます：\n\n\
                 📋 勤務依頼の送信：\n\
                 勤務依頼\n\n\
                 🏪 店舗登録：\n\
                 店舗登録 店舗番号 店舗名\n\n\
                 何かご不明な点がございましたら、お気軽にお声かけください。",
            )],
        )
        .await
}

async fn handle_postback(
    state: &AppState,
    reply_token: &str,
    user_id: &str,
    postback: StorePostback,
) -> AppResult<()> {
    match postback {
        StorePostback::SelectDate => {
            state
                .line
                .reply_message(reply_token, vec![date_template()])
                .await
        }
        StorePostback::SelectTime => {
            state
                .line
                .reply_message(reply_token, vec![time_template()])
                .await
        }
        StorePostback::SelectCount => {
            state
                .line
                .reply_message(reply_token, vec![count_template()])
                .await
        }
        StorePostback::DateChoice(choice) => {
            handle_date_choice(state, reply_token, user_id, choice).await
        }
        StorePostback::TimeChoice(slot) => {
            let mut draft = state.sessions.get_draft(user_id).await?.unwrap_or_default();
            draft.time_slot = Some(slot);
            state.sessions.save_draft(user_id, &draft).await?;
            tracing::info!("Saved time for store user {}: {}", user_id, slot.label());

            state
                .line
                .reply_message(
                    reply_token,
                    vec![
                        LineMessage::text(format!(
                            "時間帯: {}\n次に必要人数を選択してください。",
                            slot.label()
                        )),
                        count_template(),
                    ],
                )
                .await
        }
        StorePostback::CountChoice(count) => {
            let mut draft = state.sessions.get_draft(user_id).await?.unwrap_or_default();
            draft.required_count = Some(count);
            state.sessions.save_draft(user_id, &draft).await?;
            tracing::info!("Saved count for store user {}: {}名", user_id, count);

            state
                .line
                .reply_message(
                    reply_token,
                    vec![LineMessage::text(format!(
                        "依頼内容の確認\n\
                         日付: {}\n\
                         時間帯: {}\n\
                         人数: {}\n\n\
                         この内容で依頼を送信しますか？\n\
                         「はい」または「いいえ」でお答えください。",
                        draft.date_text(),
                        draft.time_text(),
                        draft.count_text()
                    ))],
                )
                .await
        }
        StorePostback::ConfirmAccept {
            request_id,
            user_id: pharmacist_user_id,
        } => handle_confirm_accept(state, reply_token, &request_id, &pharmacist_user_id).await,
        StorePostback::ConfirmReject {
            request_id,
            user_id: pharmacist_user_id,
        } => handle_confirm_reject(state, reply_token, &request_id, &pharmacist_user_id).await,
        StorePostback::Unknown(data) => {
            tracing::warn!("Unknown store postback data: {}", data);
            state
                .line
                .reply_message(reply_token, vec![LineMessage::text("不明なボタン操作です。")])
                .await
        }
    }
}

async fn handle_date_choice(
    state: &AppState,
    reply_token: &str,
    user_id: &str,
    choice: DateChoice,
) -> AppResult<()> {
    let today = Local::now().date_naive();
    let date = match choice {
        DateChoice::Today => today,
        DateChoice::Tomorrow => today + Duration::days(1),
        DateChoice::DayAfterTomorrow => today + Duration::days(2),
        DateChoice::Custom => {
            // Mark the flow as started so the typed date is picked up.
            let draft = state.sessions.get_draft(user_id).await?.unwrap_or_default();
            state.sessions.save_draft(user_id, &draft).await?;
            return state
                .line
                .reply_message(
                    reply_token,
                    vec![LineMessage::text(
                        "日付を入力してください。\n例: 4/15, 4月15日, 2024/4/15",
                    )],
                )
                .await;
        }
    };

    let draft = state.sessions.get_draft(user_id).await?.unwrap_or_default();
    save_date_and_advance(state, reply_token, user_id, draft, date).await
}

async fn save_date_and_advance(
    state: &AppState,
    reply_token: &str,
    user_id: &str,
    mut draft: StoreDraft,
    date: NaiveDate,
) -> AppResult<()> {
    draft.date = Some(date);
    state.sessions.save_draft(user_id, &draft).await?;
    tracing::info!("Saved date for store user {}: {}", user_id, date);

    state
        .line
        .reply_message(
            reply_token,
            vec![
                LineMessage::text(format!(
                    "日付: {}\n次に時間帯を選択してください。",
                    date.format("%Y/%m/%d")
                )),
                time_template(),
            ],
        )
        .await
}

async fn handle_confirm_accept(
    state: &AppState,
    reply_token: &str,
    request_id: &str,
    pharmacist_user_id: &str,
) -> AppResult<()> {
    match state
        .schedule
        .confirm_application(request_id, pharmacist_user_id)
        .await
    {
        Ok(confirmed) => {
            state
                .line
                .reply_message(
                    reply_token,
                    vec![LineMessage::text(format!(
                        "✅ 勤務が確定しました！\n\
                         依頼ID: {}\n\
                         日付: {}\n\
                         時間帯: {}\n\
                         薬剤師: {}さん\n\n\
                         薬剤師に確定通知を送信しました。",
                        confirmed.request.id,
                        confirmed.request.date.format("%Y/%m/%d"),
                        confirmed.request.time_slot.label(),
                        confirmed.pharmacist_name
                    ))],
                )
                .await
        }
        Err(AppError::Conflict { .. }) => {
            state
                .line
                .reply_message(
                    reply_token,
                    vec![LineMessage::text(
                        "この依頼は既に確定済みです。\n確定内容は変更されませんでした。",
                    )],
                )
                .await
        }
        Err(e) => Err(e),
    }
}

async fn handle_confirm_reject(
    state: &AppState,
    reply_token: &str,
    request_id: &str,
    pharmacist_user_id: &str,
) -> AppResult<()> {
    match state
        .schedule
        .reject_application(request_id, pharmacist_user_id)
        .await
    {
        Ok(name) => {
            state
                .line
                .reply_message(
                    reply_token,
                    vec![LineMessage::text(format!(
                        "応募を見送りました。\n{}さんに通知しました。",
                        name
                    ))],
                )
                .await
        }
        Err(AppError::NotFound(_)) => {
            state
                .line
                .reply_message(
                    reply_token,
                    vec![LineMessage::text("該当する応募が見つかりませんでした。")],
                )
                .await
        }
        Err(e) => Err(e),
    }
}

// ============================================================================
// Guided-form templates
// ============================================================================

fn shift_request_form() -> LineMessage {
    LineMessage::buttons(
        "勤務依頼",
        "勤務依頼",
        "項目を選択してください",
        vec![
            TemplateAction::postback("日付選択", "select_date"),
            TemplateAction::postback("時間帯選択", "select_time"),
            TemplateAction::postback("人数選択", "select_count"),
        ],
    )
}

fn date_template() -> LineMessage {
    LineMessage::buttons(
        "日付を選択してください",
        "勤務日を選択",
        "どの日を希望されますか？",
        vec![
            TemplateAction::postback("今日", "date_today"),
            TemplateAction::postback("明日", "date_tomorrow"),
            TemplateAction::postback("明後日", "date_day_after_tomorrow"),
            TemplateAction::postback("日付を指定", "date_custom"),
        ],
    )
}

fn time_template() -> LineMessage {
    LineMessage::buttons(
        "時間帯を選択してください",
        "勤務時間帯を選択",
        "どの時間帯を希望されますか？",
        vec![
            TemplateAction::postback("午前 (9:00-13:00)", "time_morning"),
            TemplateAction::postback("午後 (13:00-17:00)", "time_afternoon"),
            TemplateAction::postback("夜間 (17:00-21:00)", "time_evening"),
            TemplateAction::postback("終日 (9:00-18:00)", "time_full_day"),
        ],
    )
}

fn count_template() -> LineMessage {
    LineMessage::buttons(
        "必要人数を選択してください",
        "必要人数を選択",
        "何名必要ですか？",
        vec![
            TemplateAction::postback("1名", "count_1"),
            TemplateAction::postback("2名", "count_2"),
            TemplateAction::postback("3名", "count_3"),
            TemplateAction::postback("4名以上", "count_4_plus"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_registration() {
        assert_eq!(
            classify_store_message("店舗登録 002 サンライズ薬局"),
            StoreCommand::Registration("店舗登録 002 サンライズ薬局".to_string())
        );
    }

    #[test]
    fn test_classify_shift_request() {
        assert!(matches!(
            classify_store_message("勤務依頼 7/15 午前 2名"),
            StoreCommand::ShiftRequest(_)
        ));
        assert!(matches!(
            classify_store_message("シフトをお願いします"),
            StoreCommand::ShiftRequest(_)
        ));
    }

    #[test]
    fn test_classify_confirmations() {
        assert_eq!(classify_store_message("はい"), StoreCommand::ConfirmYes);
        assert_eq!(classify_store_message("確定"), StoreCommand::ConfirmYes);
        assert_eq!(classify_store_message("いいえ"), StoreCommand::ConfirmNo);
        // Bare キャンセル discards the draft, it does not cancel a request.
        assert_eq!(classify_store_message("キャンセル"), StoreCommand::ConfirmNo);
    }

    #[test]
    fn test_classify_cancel_request_with_id() {
        assert_eq!(
            classify_store_message("キャンセル store_req_002_20250701_093015"),
            StoreCommand::CancelRequest("store_req_002_20250701_093015".to_string())
        );
    }

    #[test]
    fn test_classify_remind_with_id() {
        assert_eq!(
            classify_store_message("リマインド store_req_002_20250701_093015"),
            StoreCommand::Remind("store_req_002_20250701_093015".to_string())
        );
        // Without a request ID there is nothing to remind about.
        assert_eq!(classify_store_message("リマインド"), StoreCommand::Other);
    }

    #[test]
    fn test_classify_other() {
        assert_eq!(classify_store_message("こんにちは"), StoreCommand::Other);
        assert_eq!(classify_store_message(""), StoreCommand::Other);
    }

    #[test]
    fn test_parse_postback_selections() {
        assert_eq!(StorePostback::parse("select_date"), StorePostback::SelectDate);
        assert_eq!(StorePostback::parse("select_time"), StorePostback::SelectTime);
        assert_eq!(StorePostback::parse("select_count"), StorePostback::SelectCount);
    }

    #[test]
    fn test_parse_postback_date_choices() {
        assert_eq!(
            StorePostback::parse("date_today"),
            StorePostback::DateChoice(DateChoice::Today)
        );
        assert_eq!(
            StorePostback::parse("date_custom"),
            StorePostback::DateChoice(DateChoice::Custom)
        );
    }

    #[test]
    fn test_parse_postback_time_and_count() {
        assert_eq!(
            StorePostback::parse("time_morning"),
            StorePostback::TimeChoice(TimeSlot::Morning)
        );
        assert_eq!(StorePostback::parse("count_2"), StorePostback::CountChoice(2));
        // Above-maximum requests clamp to the per-shift cap.
        assert_eq!(
            StorePostback::parse("count_4_plus"),
            StorePostback::CountChoice(MAX_PHARMACISTS_PER_SHIFT)
        );
    }

    #[test]
    fn test_parse_postback_settlements() {
        assert_eq!(
            StorePostback::parse("pharmacist_confirm_accept:req-1:U123"),
            StorePostback::ConfirmAccept {
                request_id: "req-1".to_string(),
                user_id: "U123".to_string(),
            }
        );
        assert_eq!(
            StorePostback::parse("pharmacist_confirm_reject:req-1:U123"),
            StorePostback::ConfirmReject {
                request_id: "req-1".to_string(),
                user_id: "U123".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_postback_unknown() {
        assert!(matches!(
            StorePostback::parse("pharmacist_confirm_accept:only-one-part"),
            StorePostback::Unknown(_)
        ));
        assert!(matches!(
            StorePostback::parse("something_else"),
            StorePostback::Unknown(_)
        ));
    }
}
