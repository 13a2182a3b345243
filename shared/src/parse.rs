//! Free-text parsers for bot messages
//!
//! Registration and shift-request messages arrive as loosely formatted
//! Japanese text. Separators vary (ASCII space, ideographic space, comma,
//! 読点), so every parser splits on the full separator class.

use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

use crate::models::TimeSlot;

fn separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ ,、\u{3000}]+").expect("valid regex"))
}

fn month_day_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2})[/\-](\d{1,2})").expect("valid regex"))
}

fn japanese_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2})月(\d{1,2})日").expect("valid regex"))
}

fn full_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4})[/\-](\d{1,2})[/\-](\d{1,2})").expect("valid regex"))
}

fn count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)名").expect("valid regex"))
}

fn notes_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:備考|メモ)[:：]\s*(.+)").expect("valid regex"))
}

fn time_condition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{1,2}:\d{2}|\d{1,2}時).*?(?:以降|から|より)").expect("valid regex")
    })
}

fn condition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"条件[：:]\s*(.+)").expect("valid regex"))
}

/// Parsed store registration message, e.g. `店舗登録 002 サンライズ薬局`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRegistration {
    pub number: String,
    pub name: String,
}

/// Parse a store registration message. The leading `店舗登録` keyword is
/// optional; the first two fields are store number and store name.
pub fn parse_store_registration(text: &str) -> Option<StoreRegistration> {
    let text = text.replace("店舗登録", "");
    let text = text.trim();
    let parts: Vec<&str> = separator_re()
        .split(text)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() < 2 {
        return None;
    }
    Some(StoreRegistration {
        number: parts[0].to_string(),
        name: parts[1].to_string(),
    })
}

/// Parsed pharmacist registration message, e.g. `田中薬剤師,090-1234-5678`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PharmacistRegistration {
    pub name: String,
    pub phone: String,
    pub availability: Vec<String>,
}

/// Parse a pharmacist registration message: name, phone, and optional
/// trailing availability terms.
pub fn parse_pharmacist_registration(text: &str) -> Option<PharmacistRegistration> {
    let parts: Vec<&str> = separator_re()
        .split(text.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() < 2 {
        return None;
    }
    Some(PharmacistRegistration {
        name: parts[0].to_string(),
        phone: parts[1].to_string(),
        availability: parts[2..].iter().map(|s| s.to_string()).collect(),
    })
}

/// Parsed free-text shift request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedShiftRequest {
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub required_count: u8,
    pub notes: Option<String>,
}

/// Parse a free-text shift request like `勤務依頼 7/15 午前 2名`.
///
/// The date must be present as `M/D` (current year is assumed); the time
/// slot defaults to full-day and the head count to one.
pub fn parse_shift_request(text: &str) -> Option<ParsedShiftRequest> {
    parse_shift_request_in_year(text, Local::now().year())
}

fn parse_shift_request_in_year(text: &str, year: i32) -> Option<ParsedShiftRequest> {
    let caps = month_day_re().captures(text)?;
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let time_slot = detect_time_slot(text);

    let required_count = count_re()
        .captures(text)
        .and_then(|c| c[1].parse::<u8>().ok())
        .unwrap_or(1);

    let notes = notes_re()
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|n| !n.is_empty());

    Some(ParsedShiftRequest {
        date,
        time_slot,
        required_count,
        notes,
    })
}

fn detect_time_slot(text: &str) -> TimeSlot {
    const MORNING: &[&str] = &["午前", "AM", "am", "9:00", "10:00", "11:00", "12:00"];
    const AFTERNOON: &[&str] = &["午後", "PM", "pm", "13:00", "14:00", "15:00", "16:00", "17:00"];
    const EVENING: &[&str] = &["夜間", "18:00", "19:00", "20:00", "21:00"];

    if MORNING.iter().any(|k| text.contains(k)) {
        TimeSlot::Morning
    } else if AFTERNOON.iter().any(|k| text.contains(k)) {
        TimeSlot::Afternoon
    } else if EVENING.iter().any(|k| text.contains(k)) {
        TimeSlot::Evening
    } else {
        TimeSlot::FullDay
    }
}

/// Kind of free-text response a pharmacist can give to a shift request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PharmacistResponseKind {
    Accepted,
    Declined,
    Conditional,
}

/// Parsed free-text pharmacist response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PharmacistResponse {
    pub kind: PharmacistResponseKind,
    pub conditions: Option<String>,
}

/// Parse a pharmacist's free-text response.
///
/// `不可` counts as a declination and `〜なら可能` as a condition even
/// though both contain `可`, so declination and conditional keywords are
/// checked before the bare-`可` acceptance.
pub fn parse_pharmacist_response(text: &str) -> Option<PharmacistResponse> {
    let declined = ["いいえ", "辞退", "不可", "×"];
    let conditional = ["条件付き", "条件", "ただし"];
    let accepted = ["はい", "承諾", "OK", "ok"];

    let kind = if declined.iter().any(|k| text.contains(k)) {
        PharmacistResponseKind::Declined
    } else if conditional.iter().any(|k| text.contains(k)) {
        PharmacistResponseKind::Conditional
    } else if accepted.iter().any(|k| text.contains(k)) || text.contains('可') {
        PharmacistResponseKind::Accepted
    } else {
        return None;
    };

    let conditions = if kind == PharmacistResponseKind::Conditional {
        time_condition_re()
            .captures(text)
            .map(|c| format!("{}以降", &c[1]))
            .or_else(|| {
                condition_re()
                    .captures(text)
                    .map(|c| c[1].trim().to_string())
            })
    } else {
        None
    };

    Some(PharmacistResponse { kind, conditions })
}

/// Parse a date out of loosely formatted text.
///
/// Accepts `M/D`, `M-D`, `M月D日`, and `YYYY/M/D` forms; two-field forms
/// assume the current year.
pub fn parse_date_flexible(text: &str) -> Option<NaiveDate> {
    parse_date_flexible_in_year(text, Local::now().year())
}

fn parse_date_flexible_in_year(text: &str, year: i32) -> Option<NaiveDate> {
    if let Some(caps) = full_date_re().captures(text) {
        let y: i32 = caps[1].parse().ok()?;
        let m: u32 = caps[2].parse().ok()?;
        let d: u32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }
    for re in [month_day_re(), japanese_date_re()] {
        if let Some(caps) = re.captures(text) {
            let m: u32 = caps[1].parse().ok()?;
            let d: u32 = caps[2].parse().ok()?;
            return NaiveDate::from_ymd_opt(year, m, d);
        }
    }
    None
}

/// Parse a time-slot keyword out of text.
pub fn parse_time_slot(text: &str) -> Option<TimeSlot> {
    let lower = text.to_lowercase();
    if ["am", "午前", "朝"].iter().any(|k| lower.contains(k)) {
        Some(TimeSlot::Morning)
    } else if ["pm", "午後", "夕方"].iter().any(|k| lower.contains(k)) {
        Some(TimeSlot::Afternoon)
    } else if ["夜間", "夜"].iter().any(|k| lower.contains(k)) {
        Some(TimeSlot::Evening)
    } else if ["終日", "フル", "一日"].iter().any(|k| lower.contains(k)) {
        Some(TimeSlot::FullDay)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_store_registration() {
        let reg = parse_store_registration("店舗登録 002 サンライズ薬局").unwrap();
        assert_eq!(reg.number, "002");
        assert_eq!(reg.name, "サンライズ薬局");
    }

    #[test]
    fn test_parse_store_registration_separators() {
        // comma
        let reg = parse_store_registration("店舗登録 003,メイプル薬局").unwrap();
        assert_eq!(reg.number, "003");
        assert_eq!(reg.name, "メイプル薬局");

        // 読点
        let reg = parse_store_registration("店舗登録 004、ひまわり薬局").unwrap();
        assert_eq!(reg.number, "004");
        assert_eq!(reg.name, "ひまわり薬局");

        // ideographic space
        let reg = parse_store_registration("店舗登録\u{3000}005\u{3000}あおば薬局").unwrap();
        assert_eq!(reg.number, "005");
        assert_eq!(reg.name, "あおば薬局");
    }

    #[test]
    fn test_parse_store_registration_missing_fields() {
        assert!(parse_store_registration("店舗登録 002").is_none());
        assert!(parse_store_registration("店舗登録").is_none());
        assert!(parse_store_registration("").is_none());
    }

    #[test]
    fn test_parse_pharmacist_registration() {
        let reg = parse_pharmacist_registration("田中薬剤師,090-1234-5678").unwrap();
        assert_eq!(reg.name, "田中薬剤師");
        assert_eq!(reg.phone, "090-1234-5678");
        assert!(reg.availability.is_empty());
    }

    #[test]
    fn test_parse_pharmacist_registration_with_availability() {
        let reg =
            parse_pharmacist_registration("佐藤薬剤師 090-2345-6789 午前 午後").unwrap();
        assert_eq!(reg.name, "佐藤薬剤師");
        assert_eq!(reg.phone, "090-2345-6789");
        assert_eq!(reg.availability, vec!["午前", "午後"]);
    }

    #[test]
    fn test_parse_pharmacist_registration_single_field() {
        assert!(parse_pharmacist_registration("田中薬剤師").is_none());
    }

    #[test]
    fn test_parse_shift_request_morning() {
        let parsed = parse_shift_request_in_year("勤務依頼 7/15 午前 2名", 2025).unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2025, 7, 15).unwrap());
        assert_eq!(parsed.time_slot, TimeSlot::Morning);
        assert_eq!(parsed.required_count, 2);
        assert!(parsed.notes.is_none());
    }

    #[test]
    fn test_parse_shift_request_defaults() {
        // No slot keyword and no head count: full day, one person.
        let parsed = parse_shift_request_in_year("シフト 8/1", 2025).unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2025, 8, 1).unwrap());
        assert_eq!(parsed.time_slot, TimeSlot::FullDay);
        assert_eq!(parsed.required_count, 1);
    }

    #[test]
    fn test_parse_shift_request_evening_and_notes() {
        let parsed =
            parse_shift_request_in_year("勤務依頼 12-24 夜間 3名 備考: 急募です", 2025).unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2025, 12, 24).unwrap());
        assert_eq!(parsed.time_slot, TimeSlot::Evening);
        assert_eq!(parsed.required_count, 3);
        assert_eq!(parsed.notes.as_deref(), Some("急募です"));
    }

    #[test]
    fn test_parse_shift_request_no_date() {
        assert!(parse_shift_request_in_year("勤務依頼 午前 2名", 2025).is_none());
    }

    #[test]
    fn test_parse_shift_request_invalid_date() {
        assert!(parse_shift_request_in_year("勤務依頼 2/30 午前", 2025).is_none());
        assert!(parse_shift_request_in_year("勤務依頼 13/1 午前", 2025).is_none());
    }

    #[test]
    fn test_parse_shift_request_count_needs_suffix() {
        // The date digits must not be mistaken for a head count.
        let parsed = parse_shift_request_in_year("勤務依頼 4/15 午後", 2025).unwrap();
        assert_eq!(parsed.required_count, 1);
    }

    #[test]
    fn test_parse_pharmacist_response_accepted() {
        let resp = parse_pharmacist_response("はい、お願いします").unwrap();
        assert_eq!(resp.kind, PharmacistResponseKind::Accepted);
        assert!(resp.conditions.is_none());

        assert_eq!(
            parse_pharmacist_response("承諾します").unwrap().kind,
            PharmacistResponseKind::Accepted
        );
        assert_eq!(
            parse_pharmacist_response("OKです").unwrap().kind,
            PharmacistResponseKind::Accepted
        );
    }

    #[test]
    fn test_parse_pharmacist_response_declined() {
        assert_eq!(
            parse_pharmacist_response("いいえ").unwrap().kind,
            PharmacistResponseKind::Declined
        );
        assert_eq!(
            parse_pharmacist_response("辞退します").unwrap().kind,
            PharmacistResponseKind::Declined
        );
        // 不可 contains 可 but must still read as a declination.
        assert_eq!(
            parse_pharmacist_response("その日は不可です").unwrap().kind,
            PharmacistResponseKind::Declined
        );
    }

    #[test]
    fn test_parse_pharmacist_response_conditional_time() {
        let resp = parse_pharmacist_response("条件付き 10:00以降なら可能").unwrap();
        assert_eq!(resp.kind, PharmacistResponseKind::Conditional);
        assert_eq!(resp.conditions.as_deref(), Some("10:00以降"));

        let resp = parse_pharmacist_response("ただし 13時 から").unwrap();
        assert_eq!(resp.kind, PharmacistResponseKind::Conditional);
        assert_eq!(resp.conditions.as_deref(), Some("13時以降"));
    }

    #[test]
    fn test_parse_pharmacist_response_conditional_freeform() {
        let resp = parse_pharmacist_response("条件: 交通費支給の場合のみ").unwrap();
        assert_eq!(resp.kind, PharmacistResponseKind::Conditional);
        assert_eq!(resp.conditions.as_deref(), Some("交通費支給の場合のみ"));
    }

    #[test]
    fn test_parse_pharmacist_response_unrecognized() {
        assert!(parse_pharmacist_response("こんにちは").is_none());
        assert!(parse_pharmacist_response("").is_none());
    }

    #[test]
    fn test_parse_date_flexible_forms() {
        assert_eq!(
            parse_date_flexible_in_year("4/15", 2025),
            NaiveDate::from_ymd_opt(2025, 4, 15)
        );
        assert_eq!(
            parse_date_flexible_in_year("4-15", 2025),
            NaiveDate::from_ymd_opt(2025, 4, 15)
        );
        assert_eq!(
            parse_date_flexible_in_year("4月15日", 2025),
            NaiveDate::from_ymd_opt(2025, 4, 15)
        );
        assert_eq!(
            parse_date_flexible_in_year("2024/4/15", 2025),
            NaiveDate::from_ymd_opt(2024, 4, 15)
        );
        assert_eq!(parse_date_flexible_in_year("明日", 2025), None);
    }

    #[test]
    fn test_parse_time_slot() {
        assert_eq!(parse_time_slot("午前でお願いします"), Some(TimeSlot::Morning));
        assert_eq!(parse_time_slot("PM希望"), Some(TimeSlot::Afternoon));
        assert_eq!(parse_time_slot("夜間のみ"), Some(TimeSlot::Evening));
        assert_eq!(parse_time_slot("終日可能"), Some(TimeSlot::FullDay));
        assert_eq!(parse_time_slot("未定"), None);
    }

    proptest! {
        /// Parsers must never panic on arbitrary input.
        #[test]
        fn prop_parsers_never_panic(text in ".*") {
            let _ = parse_store_registration(&text);
            let _ = parse_pharmacist_registration(&text);
            let _ = parse_shift_request_in_year(&text, 2025);
            let _ = parse_pharmacist_response(&text);
            let _ = parse_date_flexible_in_year(&text, 2025);
            let _ = parse_time_slot(&text);
        }

        /// A parsed head count always came from an explicit `N名` marker
        /// and date digits alone never raise it above the default.
        #[test]
        fn prop_count_from_suffix_only(m in 1u32..=12, d in 1u32..=28) {
            let text = format!("勤務依頼 {}/{}", m, d);
            let parsed = parse_shift_request_in_year(&text, 2025).unwrap();
            prop_assert_eq!(parsed.required_count, 1);
        }
    }
}
