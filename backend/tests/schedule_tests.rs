//! Shift request lifecycle tests
//!
//! The request state machine and the sheet-side status labels together
//! guarantee a request fills exactly once with exactly one accepted
//! application.

use chrono::{Local, NaiveDate, TimeZone, Utc};

use pharmacy_shift_backend::services::schedule::make_request_id;
use pharmacy_shift_backend::services::sheets::{
    column_letter, find_day_column, schedule_entry, status_label,
};
use shared::models::{
    Application, ApplicationStatus, ShiftRequest, ShiftRequestStatus, TimeSlot, TransitionError,
};
use shared::validation::is_available_for_slot;

fn open_request() -> ShiftRequest {
    let now = Utc::now();
    ShiftRequest {
        id: "store_req_002_20250715_090000".to_string(),
        store_number: "002".to_string(),
        store_name: "サンライズ薬局".to_string(),
        date: NaiveDate::from_ymd_opt(2025, 7, 15).unwrap(),
        time_slot: TimeSlot::Morning,
        required_count: 1,
        notes: None,
        status: ShiftRequestStatus::Open,
        created_at: now,
        updated_at: now,
    }
}

fn pending_application(request_id: &str, pharmacist: &str) -> Application {
    Application {
        id: format!("app_{}_{}", request_id, pharmacist),
        request_id: request_id.to_string(),
        pharmacist_id: pharmacist.to_string(),
        pharmacist_name: "田中薬剤師".to_string(),
        status: ApplicationStatus::Pending,
        conditions: None,
        responded_at: Utc::now(),
    }
}

// ============================================================================
// Request lifecycle
// ============================================================================

/// Full round-trip: created open, applied to, confirmed, ends filled with
/// exactly one accepted application.
#[test]
fn test_round_trip_open_apply_confirm() {
    let mut request = open_request();
    assert_eq!(request.status, ShiftRequestStatus::Open);

    let mut first = pending_application(&request.id, "pharm_001");
    let mut second = pending_application(&request.id, "pharm_002");

    // Store accepts the first application.
    first.settle(ApplicationStatus::Accepted).unwrap();
    request.fill().unwrap();
    second.settle(ApplicationStatus::Rejected).unwrap();

    assert_eq!(request.status, ShiftRequestStatus::Filled);
    let accepted = [&first, &second]
        .iter()
        .filter(|a| a.status == ApplicationStatus::Accepted)
        .count();
    assert_eq!(accepted, 1);
}

/// Once filled, no further application can transition the request to
/// filled again.
#[test]
fn test_filled_is_terminal() {
    let mut request = open_request();
    request.fill().unwrap();

    let err = request.fill().unwrap_err();
    assert!(matches!(err, TransitionError::RequestSettled { .. }));
    assert_eq!(request.status, ShiftRequestStatus::Filled);

    // Cancellation after fill is refused too.
    assert!(request.cancel().is_err());
}

/// A cancelled request refuses a late fill.
#[test]
fn test_cancelled_request_refuses_fill() {
    let mut request = open_request();
    request.cancel().unwrap();
    assert!(request.fill().is_err());
    assert_eq!(request.status, ShiftRequestStatus::Cancelled);
}

/// An accepted application cannot later be rejected (and vice versa).
#[test]
fn test_application_settlement_is_terminal() {
    let mut app = pending_application("req", "pharm_001");
    app.settle(ApplicationStatus::Accepted).unwrap();
    assert!(app.settle(ApplicationStatus::Rejected).is_err());

    let mut app = pending_application("req", "pharm_002");
    app.settle(ApplicationStatus::Rejected).unwrap();
    assert!(app.settle(ApplicationStatus::Accepted).is_err());
}

// ============================================================================
// Identifiers and sheet mapping
// ============================================================================

#[test]
fn test_request_id_embeds_store_and_time() {
    let at = Local.with_ymd_and_hms(2025, 7, 15, 9, 0, 0).unwrap();
    let id = make_request_id("002", at);
    assert_eq!(id, "store_req_002_20250715_090000");
    assert!(id.starts_with("store_req_002_"));
}

#[test]
fn test_status_labels_are_distinct() {
    let labels = [
        status_label(ApplicationStatus::Pending),
        status_label(ApplicationStatus::Accepted),
        status_label(ApplicationStatus::Rejected),
    ];
    assert_eq!(labels, ["応募中", "確定", "見送り"]);
}

#[test]
fn test_day_column_lookup_matches_header_labels() {
    let header: Vec<String> = ["名前", "LINE ID", "電話番号", "7/14", "7/15", "7/16"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let date = NaiveDate::from_ymd_opt(2025, 7, 15).unwrap();
    let col = find_day_column(&header, date).unwrap();
    assert_eq!(col, 4);
    assert_eq!(column_letter(col), "E");
}

/// A confirmed schedule entry makes the pharmacist read as unavailable
/// for subsequent requests on that day.
#[test]
fn test_confirmed_entry_blocks_further_requests() {
    let entry = schedule_entry(TimeSlot::Afternoon, "サンライズ薬局");
    for slot in [
        TimeSlot::Morning,
        TimeSlot::Afternoon,
        TimeSlot::Evening,
        TimeSlot::FullDay,
    ] {
        assert!(
            !is_available_for_slot(&entry, slot),
            "confirmed entry should block {:?}",
            slot
        );
    }
}
