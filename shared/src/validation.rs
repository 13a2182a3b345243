//! Validation utilities for the Pharmacy Shift Coordination System

use chrono::NaiveDate;

use crate::models::TimeSlot;

/// Maximum pharmacists a single shift request may ask for
pub const MAX_PHARMACISTS_PER_SHIFT: u8 = 3;

// ============================================================================
// Shift Request Validations
// ============================================================================

/// Validate a shift request before it is created
pub fn validate_shift_request(
    date: NaiveDate,
    required_count: u8,
    today: NaiveDate,
) -> Result<(), &'static str> {
    if date < today {
        return Err("Shift date cannot be in the past");
    }
    validate_required_count(required_count)
}

/// Validate the requested head count (1 up to the per-shift maximum)
pub fn validate_required_count(required_count: u8) -> Result<(), &'static str> {
    if required_count < 1 {
        return Err("At least one pharmacist must be requested");
    }
    if required_count > MAX_PHARMACISTS_PER_SHIFT {
        return Err("Requested head count exceeds the per-shift maximum");
    }
    Ok(())
}

/// Check whether a schedule cell leaves the pharmacist free for a slot.
///
/// An empty cell means unconstrained. Explicit unavailability markers and
/// confirmed bookings block the day. A cell that declares availability for
/// specific slots only admits requests naming one of those slots (full-day
/// declarations admit everything).
pub fn is_available_for_slot(schedule_cell: &str, slot: TimeSlot) -> bool {
    let cell = schedule_cell.trim();
    if cell.is_empty() {
        return true;
    }
    const UNAVAILABLE: &[&str] = &["勤務不可", "×", "休み", "不可", "確定"];
    if UNAVAILABLE.iter().any(|k| cell.contains(k)) {
        return false;
    }
    if slot.schedule_keywords().iter().any(|k| cell.contains(k))
        || TimeSlot::FullDay.schedule_keywords().iter().any(|k| cell.contains(k))
    {
        return true;
    }
    // Declared for some other slot only: not free for this one.
    let declares_other_slot = [TimeSlot::Morning, TimeSlot::Afternoon, TimeSlot::Evening]
        .iter()
        .filter(|s| **s != slot)
        .any(|s| s.schedule_keywords().iter().any(|k| cell.contains(k)));
    !declares_other_slot
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate a Japanese phone number.
/// Accepts: 09012345678, 090-1234-5678, 03-1234-5678
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if !(10..=11).contains(&digits.len()) {
        return Err("Phone number must have 10 or 11 digits");
    }
    if !digits.starts_with('0') {
        return Err("Phone number must start with 0");
    }
    if !phone.chars().all(|c| c.is_ascii_digit() || c == '-') {
        return Err("Phone number may contain only digits and hyphens");
    }
    Ok(())
}

/// Validate a store number (1-4 digit numeric code, e.g. "002")
pub fn validate_store_number(number: &str) -> Result<(), &'static str> {
    if number.is_empty() || number.len() > 4 {
        return Err("Store number must be 1 to 4 digits");
    }
    if !number.chars().all(|c| c.is_ascii_digit()) {
        return Err("Store number must be numeric");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_validate_shift_request_dates() {
        let today = day(2025, 7, 1);
        assert!(validate_shift_request(day(2025, 7, 1), 1, today).is_ok());
        assert!(validate_shift_request(day(2025, 7, 15), 2, today).is_ok());
        assert!(validate_shift_request(day(2025, 6, 30), 1, today).is_err());
    }

    #[test]
    fn test_validate_required_count_bounds() {
        assert!(validate_required_count(0).is_err());
        assert!(validate_required_count(1).is_ok());
        assert!(validate_required_count(3).is_ok());
        assert!(validate_required_count(4).is_err());
    }

    #[test]
    fn test_availability_empty_cell() {
        assert!(is_available_for_slot("", TimeSlot::Morning));
        assert!(is_available_for_slot("   ", TimeSlot::FullDay));
    }

    #[test]
    fn test_availability_unavailable_markers() {
        assert!(!is_available_for_slot("勤務不可", TimeSlot::Morning));
        assert!(!is_available_for_slot("×", TimeSlot::Afternoon));
        assert!(!is_available_for_slot("休み", TimeSlot::Evening));
        assert!(!is_available_for_slot("終日 不可", TimeSlot::FullDay));
    }

    #[test]
    fn test_availability_confirmed_booking_blocks() {
        assert!(!is_available_for_slot("確定 午前 (9:00-13:00) - メイプル薬局", TimeSlot::Morning));
        assert!(!is_available_for_slot("応募確定 - サンライズ薬局", TimeSlot::Afternoon));
    }

    #[test]
    fn test_availability_slot_declarations() {
        // Declared for the requested slot
        assert!(is_available_for_slot("AM", TimeSlot::Morning));
        assert!(is_available_for_slot("午後", TimeSlot::Afternoon));
        // Full-day declaration admits any slot
        assert!(is_available_for_slot("終日", TimeSlot::Morning));
        assert!(is_available_for_slot("終日", TimeSlot::Evening));
        // Declared for a different slot only
        assert!(!is_available_for_slot("午前", TimeSlot::Afternoon));
        assert!(!is_available_for_slot("夜間", TimeSlot::Morning));
    }

    #[test]
    fn test_availability_other_entries_pass() {
        // An unrelated annotation does not block the slot.
        assert!(is_available_for_slot("打ち合わせ", TimeSlot::Morning));
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("090-1234-5678").is_ok());
        assert!(validate_phone("09012345678").is_ok());
        assert!(validate_phone("03-1234-5678").is_ok());
        assert!(validate_phone("90-1234-5678").is_err());
        assert!(validate_phone("090-1234").is_err());
        assert!(validate_phone("090 1234 5678").is_err());
    }

    #[test]
    fn test_validate_store_number() {
        assert!(validate_store_number("002").is_ok());
        assert!(validate_store_number("1").is_ok());
        assert!(validate_store_number("1234").is_ok());
        assert!(validate_store_number("").is_err());
        assert!(validate_store_number("12345").is_err());
        assert!(validate_store_number("A01").is_err());
    }
}
