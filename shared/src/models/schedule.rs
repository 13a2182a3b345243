//! Shift request and application models
//!
//! A shift request is created by a store, broadcast to available
//! pharmacists, and settled by a store confirmation. The status machines
//! here are the single place that decides which transitions are legal;
//! callers get an error instead of a silent double-fill.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Work time slot within a day
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TimeSlot {
    Morning,
    Afternoon,
    Evening,
    FullDay,
}

impl TimeSlot {
    /// Human-readable label shown in bot messages
    pub fn label(&self) -> &'static str {
        match self {
            TimeSlot::Morning => "午前 (9:00-13:00)",
            TimeSlot::Afternoon => "午後 (13:00-17:00)",
            TimeSlot::Evening => "夜間 (17:00-21:00)",
            TimeSlot::FullDay => "終日 (9:00-18:00)",
        }
    }

    /// Postback data code used in LINE button templates
    pub fn postback_code(&self) -> &'static str {
        match self {
            TimeSlot::Morning => "time_morning",
            TimeSlot::Afternoon => "time_afternoon",
            TimeSlot::Evening => "time_evening",
            TimeSlot::FullDay => "time_full_day",
        }
    }

    /// Parse a postback data code back into a slot
    pub fn from_postback_code(code: &str) -> Option<Self> {
        match code {
            "time_morning" => Some(TimeSlot::Morning),
            "time_afternoon" => Some(TimeSlot::Afternoon),
            "time_evening" => Some(TimeSlot::Evening),
            "time_full_day" => Some(TimeSlot::FullDay),
            _ => None,
        }
    }

    /// Keywords that mark a schedule cell as covering this slot
    pub fn schedule_keywords(&self) -> &'static [&'static str] {
        match self {
            TimeSlot::Morning => &["AM", "午前", "9:00", "9時"],
            TimeSlot::Afternoon => &["PM", "午後", "13:00", "13時"],
            TimeSlot::Evening => &["夜間", "17:00", "17時"],
            TimeSlot::FullDay => &["終日", "フル", "全日"],
        }
    }
}

/// Status of a shift request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShiftRequestStatus {
    Open,
    Filled,
    Cancelled,
}

impl ShiftRequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ShiftRequestStatus::Filled | ShiftRequestStatus::Cancelled)
    }
}

/// Status of a pharmacist's application to a shift request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

/// Illegal state transition on a request or application
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("shift request {id} is already {status:?}")]
    RequestSettled { id: String, status: ShiftRequestStatus },
    #[error("application is already {status:?}")]
    ApplicationSettled { status: ApplicationStatus },
}

/// A store-originated need for pharmacist coverage during a time window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftRequest {
    pub id: String,
    pub store_number: String,
    pub store_name: String,
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub required_count: u8,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: ShiftRequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShiftRequest {
    /// Mark the request as filled. A request fills exactly once; any
    /// further attempt observes the terminal state and fails.
    pub fn fill(&mut self) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::RequestSettled {
                id: self.id.clone(),
                status: self.status,
            });
        }
        self.status = ShiftRequestStatus::Filled;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Cancel an open request.
    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::RequestSettled {
                id: self.id.clone(),
                status: self.status,
            });
        }
        self.status = ShiftRequestStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Summary line used in store-facing confirmation messages
    pub fn summary(&self) -> String {
        format!(
            "{} {} {}名",
            self.date.format("%m/%d"),
            self.time_slot.label(),
            self.required_count
        )
    }
}

/// A pharmacist's response expressing intent to fill a shift request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub request_id: String,
    pub pharmacist_id: String,
    pub pharmacist_name: String,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub conditions: Option<String>,
    pub responded_at: DateTime<Utc>,
}

impl Application {
    /// Settle a pending application. Accepted/rejected are terminal.
    pub fn settle(&mut self, status: ApplicationStatus) -> Result<(), TransitionError> {
        if self.status != ApplicationStatus::Pending {
            return Err(TransitionError::ApplicationSettled { status: self.status });
        }
        self.status = status;
        Ok(())
    }
}

/// A confirmed shift written back to the schedule sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub request_id: String,
    pub pharmacist_id: String,
    pub store_name: String,
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub created_at: DateTime<Utc>,
}
