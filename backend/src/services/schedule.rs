//! Shift request lifecycle
//!
//! Create → broadcast → applications → settlement. Settlement is the
//! critical section: the Redis fill claim decides the winner, the sheet
//! status update is conditional on the expected prior value, and the
//! domain state machine refuses transitions out of terminal states. All
//! three have to agree before a request reads as filled.

use chrono::{DateTime, Local, NaiveDate, Utc};

use shared::models::{
    Application, ApplicationStatus, Pharmacist, Schedule, ShiftRequest, ShiftRequestStatus, Store,
    TimeSlot,
};
use shared::validation::validate_shift_request;

use crate::error::{AppError, AppResult};
use crate::services::notification::{NotificationReport, PharmacistNotifier, StoreNotifier};
use crate::services::session::RequestStore;
use crate::services::sheets::{schedule_entry, SheetsService, StoreRow};

/// Build a request ID from the store number and creation time
pub fn make_request_id(store_number: &str, at: DateTime<Local>) -> String {
    format!("store_req_{}_{}", store_number, at.format("%Y%m%d_%H%M%S"))
}

/// Result of recording a pharmacist's application
#[derive(Debug)]
pub struct ApplicationAck {
    /// The request record, when it is still known
    pub request: Option<ShiftRequest>,
    /// Whether the application reached the application sheet
    pub recorded_in_sheet: bool,
    /// Whether the originating store was notified
    pub store_notified: bool,
}

/// Result of a successful store confirmation
#[derive(Debug)]
pub struct ConfirmedShift {
    pub request: ShiftRequest,
    pub pharmacist_name: String,
    pub schedule: Schedule,
}

/// Coordinates the sheet, the request store, and both notifiers
#[derive(Clone)]
pub struct ShiftRequestService {
    sheets: SheetsService,
    requests: RequestStore,
    pharmacist_notifier: PharmacistNotifier,
    store_notifier: StoreNotifier,
}

impl ShiftRequestService {
    pub fn new(
        sheets: SheetsService,
        requests: RequestStore,
        pharmacist_notifier: PharmacistNotifier,
        store_notifier: StoreNotifier,
    ) -> Self {
        Self {
            sheets,
            requests,
            pharmacist_notifier,
            store_notifier,
        }
    }

    /// Create and persist a shift request for a registered store
    pub async fn create_shift_request(
        &self,
        store: &Store,
        date: NaiveDate,
        time_slot: TimeSlot,
        required_count: u8,
        notes: Option<String>,
    ) -> AppResult<ShiftRequest> {
        validate_shift_request(date, required_count, Local::now().date_naive())
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let now = Utc::now();
        let request = ShiftRequest {
            id: make_request_id(&store.store_number, Local::now()),
            store_number: store.store_number.clone(),
            store_name: store.store_name.clone(),
            date,
            time_slot,
            required_count,
            notes,
            status: ShiftRequestStatus::Open,
            created_at: now,
            updated_at: now,
        };

        self.requests.save_request(&request).await?;
        tracing::info!(
            "Created shift request: {} for store {}",
            request.id,
            store.store_name
        );
        Ok(request)
    }

    /// Find available pharmacists and notify them of the request
    pub async fn broadcast(&self, request: &ShiftRequest) -> AppResult<NotificationReport> {
        let available = self
            .sheets
            .available_pharmacists(request.date, request.time_slot)
            .await?;

        if available.is_empty() {
            tracing::warn!("No available pharmacists found for request {}", request.id);
            return Ok(NotificationReport::default());
        }

        let report = self
            .pharmacist_notifier
            .notify_pharmacists_of_request(&available, request)
            .await;

        self.requests
            .record_notification(
                "shift_request",
                &request.id,
                &serde_json::json!({
                    "request_id": request.id,
                    "store_number": request.store_number,
                    "pharmacist_count": report.total,
                    "notified_count": report.notified,
                    "sent_at": Local::now().to_rfc3339(),
                    "status": "sent",
                }),
            )
            .await?;

        Ok(report)
    }

    /// Record a pharmacist's application: applicant set, application sheet
    /// row, and a notification to the originating store.
    pub async fn record_application(
        &self,
        request_id: &str,
        pharmacist_user_id: &str,
    ) -> AppResult<ApplicationAck> {
        self.requests
            .add_applicant(request_id, pharmacist_user_id)
            .await?;

        let request = self.requests.get_request(request_id).await?;
        let pharmacist = self
            .sheets
            .find_pharmacist_by_user_id(pharmacist_user_id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Pharmacist lookup failed during application: {}", e);
                None
            });

        let mut recorded_in_sheet = false;
        if let (Some(request), Some(row)) = (&request, &pharmacist) {
            let application = Application {
                id: format!("app_{}_{}", request_id, row.pharmacist.id),
                request_id: request_id.to_string(),
                pharmacist_id: row.pharmacist.id.clone(),
                pharmacist_name: row.pharmacist.name.clone(),
                status: ApplicationStatus::Pending,
                conditions: None,
                responded_at: Utc::now(),
            };
            match self
                .sheets
                .record_application(
                    &application,
                    &request.store_name,
                    request.date,
                    request.time_slot,
                )
                .await
            {
                Ok(()) => recorded_in_sheet = true,
                Err(e) => {
                    tracing::warn!("Failed to record application in sheet: {}", e);
                }
            }
        } else {
            tracing::warn!(
                "Application without full context: request known={}, pharmacist known={}",
                request.is_some(),
                pharmacist.is_some()
            );
        }

        let store_notified = self
            .notify_store_of_application(request.as_ref(), request_id, pharmacist_user_id, &pharmacist)
            .await;

        Ok(ApplicationAck {
            request,
            recorded_in_sheet,
            store_notified,
        })
    }

    async fn notify_store_of_application(
        &self,
        request: Option<&ShiftRequest>,
        request_id: &str,
        pharmacist_user_id: &str,
        pharmacist: &Option<crate::services::sheets::PharmacistRow>,
    ) -> bool {
        let Some(request) = request else {
            return false;
        };
        let store = match self.find_store(&request.store_number).await {
            Ok(Some(row)) if !row.store.line_user_id.is_empty() => row.store,
            Ok(_) => {
                tracing::warn!(
                    "Store {} has no LINE user ID, skipping application notice",
                    request.store_number
                );
                return false;
            }
            Err(e) => {
                tracing::warn!("Store lookup failed during application: {}", e);
                return false;
            }
        };

        let pharmacist_name = pharmacist
            .as_ref()
            .map(|p| p.pharmacist.name.clone())
            .unwrap_or_else(|| "薬剤師".to_string());

        match self
            .store_notifier
            .notify_application(
                &store.line_user_id,
                request_id,
                pharmacist_user_id,
                &pharmacist_name,
            )
            .await
        {
            Ok(()) => {
                tracing::info!("Store notification sent to: {}", store.line_user_id);
                true
            }
            Err(e) => {
                tracing::error!("Error sending store notification: {}", e);
                false
            }
        }
    }

    /// Settle a request in favour of one pharmacist.
    ///
    /// The Redis claim makes this first-writer-wins: a second confirmation
    /// for the same request gets a conflict, never a second fill.
    pub async fn confirm_application(
        &self,
        request_id: &str,
        pharmacist_user_id: &str,
    ) -> AppResult<ConfirmedShift> {
        let row = self
            .sheets
            .find_pharmacist_by_user_id(pharmacist_user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Pharmacist".to_string()))?;

        if !self.requests.try_mark_filled(request_id).await? {
            return Err(AppError::Conflict {
                resource: "勤務依頼".to_string(),
                message: format!("shift request {} is already filled", request_id),
            });
        }

        let mut request = self
            .requests
            .get_request(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Shift request".to_string()))?;

        request.fill().map_err(|e| AppError::Conflict {
            resource: "勤務依頼".to_string(),
            message: e.to_string(),
        })?;
        self.requests.save_request(&request).await?;

        // Conditional status update: a missing sheet row is tolerated (the
        // sheet may have been unavailable at application time), a status
        // mismatch is a real conflict and aborts the settlement.
        match self
            .sheets
            .update_application_status(
                request_id,
                &row.pharmacist.name,
                ApplicationStatus::Pending,
                ApplicationStatus::Accepted,
            )
            .await
        {
            Ok(()) => {}
            Err(AppError::NotFound(_)) => {
                tracing::warn!(
                    "No application row for {} on request {}, continuing settlement",
                    row.pharmacist.name,
                    request_id
                );
            }
            Err(e) => return Err(e),
        }

        self.sheets
            .write_schedule_entry(
                request.date,
                row.row,
                &schedule_entry(request.time_slot, &request.store_name),
            )
            .await?;

        if let Err(e) = self
            .pharmacist_notifier
            .send_shift_confirmed(pharmacist_user_id, &request)
            .await
        {
            tracing::error!("Failed to send confirmation to pharmacist: {}", e);
        }

        self.send_decline_notices(request_id, pharmacist_user_id).await;

        let schedule = Schedule {
            id: format!("sched_{}", request.id),
            request_id: request.id.clone(),
            pharmacist_id: row.pharmacist.id.clone(),
            store_name: request.store_name.clone(),
            date: request.date,
            time_slot: request.time_slot,
            created_at: Utc::now(),
        };

        self.requests
            .record_notification(
                "confirmation",
                request_id,
                &serde_json::json!({
                    "schedule": &schedule,
                    "confirmed_pharmacist": row.pharmacist.id,
                    "sent_at": Local::now().to_rfc3339(),
                    "status": "confirmed",
                }),
            )
            .await?;

        Ok(ConfirmedShift {
            request,
            pharmacist_name: row.pharmacist.name,
            schedule,
        })
    }

    async fn send_decline_notices(&self, request_id: &str, winner_user_id: &str) {
        let applicants = match self.requests.applicants(request_id).await {
            Ok(applicants) => applicants,
            Err(e) => {
                tracing::error!("Failed to load applicants for decline notices: {}", e);
                return;
            }
        };

        let others: Vec<_> = applicants
            .iter()
            .filter(|id| id.as_str() != winner_user_id)
            .collect();
        if others.is_empty() {
            tracing::info!("No other pharmacists to notify for request {}", request_id);
            return;
        }

        for user_id in others {
            if let Err(e) = self
                .pharmacist_notifier
                .send_decline_notice(user_id, request_id)
                .await
            {
                tracing::error!("Failed to send decline notification to {}: {}", user_id, e);
            }
        }
    }

    /// Reject one pharmacist's application without settling the request
    pub async fn reject_application(
        &self,
        request_id: &str,
        pharmacist_user_id: &str,
    ) -> AppResult<String> {
        let row = self
            .sheets
            .find_pharmacist_by_user_id(pharmacist_user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Pharmacist".to_string()))?;

        match self
            .sheets
            .update_application_status(
                request_id,
                &row.pharmacist.name,
                ApplicationStatus::Pending,
                ApplicationStatus::Rejected,
            )
            .await
        {
            Ok(()) => {}
            Err(AppError::NotFound(_)) => {
                tracing::warn!(
                    "No application row for {} on request {}, skipping sheet update",
                    row.pharmacist.name,
                    request_id
                );
            }
            Err(e) => return Err(e),
        }

        if let Err(e) = self
            .pharmacist_notifier
            .send_decline_notice(pharmacist_user_id, request_id)
            .await
        {
            tracing::error!("Failed to notify rejected pharmacist: {}", e);
        }

        Ok(row.pharmacist.name)
    }

    /// Cancel an open request
    pub async fn cancel_request(&self, request_id: &str) -> AppResult<ShiftRequest> {
        let mut request = self
            .requests
            .get_request(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Shift request".to_string()))?;

        request.cancel().map_err(|e| AppError::Conflict {
            resource: "勤務依頼".to_string(),
            message: e.to_string(),
        })?;
        self.requests.save_request(&request).await?;
        tracing::info!("Cancelled shift request: {}", request_id);
        Ok(request)
    }

    /// Remind pharmacists who have not responded, up to the reminder cap.
    /// Returns the number of reminders sent.
    pub async fn send_reminders(&self, request_id: &str) -> AppResult<usize> {
        if !self.requests.try_count_reminder(request_id).await? {
            return Ok(0);
        }

        let request = self
            .requests
            .get_request(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Shift request".to_string()))?;

        let available = self
            .sheets
            .available_pharmacists(request.date, request.time_slot)
            .await?;
        let applicants = self.requests.applicants(request_id).await?;

        let mut sent = 0;
        for pharmacist in unresponded(&available, &applicants) {
            match self
                .pharmacist_notifier
                .send_reminder(&pharmacist.line_user_id, &request)
                .await
            {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::error!("Failed to send reminder to {}: {}", pharmacist.name, e);
                }
            }
        }

        tracing::info!("Reminder notifications sent to {} pharmacists", sent);
        Ok(sent)
    }

    async fn find_store(&self, store_number: &str) -> AppResult<Option<StoreRow>> {
        let stores = self.sheets.store_list().await?;
        Ok(stores
            .into_iter()
            .find(|s| s.store.store_number == store_number))
    }
}

/// Pharmacists with a usable LINE ID who have not yet applied
fn unresponded<'a>(available: &'a [Pharmacist], applicants: &[String]) -> Vec<&'a Pharmacist> {
    available
        .iter()
        .filter(|p| p.has_valid_line_id())
        .filter(|p| !applicants.iter().any(|a| a == &p.line_user_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_make_request_id_format() {
        let at = Local.with_ymd_and_hms(2025, 7, 1, 9, 30, 15).unwrap();
        assert_eq!(
            make_request_id("002", at),
            "store_req_002_20250701_093015"
        );
    }

    #[test]
    fn test_unresponded_filters_applicants_and_invalid_ids() {
        let valid_a = format!("U{}", "a".repeat(32));
        let valid_b = format!("U{}", "b".repeat(32));
        let pharmacists = vec![
            Pharmacist {
                id: "pharm_001".to_string(),
                name: "田中薬剤師".to_string(),
                phone: String::new(),
                line_user_id: valid_a.clone(),
                availability: vec![],
                rating: None,
                experience_years: None,
            },
            Pharmacist {
                id: "pharm_002".to_string(),
                name: "佐藤薬剤師".to_string(),
                phone: String::new(),
                line_user_id: valid_b.clone(),
                availability: vec![],
                rating: None,
                experience_years: None,
            },
            Pharmacist {
                id: "pharm_003".to_string(),
                name: "鈴木薬剤師".to_string(),
                phone: String::new(),
                line_user_id: String::new(),
                availability: vec![],
                rating: None,
                experience_years: None,
            },
        ];

        let applicants = vec![valid_a];
        let targets = unresponded(&pharmacists, &applicants);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "佐藤薬剤師");
    }
}
