//! Google Sheets integration
//!
//! The shared spreadsheet is the system of record: monthly schedule tabs
//! (`YYYY-MM`) hold pharmacists and their day columns, `店舗登録` holds
//! stores, and `応募記録` holds application rows. This module keeps the
//! sheet behind a narrow interface (get / update / append plus domain
//! operations) and makes every status change conditional on the expected
//! prior value, so concurrent writers surface as conflicts instead of
//! silently overwriting each other.
//!
//! Workbook layout:
//! - `YYYY-MM` tabs: A name, B LINE user ID, C phone, D user type, then
//!   one column per day labelled `M/D` in the header row.
//! - `店舗登録`: A number, B name, C LINE user ID, D phone, E user type.
//! - `応募記録`: A timestamp, B request ID, C pharmacist ID, D pharmacist
//!   name, E store name, F date, G time slot, H status.

use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use url::Url;

use shared::models::{Application, ApplicationStatus, Pharmacist, Store, TimeSlot, UserType};
use shared::validation::is_available_for_slot;

use crate::error::{AppError, AppResult};

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const STORE_SHEET: &str = "店舗登録";
const APPLICATION_SHEET: &str = "応募記録";

// ============================================================================
// Service account auth
// ============================================================================

/// Google service account credentials (the fields we need from the JSON)
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// JWT claims for the OAuth2 JWT-bearer grant
#[derive(Debug, Serialize)]
struct TokenClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

// ============================================================================
// Raw client
// ============================================================================

/// Low-level Sheets v4 REST client with service-account auth
#[derive(Clone)]
pub struct SheetsClient {
    http_client: reqwest::Client,
    spreadsheet_id: String,
    key: Option<ServiceAccountKey>,
    token: Arc<Mutex<Option<CachedToken>>>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct ValueRangeBody {
    values: Vec<Vec<String>>,
}

impl SheetsClient {
    /// Create a client from a credentials file path.
    ///
    /// A missing or unreadable credentials file is a startup warning, not a
    /// failure; every operation then reports the sheet as unavailable.
    pub fn new(credentials_file: &str, spreadsheet_id: &str) -> Self {
        let key = match fs::read_to_string(credentials_file) {
            Ok(raw) => match serde_json::from_str::<ServiceAccountKey>(&raw) {
                Ok(key) => Some(key),
                Err(e) => {
                    tracing::warn!("Failed to parse Google credentials file: {}", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Google credentials file '{}' unavailable: {}",
                    credentials_file,
                    e
                );
                None
            }
        };
        if spreadsheet_id.is_empty() {
            tracing::warn!("SPREADSHEET_ID is not set");
        }

        Self {
            http_client: reqwest::Client::new(),
            spreadsheet_id: spreadsheet_id.to_string(),
            key,
            token: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.key.is_some() && !self.spreadsheet_id.is_empty()
    }

    fn unavailable() -> AppError {
        AppError::SheetsApi("Google Sheets service not available".to_string())
    }

    /// Get a bearer token, minting a fresh one when the cache is empty or
    /// within a minute of expiry.
    async fn bearer_token(&self) -> AppResult<String> {
        let key = self.key.as_ref().ok_or_else(Self::unavailable)?;

        let mut cache = self.token.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.expires_at > Instant::now() + Duration::from_secs(60) {
                return Ok(cached.token.clone());
            }
        }

        let now = chrono::Utc::now().timestamp();
        let claims = TokenClaims {
            iss: &key.client_email,
            scope: SHEETS_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| AppError::SheetsApi(format!("invalid service account key: {}", e)))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| AppError::SheetsApi(format!("failed to sign token request: {}", e)))?;

        let response = self
            .http_client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::SheetsApi(format!(
                "token request rejected ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::SheetsApi(format!("invalid token response: {}", e)))?;

        let bearer = token.access_token.clone();
        *cache = Some(CachedToken {
            token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(bearer)
    }

    fn values_url(&self, range: &str, suffix: &str) -> AppResult<Url> {
        let mut url = Url::parse(SHEETS_API_BASE)
            .map_err(|e| AppError::SheetsApi(format!("invalid API base: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::SheetsApi("invalid API base".to_string()))?
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&format!("{}{}", range, suffix));
        Ok(url)
    }

    /// Read a range of cell values
    pub async fn values_get(&self, range: &str) -> AppResult<Vec<Vec<String>>> {
        let token = self.bearer_token().await?;
        let url = self.values_url(range, "")?;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(format!("values.get failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::api_error("values.get", response).await);
        }

        let parsed: ValueRange = response
            .json()
            .await
            .map_err(|e| AppError::SheetsApi(format!("invalid values.get response: {}", e)))?;
        Ok(parsed.values)
    }

    /// Overwrite a range of cell values (RAW input)
    pub async fn values_update(&self, range: &str, values: Vec<Vec<String>>) -> AppResult<()> {
        let token = self.bearer_token().await?;
        let mut url = self.values_url(range, "")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW");

        let response = self
            .http_client
            .put(url)
            .bearer_auth(token)
            .json(&ValueRangeBody { values })
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(format!("values.update failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::api_error("values.update", response).await);
        }
        Ok(())
    }

    /// Append rows to a range (RAW input, INSERT_ROWS)
    pub async fn values_append(&self, range: &str, values: Vec<Vec<String>>) -> AppResult<()> {
        let token = self.bearer_token().await?;
        let mut url = self.values_url(range, ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let response = self
            .http_client
            .post(url)
            .bearer_auth(token)
            .json(&ValueRangeBody { values })
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(format!("values.append failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::api_error("values.append", response).await);
        }
        Ok(())
    }

    async fn api_error(op: &str, response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        AppError::SheetsApi(format!("{} rejected ({}): {}", op, status, body))
    }
}

// ============================================================================
// Domain operations
// ============================================================================

/// A pharmacist row in a monthly schedule sheet
#[derive(Debug, Clone)]
pub struct PharmacistRow {
    pub pharmacist: Pharmacist,
    pub user_type: UserType,
    /// 1-based sheet row number
    pub row: u32,
}

/// A store row in the store registry sheet
#[derive(Debug, Clone)]
pub struct StoreRow {
    pub store: Store,
    /// 1-based sheet row number
    pub row: u32,
}

/// Outcome of a store registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Created,
    Updated,
}

/// Sheet-facing operations for the shift coordination domain
#[derive(Clone)]
pub struct SheetsService {
    client: SheetsClient,
}

impl SheetsService {
    pub fn new(client: SheetsClient) -> Self {
        Self { client }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    /// Monthly schedule tab name for a date (e.g. `2025-07`)
    pub fn sheet_name(date: NaiveDate) -> String {
        date.format("%Y-%m").to_string()
    }

    /// List pharmacists from a monthly sheet (rows A2:D100)
    pub async fn pharmacist_list(&self, sheet: &str) -> AppResult<Vec<PharmacistRow>> {
        let rows = self
            .client
            .values_get(&format!("{}!A2:D100", sheet))
            .await?;

        let mut pharmacists = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let name = row.first().map(|s| s.trim()).unwrap_or_default();
            if name.is_empty() {
                continue;
            }
            let cell = |idx: usize| row.get(idx).map(|s| s.trim().to_string()).unwrap_or_default();
            let user_type = match cell(3).as_str() {
                "store" => UserType::Store,
                "admin" => UserType::Admin,
                _ => UserType::Pharmacist,
            };
            pharmacists.push(PharmacistRow {
                pharmacist: Pharmacist {
                    id: format!("pharm_{:03}", i + 1),
                    name: name.to_string(),
                    line_user_id: cell(1),
                    phone: cell(2),
                    availability: Vec::new(),
                    rating: None,
                    experience_years: None,
                },
                user_type,
                row: (i + 2) as u32,
            });
        }

        tracing::info!("Found {} pharmacists in sheet {}", pharmacists.len(), sheet);
        Ok(pharmacists)
    }

    /// Pharmacists free for the given date and slot, per their schedule
    /// column in the monthly sheet.
    pub async fn available_pharmacists(
        &self,
        date: NaiveDate,
        slot: TimeSlot,
    ) -> AppResult<Vec<Pharmacist>> {
        let sheet = Self::sheet_name(date);
        let pharmacists = self.pharmacist_list(&sheet).await?;
        if pharmacists.is_empty() {
            return Ok(Vec::new());
        }

        let day_col = self.day_column(date, &sheet).await?;
        let col = column_letter(day_col);
        let range = format!("{}!{}2:{}{}", sheet, col, col, pharmacists.len() + 1);
        let schedule = self.client.values_get(&range).await?;

        let available = pharmacists
            .into_iter()
            .enumerate()
            .filter(|(i, _)| {
                let cell = schedule
                    .get(*i)
                    .and_then(|row| row.first())
                    .map(String::as_str)
                    .unwrap_or("");
                is_available_for_slot(cell, slot)
            })
            .map(|(_, row)| row.pharmacist)
            .collect::<Vec<_>>();

        tracing::info!(
            "Found {} available pharmacists for {} {:?}",
            available.len(),
            date,
            slot
        );
        Ok(available)
    }

    /// Find a pharmacist row by LINE user ID in the current month's sheet
    pub async fn find_pharmacist_by_user_id(
        &self,
        user_id: &str,
    ) -> AppResult<Option<PharmacistRow>> {
        let sheet = Self::sheet_name(Local::now().date_naive());
        let pharmacists = self.pharmacist_list(&sheet).await?;
        Ok(pharmacists
            .into_iter()
            .find(|p| p.pharmacist.line_user_id == user_id))
    }

    /// Write a pharmacist's LINE user ID into the row matching name+phone.
    pub async fn register_pharmacist_user_id(
        &self,
        name: &str,
        phone: &str,
        user_id: &str,
    ) -> AppResult<()> {
        let sheet = Self::sheet_name(Local::now().date_naive());
        let pharmacists = self.pharmacist_list(&sheet).await?;

        let target = pharmacists
            .iter()
            .find(|p| p.pharmacist.name == name && p.pharmacist.phone == phone)
            .ok_or_else(|| {
                tracing::warn!(
                    "Pharmacist not found for name='{}' phone='{}' in sheet {}",
                    name,
                    phone,
                    sheet
                );
                AppError::NotFound(format!("Pharmacist '{}'", name))
            })?;

        self.client
            .values_update(
                &format!("{}!B{}", sheet, target.row),
                vec![vec![user_id.to_string()]],
            )
            .await?;

        tracing::info!(
            "Registered LINE user ID for pharmacist {} at row {}",
            name,
            target.row
        );
        Ok(())
    }

    /// List registered stores (rows A2:E100 of the store registry sheet)
    pub async fn store_list(&self) -> AppResult<Vec<StoreRow>> {
        let rows = self
            .client
            .values_get(&format!("{}!A2:E100", STORE_SHEET))
            .await?;

        let mut stores = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            let number = row.first().map(|s| s.trim()).unwrap_or_default();
            let name = row.get(1).map(|s| s.trim()).unwrap_or_default();
            if number.is_empty() || name.is_empty() {
                continue;
            }
            let cell = |idx: usize| row.get(idx).map(|s| s.trim().to_string()).unwrap_or_default();
            let mut store = Store::new(number, name);
            store.line_user_id = cell(2);
            let phone = cell(3);
            store.phone = (!phone.is_empty()).then_some(phone);
            stores.push(StoreRow {
                store,
                row: (i + 2) as u32,
            });
        }

        tracing::info!("Found {} stores in sheet {}", stores.len(), STORE_SHEET);
        Ok(stores)
    }

    /// Find a store row by its LINE user ID
    pub async fn find_store_by_user_id(&self, user_id: &str) -> AppResult<Option<StoreRow>> {
        let stores = self.store_list().await?;
        Ok(stores.into_iter().find(|s| s.store.line_user_id == user_id))
    }

    /// Register a store: update the LINE user ID when the number+name row
    /// already exists, append a new row otherwise.
    pub async fn register_store(
        &self,
        number: &str,
        name: &str,
        user_id: &str,
    ) -> AppResult<RegistrationOutcome> {
        let stores = self.store_list().await?;

        if let Some(existing) = stores
            .iter()
            .find(|s| s.store.store_number == number && s.store.store_name == name)
        {
            self.client
                .values_update(
                    &format!("{}!C{}", STORE_SHEET, existing.row),
                    vec![vec![user_id.to_string()]],
                )
                .await?;
            tracing::info!(
                "Updated LINE user ID for store {} {} at row {}",
                number,
                name,
                existing.row
            );
            return Ok(RegistrationOutcome::Updated);
        }

        self.client
            .values_append(
                &format!("{}!A:E", STORE_SHEET),
                vec![vec![
                    number.to_string(),
                    name.to_string(),
                    user_id.to_string(),
                    String::new(),
                    "store".to_string(),
                ]],
            )
            .await?;
        tracing::info!("Registered new store {} {}", number, name);
        Ok(RegistrationOutcome::Created)
    }

    /// Append an application row to the application log sheet
    pub async fn record_application(
        &self,
        application: &Application,
        store_name: &str,
        date: NaiveDate,
        slot: TimeSlot,
    ) -> AppResult<()> {
        let row = vec![
            Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            application.request_id.clone(),
            application.pharmacist_id.clone(),
            application.pharmacist_name.clone(),
            store_name.to_string(),
            date.format("%Y-%m-%d").to_string(),
            slot.label().to_string(),
            status_label(application.status).to_string(),
        ];

        self.client
            .values_append(&format!("{}!A:H", APPLICATION_SHEET), vec![row])
            .await?;

        tracing::info!(
            "Recorded application for {} (request: {})",
            application.pharmacist_name,
            application.request_id
        );
        Ok(())
    }

    /// Conditionally update an application's status.
    ///
    /// The write only happens when the current sheet value equals the
    /// expected prior status; anything else is reported as a conflict so a
    /// concurrent settlement cannot be overwritten.
    pub async fn update_application_status(
        &self,
        request_id: &str,
        pharmacist_name: &str,
        expected: ApplicationStatus,
        new: ApplicationStatus,
    ) -> AppResult<()> {
        let rows = self
            .client
            .values_get(&format!("{}!A2:H500", APPLICATION_SHEET))
            .await?;

        let (index, row) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| {
                row.get(1).map(String::as_str) == Some(request_id)
                    && row.get(3).map(String::as_str) == Some(pharmacist_name)
            })
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Application for request {} by {}",
                    request_id, pharmacist_name
                ))
            })?;

        let current = row.get(7).map(String::as_str).unwrap_or_default();
        if current != status_label(expected) {
            return Err(AppError::Conflict {
                resource: "応募記録".to_string(),
                message: format!(
                    "application status is '{}', expected '{}'",
                    current,
                    status_label(expected)
                ),
            });
        }

        self.client
            .values_update(
                &format!("{}!H{}", APPLICATION_SHEET, index + 2),
                vec![vec![status_label(new).to_string()]],
            )
            .await?;

        tracing::info!(
            "Updated application status for {} (request: {}) to {:?}",
            pharmacist_name,
            request_id,
            new
        );
        Ok(())
    }

    /// Write a confirmed-shift entry into a pharmacist's day cell
    pub async fn write_schedule_entry(
        &self,
        date: NaiveDate,
        pharmacist_row: u32,
        entry: &str,
    ) -> AppResult<()> {
        let sheet = Self::sheet_name(date);
        let day_col = self.day_column(date, &sheet).await?;
        let range = format!("{}!{}{}", sheet, column_letter(day_col), pharmacist_row);

        self.client
            .values_update(&range, vec![vec![entry.to_string()]])
            .await?;

        tracing::info!("Wrote schedule entry at {}: {}", range, entry);
        Ok(())
    }

    /// Resolve a date to its 0-based column index from the `M/D` header row
    pub async fn day_column(&self, date: NaiveDate, sheet: &str) -> AppResult<usize> {
        use chrono::Datelike;
        let rows = self.client.values_get(&format!("{}!1:1", sheet)).await?;
        let header = rows.into_iter().next().unwrap_or_default();
        find_day_column(&header, date).ok_or_else(|| {
            AppError::NotFound(format!(
                "Date column {}/{} in sheet {}",
                date.month(),
                date.day(),
                sheet
            ))
        })
    }
}

/// Format a confirmed-shift cell entry
pub fn schedule_entry(slot: TimeSlot, store_name: &str) -> String {
    format!("確定 {} - {}", slot.label(), store_name)
}

/// Sheet label for an application status
pub fn status_label(status: ApplicationStatus) -> &'static str {
    match status {
        ApplicationStatus::Pending => "応募中",
        ApplicationStatus::Accepted => "確定",
        ApplicationStatus::Rejected => "見送り",
    }
}

/// Locate the 0-based column whose header cell is the date's `M/D` label
pub fn find_day_column(header: &[String], date: NaiveDate) -> Option<usize> {
    use chrono::Datelike;
    let label = format!("{}/{}", date.month(), date.day());
    header.iter().position(|cell| cell.trim() == label)
}

/// Convert a 0-based column index to its A1-notation letter(s)
pub fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_name_is_year_month() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 3).unwrap();
        assert_eq!(SheetsService::sheet_name(date), "2025-07");
    }

    #[test]
    fn test_column_letter_single() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(3), "D");
        assert_eq!(column_letter(25), "Z");
    }

    #[test]
    fn test_column_letter_double() {
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(51), "AZ");
        assert_eq!(column_letter(52), "BA");
    }

    #[test]
    fn test_find_day_column() {
        let header: Vec<String> = ["名前", "LINE ID", "電話番号", "7/1", "7/2", "7/3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let date = NaiveDate::from_ymd_opt(2025, 7, 2).unwrap();
        assert_eq!(find_day_column(&header, date), Some(4));

        let missing = NaiveDate::from_ymd_opt(2025, 8, 2).unwrap();
        assert_eq!(find_day_column(&header, missing), None);
    }

    #[test]
    fn test_find_day_column_no_zero_padding() {
        // Header labels are written without zero padding.
        let header: Vec<String> = ["名前", "ID", "電話", "12/5"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let date = NaiveDate::from_ymd_opt(2025, 12, 5).unwrap();
        assert_eq!(find_day_column(&header, date), Some(3));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(status_label(ApplicationStatus::Pending), "応募中");
        assert_eq!(status_label(ApplicationStatus::Accepted), "確定");
        assert_eq!(status_label(ApplicationStatus::Rejected), "見送り");
    }

    #[test]
    fn test_schedule_entry_blocks_future_requests() {
        let entry = schedule_entry(TimeSlot::Morning, "サンライズ薬局");
        assert_eq!(entry, "確定 午前 (9:00-13:00) - サンライズ薬局");
        // The written entry must read as unavailable afterwards.
        assert!(!is_available_for_slot(&entry, TimeSlot::Morning));
        assert!(!is_available_for_slot(&entry, TimeSlot::FullDay));
    }

    #[test]
    fn test_unconfigured_client_reports_unavailable() {
        let client = SheetsClient::new("/nonexistent/credentials.json", "");
        assert!(!client.is_configured());
    }
}
