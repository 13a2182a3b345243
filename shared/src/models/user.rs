//! User models: stores and pharmacists

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a registered LINE user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Store,
    Pharmacist,
    Admin,
}

impl Default for UserType {
    fn default() -> Self {
        UserType::Pharmacist
    }
}

/// A pharmacy location that originates shift requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    /// Store number as registered in the spreadsheet (e.g. "002")
    pub store_number: String,
    pub store_name: String,
    /// LINE user ID of the store account, empty until registered
    #[serde(default)]
    pub line_user_id: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    pub fn new(store_number: impl Into<String>, store_name: impl Into<String>) -> Self {
        let now = Utc::now();
        let store_number = store_number.into();
        Self {
            id: format!("store_{}", store_number),
            store_number,
            store_name: store_name.into(),
            line_user_id: String::new(),
            phone: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A pharmacist who receives and responds to shift requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pharmacist {
    pub id: String,
    pub name: String,
    /// Contact phone number, empty if not recorded
    #[serde(default)]
    pub phone: String,
    /// LINE user ID, empty until the pharmacist registers via the bot
    #[serde(default)]
    pub line_user_id: String,
    /// Time slots the pharmacist prefers to work
    #[serde(default)]
    pub availability: Vec<super::TimeSlot>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub experience_years: Option<u8>,
}

impl Pharmacist {
    /// Whether the record carries a LINE user ID that push messages can target.
    ///
    /// LINE user IDs are "U" followed by 32 hex characters.
    pub fn has_valid_line_id(&self) -> bool {
        let id = self.line_user_id.as_str();
        id.len() == 33
            && id.starts_with('U')
            && id[1..].chars().all(|c| c.is_ascii_hexdigit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_line_id() {
        let mut p = Pharmacist {
            id: "pharm_001".to_string(),
            name: "田中薬剤師".to_string(),
            phone: "090-1234-5678".to_string(),
            line_user_id: format!("U{}", "a".repeat(32)),
            availability: vec![],
            rating: None,
            experience_years: None,
        };
        assert!(p.has_valid_line_id());

        p.line_user_id = String::new();
        assert!(!p.has_valid_line_id());

        p.line_user_id = "U123".to_string();
        assert!(!p.has_valid_line_id());

        // wrong prefix
        p.line_user_id = format!("X{}", "a".repeat(32));
        assert!(!p.has_valid_line_id());

        // non-hex payload
        p.line_user_id = format!("U{}", "z".repeat(32));
        assert!(!p.has_valid_line_id());
    }

    #[test]
    fn test_store_new_derives_id() {
        let store = Store::new("002", "サンライズ薬局");
        assert_eq!(store.id, "store_002");
        assert_eq!(store.store_number, "002");
        assert_eq!(store.store_name, "サンライズ薬局");
        assert!(store.line_user_id.is_empty());
    }
}
