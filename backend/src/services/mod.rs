//! Business logic services for the Pharmacy Shift Coordination System

pub mod line;
pub mod notification;
pub mod schedule;
pub mod session;
pub mod sheets;

pub use line::LineClient;
pub use notification::{PharmacistNotifier, StoreNotifier};
pub use schedule::ShiftRequestService;
pub use session::{RequestStore, SessionStore};
pub use sheets::{SheetsClient, SheetsService};
