//! Domain models for the Pharmacy Shift Coordination System

pub mod schedule;
pub mod user;

pub use schedule::*;
pub use user::*;
