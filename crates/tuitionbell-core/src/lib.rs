//! # TuitionBell Core
//!
//! Shared foundation for every TuitionBell crate: the student and
//! notification data model, the collaborator traits the engine is wired
//! against, the error taxonomy, and configuration loading.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::TuitionBellConfig;
pub use error::{Result, TuitionError};
pub use traits::{EmailTransport, NotificationLog, StudentStore};
pub use types::{
    NotificationEvent, NotificationKind, NotificationOutcome, NotificationRunResult,
    OutgoingEmail, PaymentStatus, Student, StudentId,
};
