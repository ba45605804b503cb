//! # TuitionBell Notify
//!
//! The decision-and-delivery core. One pass per run:
//!
//! ```text
//! StudentStore::active_students()
//!   └── for each student
//!         ├── days_until(next_due_date, today) → classify()
//!         │     7,3,1 → reminder   0 → due   -1,-3,-7 → overdue
//!         ├── compose() → EmailTransport::send()
//!         └── on success → NotificationLog::append()
//! ```

pub mod classify;
pub mod engine;
pub mod message;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use classify::{classify, days_until};
pub use engine::{NotificationEngine, reference_at};
pub use message::compose;
