//! Collaborator traits — the seams the notification engine is wired against.
//!
//! Each trait is object-safe and shared as `Arc<dyn Trait>`, so production
//! backends and in-memory test doubles are interchangeable.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{NotificationEvent, OutgoingEmail, Student};

/// Read side of the student/payment store.
#[async_trait]
pub trait StudentStore: Send + Sync {
    /// All students whose `payment_status` is `active`.
    async fn active_students(&self) -> Result<Vec<Student>>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

/// Append-only notification log.
#[async_trait]
pub trait NotificationLog: Send + Sync {
    async fn append(&self, event: &NotificationEvent) -> Result<()>;
}

/// Outbound email delivery. `Ok(())` means transport-level acceptance only.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;

    fn name(&self) -> &str;
}
