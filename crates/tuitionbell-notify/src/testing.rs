//! In-memory collaborators for tests.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

use tuitionbell_core::{
    EmailTransport, NotificationEvent, NotificationLog, OutgoingEmail, PaymentStatus, Result,
    Student, StudentId, StudentStore, TuitionError,
};

/// Build an active student with predictable name/email fields.
pub fn student(id: i64, name: &str, next_due_date: &str) -> Student {
    Student {
        id: StudentId::Number(id),
        name: name.to_string(),
        parent_name: format!("Parent of {name}"),
        email: format!("{}@example.com", name.to_lowercase()),
        payment_status: PaymentStatus::Active,
        next_due_date: next_due_date.to_string(),
    }
}

/// Student store + notification log held in memory.
///
/// Like a real store, `active_students` filters on status unless
/// `leak_inactive` is set, which lets tests check the engine's own guard.
#[derive(Default)]
pub struct MemoryStore {
    students: Mutex<Vec<Student>>,
    events: Mutex<Vec<NotificationEvent>>,
    fail_reads: bool,
    fail_writes: bool,
    leak_inactive: bool,
}

impl MemoryStore {
    pub fn new(students: Vec<Student>) -> Self {
        Self {
            students: Mutex::new(students),
            ..Self::default()
        }
    }

    /// A store whose query always errors.
    pub fn unreachable() -> Self {
        Self {
            fail_reads: true,
            ..Self::default()
        }
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn leaking_inactive(mut self) -> Self {
        self.leak_inactive = true;
        self
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StudentStore for MemoryStore {
    async fn active_students(&self) -> Result<Vec<Student>> {
        if self.fail_reads {
            return Err(TuitionError::DataAccess("connection refused".into()));
        }
        let students = self
            .students
            .lock()
            .map_err(|e| TuitionError::DataAccess(format!("Lock: {e}")))?;
        Ok(students
            .iter()
            .filter(|s| self.leak_inactive || s.is_active())
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[async_trait]
impl NotificationLog for MemoryStore {
    async fn append(&self, event: &NotificationEvent) -> Result<()> {
        if self.fail_writes {
            return Err(TuitionError::DataAccess("insert rejected".into()));
        }
        self.events
            .lock()
            .map_err(|e| TuitionError::DataAccess(format!("Lock: {e}")))?
            .push(event.clone());
        Ok(())
    }
}

/// Mailer that records every message and fails for chosen recipients.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    reject: HashSet<String>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every send addressed to `to`.
    pub fn rejecting(mut self, to: &str) -> Self {
        self.reject.insert(to.to_string());
        self
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailTransport for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        if self.reject.contains(&email.to) {
            return Err(TuitionError::Transport(format!("550 mailbox unavailable: {}", email.to)));
        }
        self.sent
            .lock()
            .map_err(|e| TuitionError::Transport(format!("Lock: {e}")))?
            .push(email.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
