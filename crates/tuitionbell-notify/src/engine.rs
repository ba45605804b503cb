//! Notification Engine — one read, then classify → send → log per student.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone};
use tokio::sync::Mutex;

use tuitionbell_core::types::SEND_FAILED;
use tuitionbell_core::{
    EmailTransport, NotificationEvent, NotificationKind, NotificationLog, NotificationOutcome,
    NotificationRunResult, Result, Student, StudentStore, TuitionError,
};

use crate::classify::{classify, days_until};
use crate::message::compose;

/// The notification engine.
///
/// Owns its collaborators and processes students strictly one after another.
/// Runs on the same engine are serialized; nothing stops two sequential runs
/// on the same day from notifying the same student twice.
pub struct NotificationEngine {
    students: Arc<dyn StudentStore>,
    log: Arc<dyn NotificationLog>,
    mailer: Arc<dyn EmailTransport>,
    run_lock: Mutex<()>,
}

impl NotificationEngine {
    pub fn new(
        students: Arc<dyn StudentStore>,
        log: Arc<dyn NotificationLog>,
        mailer: Arc<dyn EmailTransport>,
    ) -> Self {
        Self {
            students,
            log,
            mailer,
            run_lock: Mutex::new(()),
        }
    }

    /// Run with the current local time as "today".
    pub async fn run_now(&self) -> Result<NotificationRunResult> {
        self.run(Local::now().fixed_offset()).await
    }

    /// Run once against `reference`.
    ///
    /// Fails only when the store read or a log write fails; transport
    /// failures and malformed records become failed outcomes.
    pub async fn run(&self, reference: DateTime<FixedOffset>) -> Result<NotificationRunResult> {
        let _guard = self.run_lock.lock().await;
        let today = reference.date_naive();

        tracing::info!(
            "🔔 Notification run for {today} (store={}, mailer={})",
            self.students.name(),
            self.mailer.name()
        );

        let students = self.students.active_students().await.map_err(into_data_access)?;
        tracing::debug!("Fetched {} active student(s)", students.len());

        let mut result = NotificationRunResult::default();
        let mut skipped = 0usize;

        for student in &students {
            // Stores filter on status; this guards against ones that don't.
            if !student.is_active() {
                skipped += 1;
                continue;
            }

            let kind = match classify_student(student, today) {
                Ok(Some(kind)) => kind,
                Ok(None) => {
                    skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!("⚠️ Skipping student {}: {e}", student.id);
                    result.results.push(NotificationOutcome::failed(
                        &student.name,
                        format!("Malformed due date: {}", student.next_due_date),
                    ));
                    continue;
                }
            };

            let outcome = self.deliver(student, kind, reference).await?;
            result.results.push(outcome);
        }

        tracing::info!(
            "✅ Notification run done: {} sent, {} failed, {} not due",
            result.sent_count(),
            result.failed_count(),
            skipped
        );
        Ok(result)
    }

    async fn deliver(
        &self,
        student: &Student,
        kind: NotificationKind,
        reference: DateTime<FixedOffset>,
    ) -> Result<NotificationOutcome> {
        let email = compose(student, kind);

        if let Err(e) = self.mailer.send(&email).await {
            tracing::warn!("⚠️ {kind} email for {} failed: {e}", student.name);
            return Ok(NotificationOutcome::failed(&student.name, SEND_FAILED));
        }

        let event = NotificationEvent {
            student_id: student.id.clone(),
            kind,
            sent_date: reference,
        };
        self.log.append(&event).await.map_err(into_data_access)?;

        tracing::info!("📧 {kind} sent for {} to {}", student.name, email.to);
        Ok(NotificationOutcome::sent(&student.name, kind))
    }
}

/// Reference time for a caller-chosen day: local midnight of `date`, with
/// that day's own UTC offset.
pub fn reference_at(date: NaiveDate) -> DateTime<FixedOffset> {
    let midnight = date.and_time(NaiveTime::MIN);
    // A DST jump can skip midnight; take the first hour of the day that exists.
    (0..3)
        .find_map(|h| {
            Local
                .from_local_datetime(&(midnight + Duration::hours(h)))
                .earliest()
        })
        .map(|local| local.fixed_offset())
        .unwrap_or_else(|| {
            let offset = *Local::now().offset();
            DateTime::from_naive_utc_and_offset(
                midnight - Duration::seconds(offset.local_minus_utc().into()),
                offset,
            )
        })
}

fn classify_student(student: &Student, today: NaiveDate) -> Result<Option<NotificationKind>> {
    let due = student.due_date()?;
    Ok(classify(days_until(due, today)))
}

fn into_data_access(e: TuitionError) -> TuitionError {
    match e {
        TuitionError::DataAccess(_) => e,
        other => TuitionError::DataAccess(other.to_string()),
    }
}
