//! Data model — student records in, notification events and outcomes out.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{Result, TuitionError};

/// Wire format of `next_due_date`.
pub const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Error text recorded when the email transport reports failure.
pub const SEND_FAILED: &str = "Failed to send email";

/// Opaque student identifier — integer or text, whatever the store uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StudentId {
    Number(i64),
    Text(String),
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudentId::Number(n) => write!(f, "{n}"),
            StudentId::Text(s) => f.write_str(s),
        }
    }
}

impl Default for StudentId {
    fn default() -> Self {
        StudentId::Text(String::new())
    }
}

impl From<i64> for StudentId {
    fn from(n: i64) -> Self {
        StudentId::Number(n)
    }
}

impl From<&str> for StudentId {
    fn from(s: &str) -> Self {
        StudentId::Text(s.to_string())
    }
}

/// Billing state of a student. Only `Active` students are ever notified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Active,
    Inactive,
    #[default]
    #[serde(other)]
    Other,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Active => "active",
            PaymentStatus::Inactive => "inactive",
            PaymentStatus::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "active" => PaymentStatus::Active,
            "inactive" => PaymentStatus::Inactive,
            _ => PaymentStatus::Other,
        }
    }
}

/// A student record as owned by the external store.
///
/// Decoding any JSON object succeeds: missing or oddly typed columns come
/// through as text (or `Other` status) and are judged per record later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: StudentId,
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub name: String,
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub parent_name: String,
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_status")]
    pub payment_status: PaymentStatus,
    /// Raw `YYYY-MM-DD` text; parsed per record so one bad row can't sink a batch.
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub next_due_date: String,
}

impl Student {
    pub fn is_active(&self) -> bool {
        self.payment_status == PaymentStatus::Active
    }

    /// Parse `next_due_date` as a calendar date.
    pub fn due_date(&self) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(&self.next_due_date, DUE_DATE_FORMAT).map_err(|e| {
            TuitionError::MalformedRecord {
                student_id: self.id.to_string(),
                reason: format!("next_due_date '{}': {e}", self.next_due_date),
            }
        })
    }
}

fn scalar_as_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<StudentId, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => match n.as_i64() {
            Some(n) => StudentId::Number(n),
            None => StudentId::Text(n.to_string()),
        },
        Value::String(s) => StudentId::Text(s),
        Value::Null => StudentId::default(),
        other => StudentId::Text(other.to_string()),
    })
}

fn lenient_status<'de, D>(deserializer: D) -> std::result::Result<PaymentStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => PaymentStatus::parse(&s),
        _ => PaymentStatus::Other,
    })
}

/// Contact type assigned from the signed day distance to the due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Reminder,
    Due,
    Overdue,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Reminder => "reminder",
            NotificationKind::Due => "due",
            NotificationKind::Overdue => "overdue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reminder" => Some(NotificationKind::Reminder),
            "due" => Some(NotificationKind::Due),
            "overdue" => Some(NotificationKind::Overdue),
            _ => None,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record that a student was notified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub student_id: StudentId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub sent_date: DateTime<FixedOffset>,
}

/// A rendered message ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Per-student entry of a run's result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationOutcome {
    pub success: bool,
    pub student: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NotificationKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotificationOutcome {
    pub fn sent(student: &str, kind: NotificationKind) -> Self {
        Self {
            success: true,
            student: student.to_string(),
            kind: Some(kind),
            error: None,
        }
    }

    pub fn failed(student: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            student: student.to_string(),
            kind: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregated result of one engine run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationRunResult {
    pub results: Vec<NotificationOutcome>,
}

impl NotificationRunResult {
    pub fn sent_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_from_store_row() {
        let row = serde_json::json!({
            "id": 42,
            "name": "Mia",
            "parent_name": "Ana",
            "email": "ana@example.com",
            "payment_status": "active",
            "next_due_date": "2026-03-17",
            "created_at": "2026-01-01T00:00:00Z"
        });
        let student: Student = serde_json::from_value(row).unwrap();
        assert_eq!(student.id, StudentId::Number(42));
        assert!(student.is_active());
        assert_eq!(
            student.due_date().unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 17).unwrap()
        );
    }

    #[test]
    fn test_unknown_status_and_null_fields() {
        let row = serde_json::json!({
            "id": "a1b2",
            "name": "Leo",
            "parent_name": null,
            "email": "x@example.com",
            "payment_status": "suspended",
            "next_due_date": null
        });
        let student: Student = serde_json::from_value(row).unwrap();
        assert_eq!(student.payment_status, PaymentStatus::Other);
        assert_eq!(student.parent_name, "");
        assert!(matches!(
            student.due_date(),
            Err(TuitionError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_odd_rows_still_decode() {
        let rows = serde_json::json!([
            {
                "id": 1,
                "name": "Mia",
                "parent_name": "Ana",
                "email": "ana@example.com",
                "payment_status": "active",
                "next_due_date": "2026-03-17"
            },
            {
                "id": 2,
                "name": "Leo",
                "email": "leo@example.com",
                "payment_status": "active",
                "next_due_date": 20260317
            },
            { "id": 3.5, "payment_status": null }
        ]);
        let students: Vec<Student> = serde_json::from_value(rows).unwrap();
        assert_eq!(students.len(), 3);

        assert!(students[0].due_date().is_ok());

        assert_eq!(students[1].parent_name, "");
        assert_eq!(students[1].next_due_date, "20260317");
        assert!(matches!(
            students[1].due_date(),
            Err(TuitionError::MalformedRecord { .. })
        ));

        assert_eq!(students[2].id, StudentId::Text("3.5".into()));
        assert_eq!(students[2].payment_status, PaymentStatus::Other);
        assert_eq!(students[2].name, "");
    }

    #[test]
    fn test_outcome_wire_shape() {
        let ok = serde_json::to_value(NotificationOutcome::sent("Mia", NotificationKind::Due)).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "student": "Mia", "type": "due"}));

        let failed = serde_json::to_value(NotificationOutcome::failed("Mia", SEND_FAILED)).unwrap();
        assert_eq!(
            failed,
            serde_json::json!({"success": false, "student": "Mia", "error": "Failed to send email"})
        );
    }

    #[test]
    fn test_event_serializes_type_field() {
        let event = NotificationEvent {
            student_id: StudentId::Number(7),
            kind: NotificationKind::Overdue,
            sent_date: DateTime::parse_from_rfc3339("2026-03-10T09:00:00+00:00").unwrap(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["student_id"], 7);
        assert_eq!(value["type"], "overdue");
    }
}
