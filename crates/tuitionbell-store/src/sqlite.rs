//! SQLite store — students and the notification log in one local database.

use async_trait::async_trait;
use chrono::DateTime;
use rusqlite::types::Value;
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::Mutex;

use tuitionbell_core::{
    NotificationEvent, NotificationKind, NotificationLog, PaymentStatus, Result, Student,
    StudentId, StudentStore, TuitionError,
};

/// Embedded student store and notification log.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> TuitionError + '_ {
    move |e| TuitionError::DataAccess(format!("{context}: {e}"))
}

/// Student ids keep whatever SQL type they were written with.
fn id_to_sql(id: &StudentId) -> Value {
    match id {
        StudentId::Number(n) => Value::Integer(*n),
        StudentId::Text(s) => Value::Text(s.clone()),
    }
}

fn id_from_sql(value: Value) -> rusqlite::Result<StudentId> {
    match value {
        Value::Integer(n) => Ok(StudentId::Number(n)),
        Value::Text(s) => Ok(StudentId::Text(s)),
        other => Err(rusqlite::Error::InvalidColumnType(
            0,
            "id".into(),
            other.data_type(),
        )),
    }
}

fn row_to_student(row: &rusqlite::Row) -> rusqlite::Result<Student> {
    Ok(Student {
        id: id_from_sql(row.get(0)?)?,
        name: row.get(1)?,
        parent_name: row.get(2)?,
        email: row.get(3)?,
        payment_status: PaymentStatus::parse(&row.get::<_, String>(4)?),
        next_due_date: row.get(5)?,
    })
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err("DB open"))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        Self::with_connection(conn)
    }

    /// Throwaway in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("DB open"))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| TuitionError::DataAccess(format!("Lock: {e}")))
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            -- Untyped id column: integer and text ids keep their type.
            CREATE TABLE IF NOT EXISTS students (
                id NOT NULL PRIMARY KEY,
                name TEXT NOT NULL,
                parent_name TEXT NOT NULL DEFAULT '',
                email TEXT NOT NULL,
                payment_status TEXT NOT NULL DEFAULT 'active',
                next_due_date TEXT NOT NULL
            );

            -- Append-only: one row per successful send.
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                student_id NOT NULL,
                type TEXT NOT NULL,
                sent_date TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_notifications_student ON notifications(student_id);
            ",
        )
        .map_err(db_err("Migration"))?;
        Ok(())
    }

    /// Insert or replace a student record.
    pub fn upsert_student(&self, student: &Student) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO students (id, name, parent_name, email, payment_status, next_due_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id_to_sql(&student.id),
                student.name,
                student.parent_name,
                student.email,
                student.payment_status.as_str(),
                student.next_due_date,
            ],
        )
        .map_err(db_err("Save student"))?;
        Ok(())
    }

    /// All students regardless of status.
    pub fn list_students(&self) -> Result<Vec<Student>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, name, parent_name, email, payment_status, next_due_date FROM students ORDER BY rowid")
            .map_err(db_err("List students"))?;
        let rows = stmt
            .query_map([], row_to_student)
            .map_err(db_err("List students"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("List students"))
    }

    /// Notification history, oldest first.
    pub fn list_notifications(&self) -> Result<Vec<NotificationEvent>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT student_id, type, sent_date FROM notifications ORDER BY id")
            .map_err(db_err("List notifications"))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    id_from_sql(row.get(0)?)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(db_err("List notifications"))?;

        let mut events = Vec::new();
        for row in rows {
            let (student_id, kind, sent_date) = row.map_err(db_err("List notifications"))?;
            let Some(kind) = NotificationKind::parse(&kind) else {
                tracing::warn!("⚠️ Skipping notification with unknown type '{kind}'");
                continue;
            };
            let sent_date = DateTime::parse_from_rfc3339(&sent_date).map_err(|e| {
                TuitionError::DataAccess(format!("Bad sent_date '{sent_date}': {e}"))
            })?;
            events.push(NotificationEvent {
                student_id,
                kind,
                sent_date,
            });
        }
        Ok(events)
    }
}

#[async_trait]
impl StudentStore for SqliteStore {
    async fn active_students(&self) -> Result<Vec<Student>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, parent_name, email, payment_status, next_due_date
                 FROM students WHERE payment_status = 'active' ORDER BY rowid",
            )
            .map_err(db_err("Query students"))?;
        let rows = stmt
            .query_map([], row_to_student)
            .map_err(db_err("Query students"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("Query students"))
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[async_trait]
impl NotificationLog for SqliteStore {
    async fn append(&self, event: &NotificationEvent) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notifications (student_id, type, sent_date) VALUES (?1, ?2, ?3)",
            params![
                id_to_sql(&event.student_id),
                event.kind.as_str(),
                event.sent_date.to_rfc3339(),
            ],
        )
        .map_err(db_err("Insert notification"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use std::sync::Arc;
    use tuitionbell_notify::NotificationEngine;
    use tuitionbell_notify::testing::{RecordingMailer, student};

    fn reference() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 10, 9, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_active_students_filters_status() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut inactive = student(2, "Leo", "2026-03-10");
        inactive.payment_status = PaymentStatus::Inactive;
        store.upsert_student(&student(1, "Mia", "2026-03-17")).unwrap();
        store.upsert_student(&inactive).unwrap();

        let active = store.active_students().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Mia");
        assert_eq!(store.list_students().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_ids_keep_their_type() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut text_id = student(0, "Ivy", "2026-03-10");
        text_id.id = StudentId::Text("stu-9".into());
        store.upsert_student(&text_id).unwrap();
        store.upsert_student(&student(5, "Mia", "2026-03-10")).unwrap();

        let ids: Vec<StudentId> = store.list_students().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![StudentId::Text("stu-9".into()), StudentId::Number(5)]);
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let event = NotificationEvent {
            student_id: StudentId::Number(3),
            kind: NotificationKind::Overdue,
            sent_date: reference(),
        };
        store.append(&event).await.unwrap();
        store.append(&event).await.unwrap();

        let events = store.list_notifications().unwrap();
        assert_eq!(events, vec![event.clone(), event]);
    }

    #[tokio::test]
    async fn test_engine_against_sqlite() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.upsert_student(&student(1, "Mia", "2026-03-17")).unwrap();
        store.upsert_student(&student(2, "Leo", "2026-03-12")).unwrap();
        store.upsert_student(&student(3, "Ivy", "2026-03-09")).unwrap();

        let mailer = Arc::new(RecordingMailer::new());
        let engine = NotificationEngine::new(store.clone(), store.clone(), mailer.clone());
        let result = engine.run(reference()).await.unwrap();

        // Mia: +7 reminder, Leo: +2 nothing, Ivy: -1 overdue.
        assert_eq!(result.results.len(), 2);
        assert_eq!(mailer.sent().len(), 2);
        let logged: Vec<_> = store
            .list_notifications()
            .unwrap()
            .into_iter()
            .map(|e| (e.student_id, e.kind))
            .collect();
        assert_eq!(
            logged,
            vec![
                (StudentId::Number(1), NotificationKind::Reminder),
                (StudentId::Number(3), NotificationKind::Overdue),
            ]
        );
    }

    #[test]
    fn test_open_creates_file() {
        let dir = std::env::temp_dir().join("tuitionbell-test-sqlite");
        std::fs::remove_dir_all(&dir).ok();
        let path = dir.join("nested").join("tb.db");
        let store = SqliteStore::open(&path).unwrap();
        store.upsert_student(&student(1, "Mia", "2026-03-17")).unwrap();
        drop(store);

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.list_students().unwrap().len(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }
}
