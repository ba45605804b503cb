//! PostgREST store — `students` and `notifications` tables over HTTP.
//!
//! Works against Supabase or any plain PostgREST deployment. Requests carry
//! the key both as `apikey` and as a bearer token.

use async_trait::async_trait;
use std::time::Duration;

use tuitionbell_core::config::StoreConfig;
use tuitionbell_core::{NotificationEvent, NotificationLog, Result, Student, StudentStore, TuitionError};

const STUDENTS_TABLE: &str = "students";
const NOTIFICATIONS_TABLE: &str = "notifications";

/// HTTP-backed student store and notification log.
pub struct PostgrestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PostgrestStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TuitionError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
        })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::new(&config.url, &config.api_key, Duration::from_secs(config.timeout_secs))
    }

    /// `{base}/rest/v1/{table}`.
    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Unset endpoint or key only surfaces here, at first use.
    fn ensure_configured(&self) -> Result<()> {
        if self.base_url.is_empty() || self.api_key.is_empty() {
            return Err(TuitionError::DataAccess(
                "store endpoint not configured (SUPABASE_URL / SUPABASE_ANON_KEY)".into(),
            ));
        }
        Ok(())
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

async fn check_status(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(TuitionError::DataAccess(format!("{what} failed: {status} {body}")))
}

/// Decode row by row. Column problems are left for the engine to report per
/// student; only a row that isn't an object at all is dropped here.
fn decode_rows(rows: Vec<serde_json::Value>) -> Vec<Student> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<Student>(row) {
            Ok(student) => Some(student),
            Err(e) => {
                tracing::warn!("⚠️ Dropping unreadable student row: {e}");
                None
            }
        })
        .collect()
}

#[async_trait]
impl StudentStore for PostgrestStore {
    async fn active_students(&self) -> Result<Vec<Student>> {
        self.ensure_configured()?;
        let req = self
            .client
            .get(self.table_url(STUDENTS_TABLE))
            .query(&[("select", "*"), ("payment_status", "eq.active")]);

        let resp = self
            .authorized(req)
            .send()
            .await
            .map_err(|e| TuitionError::DataAccess(format!("Query students: {e}")))?;
        let resp = check_status(resp, "Query students").await?;

        let rows: Vec<serde_json::Value> = resp
            .json()
            .await
            .map_err(|e| TuitionError::DataAccess(format!("Decode students: {e}")))?;
        tracing::debug!("📥 PostgREST returned {} active student row(s)", rows.len());
        Ok(decode_rows(rows))
    }

    fn name(&self) -> &str {
        "postgrest"
    }
}

#[async_trait]
impl NotificationLog for PostgrestStore {
    async fn append(&self, event: &NotificationEvent) -> Result<()> {
        self.ensure_configured()?;
        let req = self
            .client
            .post(self.table_url(NOTIFICATIONS_TABLE))
            .header("Prefer", "return=minimal")
            .json(event);

        let resp = self
            .authorized(req)
            .send()
            .await
            .map_err(|e| TuitionError::DataAccess(format!("Insert notification: {e}")))?;
        check_status(resp, "Insert notification").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::extract::{Request, State};
    use axum::http::{HeaderMap, Method, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::{Json, Router};
    use chrono::{DateTime, FixedOffset, TimeZone};
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tuitionbell_core::{NotificationKind, NotificationOutcome, StudentId};
    use tuitionbell_notify::NotificationEngine;
    use tuitionbell_notify::testing::RecordingMailer;

    /// One request as the fake PostgREST saw it.
    #[derive(Debug, Clone)]
    struct Seen {
        method: Method,
        path: String,
        query: String,
        headers: HeaderMap,
        body: String,
    }

    struct FakeRest {
        status: StatusCode,
        students: serde_json::Value,
        seen: Mutex<Vec<Seen>>,
    }

    impl FakeRest {
        fn ok(students: serde_json::Value) -> Arc<Self> {
            Arc::new(Self {
                status: StatusCode::OK,
                students,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                students: json!([]),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<Seen> {
            self.seen.lock().unwrap().clone()
        }
    }

    async fn record(State(fake): State<Arc<FakeRest>>, req: Request) -> Response {
        let (parts, body) = req.into_parts();
        let body = to_bytes(body, usize::MAX).await.unwrap_or_default();
        fake.seen.lock().unwrap().push(Seen {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().unwrap_or_default().to_string(),
            headers: parts.headers.clone(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });

        if !fake.status.is_success() {
            return (fake.status, "relation \"students\" does not exist").into_response();
        }
        if parts.method == Method::GET {
            Json(fake.students.clone()).into_response()
        } else {
            StatusCode::CREATED.into_response()
        }
    }

    /// Serve `fake` on an ephemeral port and return its base URL.
    async fn serve(fake: Arc<FakeRest>) -> String {
        let app = Router::new().fallback(record).with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{addr}")
    }

    fn reference() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 10, 9, 0, 0)
            .unwrap()
    }

    fn row(id: i64, name: &str, due: serde_json::Value) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "parent_name": format!("Parent of {name}"),
            "email": format!("{}@example.com", name.to_lowercase()),
            "payment_status": "active",
            "next_due_date": due,
        })
    }

    #[test]
    fn test_table_url_trims_slash() {
        let store = PostgrestStore::new("https://demo.supabase.co/", "anon", Duration::from_secs(5)).unwrap();
        assert_eq!(store.table_url("students"), "https://demo.supabase.co/rest/v1/students");
    }

    #[tokio::test]
    async fn test_unconfigured_fails_at_first_use() {
        let store = PostgrestStore::from_config(&StoreConfig::default()).unwrap();
        let err = store.active_students().await.unwrap_err();
        assert!(matches!(err, TuitionError::DataAccess(_)));

        let event = NotificationEvent {
            student_id: StudentId::Number(1),
            kind: NotificationKind::Due,
            sent_date: reference(),
        };
        assert!(matches!(store.append(&event).await, Err(TuitionError::DataAccess(_))));
    }

    #[tokio::test]
    async fn test_active_students_query_and_auth() {
        let fake = FakeRest::ok(json!([row(1, "Mia", json!("2026-03-17"))]));
        let base = serve(fake.clone()).await;
        let store = PostgrestStore::new(&base, "anon-key", Duration::from_secs(5)).unwrap();

        let students = store.active_students().await.unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].id, StudentId::Number(1));
        assert_eq!(students[0].email, "mia@example.com");

        let seen = fake.seen();
        assert_eq!(seen.len(), 1);
        let req = &seen[0];
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.path, "/rest/v1/students");
        assert!(req.query.contains("select=*"), "query: {}", req.query);
        assert!(req.query.contains("payment_status=eq.active"), "query: {}", req.query);
        assert_eq!(req.headers["apikey"], "anon-key");
        assert_eq!(req.headers["authorization"], "Bearer anon-key");
    }

    #[tokio::test]
    async fn test_append_posts_event_row() {
        let fake = FakeRest::ok(json!([]));
        let base = serve(fake.clone()).await;
        let store = PostgrestStore::new(&base, "anon-key", Duration::from_secs(5)).unwrap();

        let event = NotificationEvent {
            student_id: StudentId::Number(7),
            kind: NotificationKind::Due,
            sent_date: reference(),
        };
        store.append(&event).await.unwrap();

        let seen = fake.seen();
        assert_eq!(seen.len(), 1);
        let req = &seen[0];
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.path, "/rest/v1/notifications");
        assert_eq!(req.headers["prefer"], "return=minimal");
        assert_eq!(req.headers["apikey"], "anon-key");
        assert_eq!(req.headers["authorization"], "Bearer anon-key");

        let body: serde_json::Value = serde_json::from_str(&req.body).unwrap();
        assert_eq!(body["student_id"], 7);
        assert_eq!(body["type"], "due");
        let sent = DateTime::parse_from_rfc3339(body["sent_date"].as_str().unwrap()).unwrap();
        assert_eq!(sent, reference());
    }

    #[tokio::test]
    async fn test_server_error_is_data_access_with_body() {
        let fake = FakeRest::failing();
        let base = serve(fake.clone()).await;
        let store = Arc::new(PostgrestStore::new(&base, "anon-key", Duration::from_secs(5)).unwrap());

        match store.active_students().await {
            Err(TuitionError::DataAccess(msg)) => {
                assert!(msg.contains("500"), "{msg}");
                assert!(msg.contains("does not exist"), "{msg}");
            }
            other => panic!("expected DataAccess, got {other:?}"),
        }

        let mailer = Arc::new(RecordingMailer::new());
        let engine = NotificationEngine::new(store.clone(), store, mailer.clone());
        let err = engine.run(reference()).await.unwrap_err();
        assert!(matches!(err, TuitionError::DataAccess(_)));
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_odd_row_does_not_sink_batch() {
        let mut no_parent = row(3, "Ivy", json!("2026-03-10"));
        no_parent.as_object_mut().unwrap().remove("parent_name");
        let fake = FakeRest::ok(json!([
            row(1, "Mia", json!("2026-03-17")),
            row(2, "Leo", json!(20260317)),
            no_parent,
        ]));
        let base = serve(fake.clone()).await;
        let store = Arc::new(PostgrestStore::new(&base, "anon-key", Duration::from_secs(5)).unwrap());
        let mailer = Arc::new(RecordingMailer::new());
        let engine = NotificationEngine::new(store.clone(), store, mailer.clone());

        let result = engine.run(reference()).await.unwrap();
        assert_eq!(
            result.results,
            vec![
                NotificationOutcome::sent("Mia", NotificationKind::Reminder),
                NotificationOutcome::failed("Leo", "Malformed due date: 20260317"),
                NotificationOutcome::sent("Ivy", NotificationKind::Due),
            ]
        );
        assert_eq!(mailer.sent().len(), 2);

        // One read, then one log write per successful send.
        let posts: Vec<_> = fake
            .seen()
            .into_iter()
            .filter(|r| r.method == Method::POST)
            .collect();
        assert_eq!(posts.len(), 2);
    }
}
