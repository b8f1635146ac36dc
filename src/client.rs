//! Gateway client for the remote notification service.
//!
//! A thin normalizing adapter over the REST endpoints: it attaches auth,
//! maps backend error bodies into [`AppError`], and funnels every response
//! through the wire layer so callers only see canonical types. No state, no
//! side effects beyond the network call.

use std::time::Duration;

use chrono::Utc;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::errors::AppError;
use crate::models::notification::{
    wire, CreateNotification, Notification, NotificationFilter,
};

#[derive(Clone)]
pub struct NotificationClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl NotificationClient {
    /// `base` is the service root including the API prefix, e.g.
    /// `http://gateway.internal/api/v1`. `token` is attached as a bearer
    /// `Authorization` header when present.
    pub fn new(base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .use_rustls_tls()
                .connect_timeout(Duration::from_secs(5))
                .timeout(Duration::from_secs(15))
                .user_agent(concat!("notifyd/", env!("CARGO_PKG_VERSION")))
                .build()
                .expect("failed to build HTTP client"),
            base: base.into(),
            token,
        }
    }

    /// List notifications matching `filter`.
    ///
    /// Connection failures and HTTP 404 resolve to an empty list: a fresh
    /// user with zero notifications and a briefly unreachable service look
    /// identical to callers, by contract. Everything else propagates.
    pub async fn list(&self, filter: &NotificationFilter) -> Result<Vec<Notification>, AppError> {
        let mut query: Vec<(&str, String)> = vec![("userId", filter.user_id.clone())];
        if let Some(project) = &filter.project_id {
            query.push(("projectId", project.clone()));
        }
        if let Some(kind) = filter.kind {
            query.push(("type", kind.as_wire().to_owned()));
        }
        if let Some(read) = filter.read {
            query.push(("read", read.to_string()));
        }
        if let Some(from) = filter.date_from {
            query.push(("dateFrom", from.to_rfc3339()));
        }
        if let Some(to) = filter.date_to {
            query.push(("dateTo", to.to_rfc3339()));
        }

        let resp = match self
            .authed(self.http.get(self.url("notifications")))
            .query(&query)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                let err = AppError::from_transport(e);
                if err.is_suppressible() {
                    debug!(error = %err, "notification service unreachable, treating list as empty");
                    return Ok(Vec::new());
                }
                return Err(err);
            }
        };

        if resp.status() == StatusCode::NOT_FOUND {
            debug!("notification list returned 404, treating as empty");
            return Ok(Vec::new());
        }

        let resp = Self::check(resp).await?;
        let raw: Vec<wire::RawNotification> =
            resp.json().await.map_err(AppError::from_transport)?;
        Ok(raw
            .into_iter()
            .map(wire::RawNotification::into_notification)
            .collect())
    }

    /// Create a notification. All failures propagate; parking the request
    /// in the outbox is the caller's job, not this adapter's.
    pub async fn create(&self, cmd: &CreateNotification) -> Result<Notification, AppError> {
        let resp = self
            .authed(self.http.post(self.url("notifications")))
            .header("idempotency-key", cmd.idempotency_key.to_string())
            .json(&wire::CreateBody::from(cmd))
            .send()
            .await
            .map_err(AppError::from_transport)?;
        let resp = Self::check(resp).await?;
        let raw: wire::RawNotification = resp.json().await.map_err(AppError::from_transport)?;
        Ok(raw.into_notification())
    }

    /// Mark one notification as read. The result always satisfies
    /// `read == true` with a populated `read_at`, whatever the backend
    /// echoed back.
    pub async fn mark_as_read(&self, id: &str) -> Result<Notification, AppError> {
        let resp = self
            .authed(self.http.put(self.url(&format!("notifications/{id}/read"))))
            .send()
            .await
            .map_err(AppError::from_transport)?;
        let resp = Self::check(resp).await?;
        let raw: wire::RawNotification = resp.json().await.map_err(AppError::from_transport)?;
        let mut n = raw.into_notification();
        if !n.read || n.read_at.is_none() {
            n.mark_read(Utc::now());
        }
        Ok(n)
    }

    /// Mark everything for `user_id` as read. Idempotent against "nothing
    /// to mark": 404 and connection errors are suppressed.
    pub async fn mark_all_as_read(&self, user_id: &str) -> Result<(), AppError> {
        let resp = match self
            .authed(self.http.put(self.url("notifications/mark-all-read")))
            .query(&[("userId", user_id)])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                let err = AppError::from_transport(e);
                if err.is_suppressible() {
                    debug!(error = %err, user_id, "mark-all-read unreachable, nothing to mark");
                    return Ok(());
                }
                return Err(err);
            }
        };

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(user_id, "mark-all-read returned 404, nothing to mark");
            return Ok(());
        }

        Self::check(resp).await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let resp = self
            .authed(self.http.delete(self.url(&format!("notifications/{id}"))))
            .send()
            .await
            .map_err(AppError::from_transport)?;
        Self::check(resp).await?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base.trim_end_matches('/'), path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Map a non-2xx response to an error, extracting the backend's message
    /// when the body is parseable JSON and falling back to the raw text.
    async fn check(resp: Response) -> Result<Response, AppError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(AppError::Api {
            status: status.as_u16(),
            message: backend_message(&body),
        })
    }
}

fn backend_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(v) => v
            .get("error")
            .and_then(|e| e.get("message"))
            .or_else(|| v.get("message"))
            .and_then(Value::as_str)
            .map_or_else(|| body.to_owned(), str::to_owned),
        Err(_) => body.to_owned(),
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::NotificationKind;
    use serde_json::json;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> NotificationClient {
        NotificationClient::new(format!("{}/api/v1", server.uri()), None)
    }

    #[tokio::test]
    async fn list_normalizes_backend_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/notifications"))
            .and(query_param("userId", "u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": 7,
                    "userId": "u1",
                    "type": "task_assigned",
                    "title": "Assigned",
                    "message": "You were assigned T-9",
                    "data": "{\"taskId\":\"T-9\"}",
                    "read": false
                }
            ])))
            .mount(&server)
            .await;

        let list = client_for(&server)
            .list(&NotificationFilter::for_user("u1"))
            .await
            .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "7");
        assert_eq!(list[0].kind, NotificationKind::TaskAssigned);
        assert_eq!(list[0].data, json!({"taskId": "T-9"}));
    }

    #[tokio::test]
    async fn list_404_resolves_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/notifications"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let list = client_for(&server)
            .list(&NotificationFilter::for_user("u1"))
            .await
            .unwrap();
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn list_connection_refused_resolves_to_empty() {
        // nothing listens on port 1
        let client = NotificationClient::new("http://127.0.0.1:1/api/v1", None);
        let list = client
            .list(&NotificationFilter::for_user("u1"))
            .await
            .unwrap();
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn create_sends_idempotency_key_and_stringified_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/notifications"))
            .and(header_exists("idempotency-key"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "n1",
                "userId": "u1",
                "type": "task_assigned",
                "title": "t",
                "message": "m",
                "data": "{\"k\":1}",
                "read": false,
                "createdAt": "2026-08-06T10:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cmd = CreateNotification::new("u1", NotificationKind::TaskAssigned, "t", "m")
            .with_data(json!({"k": 1}));
        let created = client_for(&server).create(&cmd).await.unwrap();
        assert_eq!(created.id, "n1");
        assert_eq!(created.data, json!({"k": 1}));
    }

    #[tokio::test]
    async fn create_error_surfaces_backend_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/notifications"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(json!({"error": {"message": "title is required"}})),
            )
            .mount(&server)
            .await;

        let cmd = CreateNotification::new("u1", NotificationKind::TaskAssigned, "", "m");
        let err = client_for(&server).create(&cmd).await.unwrap_err();
        match err {
            AppError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "title is required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn mark_as_read_backfills_read_at() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/notifications/n1/read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "n1",
                "userId": "u1",
                "type": "task_updated",
                "read": true
                // backend forgot readAt
            })))
            .mount(&server)
            .await;

        let n = client_for(&server).mark_as_read("n1").await.unwrap();
        assert!(n.read);
        assert!(n.read_at.is_some());
    }

    #[tokio::test]
    async fn mark_all_as_read_suppresses_404() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/notifications/mark-all-read"))
            .and(query_param("userId", "u1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        client_for(&server).mark_all_as_read("u1").await.unwrap();
    }

    #[tokio::test]
    async fn delete_propagates_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/notifications/nope"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server).delete("nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[test]
    fn backend_message_falls_back_to_raw_text() {
        assert_eq!(backend_message("plain failure"), "plain failure");
        assert_eq!(backend_message("{\"message\":\"boom\"}"), "boom");
        assert_eq!(
            backend_message("{\"error\":{\"message\":\"nested\"}}"),
            "nested"
        );
    }
}
