//! HTTP front door.
//!
//! `POST /api/request` は認証と検証だけして queue に積み、すぐに返す。
//! 生成・公開・通知は worker 側で進み、`GET /api/status/{id}` で追える。

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::{info, warn};

use shipwright_core::domain::{SubmissionId, SubmitRequest, TaskRequest};
use shipwright_core::queue::{QueueError, RoundQueue};

pub const LIVENESS_TEXT: &str = "LLM Code Deployment Agent is running!";
const ACCEPTED_MESSAGE: &str = "Request received and is being processed";

#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<dyn RoundQueue>,
    pub secret: Arc<str>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/api/request", post(submit))
        .route("/api/status/{submission_id}", get(status))
        .with_state(state)
}

async fn liveness() -> &'static str {
    LIVENESS_TEXT
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

async fn submit(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if !is_json(&headers) {
        return error(
            StatusCode::BAD_REQUEST,
            "Invalid request: Content-Type must be application/json",
        );
    }

    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => return error(StatusCode::BAD_REQUEST, format!("Invalid request: {e}")),
    };

    // 認証は他の検証より先。失敗したリクエストは何も積まない
    let supplied = value.get("secret").and_then(Value::as_str).unwrap_or("");
    if !constant_time_eq(supplied.as_bytes(), state.secret.as_bytes()) {
        warn!("rejected request with a bad secret");
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    let raw: SubmitRequest = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => return error(StatusCode::BAD_REQUEST, format!("Invalid request: {e}")),
    };
    let request = match TaskRequest::try_from(raw) {
        Ok(request) => request,
        Err(e) => return error(StatusCode::BAD_REQUEST, format!("Invalid request: {e}")),
    };

    let key = request.key();
    match state.queue.enqueue(request).await {
        Ok(id) => {
            info!(submission = %id, round = %key, "request accepted");
            (
                StatusCode::OK,
                Json(json!({ "message": ACCEPTED_MESSAGE, "submission_id": id })),
            )
                .into_response()
        }
        Err(e @ QueueError::Full { .. }) => {
            warn!(round = %key, error = %e, "request refused");
            error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
        Err(e @ QueueError::Duplicate { .. }) => {
            warn!(round = %key, error = %e, "request refused");
            error(StatusCode::CONFLICT, e.to_string())
        }
        Err(e @ QueueError::Unknown(_)) => error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn status(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let Ok(id) = raw.parse::<SubmissionId>() else {
        return error(StatusCode::NOT_FOUND, format!("unknown submission '{raw}'"));
    };
    match state.queue.status(id).await {
        Some(status) => (StatusCode::OK, Json(status)).into_response(),
        None => error(StatusCode::NOT_FOUND, format!("unknown submission '{raw}'")),
    }
}

/// Byte comparison whose running time depends only on the lengths.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipwright_core::config::QueueConfig;
    use shipwright_core::ports::{Clock, SystemClock, UlidGenerator};
    use shipwright_core::queue::{InMemoryRoundQueue, RoundLease};

    struct Server {
        base: String,
        queue: Arc<InMemoryRoundQueue>,
        http: reqwest::Client,
    }

    async fn start(max_pending: usize) -> Server {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let config = QueueConfig {
            max_pending,
            ..QueueConfig::default()
        };
        let queue = Arc::new(InMemoryRoundQueue::new(
            &config,
            Arc::clone(&clock),
            Arc::new(UlidGenerator::new(clock)),
        ));
        let app = router(AppState {
            queue: queue.clone(),
            secret: Arc::from("s3cret"),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Server {
            base: format!("http://{addr}"),
            queue,
            http: reqwest::Client::new(),
        }
    }

    fn body(task: &str, round: u32) -> Value {
        json!({
            "secret": "s3cret",
            "task": task,
            "brief": "Build a counter page",
            "round": round,
            "nonce": "n-1",
            "email": "me@example.com",
            "evaluation_url": "http://eval.local/notify",
            "attachments": [],
        })
    }

    impl Server {
        async fn submit(&self, body: &Value) -> (u16, Value) {
            let resp = self
                .http
                .post(format!("{}/api/request", self.base))
                .json(body)
                .send()
                .await
                .unwrap();
            let status = resp.status().as_u16();
            (status, resp.json().await.unwrap())
        }
    }

    #[test]
    fn secret_comparison() {
        assert!(constant_time_eq(b"s3cret", b"s3cret"));
        assert!(!constant_time_eq(b"s3cret", b"s3creT"));
        assert!(!constant_time_eq(b"s3cret", b"s3cre"));
        assert!(!constant_time_eq(b"", b"s3cret"));
    }

    #[tokio::test]
    async fn liveness_text() {
        let server = start(8).await;
        let text = reqwest::get(format!("{}/", server.base))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(text, LIVENESS_TEXT);
    }

    #[tokio::test]
    async fn non_json_body_is_rejected() {
        let server = start(8).await;
        let resp = server
            .http
            .post(format!("{}/api/request", server.base))
            .body("task=x")
            .header("content-type", "text/plain")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status().as_u16(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(
            body["error"],
            "Invalid request: Content-Type must be application/json"
        );
        assert_eq!(server.queue.counts().await.pending(), 0);
    }

    #[tokio::test]
    async fn bad_secret_is_unauthorized_and_enqueues_nothing() {
        let server = start(8).await;
        let mut request = body("counter", 1);
        request["secret"] = json!("wrong");

        let (status, resp) = server.submit(&request).await;
        assert_eq!(status, 401);
        assert_eq!(resp, json!({ "error": "Unauthorized" }));

        request.as_object_mut().unwrap().remove("secret");
        let (status, _) = server.submit(&request).await;
        assert_eq!(status, 401);

        assert_eq!(server.queue.counts().await.pending(), 0);
    }

    #[tokio::test]
    async fn invalid_fields_are_rejected() {
        let server = start(8).await;

        let (status, resp) = server.submit(&body("../etc", 1)).await;
        assert_eq!(status, 400);
        assert!(resp["error"].as_str().unwrap().contains("invalid task id"));

        let (status, _) = server.submit(&body("counter", 0)).await;
        assert_eq!(status, 400);

        let mut missing = body("counter", 1);
        missing.as_object_mut().unwrap().remove("brief");
        let (status, resp) = server.submit(&missing).await;
        assert_eq!(status, 400);
        assert!(resp["error"].as_str().unwrap().contains("brief"));
    }

    #[tokio::test]
    async fn accepted_request_is_queued_and_visible() {
        let server = start(8).await;

        let (status, resp) = server.submit(&body("counter", 1)).await;
        assert_eq!(status, 200);
        assert_eq!(resp["message"], ACCEPTED_MESSAGE);
        let id = resp["submission_id"].as_str().unwrap().to_string();
        assert!(id.starts_with("sub-"));

        let status_resp = reqwest::get(format!("{}/api/status/{id}", server.base))
            .await
            .unwrap();
        assert_eq!(status_resp.status().as_u16(), 200);
        let status: Value = status_resp.json().await.unwrap();
        assert_eq!(status["submission_id"], id.as_str());
        assert_eq!(status["state"], "queued");
        assert_eq!(status["task"], "counter");
        assert_eq!(status["round"], 1);
    }

    #[tokio::test]
    async fn opaque_fields_reach_the_queue_unchanged() {
        let server = start(8).await;
        let mut request = body("counter", 1);
        request["nonce"] = json!(12345);
        request["attachments"] = Value::Null;

        let (status, _) = server.submit(&request).await;
        assert_eq!(status, 200);

        let lease = server.queue.lease().await.unwrap();
        assert_eq!(lease.request().nonce, Some(json!(12345)));
        assert_eq!(lease.request().email, Some(json!("me@example.com")));
        assert!(lease.request().attachments.is_empty());
    }

    #[tokio::test]
    async fn unknown_submission_is_not_found() {
        let server = start(8).await;
        for id in ["sub-01ARZ3NDEKTSV4RRFFQ69G5FAV", "garbage"] {
            let resp = reqwest::get(format!("{}/api/status/{id}", server.base))
                .await
                .unwrap();
            assert_eq!(resp.status().as_u16(), 404);
        }
    }

    #[tokio::test]
    async fn same_round_in_flight_conflicts() {
        let server = start(8).await;
        assert_eq!(server.submit(&body("counter", 1)).await.0, 200);

        let (status, _) = server.submit(&body("counter", 1)).await;
        assert_eq!(status, 409);

        // another round of the same task is fine
        assert_eq!(server.submit(&body("counter", 2)).await.0, 200);
    }

    #[tokio::test]
    async fn full_queue_is_unavailable() {
        let server = start(1).await;
        assert_eq!(server.submit(&body("alpha", 1)).await.0, 200);

        let (status, resp) = server.submit(&body("beta", 1)).await;
        assert_eq!(status, 503);
        assert!(resp["error"].as_str().unwrap().contains("full"));
    }
}
