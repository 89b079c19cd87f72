//! HttpCallbackClient - 評価サービスへの JSON POST

use async_trait::async_trait;
use reqwest::Client;

use crate::ports::{CallbackClient, CallbackError};

#[derive(Clone, Default)]
pub struct HttpCallbackClient {
    client: Client,
}

impl HttpCallbackClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CallbackClient for HttpCallbackClient {
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<u16, CallbackError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| CallbackError::Transport(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;
    use crate::testing::serve;

    #[tokio::test]
    async fn posts_json_and_reports_status() {
        let received: Arc<Mutex<Vec<Value>>> = Arc::default();
        let app = Router::new()
            .route(
                "/notify",
                post(
                    |State(received): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                        received.lock().unwrap().push(body);
                        StatusCode::ACCEPTED
                    },
                ),
            )
            .route("/down", post(|| async { StatusCode::SERVICE_UNAVAILABLE }))
            .with_state(received.clone());
        let base = serve(app).await;
        let client = HttpCallbackClient::new();

        let status = client
            .post_json(&format!("{base}/notify"), &json!({"task": "t1"}))
            .await
            .unwrap();
        assert_eq!(status, 202);
        assert_eq!(received.lock().unwrap()[0]["task"], "t1");

        let status = client
            .post_json(&format!("{base}/down"), &json!({}))
            .await
            .unwrap();
        assert_eq!(status, 503);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let err = HttpCallbackClient::new()
            .post_json("http://127.0.0.1:1/notify", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CallbackError::Transport(_)));
    }
}
