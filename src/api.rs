//! HTTP dispatcher boundary
//!
//! Transport adapters post normalized actions here and relay the returned
//! replies to the user.

mod handlers;
mod types;

pub use handlers::create_router;

use crate::runtime::Dispatcher;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<dyn Dispatcher>,
    /// Expected `X-Dispatcher-Token`; unset disables the check
    pub dispatcher_token: Option<String>,
}

impl AppState {
    pub fn new(dispatcher: Arc<dyn Dispatcher>, dispatcher_token: Option<String>) -> Self {
        Self {
            dispatcher,
            dispatcher_token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::MockCatalog;
    use crate::runtime::{SessionManager, SessionRuntime};
    use crate::session::InMemorySessionStore;
    use serde_json::{json, Value};
    use std::time::Duration;

    async fn serve(token: Option<&str>) -> String {
        let runtime = SessionRuntime::new(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(MockCatalog::with_products(3)),
            Duration::from_secs(3600),
        );
        let manager = Arc::new(SessionManager::new(runtime, Duration::from_secs(60)));
        let app = create_router(AppState::new(manager, token.map(str::to_string)));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn post(base: &str, body: Value, token: Option<&str>) -> (u16, Value) {
        let mut request = reqwest::Client::new()
            .post(format!("{base}/api/actions"))
            .json(&body);
        if let Some(token) = token {
            request = request.header(handlers::TOKEN_HEADER, token);
        }
        let resp = request.send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_named_action_and_callback() {
        let base = serve(None).await;

        let (status, body) = post(&base, json!({ "user_id": 42, "action": "start" }), None).await;
        assert_eq!(status, 200);
        let replies = body["replies"].as_array().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["choices"][0][0]["id"], "product:1");

        let (status, body) = post(&base, json!({ "user_id": "42", "callback": "product:2" }), None).await;
        assert_eq!(status, 200);
        assert_eq!(body["replies"][0]["image"], "http://cms.test/uploads/2.png");

        let (status, body) = post(
            &base,
            json!({ "user_id": 42, "action": "select_product", "payload": { "product_id": 3 } }),
            None,
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["replies"][0]["text"], "This action is not available now.");
    }

    #[tokio::test]
    async fn test_malformed_requests_are_rejected() {
        let base = serve(None).await;

        let (status, body) = post(&base, json!({ "user_id": 42 }), None).await;
        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().contains("callback"));

        let (status, _) = post(&base, json!({ "user_id": 42, "action": "dance" }), None).await;
        assert_eq!(status, 400);

        let (status, _) = post(&base, json!({ "user_id": " ", "action": "start" }), None).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_dispatcher_token_is_checked() {
        let base = serve(Some("s3cret")).await;

        let (status, _) = post(&base, json!({ "user_id": 1, "action": "start" }), None).await;
        assert_eq!(status, 401);
        let (status, _) = post(&base, json!({ "user_id": 1, "action": "start" }), Some("wrong")).await;
        assert_eq!(status, 401);
        let (status, _) = post(&base, json!({ "user_id": 1, "action": "start" }), Some("s3cret")).await;
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn test_health_and_version() {
        let base = serve(None).await;
        let health: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");

        let version = reqwest::get(format!("{base}/version"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(version.starts_with("storefront-bot "));
    }
}
