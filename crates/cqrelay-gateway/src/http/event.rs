//! OneBot event ingress: POST /.
//!
//! Always answers 200. Accepted private messages are queued for the worker
//! pool; everything else (group messages, notices, heartbeats, malformed
//! bodies) is dropped here.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::StatusCode};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use cqrelay_onebot::InboundEvent;

use crate::app::AppState;

pub async fn event_handler(State(state): State<Arc<AppState>>, body: Bytes) -> StatusCode {
    let event: InboundEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "malformed event body, ignoring");
            return StatusCode::OK;
        }
    };

    let post_type = event.post_type.clone();
    let message_type = event.message_type.clone();
    let Some(msg) = event.into_private() else {
        debug!(post_type = %post_type, message_type = %message_type, "event ignored");
        return StatusCode::OK;
    };

    let (id, user) = (msg.id, msg.user_id);
    match state.queue.try_send(msg) {
        Ok(()) => debug!(id = %id, user = %user, "private message queued"),
        Err(TrySendError::Full(_)) => {
            warn!(id = %id, user = %user, "worker queue full, dropping message")
        }
        Err(TrySendError::Closed(_)) => {
            warn!(id = %id, user = %user, "worker queue closed, dropping message")
        }
    }
    StatusCode::OK
}

/// Fallback for every other route and method.
pub async fn acknowledge() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    use cqrelay_core::types::UserId;

    use crate::app::{build_router, test_support};

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn private_message_is_queued() {
        let (state, mut rx) = test_support::state(4);
        let body = serde_json::json!({
            "post_type": "message",
            "message_type": "private",
            "user_id": 10001,
            "message": "你好",
        });
        let resp = build_router(state)
            .oneshot(post(&body.to_string()))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.user_id, UserId(10001));
        assert_eq!(msg.raw, "你好");
    }

    #[tokio::test]
    async fn group_message_is_acknowledged_not_queued() {
        let (state, mut rx) = test_support::state(4);
        let body = serde_json::json!({
            "post_type": "message",
            "message_type": "group",
            "group_id": 1,
            "user_id": 2,
            "message": "hi",
        });
        let resp = build_router(state)
            .oneshot(post(&body.to_string()))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_body_is_acknowledged() {
        let (state, mut rx) = test_support::state(4);
        let resp = build_router(state).oneshot(post("{not json")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_queue_still_acknowledges() {
        let (state, mut rx) = test_support::state(1);
        let router = build_router(state);
        let body = r#"{"message_type":"private","user_id":1,"message":"a"}"#;

        for _ in 0..3 {
            let resp = router.clone().oneshot(post(body)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_route_is_acknowledged() {
        let (state, _rx) = test_support::state(1);
        let req = Request::builder()
            .method(Method::GET)
            .uri("/anything")
            .body(Body::empty())
            .unwrap();
        let resp = build_router(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
