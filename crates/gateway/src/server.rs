use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        routing::{delete, get, post},
    },
    tower_http::trace::TraceLayer,
    tracing::info,
};

use {
    confab_dispatch::WebhookCoordinator, confab_live::LiveModeService, confab_sessions::SessionStore,
};

use crate::{admin, webhook};

// ── Shared app state ─────────────────────────────────────────────────────────

/// Everything a handler needs, threaded explicitly — no ambient
/// request-global state.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<WebhookCoordinator>,
    pub live: Arc<LiveModeService>,
    pub sessions: SessionStore,
}

// ── Router / startup ─────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/webhook", get(webhook::verify_handler).post(webhook::deliver_handler))
        .route("/api/tickets/{ticket_ref}/claim", post(admin::claim_handler))
        .route("/api/tickets/{ticket_ref}/close", post(admin::close_handler))
        .route("/api/tickets/{ticket_ref}/reply", post(admin::reply_handler))
        .route("/api/tickets/{ticket_ref}/notes", get(admin::notes_handler))
        .route("/api/sessions/{user_id}", delete(admin::clear_session_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}

async fn health_handler() -> &'static str {
    "ok"
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use {
        async_trait::async_trait,
        axum::{
            body::Body,
            http::{Request, StatusCode},
        },
        tower::ServiceExt,
    };

    use {
        confab_common::{FlowEngine, InboundMessage, OutboundSender},
        confab_config::DispatchMode,
        confab_dispatch::{CoordinatorConfig, JobQueue, LockPolicy},
        confab_live::{MemoryTicketRepo, TicketRepository},
        confab_locks::UserLockManager,
        confab_sessions::SessionTtl,
        confab_store::{KvStore, MemoryKv},
        confab_whatsapp::verify::signature_for,
    };

    use super::*;

    const SECRET: &str = "app-secret";

    struct NoopEngine;

    #[async_trait]
    impl FlowEngine for NoopEngine {
        async fn process_inbound(&self, _msg: &InboundMessage) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct SilentSender;

    #[async_trait]
    impl OutboundSender for SilentSender {
        async fn send_text(&self, _user_id: &str, _body: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn app() -> Router {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let sessions = SessionStore::new(Arc::clone(&kv), SessionTtl::default());
        let live = Arc::new(LiveModeService::new(
            sessions.clone(),
            Arc::new(MemoryTicketRepo::new()) as Arc<dyn TicketRepository>,
            Arc::new(SilentSender),
        ));
        let coordinator = Arc::new(WebhookCoordinator::new(
            CoordinatorConfig {
                app_secret: SECRET.into(),
                verify_token: "verify-tok".into(),
                phone_number_id: "1555".into(),
                lock: LockPolicy {
                    lease: Duration::from_secs(5),
                    wait: Duration::from_millis(100),
                },
            },
            Arc::new(JobQueue::new(
                Arc::clone(&kv),
                DispatchMode::Inline,
                Duration::from_secs(60),
            )),
            Arc::new(UserLockManager::new(Arc::clone(&kv))),
            Arc::clone(&live),
            Arc::new(NoopEngine),
        ));

        build_app(AppState {
            coordinator,
            live,
            sessions,
        })
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn verification_echoes_the_challenge() {
        let response = app()
            .oneshot(
                Request::get(
                    "/webhook?hub.mode=subscribe&hub.verify_token=verify-tok&hub.challenge=c-42",
                )
                .body(Body::empty())
                .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "c-42");
    }

    #[tokio::test]
    async fn verification_with_bad_token_is_forbidden() {
        let response = app()
            .oneshot(
                Request::get("/webhook?hub.mode=subscribe&hub.verify_token=bad&hub.challenge=c")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unsigned_delivery_is_unauthorized() {
        let response = app()
            .oneshot(
                Request::post("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"entry":[]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signed_delivery_gets_a_fast_ack() {
        let body = r#"{"object":"whatsapp_business_account","entry":[]}"#;
        let signature = format!("sha256={}", signature_for(body.as_bytes(), SECRET));

        let response = app()
            .oneshot(
                Request::post("/webhook")
                    .header("content-type", "application/json")
                    .header("X-Hub-Signature-256", signature)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "EVENT_RECEIVED");
    }

    #[tokio::test]
    async fn garbage_signed_body_is_a_bad_request() {
        let body = "not json";
        let signature = format!("sha256={}", signature_for(body.as_bytes(), SECRET));

        let response = app()
            .oneshot(
                Request::post("/webhook")
                    .header("X-Hub-Signature-256", signature)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn claim_on_unknown_ticket_is_not_found() {
        let response = app()
            .oneshot(
                Request::post("/api/tickets/TCK-missing/claim")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"agent":"alice"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn session_clear_reports_evictions() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let sessions = SessionStore::new(Arc::clone(&kv), SessionTtl::default());
        sessions.session("u1").save("stage", &"MENU").await.unwrap();

        let live = Arc::new(LiveModeService::new(
            sessions.clone(),
            Arc::new(MemoryTicketRepo::new()) as Arc<dyn TicketRepository>,
            Arc::new(SilentSender),
        ));
        let coordinator = Arc::new(WebhookCoordinator::new(
            CoordinatorConfig {
                app_secret: SECRET.into(),
                verify_token: "verify-tok".into(),
                phone_number_id: "1555".into(),
                lock: LockPolicy::default(),
            },
            Arc::new(JobQueue::new(
                Arc::clone(&kv),
                DispatchMode::Inline,
                Duration::from_secs(60),
            )),
            Arc::new(UserLockManager::new(Arc::clone(&kv))),
            Arc::clone(&live),
            Arc::new(NoopEngine),
        ));
        let app = build_app(AppState {
            coordinator,
            live,
            sessions: sessions.clone(),
        });

        let response = app
            .oneshot(
                Request::delete("/api/sessions/u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("\"evicted\":1"));
        assert!(sessions.session("u1").get::<String>("stage").await.unwrap().is_none());
    }
}
