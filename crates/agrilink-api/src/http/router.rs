//! Axum router configuration with middleware.
//!
//! All REST routes are under `/api/v1/`; the realtime upgrade lives at
//! `/ws` and the health check at `/health`. Middleware: CORS, tracing.

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Auth (open)
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        // Identities
        .route(
            "/identities/me",
            get(handlers::identity::me).patch(handlers::identity::update_me),
        )
        .route("/identities/me/withdraw", post(handlers::identity::withdraw))
        .route("/identities/{id}", get(handlers::identity::get_identity))
        .route("/agronomists", get(handlers::identity::search_agronomists))
        // Consultations
        .route(
            "/consultations",
            post(handlers::consultation::create_consultation)
                .get(handlers::consultation::list_consultations),
        )
        .route(
            "/consultations/{id}",
            patch(handlers::consultation::update_consultation),
        )
        .route(
            "/consultations/{id}/pay/mock",
            post(handlers::consultation::pay_mock),
        )
        // Chat
        .route("/chat", get(handlers::chat::list_chats))
        .route("/chat/{id}", get(handlers::chat::get_chat))
        .route(
            "/chat/consultation/{id}",
            post(handlers::chat::get_or_create_chat),
        )
        .route("/chat/{id}/messages", post(handlers::chat::post_message))
        .route("/chat/{id}/messages/read", patch(handlers::chat::mark_read))
        // Subscriptions
        .route(
            "/subscriptions",
            post(handlers::subscription::subscribe)
                .get(handlers::subscription::list_subscriptions),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/ws", get(handlers::ws::ws_handler))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
