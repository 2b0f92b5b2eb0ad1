use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{delete, get, post, put},
};

use super::admin::admin_router;
use super::{applications, drafts};
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

/// Routes available to parent (user) tokens.
pub fn user_router() -> Router<Arc<AppState>> {
    Router::new()
        // The caller's own draft
        .route("/draft", get(drafts::get_draft))
        .route("/draft", post(drafts::create_draft))
        .route("/drafts/{id}", put(drafts::update_draft))
        .route("/drafts/{id}", delete(drafts::delete_draft))
        // Applications
        .route("/applications", get(applications::list_applications))
        .route("/applications/{id}", delete(applications::delete_application))
        .route(
            "/applications/{id}/documents",
            get(applications::list_application_documents),
        )
        .route(
            "/applications/{id}/documents",
            delete(applications::delete_application_documents),
        )
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/admin", admin_router())
        .nest("/api/v1", user_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
