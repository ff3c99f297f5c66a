use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Method, Request, header},
    middleware,
    middleware::Next,
    routing::get,
};
use tower_http::cors::{Any, CorsLayer};

use super::handlers::{health, jobs};
use super::{AppState, sse_logs_endpoint};

pub(crate) fn build_router(state: AppState) -> Router {
    // Dashboards on other origins poll the JSON endpoints.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    Router::new()
        .route("/", get(jobs::describe_jobs))
        .route("/health", get(health::health_check))
        .route("/status", get(jobs::job_statuses))
        .route("/api/jobs", get(jobs::get_jobs))
        .route("/api/jobs/{name}", get(jobs::get_job))
        .route("/api/logs", get(sse_logs_endpoint))
        .layer(middleware::from_fn(security_headers))
        .layer(cors)
        .with_state(state)
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'self'"),
    );
    response
}
