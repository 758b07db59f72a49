mod routes;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::error::{Error, Result};
use crate::MetaAdsDW;

/// Build the API router over the shared warehouse facade.
pub fn router(dw: MetaAdsDW) -> Router {
    Router::new()
        .route("/api/settings", get(routes::get_settings).post(routes::post_settings))
        .route("/api/meta/accounts", get(routes::list_meta_accounts))
        .route("/api/accounts/add", post(routes::add_account))
        .route("/api/accounts", get(routes::list_accounts))
        .route("/api/accounts/{id}", delete(routes::remove_account))
        .route("/api/sync/{account_id}", post(routes::sync_account))
        .route("/api/ads", get(routes::list_ads))
        .route("/api/analyze/{ad_id}", post(routes::analyze_ad))
        .route("/api/analyze-all", post(routes::analyze_all))
        .route("/api/analytics", get(routes::analytics))
        .route("/api/reports/generate", post(routes::generate_report))
        .route("/api/reports", get(routes::list_reports))
        .with_state(dw)
}

/// Bind and serve until the process is stopped.
pub async fn serve(dw: MetaAdsDW, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Other(format!("failed to bind {addr}: {e}")))?;
    log::info!("metadw listening on http://{addr}");
    axum::serve(listener, router(dw))
        .await
        .map_err(|e| Error::Other(e.to_string()))
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Config(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("Request failed: {self}");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
