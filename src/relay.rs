//! Proxy relay: forwards uploaded images to the remote provider
//!
//! Stateless request/response forwarder. Success is a binary `image/png`
//! body; every failure is a JSON `{"error": ...}` envelope, so callers
//! distinguish the two by status code and content type alone. Raw upstream
//! error bodies are logged here and never leaked to the client.

use crate::config::RelayConfig;
use crate::error::{BgBatchError, Result};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Upload size cap; generous compared to what the provider accepts
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Shared, immutable per-process state; no mutable state crosses requests
#[derive(Clone)]
struct RelayState {
    client: reqwest::Client,
    config: Arc<RelayConfig>,
}

/// Request-boundary failures, rendered as the JSON error envelope
enum RelayError {
    /// No `image` field in the multipart payload
    MissingImage,
    /// Unreadable multipart payload
    Malformed,
    /// Neither request credential nor server default configured
    MissingCredential,
    /// Upstream provider returned non-success
    Upstream { status: u16 },
    /// Could not reach the upstream provider
    Forward,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingImage => (StatusCode::BAD_REQUEST, "missing 'image' field"),
            Self::Malformed => (StatusCode::BAD_REQUEST, "malformed multipart request"),
            Self::MissingCredential => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "server API key is not configured",
            ),
            Self::Upstream { status } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                "the background removal provider rejected the request",
            ),
            Self::Forward => (
                StatusCode::BAD_GATEWAY,
                "failed to reach the background removal provider",
            ),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Caller-supplied credential wins; otherwise the server-held default.
/// Empty strings count as absent.
fn resolve_credential(request_key: Option<String>, default_key: Option<&str>) -> Option<String> {
    request_key
        .filter(|k| !k.is_empty())
        .or_else(|| default_key.filter(|k| !k.is_empty()).map(String::from))
}

async fn remove_background(
    State(state): State<RelayState>,
    mut multipart: Multipart,
) -> std::result::Result<Response, RelayError> {
    let mut image: Option<(Bytes, String)> = None;
    let mut request_key: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| RelayError::Malformed)?
    {
        match field.name() {
            Some("image") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let data = field.bytes().await.map_err(|_| RelayError::Malformed)?;
                image = Some((data, file_name));
            },
            Some("apiKey") => {
                request_key = field.text().await.ok();
            },
            _ => {},
        }
    }

    let (image, file_name) = image.ok_or(RelayError::MissingImage)?;
    let api_key = resolve_credential(request_key, state.config.api_key.as_deref())
        .ok_or(RelayError::MissingCredential)?;

    let form = Form::new()
        .part("image_file", Part::bytes(image.to_vec()).file_name(file_name))
        .text("size", "auto");

    let response = state
        .client
        .post(&state.config.upstream_url)
        .header("X-Api-Key", api_key)
        .multipart(form)
        .send()
        .await
        .map_err(|e| {
            error!(upstream = %state.config.upstream_url, error = %e, "upstream request failed");
            RelayError::Forward
        })?;

    let status = response.status();
    if !status.is_success() {
        // Log the raw provider body server-side; the client gets a generic message.
        let body = response.text().await.unwrap_or_default();
        error!(status = status.as_u16(), %body, "upstream rejected request");
        return Err(RelayError::Upstream {
            status: status.as_u16(),
        });
    }

    let result = response.bytes().await.map_err(|e| {
        error!(error = %e, "failed to read upstream body");
        RelayError::Forward
    })?;

    Ok(([(header::CONTENT_TYPE, "image/png")], result).into_response())
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(serde_json::json!({ "error": "method not allowed" })),
    )
        .into_response()
}

/// Build the relay router
///
/// # Errors
/// Returns `InvalidConfig` when the HTTP client cannot be constructed.
pub fn router(config: RelayConfig) -> Result<Router> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| BgBatchError::invalid_config(format!("failed to build HTTP client: {e}")))?;

    let state = RelayState {
        client,
        config: Arc::new(config),
    };

    Ok(Router::new()
        .route(
            "/api/remove-bg",
            post(remove_background).fallback(method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Bind and serve the relay until interrupted
///
/// # Errors
/// Returns `Io` for bind and accept failures.
pub async fn serve(config: RelayConfig) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let has_default_key = config.api_key.is_some();
    let app = router(config)?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, has_default_key, "relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down relay");
        })
        .await?;
    Ok(())
}
