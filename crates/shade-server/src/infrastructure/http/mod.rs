//! HTTP request transport.
//!
//! # Routes
//!
//! | Method | Path               | Query   | Success                      |
//! |--------|--------------------|---------|------------------------------|
//! | POST   | `/window/up`       | `pos=N` | 200, empty body              |
//! | POST   | `/window/down`     | `pos=N` | 200, empty body              |
//! | GET    | `/window/position` |         | 200, `text/plain` integer    |
//!
//! `up` and `down` behave identically: the target is absolute, so the
//! direction follows from where the shade currently is.
//!
//! # Status codes
//!
//! - 400: missing, repeated, non-numeric, or out-of-range `pos`.
//! - 502: the motor or the serial link failed.
//! - 503: the backend is unusable (poisoned lock, worker failure).

use std::future::Future;
use std::io;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::application::control_shade::{ControlError, ShadeService};

const POS_PARAM: &str = "pos";

/// Failure of a single request, already classified by HTTP status.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Control(ControlError),
}

impl From<ControlError> for ApiError {
    fn from(e: ControlError) -> Self {
        ApiError::Control(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Control(e @ ControlError::InvalidPosition(_)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Control(e @ ControlError::Motor(_)) => {
                error!("shade request failed: {e}");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            ApiError::Control(e @ ControlError::Unavailable(_)) => {
                error!("shade backend unavailable: {e}");
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
        };
        (status, message).into_response()
    }
}

/// Builds the router with request tracing attached.
pub fn router(service: ShadeService) -> Router {
    Router::new()
        .route("/window/up", post(move_window))
        .route("/window/down", post(move_window))
        .route("/window/position", get(window_position))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Serves `service` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns the underlying I/O error if the accept loop fails.
pub async fn serve<F>(listener: TcpListener, service: ShadeService, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("HTTP transport listening on {addr}");
    }
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn move_window(
    State(service): State<ShadeService>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<StatusCode, ApiError> {
    let position = extract_pos(&params)?;
    service.set_position(position).await?;
    Ok(StatusCode::OK)
}

async fn window_position(State(service): State<ShadeService>) -> Result<Response, ApiError> {
    let position = service.get_position().await?;
    Ok(([(header::CONTENT_TYPE, "text/plain")], position.to_string()).into_response())
}

/// Pulls exactly one integer `pos` value out of the query string.
fn extract_pos(params: &[(String, String)]) -> Result<i32, ApiError> {
    let mut values = params
        .iter()
        .filter(|(key, _)| key == POS_PARAM)
        .map(|(_, value)| value.as_str());

    let Some(raw) = values.next() else {
        return Err(ApiError::BadRequest(
            "request must have a 'pos' query parameter with a numeric value".to_string(),
        ));
    };
    if values.next().is_some() {
        return Err(ApiError::BadRequest(
            "request must only have a single 'pos' query parameter".to_string(),
        ));
    }

    raw.trim().parse::<i32>().map_err(|e| {
        warn!("rejecting non-numeric pos {raw:?}: {e}");
        ApiError::BadRequest(format!("'pos' must be an integer, got {raw:?}"))
    })
}
