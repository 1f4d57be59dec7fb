use axum::{
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::AppState;

mod anilist;
mod schedule;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/cached-schedule",
            get(schedule::get_cached_schedule).options(preflight),
        )
        .route("/anilist", post(anilist::proxy_anilist).options(preflight))
}

/// Browsers may call us from any origin with GET/POST and a JSON body
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// OPTIONS /anilist, OPTIONS /cached-schedule
async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Client-facing error: a status and a short message, rendered as
/// `{"error": "..."}`. Internal details stay in the logs.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{body::Body, http::Request, response::Response, Router};
    use tower::ServiceExt;

    pub async fn send(app: Router, request: Request<Body>) -> (Response, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (Response::from_parts(parts, Body::empty()), json)
    }
}
