use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::ApiError;
use crate::AppState;

/// POST /anilist
/// Forward the body to AniList as a GraphQL request (rate-limited, with our
/// credentials) and relay its status and JSON. Any content type is accepted
/// as long as the body is JSON.
pub(super) async fn proxy_anilist(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let request: serde_json::Value =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("Invalid JSON body"))?;

    match state.anilist.passthrough(&request).await {
        Ok((status, json)) => {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            Ok((status, Json(json)))
        }
        Err(e) => {
            tracing::error!("AniList passthrough failed: {}", e);
            Err(ApiError::internal("AniList proxy failed"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::send;
    use crate::services::schedule::{BuildSchedule, ScheduleError};
    use crate::services::test_server::spawn_server;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::post,
        Json, Router,
    };
    use std::sync::Arc;
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(60);

    struct NeverBuilt;

    #[async_trait]
    impl BuildSchedule for NeverBuilt {
        async fn build(&self) -> Result<crate::models::Schedule, ScheduleError> {
            Err(ScheduleError::Aborted)
        }
    }

    fn post_anilist(body: &str) -> Request<Body> {
        Request::post("/anilist")
            .header("Content-Type", "text/plain")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_passthrough_relays_upstream() {
        let upstream = Router::new().route(
            "/",
            post(|Json(body): Json<serde_json::Value>| async move {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(serde_json::json!({ "query": body["query"] })),
                )
            }),
        );
        let base = spawn_server(upstream).await;
        let app = crate::test_app(Arc::new(NeverBuilt), &format!("{}/", base), TTL);

        let request = post_anilist(r#"{"query": "{ Page { pageInfo { total } } }"}"#);
        let (response, body) = send(app, request).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["query"], "{ Page { pageInfo { total } } }");
    }

    #[tokio::test]
    async fn test_passthrough_network_failure_is_500() {
        // Nothing listens on the discard port
        let app = crate::test_app(Arc::new(NeverBuilt), "http://127.0.0.1:9/", TTL);

        let (response, body) = send(app, post_anilist(r#"{"query": "{}"}"#)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({ "error": "AniList proxy failed" }));
    }

    #[tokio::test]
    async fn test_passthrough_rejects_invalid_json() {
        let app = crate::test_app(Arc::new(NeverBuilt), "http://127.0.0.1:9/", TTL);

        let (response, body) = send(app, post_anilist("not json")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid JSON body");
    }
}
