//! Axum HTTP server: router, handlers, listener, graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::page;
use crate::relay::upstream;

/// Shared application state. Cheap to clone behind the router's Arc.
#[derive(Clone)]
pub struct AppState {
    pub config: RelayConfig,
    pub upstream_client: reqwest::Client,
}

/// Build the router. Split out from [`run`] so tests can drive it directly.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(page::index))
        .route("/fetch-photo", get(handle_fetch_photo))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Build and run the HTTP server.
pub async fn run(state: AppState) -> anyhow::Result<()> {
    let listen_addr = state.config.server.listen_address.clone();
    let app = app(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Tempest relay listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Tempest relay shut down gracefully");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct FetchParams {
    /// Opaque photo identifier. Defaulting to empty lets the handler own
    /// the missing-parameter error instead of axum's rejection.
    #[serde(default)]
    id: String,
}

/// Main handler for GET /fetch-photo.
///
/// 1. Reject missing/empty identifiers before any upstream traffic
/// 2. Fetch from Tempest under the configured deadline
/// 3. Stream the image back, or translate the failure into the JSON body
async fn handle_fetch_photo(
    State(state): State<Arc<AppState>>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    Query(params): Query<FetchParams>,
) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let span = tracing::info_span!(
        "fetch_photo",
        request_id = %request_id,
        client = %client_addr,
        photo_id = %params.id,
    );

    async move {
        if params.id.is_empty() {
            let err = RelayError::MissingIdentifier;
            tracing::warn!(outcome = err.kind(), "Rejected request without photo ID");
            return err.into_response();
        }

        match upstream::fetch_photo(&state.upstream_client, &state.config.upstream, &params.id)
            .await
        {
            Ok(response) => {
                tracing::info!(outcome = "success", "Serving image");
                response
            }
            Err(err) => {
                tracing::warn!(
                    outcome = err.kind(),
                    status = err.status().as_u16(),
                    "Relay failed"
                );
                err.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

/// Health check endpoint.
async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Wait for SIGINT (Ctrl+C) for graceful shutdown.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, draining connections...");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::extract::connect_info::MockConnectInfo;
    use axum::extract::Path;
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::error::ErrorBody;

    /// Spawn a throwaway upstream on an ephemeral port, returning its base URL.
    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn build_test_app(base_url: &str, timeout_secs: u64) -> Router {
        let mut config = RelayConfig::default();
        config.upstream.base_url = base_url.to_string();
        config.upstream.timeout_secs = timeout_secs;

        let upstream_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap();

        app(AppState {
            config,
            upstream_client,
        })
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))))
    }

    async fn send_get(app: Router, uri: &str) -> axum::response::Response {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap()
    }

    async fn error_body(response: axum::response::Response) -> ErrorBody {
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn missing_id_is_rejected_without_upstream_call() {
        // Port 1 is never listening; any outbound attempt would surface as
        // a connection failure (500), not the expected 400.
        let app = build_test_app("http://127.0.0.1:1", 1);

        for uri in ["/fetch-photo", "/fetch-photo?id="] {
            let response = send_get(app.clone(), uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = error_body(response).await;
            assert_eq!(body.error, "Image ID required");
            assert_eq!(body.status, 400);
        }
    }

    #[tokio::test]
    async fn upstream_no_content_becomes_not_found() {
        let base = spawn_upstream(Router::new().fallback(|| async { StatusCode::NO_CONTENT })).await;
        let app = build_test_app(&base, 5);

        let response = send_get(app, "/fetch-photo?id=GHOST").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = error_body(response).await;
        assert_eq!(body.error, "Image not found");
        assert!(body.details.unwrap().contains("GHOST"));
        assert_eq!(body.status, 404);
    }

    #[tokio::test]
    async fn success_streams_bytes_with_forwarded_content_type() {
        let base = spawn_upstream(Router::new().route(
            "/image/{id}/preview/",
            get(|| async {
                ([(header::CONTENT_TYPE, "image/jpeg")], &b"\xff\xd8fakejpeg"[..])
            }),
        ))
        .await;
        let app = build_test_app(&base, 5);

        let response = send_get(app, "/fetch-photo?id=89715C5328").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=3600"
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"\xff\xd8fakejpeg");
    }

    #[tokio::test]
    async fn mapped_upstream_statuses_follow_the_table() {
        let cases = [
            (StatusCode::FORBIDDEN, StatusCode::FORBIDDEN, "Access denied"),
            (
                StatusCode::UNAUTHORIZED,
                StatusCode::UNAUTHORIZED,
                "Authentication required",
            ),
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Tempest API error",
            ),
            (
                StatusCode::SERVICE_UNAVAILABLE,
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable",
            ),
        ];

        for (upstream_status, expected_status, expected_error) in cases {
            let base =
                spawn_upstream(Router::new().fallback(move || async move { upstream_status }))
                    .await;
            let app = build_test_app(&base, 5);

            let response = send_get(app, "/fetch-photo?id=X1").await;
            assert_eq!(response.status(), expected_status);
            let body = error_body(response).await;
            assert_eq!(body.error, expected_error);
            assert_eq!(body.status, expected_status.as_u16());
        }
    }

    #[tokio::test]
    async fn unmapped_upstream_status_passes_through_with_code_in_details() {
        let base = spawn_upstream(Router::new().fallback(|| async { StatusCode::IM_A_TEAPOT })).await;
        let app = build_test_app(&base, 5);

        let response = send_get(app, "/fetch-photo?id=X1").await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        let body = error_body(response).await;
        assert_eq!(body.error, "Unexpected error");
        assert!(body.details.unwrap().contains("418"));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_connection_failure() {
        let app = build_test_app("http://127.0.0.1:1", 1);

        let response = send_get(app, "/fetch-photo?id=X1").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = error_body(response).await;
        assert_eq!(body.error, "Connection failed");
    }

    #[tokio::test]
    async fn stalled_upstream_hits_the_deadline() {
        let base = spawn_upstream(Router::new().fallback(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            StatusCode::OK
        }))
        .await;
        let app = build_test_app(&base, 1);

        let response = send_get(app, "/fetch-photo?id=SLOW").await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let body = error_body(response).await;
        assert_eq!(body.error, "Request timeout");
        assert_eq!(body.status, 408);
    }

    #[tokio::test]
    async fn concurrent_requests_stay_correlated_to_their_identifier() {
        // Upstream echoes the identifier so each response is attributable.
        let base = spawn_upstream(Router::new().route(
            "/image/{id}/preview/",
            get(|Path(id): Path<String>| async move { id }),
        ))
        .await;
        let app = build_test_app(&base, 5);

        let (a, b, c) = tokio::join!(
            send_get(app.clone(), "/fetch-photo?id=AAA"),
            send_get(app.clone(), "/fetch-photo?id=BBB"),
            send_get(app, "/fetch-photo?id=CCC"),
        );

        for (response, expected) in [(a, "AAA"), (b, "BBB"), (c, "CCC")] {
            assert_eq!(response.status(), StatusCode::OK);
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert_eq!(&bytes[..], expected.as_bytes());
        }
    }

    #[tokio::test]
    async fn root_serves_the_presentation_page() {
        let app = build_test_app("http://127.0.0.1:1", 1);

        let response = send_get(app, "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/html"));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let page = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(page.contains("Image Finder"));
        assert!(page.contains("/fetch-photo?id="));
    }

    #[tokio::test]
    async fn health_endpoint_answers_ok() {
        let app = build_test_app("http://127.0.0.1:1", 1);

        let response = send_get(app, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn error_details_hold_diagnostics_not_contracts() {
        // `details` is free text; clients branch on `status`. Verify the
        // field deserializes as optional so its absence is not an error.
        let body: ErrorBody =
            serde_json::from_str(r#"{"error":"Image ID required","status":400}"#).unwrap();
        assert!(body.details.is_none());

        let value: Value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["status"], 400);
    }
}
