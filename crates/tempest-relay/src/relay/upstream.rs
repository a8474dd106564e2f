//! Upstream fetch path: URL construction, the bounded GET, and translation
//! of the Tempest response into the client-facing one.
//!
//! The success path streams bytes verbatim: the upstream body is never
//! buffered, so large previews cost constant memory.

use std::time::Instant;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use reqwest::Url;

use crate::config::UpstreamConfig;
use crate::error::RelayError;

/// Fixed post-processing controls (rotation, size cap, watermark, crop,
/// source tag). Not a caller-facing surface.
const FIXED_QUERY: &str = "exifrotate=1&MaxSize=9999&ProofWatermark=FALSE&source=G&WithCrop=TRUE";

/// Cache directive attached to every successful image response.
const CACHE_CONTROL: &str = "public, max-age=3600";

/// Build the upstream preview URL for one photo ID.
///
/// The identifier lands percent-encoded in a single path segment:
/// `<base>/image/<id>/preview/?<fixed query>`.
pub fn build_photo_url(base_url: &str, photo_id: &str) -> Result<Url, RelayError> {
    let mut url = Url::parse(base_url).map_err(|e| RelayError::RequestConstruction {
        reason: e.to_string(),
    })?;

    url.path_segments_mut()
        .map_err(|_| RelayError::RequestConstruction {
            reason: format!("upstream base URL '{base_url}' cannot carry a path"),
        })?
        .pop_if_empty()
        .push("image")
        .push(photo_id)
        .push("preview")
        .push(""); // Tempest requires the trailing slash

    url.set_query(Some(FIXED_QUERY));
    Ok(url)
}

/// Translate a non-transport upstream status into a relay error.
///
/// Returns `None` for 200 (the streaming success path). The 204 entry is
/// config-gated because "no content means unknown ID" is a Tempest
/// convention, not an HTTP one.
pub fn classify_status(
    status: StatusCode,
    photo_id: &str,
    config: &UpstreamConfig,
) -> Option<RelayError> {
    match status {
        StatusCode::OK => None,
        StatusCode::NO_CONTENT if config.treat_no_content_as_missing => {
            Some(RelayError::NotFound {
                photo_id: photo_id.to_string(),
            })
        }
        StatusCode::FORBIDDEN => Some(RelayError::AccessDenied {
            photo_id: photo_id.to_string(),
        }),
        StatusCode::UNAUTHORIZED => Some(RelayError::AuthenticationRequired),
        StatusCode::INTERNAL_SERVER_ERROR => Some(RelayError::UpstreamInternalError),
        StatusCode::SERVICE_UNAVAILABLE => Some(RelayError::UpstreamUnavailable),
        other => Some(RelayError::UnexpectedStatus {
            status: other.as_u16(),
        }),
    }
}

/// Fetch one photo from Tempest and assemble the client response.
///
/// The client carries the configured deadline; when it fires, the in-flight
/// call is dropped (releasing the pooled connection) and the caller gets
/// the distinct timeout error rather than a generic connection failure.
pub async fn fetch_photo(
    client: &reqwest::Client,
    config: &UpstreamConfig,
    photo_id: &str,
) -> Result<Response, RelayError> {
    let url = build_photo_url(&config.base_url, photo_id)?;
    let start = Instant::now();

    tracing::debug!(url = %url, "Requesting Tempest API");

    let upstream_resp = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            tracing::warn!(
                photo_id = %photo_id,
                deadline_secs = config.timeout_secs,
                "Tempest API request timed out"
            );
            RelayError::Timeout {
                deadline_secs: config.timeout_secs,
            }
        } else {
            tracing::error!(photo_id = %photo_id, error = %e, "Tempest API connection failed");
            RelayError::ConnectionFailure {
                reason: e.to_string(),
            }
        }
    })?;

    let status = upstream_resp.status();
    let latency = start.elapsed().as_millis() as u64;
    tracing::info!(
        photo_id = %photo_id,
        status = status.as_u16(),
        latency_ms = latency,
        "Tempest API responded"
    );

    if let Some(err) = classify_status(status, photo_id, config) {
        return Err(err);
    }

    // Success: headers go out before the first body byte, then the body
    // streams chunk-by-chunk.
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CACHE_CONTROL, CACHE_CONTROL);

    if let Some(content_type) = upstream_resp.headers().get(header::CONTENT_TYPE) {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }

    let body = Body::from_stream(upstream_resp.bytes_stream());

    Ok(builder.body(body).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build streaming response");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
    }))
}
