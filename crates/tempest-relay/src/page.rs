//! Embedded presentation page.
//!
//! The UI is a single static document compiled into the binary; it takes no
//! server-side data, so there is no template engine in the loop. Its only
//! contract with the relay is `GET /fetch-photo?id=...` and the JSON error
//! shape.

use axum::response::Html;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Handler for `GET /`.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
