//! Request handlers for the metrics endpoint
//!
//! Handlers are plain functions from a request to an [`HttpResponse`], so
//! routing can be tested without sockets.

use crate::metrics::render_text;
use crate::reconcile::ResourceReconciler;

/// Prometheus text exposition content type
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Response produced by a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Type header value
    pub content_type: &'static str,
    /// Response body
    pub body: String,
}

impl HttpResponse {
    fn plain(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.into(),
        }
    }

    /// Reason phrase for the status line
    pub fn status_text(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            405 => "Method Not Allowed",
            500 => "Internal Server Error",
            _ => "Unknown",
        }
    }
}

/// Handler for GET /metrics
///
/// A failed scrape answers 500 with the error text, never a page of zeros.
pub fn handle_metrics(reconciler: &ResourceReconciler) -> HttpResponse {
    match reconciler.scrape() {
        Ok(report) => HttpResponse {
            status: 200,
            content_type: METRICS_CONTENT_TYPE,
            body: render_text(&report.records()),
        },
        Err(e) => {
            tracing::error!("Scrape failed: {}", e);
            HttpResponse::plain(500, format!("scrape failed: {}\n", e))
        }
    }
}

/// Handler for GET /health
pub fn handle_health() -> HttpResponse {
    HttpResponse::plain(200, "ok\n")
}

/// Route an HTTP request to its handler
pub fn route_request(method: &str, path: &str, reconciler: &ResourceReconciler) -> HttpResponse {
    let path = path.split_once('?').map_or(path, |(path, _)| path);

    match (method, path) {
        ("GET", "/metrics") => handle_metrics(reconciler),
        ("GET", "/health") => handle_health(),
        (_, "/metrics") | (_, "/health") => HttpResponse::plain(405, "method not allowed\n"),
        _ => HttpResponse::plain(404, "not found\n"),
    }
}
