//! Side channels of a call: the debug observer and the progress indicator.
//!
//! Neither can influence the outcome of a request. The observer is invoked
//! after each network attempt when the client's debug flag is set; the
//! progress indicator is shown once before the first attempt and dismissed
//! once after the terminal outcome.

use crate::request::Request;
use crate::transport::ResponseMeta;
use bytes::Bytes;

/// Receives every completed network attempt while debugging is enabled.
pub trait Observer: Send + Sync {
    /// Called after each attempt, before post-response middlewares run.
    fn record(&self, request: &Request, response: Option<&ResponseMeta>, body: Option<&Bytes>);
}

/// Default [`Observer`]: logs each attempt as a curl command followed by the
/// response status and body, at `DEBUG` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurlLogger;

impl Observer for CurlLogger {
    fn record(&self, request: &Request, response: Option<&ResponseMeta>, body: Option<&Bytes>) {
        tracing::debug!(curl = %render_curl(request), "Request");
        tracing::debug!(
            status = response.map_or(0, |meta| meta.status.as_u16()),
            body = %body.map(|b| pretty_body(b)).unwrap_or_default(),
            "Response"
        );
    }
}

/// Renders a request as a reproducible curl command.
///
/// ```
/// use reqflow::{observe::render_curl, request::materialize, Endpoint, NetworkConfig};
///
/// let config = NetworkConfig::new("https://api.example.com".parse().unwrap());
/// let endpoint = Endpoint::post("/notes").with_body("hi");
/// let curl = render_curl(&materialize(&endpoint, &config).unwrap());
///
/// assert!(curl.starts_with("curl -v -X POST"));
/// assert!(curl.ends_with("\"https://api.example.com/notes\""));
/// ```
pub fn render_curl(request: &Request) -> String {
    let mut parts = vec![format!("curl -v -X {}", request.method)];
    for (name, value) in &request.headers {
        if *name == http::header::COOKIE {
            continue;
        }
        let value = String::from_utf8_lossy(value.as_bytes());
        parts.push(format!("-H \"{}: {}\"", name, escape(&value)));
    }
    if let Some(body) = &request.body {
        parts.push(format!("-d \"{}\"", escape(&String::from_utf8_lossy(body))));
    }
    parts.push(format!("\"{}\"", request.url));
    parts.join(" \\\n\t")
}

/// Pretty-prints JSON bodies; other bodies are returned as lossy UTF-8.
pub fn pretty_body(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// A UI-side loading indicator driven by a call's lifecycle.
pub trait ProgressIndicator: Send + Sync {
    /// Called once, before the first attempt.
    fn show(&self);

    /// Called once, after the terminal outcome and before delivery.
    fn dismiss(&self);
}
