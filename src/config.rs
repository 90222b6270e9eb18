//! Shared client configuration.

use http::HeaderMap;
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings every request of a [`Client`](crate::Client) is materialized against.
///
/// The configuration is owned by the client. It can be changed between
/// requests through [`Client::config_mut`](crate::Client::config_mut); requests
/// already in flight keep the configuration they started with.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Base URL relative endpoint paths are appended to.
    pub base_url: Url,

    /// Headers sent with every request unless the endpoint opts out.
    pub headers: HeaderMap,

    /// Query parameters added to every request, in order.
    pub query_parameters: Vec<(String, String)>,

    /// Parameters merged into every JSON object or form body.
    pub body_parameters: Map<String, Value>,

    /// Hosts for which certificate validation is relaxed.
    pub trusted_domains: Vec<String>,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Report every network attempt to the client's observer.
    pub debug: bool,
}

impl NetworkConfig {
    /// Creates a configuration with no defaults besides the base URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            headers: HeaderMap::new(),
            query_parameters: Vec::new(),
            body_parameters: Map::new(),
            trusted_domains: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            debug: false,
        }
    }

    /// Returns `true` if `host` is in the trusted-domain allowlist.
    pub fn is_trusted(&self, host: &str) -> bool {
        self.trusted_domains
            .iter()
            .any(|domain| domain.eq_ignore_ascii_case(host))
    }
}
