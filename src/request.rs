//! Materialization of endpoints into concrete requests.
//!
//! [`materialize`] is a pure function of an [`Endpoint`] and a
//! [`NetworkConfig`]: the same inputs always produce the same [`Request`].
//! The pipeline calls it again for every attempt rather than reusing the
//! previous attempt's (possibly middleware-mutated) request.

use crate::config::NetworkConfig;
use crate::endpoint::{upsert, value_to_param, Body, Endpoint};
use crate::{Error, Result};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// A request ready to be handed to a [`Transport`](crate::Transport).
///
/// Pre-request middlewares receive it mutably and may change any field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The HTTP method.
    pub method: Method,

    /// The fully resolved URL, query included.
    pub url: Url,

    /// The merged headers.
    pub headers: HeaderMap,

    /// The encoded body.
    pub body: Option<Bytes>,

    /// How long the transport may spend on this request.
    pub timeout: Duration,

    /// Whether the host is in the trusted-domain allowlist, in which case the
    /// transport may skip certificate validation.
    pub relaxed_tls: bool,
}

/// Combines an endpoint with the client configuration.
///
/// Headers, query parameters and body parameters all follow the same rule:
/// client defaults first, endpoint values replace them on key collision.
///
/// # Errors
///
/// Returns [`Error::RequestConstruction`] when the URL cannot be formed or the
/// body cannot be encoded.
///
/// # Examples
///
/// ```
/// use reqflow::{request::materialize, Endpoint, NetworkConfig};
///
/// let config = NetworkConfig::new("https://api.example.com/v1".parse().unwrap());
/// let request = materialize(&Endpoint::get("/users/42"), &config).unwrap();
///
/// assert_eq!(request.url.as_str(), "https://api.example.com/v1/users/42");
/// ```
pub fn materialize(endpoint: &Endpoint, config: &NetworkConfig) -> Result<Request> {
    let mut url = resolve_url(endpoint, config)?;

    let mut query = config.query_parameters.clone();
    for (key, value) in endpoint.query_params().unwrap_or_default() {
        upsert(&mut query, key.clone(), value.clone());
    }
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(&query);
    }

    let mut headers = if endpoint.use_endpoint_headers_only() {
        HeaderMap::new()
    } else {
        config.headers.clone()
    };
    for (name, value) in endpoint.headers() {
        headers.insert(name.clone(), value.clone());
    }

    let body = match endpoint.body() {
        Some(body) => {
            let (bytes, content_type) = encode_body(body, config)?;
            if let Some(content_type) = content_type {
                if !endpoint.use_endpoint_headers_only() && !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
                }
            }
            Some(bytes)
        }
        None => None,
    };

    let relaxed_tls = url.host_str().is_some_and(|host| config.is_trusted(host));

    Ok(Request {
        method: endpoint.method().clone(),
        url,
        headers,
        body,
        timeout: config.timeout,
        relaxed_tls,
    })
}

/// Resolves the endpoint against the base URL.
///
/// Relative paths are appended to the base path. A query on the base URL is
/// kept ahead of the endpoint's inline query, and fragments are dropped
/// since they are never sent.
fn resolve_url(endpoint: &Endpoint, config: &NetworkConfig) -> Result<Url> {
    if endpoint.is_full_path() {
        let raw = endpoint.path();
        let url = Url::parse(raw)
            .map_err(|e| Error::RequestConstruction(format!("Invalid URL `{}`: {}", raw, e)))?;
        return ensure_hierarchical(url);
    }

    let mut url = ensure_hierarchical(config.base_url.clone())?;
    url.set_fragment(None);

    let path = endpoint
        .path()
        .split_once('#')
        .map_or(endpoint.path(), |(path, _)| path);
    let (path, inline_query) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };

    let path = path.trim_start_matches('/');
    if !path.is_empty() {
        let joined = format!("{}/{}", url.path().trim_end_matches('/'), path);
        url.set_path(&joined);
    }

    if let Some(inline) = inline_query.filter(|q| !q.is_empty()) {
        let query = match url.query() {
            Some(base) if !base.is_empty() => format!("{}&{}", base, inline),
            _ => inline.to_string(),
        };
        url.set_query(Some(&query));
    }
    Ok(url)
}

fn ensure_hierarchical(url: Url) -> Result<Url> {
    if url.cannot_be_a_base() {
        return Err(Error::RequestConstruction(format!(
            "URL `{}` has no hierarchical path",
            url
        )));
    }
    Ok(url)
}

fn encode_body(body: &Body, config: &NetworkConfig) -> Result<(Bytes, Option<&'static str>)> {
    match body {
        Body::Raw(bytes) => Ok((bytes.clone(), None)),
        Body::Json(value) => {
            let value = match value {
                Value::Object(fields) if !config.body_parameters.is_empty() => {
                    let mut merged = config.body_parameters.clone();
                    merged.extend(fields.clone());
                    Value::Object(merged)
                }
                other => other.clone(),
            };
            let bytes = serde_json::to_vec(&value).map_err(|e| {
                Error::RequestConstruction(format!("Failed to encode JSON body: {}", e))
            })?;
            Ok((Bytes::from(bytes), Some("application/json")))
        }
        Body::Form(fields) => {
            let mut pairs: Vec<(String, String)> = Vec::new();
            for (key, value) in &config.body_parameters {
                if let Some(value) = value_to_param(value.clone()) {
                    pairs.push((key.clone(), value));
                }
            }
            for (key, value) in fields {
                upsert(&mut pairs, key.clone(), value.clone());
            }
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&pairs)
                .finish();
            Ok((
                Bytes::from(encoded),
                Some("application/x-www-form-urlencoded"),
            ))
        }
    }
}
