//! The network seam.
//!
//! The pipeline never performs I/O itself: every attempt goes through a
//! [`Transport`]. [`ReqwestTransport`] is the default implementation; tests and
//! embedders can plug in their own.

use crate::request::Request;
use crate::{BoxError, Error, Result};
use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};
use std::future::Future;
use std::pin::Pin;
use url::Url;

/// An owned, boxed, `Send` future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Response metadata: everything about a response except its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMeta {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The final URL, after redirects.
    pub url: Url,
    /// The protocol version.
    pub version: Version,
}

impl ResponseMeta {
    /// Metadata with the given status, no headers and HTTP/1.1.
    pub fn new(status: StatusCode, url: Url) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            url,
            version: Version::HTTP_11,
        }
    }
}

/// A network-level failure reported by a [`Transport`].
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// The attempt was aborted by its [`RequestHandle`](crate::RequestHandle).
    #[error("request cancelled")]
    Cancelled,

    /// The attempt exceeded its timeout.
    #[error("request timed out")]
    Timeout,

    /// No connection could be established.
    #[error("connection failed: {0}")]
    Connect(#[source] BoxError),

    /// Any other transport failure.
    #[error(transparent)]
    Other(BoxError),
}

/// Raw result of one network attempt.
///
/// Mirrors the `(bytes?, response?, error?)` triple of platform HTTP clients:
/// a transport error may come with partial metadata (e.g. the body stream broke
/// after the headers arrived), and a response may come without a body.
#[derive(Debug, Default)]
pub struct RawResponse {
    /// The body, `None` when the response had none.
    pub body: Option<Bytes>,
    /// Response metadata, `None` when no response was received.
    pub meta: Option<ResponseMeta>,
    /// The transport error, if the attempt failed.
    pub error: Option<TransportError>,
}

impl RawResponse {
    /// A received response. An empty body is recorded as absent.
    pub fn received(meta: ResponseMeta, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self {
            body: (!body.is_empty()).then_some(body),
            meta: Some(meta),
            error: None,
        }
    }

    /// A failed attempt without any response.
    pub fn failed(error: TransportError) -> Self {
        Self {
            body: None,
            meta: None,
            error: Some(error),
        }
    }

    /// The status code, if a response was received.
    pub fn status(&self) -> Option<StatusCode> {
        self.meta.as_ref().map(|meta| meta.status)
    }
}

/// Sends materialized requests over the network.
///
/// Implementations must not panic on network failures; they report them
/// through [`RawResponse::error`]. Cancellation is handled by the pipeline,
/// which drops the returned future.
pub trait Transport: Send + Sync {
    /// Performs one network attempt.
    fn send<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, RawResponse>;
}

/// [`Transport`] backed by `reqwest`.
///
/// Keeps a second client with certificate validation disabled, used only for
/// requests flagged [`Request::relaxed_tls`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    strict: reqwest::Client,
    relaxed: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates the transport with default `reqwest` settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self> {
        let strict = reqwest::Client::builder().build().map_err(|e| {
            Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;
        let relaxed = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| {
                Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Self { strict, relaxed })
    }

    async fn perform(&self, request: &Request) -> RawResponse {
        let client = if request.relaxed_tls {
            &self.relaxed
        } else {
            &self.strict
        };

        let mut builder = client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .timeout(request.timeout);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return RawResponse::failed(map_error(e)),
        };

        let meta = ResponseMeta {
            status: response.status(),
            headers: response.headers().clone(),
            url: response.url().clone(),
            version: response.version(),
        };

        match response.bytes().await {
            Ok(body) => RawResponse::received(meta, body),
            Err(e) => RawResponse {
                body: None,
                meta: Some(meta),
                error: Some(map_error(e)),
            },
        }
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, RawResponse> {
        Box::pin(self.perform(request))
    }
}

fn map_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect(Box::new(error))
    } else {
        TransportError::Other(Box::new(error))
    }
}
