//! Error types for requests executed by the pipeline.
//!
//! Every failure that reaches a caller is one of the [`Error`] variants. Raw
//! transport errors are classified before they leave the execution core, so
//! callers never have to match on `reqwest` or I/O error types.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

/// Boxed error used for middleware, transport and decoder failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The main error type for requests.
///
/// The set is flat: each variant carries only what is needed to render a
/// message or to decide whether a retry makes sense.
///
/// # Examples
///
/// ```no_run
/// use reqflow::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.get::<serde_json::Value>("/endpoint").await {
///     Ok(value) => println!("Success: {:?}", value),
///     Err(Error::HttpError { status, raw_response, .. }) => {
///         eprintln!("HTTP error {}: {}", status, String::from_utf8_lossy(&raw_response));
///     }
///     Err(Error::ParsingFailed { raw_response, reason, .. }) => {
///         eprintln!("Failed to parse {}: {}", raw_response, reason);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The endpoint and the client configuration could not be combined into a
    /// well-formed request (bad URL, unserializable body, ...).
    ///
    /// Never retried.
    #[error("Unable to build request: {0}")]
    RequestConstruction(String),

    /// A pre-request or post-response middleware hook failed.
    ///
    /// Never retried.
    #[error("Middleware error: {0}")]
    Middleware(#[source] BoxError),

    /// Post-response middlewares asked for more retries than the client allows.
    ///
    /// No network send is made for the attempt that produced this error.
    #[error("Middleware max retry reached after {attempts} attempts")]
    MaxRetry {
        /// The number of network sends performed before giving up.
        attempts: usize,
    },

    /// The request was cancelled through its [`RequestHandle`](crate::RequestHandle).
    #[error("The network request has been cancelled")]
    Cancelled,

    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    /// A network-level failure (connection refused, DNS, TLS, broken body stream...).
    #[error("Network error: {0}")]
    Network(#[source] BoxError),

    /// The server answered with a status outside the accepted range.
    ///
    /// The raw body is kept so callers can decode a structured error payload,
    /// see [`Error::decode_body`].
    #[error("HTTP error {status}: {}", String::from_utf8_lossy(.raw_response))]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: Bytes,
        /// The response headers
        headers: HeaderMap,
        /// Rate limit information parsed from headers
        rate_limit_info: Option<crate::rate_limit::RateLimitInfo>,
    },

    /// The status was accepted but the response carried no body.
    #[error("The request returned an empty response")]
    EmptyResponse,

    /// The decode function rejected the response body.
    #[error("Failed to parse response: {reason}")]
    ParsingFailed {
        /// The raw response body, lossily converted to text
        raw_response: String,
        /// The decoder's error message
        reason: String,
        /// The HTTP status code, when a response was received
        status: Option<StatusCode>,
    },

    /// The response body is not valid UTF-8.
    #[error("Unable to convert response data to string")]
    DataToString {
        /// The offending bytes
        data: Bytes,
        /// Where decoding stopped
        #[source]
        source: std::str::Utf8Error,
    },

    /// An unclassified failure.
    #[error("Generic error: {0}")]
    Generic(BoxError),

    /// Invalid client configuration was provided to the builder.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An invalid base URL was provided to the builder.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` if repeating the request could plausibly succeed.
    ///
    /// The pipeline never acts on this by itself; it is meant for
    /// post-response middlewares deciding whether to ask for a retry.
    ///
    /// # Examples
    ///
    /// ```
    /// use reqflow::Error;
    /// use http::StatusCode;
    ///
    /// let err = Error::HttpError {
    ///     status: StatusCode::SERVICE_UNAVAILABLE,
    ///     raw_response: bytes::Bytes::new(),
    ///     headers: http::HeaderMap::new(),
    ///     rate_limit_info: None,
    /// };
    /// assert!(err.is_retryable());
    /// assert!(!Error::EmptyResponse.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::Timeout => true,
            Error::HttpError { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// Returns `true` for [`Error::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError { status, .. } => Some(*status),
            Error::ParsingFailed { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&[u8]> {
        match self {
            Error::HttpError { raw_response, .. } => Some(&raw_response[..]),
            Error::ParsingFailed { raw_response, .. } => Some(raw_response.as_bytes()),
            Error::DataToString { data, .. } => Some(&data[..]),
            _ => None,
        }
    }

    /// Decodes the body of an [`Error::HttpError`] as JSON.
    ///
    /// Returns `None` for other variants or when the body does not match `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// use reqflow::Error;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct ApiError { error: String }
    ///
    /// let err = Error::HttpError {
    ///     status: http::StatusCode::NOT_FOUND,
    ///     raw_response: bytes::Bytes::from_static(br#"{"error":"not found"}"#),
    ///     headers: http::HeaderMap::new(),
    ///     rate_limit_info: None,
    /// };
    /// let body: ApiError = err.decode_body().unwrap();
    /// assert_eq!(body.error, "not found");
    /// ```
    pub fn decode_body<T: DeserializeOwned>(&self) -> Option<T> {
        match self {
            Error::HttpError { raw_response, .. } => serde_json::from_slice(raw_response).ok(),
            _ => None,
        }
    }

    /// Returns rate limit information if available.
    ///
    /// This is only present for `HttpError` variants that include rate limit headers.
    pub fn rate_limit_info(&self) -> Option<&crate::rate_limit::RateLimitInfo> {
        match self {
            Error::HttpError {
                rate_limit_info, ..
            } => rate_limit_info.as_ref(),
            _ => None,
        }
    }
}

/// A specialized `Result` type for requests.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_display_includes_body() {
        let err = Error::HttpError {
            status: StatusCode::NOT_FOUND,
            raw_response: Bytes::from_static(b"missing"),
            headers: HeaderMap::new(),
            rate_limit_info: None,
        };
        assert_eq!(err.to_string(), "HTTP error 404 Not Found: missing");
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.raw_response(), Some(&b"missing"[..]));
    }

    #[test]
    fn middleware_error_keeps_source() {
        let err = Error::Middleware("token expired".into());
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("token expired"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn decode_body_ignores_other_variants() {
        assert!(Error::EmptyResponse
            .decode_body::<serde_json::Value>()
            .is_none());
    }
}
