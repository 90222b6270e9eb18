//! The response envelope delivered once per logical call.
//!
//! A [`Response`] wraps the terminal outcome, success or failure, together
//! with the request that produced it, the response metadata if one was
//! received, and the client that ran it. Adapters never edit an envelope:
//! they consume it and build a new one around the transformed outcome.

use crate::request::Request;
use crate::transport::ResponseMeta;
use crate::{Client, Error, Result};
use http::StatusCode;
use std::time::Duration;

/// The terminal outcome of a call and its context.
///
/// # Type Parameters
///
/// * `T` - The success payload: raw bytes out of the execution core, or
///   whatever an adapter turned them into
///
/// # Examples
///
/// ```no_run
/// use reqflow::{adapter, Client, Endpoint};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
/// }
///
/// # async fn example() -> Result<(), reqflow::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// let response = client
///     .request(Endpoint::get("/users/42"), adapter::json::<User>())
///     .await;
///
/// println!("Status: {:?}", response.status());
/// println!("Request took {:?}", response.latency);
/// println!("Attempts: {}", response.attempts);
///
/// let user = response.into_result()?;
/// println!("User: {}", user.id);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Response<T> {
    /// The outcome.
    pub result: Result<T>,

    /// The request of the last attempt, `None` when materialization failed.
    pub request: Option<Request>,

    /// The response metadata of the last attempt, if a response was received.
    pub response: Option<ResponseMeta>,

    /// The client that executed the call.
    pub session: Client,

    /// Time from the start of the call to its terminal outcome, retries included.
    pub latency: Duration,

    /// Number of network sends performed.
    pub attempts: usize,
}

impl<T> Response<T> {
    pub(crate) fn new(
        result: Result<T>,
        request: Option<Request>,
        response: Option<ResponseMeta>,
        session: Client,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            result,
            request,
            response,
            session,
            latency,
            attempts,
        }
    }

    /// An envelope for a call that ended without ever reaching the pipeline's
    /// terminal state.
    pub(crate) fn detached(session: Client, error: Error) -> Self {
        Self::new(Err(error), None, None, session, Duration::ZERO, 0)
    }

    /// Wraps a different outcome in the same context.
    pub fn converted_to<U>(self, result: Result<U>) -> Response<U> {
        Response {
            result,
            request: self.request,
            response: self.response,
            session: self.session,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Transforms the whole outcome, success or failure.
    pub fn map_result<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(Result<T>) -> Result<U>,
    {
        let Response {
            result,
            request,
            response,
            session,
            latency,
            attempts,
        } = self;
        Response::new(f(result), request, response, session, latency, attempts)
    }

    /// Maps the success payload, keeping the context.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use reqflow::{Client, Endpoint};
    /// # async fn example(client: Client) {
    /// let response = client.request(Endpoint::get("/count"), reqflow::adapter::Text).await;
    /// let length = response.map(|text| text.len());
    /// # }
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        self.map_result(|result| result.map(f))
    }

    /// Maps the success payload with a fallible function.
    pub fn and_then<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> Result<U>,
    {
        self.map_result(|result| result.and_then(f))
    }

    /// Discards the context and returns the outcome.
    pub fn into_result(self) -> Result<T> {
        self.result
    }

    /// Returns `true` if the outcome is a success.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The error, if the outcome is a failure.
    pub fn error(&self) -> Option<&Error> {
        self.result.as_ref().err()
    }

    /// The status code of the last received response.
    pub fn status(&self) -> Option<StatusCode> {
        self.response.as_ref().map(|meta| meta.status)
    }

    /// Returns `true` if the request was sent more than once.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a response header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.response.as_ref()?.headers.get(name)?.to_str().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use url::Url;

    fn client() -> Client {
        Client::builder()
            .base_url("http://localhost")
            .unwrap()
            .build()
            .unwrap()
    }

    fn envelope() -> Response<u32> {
        let mut meta = ResponseMeta::new(StatusCode::OK, Url::parse("http://localhost/").unwrap());
        meta.headers
            .insert("content-type", HeaderValue::from_static("application/json"));
        Response::new(
            Ok(42),
            None,
            Some(meta),
            client(),
            Duration::from_millis(100),
            2,
        )
    }

    #[tokio::test]
    async fn map_keeps_context() {
        let response = envelope().map(|n| n.to_string());
        assert_eq!(response.result.as_deref().unwrap(), "42");
        assert_eq!(response.status(), Some(StatusCode::OK));
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert!(response.was_retried());
    }

    #[tokio::test]
    async fn and_then_can_fail() {
        let response = envelope().and_then(|_| Err::<(), _>(Error::EmptyResponse));
        assert!(!response.is_success());
        assert!(matches!(response.error(), Some(Error::EmptyResponse)));
        assert_eq!(response.attempts, 2);
    }

    #[tokio::test]
    async fn detached_has_no_context() {
        let response = Response::<()>::detached(client(), Error::Cancelled);
        assert!(response.status().is_none());
        assert!(response.request.is_none());
        assert!(response.into_result().unwrap_err().is_cancelled());
    }
}
