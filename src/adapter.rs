//! Adapters turning the raw byte envelope into the payload a caller wants.
//!
//! Every consumption style of [`Client`](crate::Client) (callback, future,
//! `async`) runs the same execution core and then hands its
//! `Response<Bytes>` to a [`ResponseAdapter`]. Adapters only transform the
//! success payload; failures pass through untouched, except for
//! [`NoPayload`] which treats an empty response as success.

use crate::{BoxError, Error, Response};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// Transforms the terminal envelope of the execution core.
pub trait ResponseAdapter: Send + 'static {
    /// The success payload after adaptation.
    type Output: Send + 'static;

    /// Consumes the byte envelope and builds the adapted one.
    fn adapt(self, response: Response<Bytes>) -> Response<Self::Output>;
}

/// Passes the raw bytes through.
#[derive(Debug, Clone, Copy, Default)]
pub struct Raw;

impl ResponseAdapter for Raw {
    type Output = Bytes;

    fn adapt(self, response: Response<Bytes>) -> Response<Bytes> {
        response
    }
}

/// Decodes the body with an injected function.
///
/// A decoder failure is reported as [`Error::ParsingFailed`], never as the
/// decoder's own error type.
pub struct Decode<T, F> {
    decoder: F,
    _output: PhantomData<fn() -> T>,
}

impl<T, F> ResponseAdapter for Decode<T, F>
where
    T: Send + 'static,
    F: FnOnce(&[u8]) -> Result<T, BoxError> + Send + 'static,
{
    type Output = T;

    fn adapt(self, response: Response<Bytes>) -> Response<T> {
        let status = response.status();
        let decoder = self.decoder;
        response.and_then(|body| {
            decoder(&body[..]).map_err(|e| {
                let raw_response = String::from_utf8_lossy(&body).into_owned();
                tracing::error!(
                    error = %e,
                    raw_response = %raw_response,
                    "Failed to decode response"
                );
                Error::ParsingFailed {
                    raw_response,
                    reason: e.to_string(),
                    status,
                }
            })
        })
    }
}

/// A [`Decode`] adapter using `decoder`.
///
/// # Examples
///
/// ```
/// use reqflow::adapter;
///
/// let csv = adapter::decode_with(|body: &[u8]| {
///     Ok(body.split(|b| *b == b',').count())
/// });
/// ```
pub fn decode_with<T, F>(decoder: F) -> Decode<T, F>
where
    F: FnOnce(&[u8]) -> Result<T, BoxError>,
{
    Decode {
        decoder,
        _output: PhantomData,
    }
}

/// Function pointer type of the JSON decoder used by [`json`].
pub type JsonDecoder<T> = fn(&[u8]) -> Result<T, BoxError>;

/// A [`Decode`] adapter parsing the body as JSON with `serde_json`.
pub fn json<T: DeserializeOwned>() -> Decode<T, JsonDecoder<T>> {
    decode_with(decode_json::<T> as JsonDecoder<T>)
}

fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, BoxError> {
    Ok(serde_json::from_slice(body)?)
}

/// Decodes the body as UTF-8 text.
///
/// Invalid UTF-8 is reported as [`Error::DataToString`] carrying the bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Text;

impl ResponseAdapter for Text {
    type Output = String;

    fn adapt(self, response: Response<Bytes>) -> Response<String> {
        response.and_then(|data| match std::str::from_utf8(&data) {
            Ok(text) => Ok(text.to_owned()),
            Err(source) => Err(Error::DataToString {
                data: data.clone(),
                source,
            }),
        })
    }
}

/// Discards the body.
///
/// An [`Error::EmptyResponse`] is the expected shape for this adapter and
/// resolves as success.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPayload;

impl ResponseAdapter for NoPayload {
    type Output = ();

    fn adapt(self, response: Response<Bytes>) -> Response<()> {
        response.map_result(|result| match result {
            Ok(_) | Err(Error::EmptyResponse) => Ok(()),
            Err(e) => Err(e),
        })
    }
}
