//! Classification of raw attempt outcomes into the [`Error`] taxonomy.
//!
//! Pure functions, no I/O. Retrying is never decided here.

use crate::rate_limit::RateLimitInfo;
use crate::transport::{RawResponse, ResponseMeta, TransportError};
use crate::Error;
use bytes::Bytes;
use std::ops::RangeInclusive;

/// Status codes treated as success unless configured otherwise.
pub const DEFAULT_ACCEPTED_STATUS: RangeInclusive<u16> = 200..=299;

/// Maps a transport failure to exactly one taxonomy variant.
///
/// Cancellation always wins. When the server did answer with a rejected
/// status before the failure, the status error is reported with whatever body
/// was received so callers can still decode the server's error payload.
pub fn classify(
    error: TransportError,
    body: Option<&Bytes>,
    meta: Option<&ResponseMeta>,
    accepted: &RangeInclusive<u16>,
) -> Error {
    let rejected = meta.filter(|meta| !accepted.contains(&meta.status.as_u16()));
    match (error, rejected) {
        (TransportError::Cancelled, _) => Error::Cancelled,
        (_, Some(meta)) => status_error(meta, body.cloned().unwrap_or_default()),
        (TransportError::Timeout, None) => Error::Timeout,
        (TransportError::Connect(source) | TransportError::Other(source), None) => {
            Error::Network(source)
        }
    }
}

/// Resolves the final outcome of an attempt no middleware retried.
///
/// Order of checks: transport error, missing response, rejected status,
/// missing body.
pub fn resolve(raw: &mut RawResponse, accepted: &RangeInclusive<u16>) -> Result<Bytes, Error> {
    if let Some(error) = raw.error.take() {
        return Err(classify(
            error,
            raw.body.as_ref(),
            raw.meta.as_ref(),
            accepted,
        ));
    }
    let Some(meta) = raw.meta.as_ref() else {
        return Err(Error::Generic(
            "transport returned neither a response nor an error".into(),
        ));
    };
    if !accepted.contains(&meta.status.as_u16()) {
        return Err(status_error(meta, raw.body.clone().unwrap_or_default()));
    }
    raw.body.clone().ok_or(Error::EmptyResponse)
}

fn status_error(meta: &ResponseMeta, body: Bytes) -> Error {
    Error::HttpError {
        status: meta.status,
        raw_response: body,
        headers: meta.headers.clone(),
        rate_limit_info: RateLimitInfo::throttled(&meta.headers),
    }
}
