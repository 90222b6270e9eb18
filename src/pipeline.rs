//! The execution core: one loop per logical call.
//!
//! Each iteration materializes the endpoint, runs the pre-request hooks,
//! sends, and runs the post-response hooks. A post-response hook asking for a
//! retry restarts the loop; anything else resolves the call.

use crate::classify;
use crate::client::ClientInner;
use crate::handle;
use crate::middleware::{partition, Decision};
use crate::request::{materialize, Request};
use crate::transport::{RawResponse, ResponseMeta, TransportError};
use crate::{Client, Endpoint, Error, Response};
use bytes::Bytes;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Runs `endpoint` to its terminal outcome.
///
/// Never panics and never returns early without an envelope: every exit path
/// builds exactly one [`Response`].
pub(crate) async fn run(
    session: Client,
    endpoint: &Endpoint,
    mut cancel: watch::Receiver<bool>,
) -> Response<Bytes> {
    let inner = session.inner.clone();
    let start = Instant::now();
    let mut retries = 0usize;
    let mut sends = 0usize;
    let mut last_meta: Option<ResponseMeta> = None;

    loop {
        let mut request = match materialize(endpoint, &inner.config) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, path = endpoint.path(), "Failed to build request");
                return Response::new(Err(e), None, last_meta, session, start.elapsed(), sends);
            }
        };

        if retries > 0 {
            let Some(delay) = retry_delay(&inner, retries, last_meta.as_ref()) else {
                tracing::warn!(
                    attempts = sends,
                    method = %request.method,
                    url = %request.url,
                    "Retry limit reached"
                );
                return Response::new(
                    Err(Error::MaxRetry { attempts: sends }),
                    Some(request),
                    last_meta,
                    session,
                    start.elapsed(),
                    sends,
                );
            };
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        if endpoint.allow_middlewares() {
            if let Err(e) = run_pre_hooks(&inner, &mut request) {
                tracing::warn!(error = %e, url = %request.url, "Pre-request middleware failed");
                return Response::new(
                    Err(Error::Middleware(e)),
                    Some(request),
                    last_meta,
                    session,
                    start.elapsed(),
                    sends,
                );
            }
        }

        if *cancel.borrow() {
            return Response::new(
                Err(Error::Cancelled),
                Some(request),
                last_meta,
                session,
                start.elapsed(),
                sends,
            );
        }

        sends += 1;
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            attempt = sends,
            "Executing HTTP request"
        );

        let attempt_start = Instant::now();
        let mut raw = tokio::select! {
            raw = inner.transport.send(&request) => raw,
            _ = handle::cancelled(&mut cancel) => RawResponse::failed(TransportError::Cancelled),
        };

        match &raw.meta {
            Some(meta) => tracing::info!(
                status = meta.status.as_u16(),
                latency_ms = attempt_start.elapsed().as_millis(),
                attempt = sends,
                "Received HTTP response"
            ),
            None => tracing::debug!(
                error = ?raw.error,
                attempt = sends,
                "No response received"
            ),
        }

        if inner.config.debug {
            if let Some(observer) = &inner.observer {
                observer.record(&request, raw.meta.as_ref(), raw.body.as_ref());
            }
        }

        if endpoint.allow_middlewares() {
            match run_post_hooks(&inner, &request, &raw).await {
                Ok(Decision::Next) => {}
                Ok(Decision::Retry) => {
                    retries += 1;
                    tracing::info!(
                        retry = retries,
                        status = raw.status().map(|s| s.as_u16()),
                        url = %request.url,
                        "Middleware requested a retry"
                    );
                    last_meta = raw.meta.take();
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, url = %request.url, "Post-response middleware failed");
                    return Response::new(
                        Err(Error::Middleware(e)),
                        Some(request),
                        raw.meta,
                        session,
                        start.elapsed(),
                        sends,
                    );
                }
            }
        }

        let result = classify::resolve(&mut raw, &inner.accepted_status);
        if let Err(e) = &result {
            tracing::warn!(
                error = %e,
                attempts = sends,
                method = %request.method,
                url = %request.url,
                "Request failed"
            );
        }
        return Response::new(
            result,
            Some(request),
            raw.meta,
            session,
            start.elapsed(),
            sends,
        );
    }
}

/// Delay before retry number `retry`, `None` once the strategy's cap is hit.
///
/// A throttled previous response takes precedence over the strategy's own
/// pacing when rate-limit handling is enabled.
fn retry_delay(inner: &ClientInner, retry: usize, last: Option<&ResponseMeta>) -> Option<Duration> {
    let paced = inner.retry_strategy.delay_for_retry(retry)?;
    let throttled = last.and_then(|meta| inner.rate_limit_config.delay_for(&meta.headers));
    match throttled {
        Some(delay) => {
            tracing::info!(
                rate_limit_delay_ms = delay.as_millis(),
                retry = retry,
                max_wait_secs = inner.rate_limit_config.max_wait.as_secs(),
                "Rate limited - waiting before retry"
            );
            Some(delay)
        }
        None => Some(paced),
    }
}

/// Global hooks may rewrite the URL, so the scoped group is matched against
/// the request as they left it.
fn run_pre_hooks(inner: &ClientInner, request: &mut Request) -> Result<(), crate::BoxError> {
    let url = request.url.clone();
    for middleware in partition(&inner.middlewares, &url).global() {
        middleware.pre_request(request)?;
    }
    let url = request.url.clone();
    for middleware in partition(&inner.middlewares, &url).scoped() {
        middleware.pre_request(request)?;
    }
    Ok(())
}

async fn run_post_hooks(
    inner: &ClientInner,
    request: &Request,
    raw: &RawResponse,
) -> Result<Decision, crate::BoxError> {
    let chain = partition(&inner.middlewares, &request.url);
    for middleware in chain.iter() {
        if middleware.post_response(raw).await? == Decision::Retry {
            return Ok(Decision::Retry);
        }
    }
    Ok(Decision::Next)
}
