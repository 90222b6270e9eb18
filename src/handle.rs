//! Cancellation handles, delivery contexts and the future-style adapter.

use crate::observe::ProgressIndicator;
use crate::{Client, Error, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};

/// Cancels an in-flight call.
///
/// Every consumption style hands out the same kind of handle, so
/// cancellation behaves identically whatever the caller used.
///
/// Cancelling while the request is on the wire aborts the attempt and the call
/// resolves with [`Error::Cancelled`]. Cancelling while a middleware hook runs
/// does not interrupt the hook; the next network send is skipped instead.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    cancelled: Arc<watch::Sender<bool>>,
}

impl RequestHandle {
    pub(crate) fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                cancelled: Arc::new(tx),
            },
            rx,
        )
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.send_replace(true);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }
}

/// Resolves once `rx` observes a cancellation. Never resolves if every
/// handle was dropped without cancelling.
pub(crate) async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

/// Where the completion of a call runs.
#[derive(Debug, Clone, Default)]
pub enum Delivery {
    /// On the task that executed the call, right after the terminal outcome.
    #[default]
    Inline,
    /// On a task spawned onto the given runtime.
    Runtime(Handle),
}

impl Delivery {
    /// Delivery onto the runtime the caller is running on.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn current() -> Self {
        Delivery::Runtime(Handle::current())
    }

    pub(crate) fn deliver<T, F>(self, value: T, completion: F)
    where
        T: Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        match self {
            Delivery::Inline => completion(value),
            Delivery::Runtime(handle) => {
                handle.spawn(async move { completion(value) });
            }
        }
    }
}

/// Per-call options.
#[derive(Clone, Default)]
pub struct CallOptions {
    pub(crate) delivery: Delivery,
    pub(crate) progress: Option<Arc<dyn ProgressIndicator>>,
}

impl CallOptions {
    /// Default options: inline delivery, no progress indicator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets where the completion runs.
    pub fn delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Sets a progress indicator shown for the duration of the call.
    pub fn progress(mut self, indicator: Arc<dyn ProgressIndicator>) -> Self {
        self.progress = Some(indicator);
        self
    }
}

impl std::fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOptions")
            .field("delivery", &self.delivery)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Future-style view of a call, returned by [`Client::request`].
///
/// Resolves to the adapted envelope. Dropping it before it resolves cancels
/// the call; [`handle`](Self::handle) gives a handle that outlives it.
#[must_use = "dropping a PendingRequest cancels the call"]
pub struct PendingRequest<T> {
    rx: oneshot::Receiver<Response<T>>,
    handle: RequestHandle,
    session: Client,
    done: bool,
}

impl<T> PendingRequest<T> {
    pub(crate) fn new(
        rx: oneshot::Receiver<Response<T>>,
        handle: RequestHandle,
        session: Client,
    ) -> Self {
        Self {
            rx,
            handle,
            session,
            done: false,
        }
    }

    /// The cancellation handle of this call.
    pub fn handle(&self) -> &RequestHandle {
        &self.handle
    }

    /// Cancels the call; the future still resolves, with [`Error::Cancelled`]
    /// if the request was on the wire.
    pub fn cancel(&self) {
        self.handle.cancel();
    }
}

impl<T> Future for PendingRequest<T> {
    type Output = Response<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(response)) => {
                this.done = true;
                Poll::Ready(response)
            }
            Poll::Ready(Err(_)) => {
                this.done = true;
                Poll::Ready(Response::detached(
                    this.session.clone(),
                    Error::Generic("request task ended without delivering a response".into()),
                ))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for PendingRequest<T> {
    fn drop(&mut self) {
        if !self.done {
            self.handle.cancel();
        }
    }
}
