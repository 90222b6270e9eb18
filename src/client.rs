//! HTTP client running endpoints through the middleware pipeline.
//!
//! The [`Client`] type is the main entry point for making HTTP requests.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    adapter::{self, ResponseAdapter},
    classify::DEFAULT_ACCEPTED_STATUS,
    config::{NetworkConfig, DEFAULT_TIMEOUT},
    handle::{CallOptions, PendingRequest, RequestHandle},
    middleware::Middleware,
    observe::{CurlLogger, Observer},
    pipeline,
    rate_limit::RateLimitConfig,
    retry::RetryStrategy,
    transport::{ReqwestTransport, Transport},
    Endpoint, Error, Response, Result,
};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use url::Url;

/// An HTTP client executing [`Endpoint`]s through its middleware chain.
///
/// The client is cheap to clone and designed to be reused: clones share the
/// configuration, middlewares and connection pool. Mutating a client through
/// [`config_mut`](Self::config_mut) or [`add_middleware`](Self::add_middleware)
/// detaches it from its clones and from requests already in flight.
///
/// # Examples
///
/// ```no_run
/// use reqflow::{Client, Endpoint, RetryStrategy};
/// use std::time::Duration;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct CreateUser {
///     name: String,
///     email: String,
/// }
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
///     email: String,
/// }
///
/// # async fn example() -> Result<(), reqflow::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .retry_strategy(RetryStrategy::Linear {
///         delay: Duration::from_millis(200),
///         max_retries: 2,
///     })
///     .build()?;
///
/// // GET request
/// let user: User = client.get("/users/123").await?;
/// println!("User: {}", user.name);
///
/// // POST request
/// let new_user = CreateUser {
///     name: "Alice".to_string(),
///     email: "alice@example.com".to_string(),
/// };
/// let created: User = client.post("/users", &new_user).await?;
/// println!("Created user with ID: {}", created.id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

#[derive(Clone)]
pub(crate) struct ClientInner {
    pub(crate) config: NetworkConfig,
    pub(crate) middlewares: Vec<Arc<dyn Middleware>>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) observer: Option<Arc<dyn Observer>>,
    pub(crate) retry_strategy: RetryStrategy,
    pub(crate) rate_limit_config: RateLimitConfig,
    pub(crate) accepted_status: RangeInclusive<u16>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.config.base_url.as_str())
            .field("middlewares", &self.inner.middlewares.len())
            .field("retry_strategy", &self.inner.retry_strategy)
            .field("accepted_status", &self.inner.accepted_status)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reqflow::Client;
    ///
    /// # async fn example() -> Result<(), reqflow::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The configuration requests are materialized against.
    pub fn config(&self) -> &NetworkConfig {
        &self.inner.config
    }

    /// Mutable access to the configuration.
    ///
    /// Requests already started keep the configuration they were started with.
    pub fn config_mut(&mut self) -> &mut NetworkConfig {
        &mut Arc::make_mut(&mut self.inner).config
    }

    /// Appends a middleware after the ones already registered.
    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        Arc::make_mut(&mut self.inner).middlewares.push(middleware);
    }

    /// Number of registered middlewares.
    pub fn middleware_count(&self) -> usize {
        self.inner.middlewares.len()
    }

    /// Executes `endpoint` and hands the adapted envelope to `completion`.
    ///
    /// This is the primitive every other request method is built on. The call
    /// runs on a spawned Tokio task; `completion` is invoked exactly once, on
    /// the context chosen by [`CallOptions::delivery`]. A panic inside the
    /// pipeline, e.g. in a middleware hook, is delivered as [`Error::Generic`].
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn execute<A, F>(
        &self,
        endpoint: Endpoint,
        adapter: A,
        options: CallOptions,
        completion: F,
    ) -> RequestHandle
    where
        A: ResponseAdapter,
        F: FnOnce(Response<A::Output>) + Send + 'static,
    {
        let (handle, cancel) = RequestHandle::new();
        let session = self.clone();
        let CallOptions { delivery, progress } = options;

        if let Some(progress) = &progress {
            progress.show();
        }
        tokio::spawn(async move {
            let fallback = session.clone();
            let run = tokio::spawn(async move { pipeline::run(session, &endpoint, cancel).await });
            let response = match run.await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(error = %e, "Request task failed");
                    Response::detached(
                        fallback,
                        Error::Generic(format!("request task failed: {}", e).into()),
                    )
                }
            };
            let response = adapter.adapt(response);
            if let Some(progress) = &progress {
                progress.dismiss();
            }
            delivery.deliver(response, completion);
        });
        handle
    }

    /// Callback-style request with default [`CallOptions`].
    pub fn request_with<A, F>(&self, endpoint: Endpoint, adapter: A, completion: F) -> RequestHandle
    where
        A: ResponseAdapter,
        F: FnOnce(Response<A::Output>) + Send + 'static,
    {
        self.execute(endpoint, adapter, CallOptions::default(), completion)
    }

    /// Future-style request.
    ///
    /// The call starts immediately; the returned [`PendingRequest`] resolves to
    /// the adapted envelope.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reqflow::{adapter, Client, Endpoint};
    ///
    /// # async fn example(client: Client) {
    /// let pending = client.request(Endpoint::get("/slow"), adapter::Text);
    /// let handle = pending.handle().clone();
    /// tokio::spawn(async move {
    ///     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    ///     handle.cancel();
    /// });
    /// let response = pending.await;
    /// # }
    /// ```
    pub fn request<A>(&self, endpoint: Endpoint, adapter: A) -> PendingRequest<A::Output>
    where
        A: ResponseAdapter,
    {
        self.request_with_options(endpoint, adapter, CallOptions::default())
    }

    /// Future-style request with explicit [`CallOptions`].
    pub fn request_with_options<A>(
        &self,
        endpoint: Endpoint,
        adapter: A,
        options: CallOptions,
    ) -> PendingRequest<A::Output>
    where
        A: ResponseAdapter,
    {
        let (tx, rx) = oneshot::channel();
        let handle = self.execute(endpoint, adapter, options, move |response| {
            let _ = tx.send(response);
        });
        PendingRequest::new(rx, handle, self.clone())
    }

    /// Runs `endpoint` and returns only the adapted outcome.
    ///
    /// Dropping the returned future cancels the call.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reqflow::{adapter, Client, Endpoint};
    ///
    /// # async fn example(client: Client) -> Result<(), reqflow::Error> {
    /// client
    ///     .fetch(Endpoint::delete("/sessions/current"), adapter::NoPayload)
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn fetch<A>(&self, endpoint: Endpoint, adapter: A) -> Result<A::Output>
    where
        A: ResponseAdapter,
    {
        self.request(endpoint, adapter).await.into_result()
    }

    /// Makes a GET request to the specified path and decodes the JSON response.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reqflow::Client;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct User { name: String }
    ///
    /// # async fn example() -> Result<(), reqflow::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let user: User = client.get("/users/123").await?;
    /// println!("User: {}", user.name);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get<Res>(&self, path: impl Into<String>) -> Result<Res>
    where
        Res: DeserializeOwned + Send + 'static,
    {
        self.fetch(Endpoint::get(path), adapter::json::<Res>()).await
    }

    /// Makes a POST request with a JSON body and decodes the JSON response.
    pub async fn post<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Res>
    where
        Req: Serialize,
        Res: DeserializeOwned + Send + 'static,
    {
        let endpoint = Endpoint::post(path).with_json(body)?;
        self.fetch(endpoint, adapter::json::<Res>()).await
    }

    /// Makes a PUT request with a JSON body and decodes the JSON response.
    pub async fn put<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Res>
    where
        Req: Serialize,
        Res: DeserializeOwned + Send + 'static,
    {
        let endpoint = Endpoint::put(path).with_json(body)?;
        self.fetch(endpoint, adapter::json::<Res>()).await
    }

    /// Makes a DELETE request to the specified path, discarding any body.
    pub async fn delete(&self, path: impl Into<String>) -> Result<()> {
        self.fetch(Endpoint::delete(path), adapter::NoPayload).await
    }

    /// Makes a PATCH request with a JSON body and decodes the JSON response.
    pub async fn patch<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Res>
    where
        Req: Serialize,
        Res: DeserializeOwned + Send + 'static,
    {
        let endpoint = Endpoint::patch(path).with_json(body)?;
        self.fetch(endpoint, adapter::json::<Res>()).await
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use reqflow::{ClientBuilder, RetryStrategy};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), reqflow::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .retry_strategy(RetryStrategy::ExponentialBackoff {
///         initial_delay: Duration::from_millis(100),
///         max_delay: Duration::from_secs(10),
///         max_retries: 3,
///         jitter: true,
///     })
///     .default_header("User-Agent", "my-app/1.0")?
///     .default_query_param("api_version", "2")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    headers: HeaderMap,
    query_parameters: Vec<(String, String)>,
    body_parameters: Map<String, Value>,
    trusted_domains: Vec<String>,
    timeout: Duration,
    debug: bool,
    middlewares: Vec<Arc<dyn Middleware>>,
    transport: Option<Arc<dyn Transport>>,
    observer: Option<Arc<dyn Observer>>,
    retry_strategy: RetryStrategy,
    rate_limit_config: RateLimitConfig,
    accepted_status: RangeInclusive<u16>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            headers: HeaderMap::new(),
            query_parameters: Vec::new(),
            body_parameters: Map::new(),
            trusted_domains: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            debug: false,
            middlewares: Vec::new(),
            transport: None,
            observer: None,
            retry_strategy: RetryStrategy::default(),
            rate_limit_config: RateLimitConfig::default(),
            accepted_status: DEFAULT_ACCEPTED_STATUS,
        }
    }

    /// Sets the base URL for all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a default query parameter. A later value for the same key replaces
    /// the earlier one.
    pub fn default_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        crate::endpoint::upsert(&mut self.query_parameters, key.into(), value.into());
        self
    }

    /// Adds a default body parameter merged into JSON object and form bodies.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized to JSON.
    pub fn default_body_param<V: Serialize>(mut self, key: impl Into<String>, value: &V) -> Result<Self> {
        let value = serde_json::to_value(value)
            .map_err(|e| Error::ConfigurationError(format!("Invalid body parameter: {}", e)))?;
        self.body_parameters.insert(key.into(), value);
        Ok(self)
    }

    /// Relaxes certificate validation for `host`.
    pub fn trusted_domain(mut self, host: impl Into<String>) -> Self {
        self.trusted_domains.push(host.into());
        self
    }

    /// Sets the request timeout. Defaults to 60 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reports every network attempt to the observer.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Registers a middleware. Middlewares run in registration order.
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Replaces the default [`ReqwestTransport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the default [`CurlLogger`] observer.
    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Sets how many middleware-requested retries are allowed and how they
    /// are paced. Defaults to one immediate retry.
    pub fn retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.retry_strategy = strategy;
        self
    }

    /// Sets the rate limit configuration.
    ///
    /// By default, throttling headers of a retried response are honoured for
    /// up to five minutes.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reqflow::{Client, rate_limit::RateLimitConfig};
    /// use std::time::Duration;
    ///
    /// # async fn example() -> Result<(), reqflow::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .rate_limit_config(RateLimitConfig::default().with_max_wait(Duration::from_secs(60)))
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn rate_limit_config(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit_config = config;
        self
    }

    /// Sets the status codes treated as success. Defaults to `200..=299`.
    pub fn accepted_status(mut self, range: RangeInclusive<u16>) -> Self {
        self.accepted_status = range;
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided or if the default
    /// transport cannot be created.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::ConfigurationError("Base URL is required".to_string()))?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };
        let observer = self
            .observer
            .unwrap_or_else(|| Arc::new(CurlLogger) as Arc<dyn Observer>);

        let config = NetworkConfig {
            base_url,
            headers: self.headers,
            query_parameters: self.query_parameters,
            body_parameters: self.body_parameters,
            trusted_domains: self.trusted_domains,
            timeout: self.timeout,
            debug: self.debug,
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                config,
                middlewares: self.middlewares,
                transport,
                observer: Some(observer),
                retry_strategy: self.retry_strategy,
                rate_limit_config: self.rate_limit_config,
                accepted_status: self.accepted_status,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_base_url() {
        match Client::builder().build() {
            Err(Error::ConfigurationError(message)) => assert_eq!(message, "Base URL is required"),
            other => panic!("Expected ConfigurationError, got {:?}", other),
        }
    }

    #[test]
    fn builder_rejects_invalid_header() {
        let result = Client::builder().default_header("bad header", "x");
        assert!(matches!(result, Err(Error::ConfigurationError(_))));
    }

    #[test]
    fn builder_populates_config() {
        let client = Client::builder()
            .base_url("https://api.example.com")
            .unwrap()
            .default_header("x-app", "demo")
            .unwrap()
            .default_query_param("v", "1")
            .default_query_param("v", "2")
            .default_body_param("locale", &"en")
            .unwrap()
            .trusted_domain("internal.example.com")
            .timeout(Duration::from_secs(5))
            .debug(true)
            .build()
            .unwrap();

        let config = client.config();
        assert_eq!(config.headers["x-app"], "demo");
        assert_eq!(config.query_parameters, vec![("v".to_string(), "2".to_string())]);
        assert_eq!(config.body_parameters["locale"], "en");
        assert!(config.is_trusted("INTERNAL.example.com"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.debug);
    }

    #[test]
    fn config_mut_detaches_from_clones() {
        let original = Client::builder()
            .base_url("https://api.example.com")
            .unwrap()
            .build()
            .unwrap();
        let mut changed = original.clone();
        changed.config_mut().debug = true;
        changed.add_middleware(Arc::new(Noop));

        assert!(!original.config().debug);
        assert_eq!(original.middleware_count(), 0);
        assert!(changed.config().debug);
        assert_eq!(changed.middleware_count(), 1);
    }

    struct Noop;

    impl Middleware for Noop {}
}
