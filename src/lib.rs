//! # reqflow - An HTTP request engine with scoped middleware chains
//!
//! reqflow turns declarative [`Endpoint`] descriptions into HTTP requests, runs
//! them through an ordered chain of [`Middleware`] hooks before and after
//! sending, lets those hooks retry the whole request, and classifies every
//! failure into one flat [`Error`] taxonomy.
//!
//! ## Quick Start
//!
//! ```no_run
//! use reqflow::{adapter, Client, Endpoint};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct CreateUser {
//!     name: String,
//!     email: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), reqflow::Error> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")?
//!         .timeout(Duration::from_secs(30))
//!         .default_header("Accept", "application/json")?
//!         .build()?;
//!
//!     // Shortcut: GET and decode JSON
//!     let user: User = client.get("/users/123").await?;
//!     println!("User: {}", user.name);
//!
//!     // Full envelope with request/response context
//!     let endpoint = Endpoint::post("/users").with_json(&CreateUser {
//!         name: "Alice".to_string(),
//!         email: "alice@example.com".to_string(),
//!     })?;
//!     let response = client.request(endpoint, adapter::json::<User>()).await;
//!     println!("Status {:?} after {} attempt(s)", response.status(), response.attempts);
//!     let created = response.into_result()?;
//!     println!("Created user with ID: {}", created.id);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Endpoint descriptors** - Immutable request descriptions merged with client defaults
//! - **Scoped middlewares** - Global hooks and hooks bound to a path segment, run in registration order
//! - **Middleware-driven retries** - Only a post-response hook can retry; a strategy caps and paces it
//! - **Rich error handling** - One flat error type that keeps raw bodies and status codes
//! - **One execution path** - Callback, future and `async` styles share the same core and cancellation
//! - **Automatic logging** - Structured logging with `tracing`, curl dumps in debug mode
//! - **Pluggable transport** - `reqwest` by default, any [`Transport`] in tests
//!
//! ## Error Handling
//!
//! ```no_run
//! use reqflow::{adapter, Client, Endpoint, Error};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, Debug)]
//! struct ApiError {
//!     message: String,
//! }
//!
//! # async fn example(client: Client) {
//! match client.fetch(Endpoint::get("/endpoint"), adapter::Text).await {
//!     Ok(text) => println!("Success: {}", text),
//!     Err(err @ Error::HttpError { .. }) => {
//!         let api_error: Option<ApiError> = err.decode_body();
//!         eprintln!("HTTP error {:?}: {:?}", err.status(), api_error);
//!     }
//!     Err(Error::Cancelled) => eprintln!("Cancelled"),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # }
//! ```
//!
//! ## Retries
//!
//! A middleware decides whether to retry; the [`RetryStrategy`] decides how
//! often and how fast:
//!
//! ```no_run
//! use reqflow::{Client, RetryStrategy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), reqflow::Error> {
//! let client = Client::builder()
//!     .base_url("https://api.example.com")?
//!     .retry_strategy(RetryStrategy::ExponentialBackoff {
//!         initial_delay: Duration::from_millis(100),
//!         max_delay: Duration::from_secs(30),
//!         max_retries: 3,
//!         jitter: true,
//!     })
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod classify;
mod client;
pub mod config;
pub mod endpoint;
mod error;
mod handle;
pub mod middleware;
pub mod observe;
mod pipeline;
pub mod rate_limit;
pub mod request;
mod response;
pub mod retry;
pub mod transport;

pub use adapter::ResponseAdapter;
pub use client::{Client, ClientBuilder};
pub use config::NetworkConfig;
pub use endpoint::{Body, Endpoint};
pub use error::{BoxError, Error, Result};
pub use handle::{CallOptions, Delivery, PendingRequest, RequestHandle};
pub use middleware::{partition, Chain, Decision, Middleware, Scope};
pub use observe::{CurlLogger, Observer, ProgressIndicator};
pub use request::Request;
pub use response::Response;
pub use retry::RetryStrategy;
pub use transport::{BoxFuture, RawResponse, ReqwestTransport, ResponseMeta, Transport, TransportError};
