//! Example demonstrating middlewares and middleware-driven retries.
//!
//! This example shows how to:
//! - Attach credentials with a global pre-request hook
//! - Refresh them and retry after a 401 in a post-response hook
//! - Scope a middleware to a single path segment
//! - Cap retries with a `RetryStrategy`
//!
//! Run with: `cargo run --example token_refresh`

use reqflow::{
    adapter, BoxError, BoxFuture, Client, Decision, Endpoint, Error, Middleware, RawResponse,
    Request, RetryStrategy, Scope,
};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Adds a bearer token to every request and refreshes it once it expires.
struct BearerAuth {
    token: RwLock<String>,
}

impl BearerAuth {
    async fn refresh(&self) -> Result<(), BoxError> {
        // A real implementation would call the identity provider here.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut token = self.token.write().map_err(|e| e.to_string())?;
        *token = "fresh-token".to_string();
        Ok(())
    }
}

impl Middleware for BearerAuth {
    fn pre_request(&self, request: &mut Request) -> Result<(), BoxError> {
        let token = self.token.read().map_err(|e| e.to_string())?;
        request
            .headers
            .insert("authorization", format!("Bearer {}", token).parse()?);
        Ok(())
    }

    fn post_response<'a>(
        &'a self,
        outcome: &'a RawResponse,
    ) -> BoxFuture<'a, Result<Decision, BoxError>> {
        Box::pin(async move {
            if outcome.status().map(|s| s.as_u16()) == Some(401) {
                tracing::info!("Token rejected, refreshing");
                self.refresh().await?;
                return Ok(Decision::Retry);
            }
            Ok(Decision::Next)
        })
    }
}

/// Tags every request under `/admin/` with an audit header.
struct AdminAudit;

impl Middleware for AdminAudit {
    fn scope(&self) -> Scope {
        Scope::path("admin")
    }

    fn pre_request(&self, request: &mut Request) -> Result<(), BoxError> {
        request
            .headers
            .insert("x-audit", "token_refresh-demo".parse()?);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("reqflow=info,token_refresh=info")
        .init();

    let client = Client::builder()
        .base_url("https://httpbin.org")?
        .middleware(Arc::new(BearerAuth {
            token: RwLock::new("expired-token".to_string()),
        }))
        .middleware(Arc::new(AdminAudit))
        .retry_strategy(RetryStrategy::Linear {
            delay: Duration::from_millis(250),
            max_retries: 1,
        })
        .build()?;

    println!("=== Authenticated request ===");
    let response = client
        .request(Endpoint::get("/bearer"), adapter::Text)
        .await;
    println!("Status: {:?}, attempts: {}", response.status(), response.attempts);

    println!("=== Retry cap ===");
    // httpbin answers 401 no matter the token, so the second 401 hits the cap.
    match client
        .fetch(Endpoint::get("/status/401"), adapter::NoPayload)
        .await
    {
        Err(Error::MaxRetry { attempts }) => println!("Gave up after {} attempts", attempts),
        other => println!("Unexpected outcome: {:?}", other),
    }

    println!("=== Middlewares disabled ===");
    let result = client
        .fetch(
            Endpoint::get("/status/401").without_middlewares(),
            adapter::NoPayload,
        )
        .await;
    println!("Without middlewares: {:?}", result.map_err(|e| e.status()));

    Ok(())
}
