//! Integration tests using wiremock to simulate HTTP servers.

use reqflow::{
    adapter, BoxError, BoxFuture, Client, Decision, Endpoint, Error, Middleware, RawResponse,
    Request, RetryStrategy, Scope,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct TestData {
    id: u32,
    name: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: u32,
}

fn client_for(server: &MockServer) -> Client {
    Client::builder()
        .base_url(server.uri())
        .unwrap()
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_get_decodes_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/42"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":42}"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client
        .request(Endpoint::get("/users/42"), adapter::json::<User>())
        .await;

    assert_eq!(response.status().map(|s| s.as_u16()), Some(200));
    assert_eq!(response.attempts, 1);
    assert!(!response.was_retried());
    assert_eq!(
        response.request.as_ref().map(|r| r.url.path()),
        Some("/users/42")
    );
    assert_eq!(response.into_result().unwrap(), User { id: 42 });
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let mock_server = MockServer::start().await;

    let request_data = TestData {
        id: 0,
        name: "New".to_string(),
    };
    let response_data = TestData {
        id: 1,
        name: "New".to_string(),
    };

    Mock::given(method("POST"))
        .and(path("/test"))
        .and(header("content-type", "application/json"))
        .and(body_json(&request_data))
        .respond_with(ResponseTemplate::new(201).set_body_json(&response_data))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let created: TestData = client.post("/test", &request_data).await.unwrap();

    assert_eq!(created, response_data);
}

#[tokio::test]
async fn test_client_defaults_are_merged() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/notes"))
        .and(header("x-app", "demo"))
        .and(query_param("v", "2"))
        .and(body_json(serde_json::json!({"text": "hi", "locale": "en"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .default_header("x-app", "demo")
        .unwrap()
        .default_query_param("v", "1")
        .default_body_param("locale", &"en")
        .unwrap()
        .build()
        .unwrap();

    let endpoint = Endpoint::post("/notes")
        .with_query_param("v", "2")
        .with_json(&serde_json::json!({"text": "hi"}))
        .unwrap();
    let text = client.fetch(endpoint, adapter::Text).await.unwrap();

    assert_eq!(text, "ok");
}

#[tokio::test]
async fn test_404_keeps_status_and_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"error":"not found"}"#))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .fetch(Endpoint::get("/missing"), adapter::json::<User>())
        .await;

    match result {
        Err(Error::HttpError {
            status,
            raw_response,
            ..
        }) => {
            assert_eq!(status.as_u16(), 404);
            assert_eq!(&raw_response[..], br#"{"error":"not found"}"#);
        }
        other => panic!("Expected HttpError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_error_body_can_be_decoded() {
    #[derive(Debug, Deserialize)]
    struct ApiError {
        message: String,
    }

    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(serde_json::json!({"message": "bad input"})),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .fetch(Endpoint::get("/validate"), adapter::Raw)
        .await
        .unwrap_err();

    let body: ApiError = err.decode_body().unwrap();
    assert_eq!(body.message, "bad input");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_204_with_no_payload_is_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/sessions/current"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.delete("/sessions/current").await.unwrap();

    let result = client
        .fetch(Endpoint::delete("/sessions/current"), adapter::Raw)
        .await;
    assert!(matches!(result, Err(Error::EmptyResponse)));
}

#[tokio::test]
async fn test_decode_failure_is_parsing_failed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"unexpected":"shape"}"#))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result: reqflow::Result<TestData> = client.get("/test").await;

    match result {
        Err(Error::ParsingFailed {
            raw_response,
            status,
            ..
        }) => {
            assert_eq!(raw_response, r#"{"unexpected":"shape"}"#);
            assert_eq!(status.map(|s| s.as_u16()), Some(200));
        }
        other => panic!("Expected ParsingFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_timeout_is_classified() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let result = client.fetch(Endpoint::get("/slow"), adapter::Text).await;
    assert!(matches!(result, Err(Error::Timeout)));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let client = Client::builder()
        .base_url("http://127.0.0.1:1")
        .unwrap()
        .build()
        .unwrap();

    let result = client.fetch(Endpoint::get("/"), adapter::Raw).await;
    assert!(matches!(result, Err(Error::Network(_))));
}

#[tokio::test]
async fn test_cancel_while_on_the_wire() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let pending = client.request(Endpoint::get("/slow"), adapter::Text);
    let handle = pending.handle().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    let response = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .unwrap();
    assert!(response.into_result().unwrap_err().is_cancelled());
}

/// Replaces a stale bearer token after the first 401.
struct TokenRefresh {
    token: std::sync::Mutex<String>,
    refreshed: AtomicBool,
}

impl Middleware for TokenRefresh {
    fn pre_request(&self, request: &mut Request) -> Result<(), BoxError> {
        let token = self.token.lock().map_err(|e| e.to_string())?;
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
            if outcome.status().map(|s| s.as_u16()) == Some(401)
                && !self.refreshed.swap(true, Ordering::SeqCst)
            {
                *self.token.lock().map_err(|e| e.to_string())? = "fresh".to_string();
                return Ok(Decision::Retry);
            }
            Ok(Decision::Next)
        })
    }
}

#[tokio::test]
async fn test_middleware_retry_over_http() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":7}"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .middleware(Arc::new(TokenRefresh {
            token: std::sync::Mutex::new("stale".to_string()),
            refreshed: AtomicBool::new(false),
        }))
        .build()
        .unwrap();

    let response = client
        .request(Endpoint::get("/me"), adapter::json::<User>())
        .await;

    assert_eq!(response.attempts, 2);
    assert!(response.was_retried());
    assert_eq!(response.into_result().unwrap(), User { id: 7 });
}

/// Always asks for a retry on 503.
struct RetryUnavailable {
    calls: AtomicUsize,
}

impl Middleware for RetryUnavailable {
    fn scope(&self) -> Scope {
        Scope::path("jobs")
    }

    fn post_response<'a>(
        &'a self,
        outcome: &'a RawResponse,
    ) -> BoxFuture<'a, Result<Decision, BoxError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if outcome.status().map(|s| s.as_u16()) == Some(503) {
                Ok(Decision::Retry)
            } else {
                Ok(Decision::Next)
            }
        })
    }
}

#[tokio::test]
async fn test_retry_cap_over_http() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).insert_header("retry-after", "0"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let middleware = Arc::new(RetryUnavailable {
        calls: AtomicUsize::new(0),
    });
    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .middleware(middleware.clone())
        .retry_strategy(RetryStrategy::Linear {
            delay: Duration::from_millis(10),
            max_retries: 2,
        })
        .build()
        .unwrap();

    let response = client
        .request(Endpoint::get("/jobs/1"), adapter::Raw)
        .await;

    assert!(matches!(response.error(), Some(Error::MaxRetry { attempts: 3 })));
    assert_eq!(response.status().map(|s| s.as_u16()), Some(503));
    assert_eq!(middleware.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_scoped_middleware_skips_other_paths() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let middleware = Arc::new(RetryUnavailable {
        calls: AtomicUsize::new(0),
    });
    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .middleware(middleware.clone())
        .build()
        .unwrap();

    let err = client
        .fetch(Endpoint::get("/jobsite/1"), adapter::Raw)
        .await
        .unwrap_err();

    assert_eq!(err.status().map(|s| s.as_u16()), Some(503));
    assert_eq!(middleware.calls.load(Ordering::SeqCst), 0);
}
