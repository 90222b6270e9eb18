//! Basic example demonstrating the three ways of consuming a request.
//!
//! This example shows how to:
//! - Create a client with default headers and debug logging
//! - Use the `async` shortcuts for GET and POST
//! - Use the future style to keep the response envelope
//! - Use the callback style with a delivery context
//!
//! Run with: `cargo run --example basic_call`

use reqflow::{adapter, CallOptions, Client, Delivery, Endpoint, Error};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("reqflow=debug,basic_call=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .default_header("Accept", "application/json")?
        .debug(true)
        .build()?;

    println!("=== async shortcut ===");
    let post: Post = client.get("/posts/1").await?;
    println!("Post ID: {}", post.id);
    println!("Title: {}", post.title);
    println!();

    println!("=== Future style with envelope ===");
    let endpoint = Endpoint::post("/posts").with_json(&NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    })?;
    let response = client.request(endpoint, adapter::json::<Post>()).await;
    println!("Status code: {:?}", response.status());
    println!("Request latency: {:?}", response.latency);
    println!("Content-Type: {:?}", response.header("content-type"));
    println!("Was retried: {}", response.was_retried());
    println!("Created post ID: {}", response.into_result()?.id);
    println!();

    println!("=== Callback style ===");
    let (tx, rx) = tokio::sync::oneshot::channel();
    let options = CallOptions::new().delivery(Delivery::current());
    client.execute(
        Endpoint::get("/posts/2").with_query_param("fields", "title"),
        adapter::Text,
        options,
        move |response| {
            let _ = tx.send(response.map(|text| text.len()));
        },
    );
    if let Ok(response) = rx.await {
        println!("Body length: {:?}", response.result);
    }

    Ok(())
}
