//! Exercises the mock interceptor without touching the network.
//!
//! Run with: `cargo run --example mock`

use fetchr::mock::{MockContext, MockResponse};
use fetchr::Client;

#[tokio::main]
async fn main() -> fetchr::Result<()> {
    let mock = MockContext::new();
    mock.when("GET https://api.example.com/health", MockResponse::ok(r#"{"ok":true}"#));
    mock.prevent_stray_requests(true);

    let client = Client::builder().mock(mock).build()?;

    let res = client.get("https://api.example.com/health").send().await?;
    println!("status: {}", res.status());
    println!("body: {}", res.text()?);
    Ok(())
}
