//! Sends and receives a JSON body.
//!
//! Run with: `cargo run --example json`

use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct NewIssue<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Deserialize, Debug)]
struct Issue {
    id: u64,
    title: String,
}

#[tokio::main]
async fn main() -> fetchr::Result<()> {
    let client = fetchr::Client::new();

    let issue: Issue = client
        .post("https://api.example.com/issues")
        .json(&NewIssue {
            title: "things are broken",
            body: "here's how to reproduce it",
        })
        .send()
        .await?
        .json()?;

    println!("created issue #{}: {}", issue.id, issue.title);
    Ok(())
}
