//! Makes a request from synchronous code using the `blocking` feature.
//!
//! Run with: `cargo run --example blocking --features blocking`

fn main() -> fetchr::Result<()> {
    let client = fetchr::blocking::Client::new();
    let res = client.get("https://httpbin.org/get").send()?;
    println!("status: {}", res.status());
    println!("body: {}", res.text()?);
    Ok(())
}
