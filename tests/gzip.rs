#![cfg(feature = "gzip")]

mod support;

use std::io::Write;

use http_body_util::Full;
use support::server;

fn gzip_bytes(input: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(input).unwrap();
    encoder.finish().unwrap()
}

#[tokio::test]
async fn transparently_decodes_a_gzip_response_body() {
    let server = server::http(|_req| async move {
        let compressed = gzip_bytes(b"hello from the other side");
        http::Response::builder()
            .status(200)
            .header("content-encoding", "gzip")
            .body(Full::new(bytes::Bytes::from(compressed)))
            .unwrap()
    });

    let url = format!("http://{}/", server.addr());
    let client = fetchr::Client::new();

    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.text().unwrap(), "hello from the other side");
    assert!(resp.headers().get("content-encoding").is_none());
}

#[tokio::test]
async fn disabling_gzip_leaves_the_body_compressed() {
    let server = server::http(|_req| async move {
        let compressed = gzip_bytes(b"still compressed");
        http::Response::builder()
            .status(200)
            .header("content-encoding", "gzip")
            .body(Full::new(bytes::Bytes::from(compressed)))
            .unwrap()
    });

    let url = format!("http://{}/", server.addr());
    let client = fetchr::Client::builder().gzip(false).build().unwrap();

    let resp = client.get(&url).send().await.unwrap();
    assert_ne!(resp.bytes(), &bytes::Bytes::from_static(b"still compressed"));
    assert!(resp.headers().get("content-encoding").is_some());
}
