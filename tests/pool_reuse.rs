mod support;

use http_body_util::Full;
use support::server;

#[tokio::test]
async fn sequential_requests_reuse_a_pooled_connection() {
    let server = server::http(|_req| async move {
        http::Response::builder()
            .status(200)
            .body(Full::new(bytes::Bytes::from_static(b"hi")))
            .unwrap()
    });

    let url = format!("http://{}/", server.addr());
    let client = fetchr::Client::new();

    let first = client.get(&url).send().await.unwrap();
    assert!(first.is_success());
    let second = client.get(&url).send().await.unwrap();
    assert!(second.is_success());

    let stats = client.pool_stats();
    assert_eq!(stats.connections_created, 1);
    assert_eq!(stats.connections_reused, 1);
    assert_eq!(stats.total_requests, 2);
}

#[tokio::test]
async fn closing_idle_connections_forces_a_fresh_one() {
    let server = server::http(|_req| async move {
        http::Response::builder()
            .status(200)
            .body(Full::new(bytes::Bytes::from_static(b"hi")))
            .unwrap()
    });

    let url = format!("http://{}/", server.addr());
    let client = fetchr::Client::new();

    client.get(&url).send().await.unwrap();
    client.close_idle_connections();
    client.get(&url).send().await.unwrap();

    let stats = client.pool_stats();
    assert_eq!(stats.connections_created, 2);
    assert_eq!(stats.connections_reused, 0);
}
