//! Proxy fallback and collection tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

mod common;
use common::{
    client, start_programmable_backend, start_server, test_config, unused_addr, write_fixture,
    BackendResponse,
};

#[tokio::test]
async fn test_unmatched_request_is_relayed() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), "api/local.GET.200.json", r#""local""#);

    let backend = start_programmable_backend(|head| async move {
        let path = head.split_whitespace().nth(1).unwrap_or("").to_string();
        let mut response = BackendResponse::json(201, &format!(r#"{{"path":"{path}"}}"#));
        response.headers.push(("Set-Cookie", "a=1".to_string()));
        response.headers.push(("Set-Cookie", "b=2".to_string()));
        response
    })
    .await;

    let mut config = test_config(dir.path());
    config.proxy_fallback = format!("http://{backend}");
    let (addr, shutdown) = start_server(config).await;
    let client = client();

    let res = client
        .get(format!("http://{addr}/api/remote?q=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let cookies: Vec<_> = res.headers().get_all("set-cookie").iter().collect();
    assert_eq!(cookies.len(), 2);
    assert_eq!(res.text().await.unwrap(), r#"{"path":"/api/remote?q=1"}"#);

    // matched routes still come from disk
    let res = client
        .get(format!("http://{addr}/api/local"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), r#""local""#);

    shutdown.trigger();
}

#[tokio::test]
async fn test_proxied_broker_is_relayed() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), "api/user.GET.200.json", r#""mock""#);

    let backend = start_programmable_backend(|_| async { BackendResponse::json(200, r#""origin""#) }).await;

    let mut config = test_config(dir.path());
    config.proxy_fallback = format!("http://{backend}");
    let (addr, shutdown) = start_server(config).await;
    let client = client();

    let res = client
        .patch(format!("http://{addr}/mockroute/proxied"))
        .json(&serde_json::json!({ "method": "GET", "urlMask": "/api/user", "value": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let body = client
        .get(format!("http://{addr}/api/user"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, r#""origin""#);

    shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_fallback_is_marked_502() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.proxy_fallback = format!("http://{}", unused_addr().await);
    let (addr, shutdown) = start_server(config).await;

    let res = client()
        .get(format!("http://{addr}/api/anything"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 502);
    assert_eq!(res.headers()["x-mockroute-relay-error"], "1");

    shutdown.trigger();
}

#[tokio::test]
async fn test_origin_502_is_not_marked() {
    let dir = tempfile::tempdir().unwrap();
    let backend = start_programmable_backend(|_| async { BackendResponse::json(502, "{}") }).await;
    let mut config = test_config(dir.path());
    config.proxy_fallback = format!("http://{backend}");
    let (addr, shutdown) = start_server(config).await;

    let res = client()
        .get(format!("http://{addr}/api/anything"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 502);
    assert!(res.headers().get("x-mockroute-relay-error").is_none());

    shutdown.trigger();
}

#[tokio::test]
async fn test_collect_proxied_never_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let backend = start_programmable_backend(move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move { BackendResponse::json(200, &format!(r#"{{"call":{n}}}"#)) }
    })
    .await;

    let mut config = test_config(dir.path());
    config.proxy_fallback = format!("http://{backend}");
    config.collect_proxied = true;
    config.format_collected_json = false;
    let (addr, shutdown) = start_server(config).await;
    let client = client();

    for _ in 0..2 {
        let res = client
            .get(format!("http://{addr}/api/feed"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
    }

    let first = std::fs::read_to_string(dir.path().join("api/feed.GET.200.json")).unwrap();
    let second =
        std::fs::read_to_string(dir.path().join("api/feed(collected-2).GET.200.json")).unwrap();
    assert_eq!(first, r#"{"call":0}"#);
    assert_eq!(second, r#"{"call":1}"#);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    shutdown.trigger();
}

#[tokio::test]
async fn test_collected_text_gets_txt_extension() {
    let dir = tempfile::tempdir().unwrap();
    let backend = start_programmable_backend(|_| async {
        BackendResponse {
            status: 200,
            headers: vec![("Content-Type", "text/plain; charset=utf-8".to_string())],
            body: "plain words".to_string(),
        }
    })
    .await;

    let mut config = test_config(dir.path());
    config.proxy_fallback = format!("http://{backend}");
    config.collect_proxied = true;
    let (addr, shutdown) = start_server(config).await;

    let res = client()
        .get(format!("http://{addr}/api/readme"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let saved = std::fs::read_to_string(dir.path().join("api/readme.GET.200.txt")).unwrap();
    assert_eq!(saved, "plain words");

    shutdown.trigger();
}
