//! End-to-end dispatch tests against a running server.

use std::time::{Duration, Instant};

use mockroute::config::validation::validate_config;
use mockroute::config::{CookieConfig, PluginConfig};

mod common;
use common::{client, start_server, test_config, write_fixture};

#[tokio::test]
async fn test_variable_segment_serves_fixture() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), "api/user/[id].GET.200.json", r#"{"name":"ada"}"#);
    let (addr, shutdown) = start_server(test_config(dir.path())).await;

    let res = client()
        .get(format!("http://{addr}/api/user/42"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "application/json");
    assert_eq!(res.text().await.unwrap(), r#"{"name":"ada"}"#);

    // query strings do not affect matching
    let res = client()
        .get(format!("http://{addr}/api/user/42?full=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    shutdown.trigger();
}

#[tokio::test]
async fn test_default_comment_selected_initially() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), "api/x.GET.200.json", "plain");
    write_fixture(dir.path(), "api/x(default).GET.200.json", "chosen");
    let (addr, shutdown) = start_server(test_config(dir.path())).await;

    let body = client()
        .get(format!("http://{addr}/api/x"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "chosen");

    shutdown.trigger();
}

#[tokio::test]
async fn test_synthetic_500_has_empty_body() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), "api/orders.GET.200.json", "[]");
    let (addr, shutdown) = start_server(test_config(dir.path())).await;
    let client = client();

    let res = client
        .patch(format!("http://{addr}/mockroute/toggle500"))
        .json(&serde_json::json!({ "method": "GET", "urlMask": "/api/orders" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = client
        .get(format!("http://{addr}/api/orders"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);
    assert!(res.bytes().await.unwrap().is_empty());

    // toggling again restores the fixture
    client
        .patch(format!("http://{addr}/mockroute/toggle500"))
        .json(&serde_json::json!({ "method": "GET", "urlMask": "/api/orders" }))
        .send()
        .await
        .unwrap();
    let res = client
        .get(format!("http://{addr}/api/orders"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "[]");

    shutdown.trigger();
}

#[tokio::test]
async fn test_head_falls_back_to_get_without_body() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), "api/ping.GET.200.txt", "pong");
    let (addr, shutdown) = start_server(test_config(dir.path())).await;

    let res = client()
        .head(format!("http://{addr}/api/ping"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.bytes().await.unwrap().is_empty());

    shutdown.trigger();
}

#[tokio::test]
async fn test_unmatched_without_fallback_is_404() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), "api/ping.GET.200.txt", "pong");
    let (addr, shutdown) = start_server(test_config(dir.path())).await;
    let client = client();

    let res = client
        .get(format!("http://{addr}/api/nothing"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    // wrong method on a known path
    let res = client
        .post(format!("http://{addr}/api/ping"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    shutdown.trigger();
}

#[tokio::test]
async fn test_vanished_fixture_is_404() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), "api/gone.GET.200.json", "{}");
    let (addr, shutdown) = start_server(test_config(dir.path())).await;

    // watcher is off, so the broker still points at the deleted file
    std::fs::remove_file(dir.path().join("api/gone.GET.200.json")).unwrap();

    let res = client()
        .get(format!("http://{addr}/api/gone"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    shutdown.trigger();
}

#[tokio::test]
async fn test_cookie_and_extra_headers_attached() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), "api/me.GET.200.json", "{}");
    let mut config = test_config(dir.path());
    config.cookies = vec![
        CookieConfig {
            label: "admin".into(),
            value: "session=admin".into(),
        },
        CookieConfig {
            label: "guest".into(),
            value: "session=guest".into(),
        },
    ];
    config.extra_headers = vec![("x-served-by".into(), "mockroute".into())];
    let (addr, shutdown) = start_server(config).await;
    let client = client();

    let res = client
        .get(format!("http://{addr}/api/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["set-cookie"], "session=admin");
    assert_eq!(res.headers()["x-served-by"], "mockroute");

    let res = client
        .patch(format!("http://{addr}/mockroute/cookies"))
        .json(&"guest")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = client
        .get(format!("http://{addr}/api/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["set-cookie"], "session=guest");

    shutdown.trigger();
}

#[tokio::test]
async fn test_template_plugin_renders_params() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(
        dir.path(),
        "api/item/[sku].GET.200.json",
        r#"{"sku":"{{params.sku}}","lang":"{{query.lang}}"}"#,
    );
    let mut config = test_config(dir.path());
    config.plugins = vec![PluginConfig {
        pattern: r"item/".into(),
        transform: "template".into(),
    }];
    let (addr, shutdown) = start_server(config).await;

    let body = client()
        .get(format!("http://{addr}/api/item/ab-12?lang=en"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, r#"{"sku":"ab-12","lang":"en"}"#);

    shutdown.trigger();
}

#[tokio::test]
async fn test_delayed_route_waits() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), "api/slow.GET.200.json", "{}");
    write_fixture(dir.path(), "api/fast.GET.200.json", "{}");
    let mut config = test_config(dir.path());
    config.delay_ms = 300;
    let (addr, shutdown) = start_server(config).await;
    let client = client();

    let res = client
        .patch(format!("http://{addr}/mockroute/delay"))
        .json(&serde_json::json!({ "method": "GET", "urlMask": "/api/slow", "value": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let slow = {
        let client = client.clone();
        tokio::spawn(async move {
            let start = Instant::now();
            let res = client
                .get(format!("http://{addr}/api/slow"))
                .send()
                .await
                .unwrap();
            (res.status(), start.elapsed())
        })
    };

    // other routes are served while the delayed one is pending
    let start = Instant::now();
    let res = client
        .get(format!("http://{addr}/api/fast"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(start.elapsed() < Duration::from_millis(300));

    let (status, elapsed) = slow.await.unwrap();
    assert_eq!(status, 200);
    assert!(elapsed >= Duration::from_millis(300));

    shutdown.trigger();
}

#[tokio::test]
async fn test_delay_close_to_request_timeout_still_serves_fixture() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), "api/slow.GET.200.json", r#""slow""#);
    let mut config = test_config(dir.path());
    config.delay_ms = 1_500;
    config.limits.request_timeout_secs = 2;
    config.limits.long_poll_timeout_ms = 1_000;
    let mut listening = config.clone();
    listening.listener.port = 8080;
    assert!(validate_config(&listening).is_ok());
    let (addr, shutdown) = start_server(config).await;
    let client = client();

    client
        .patch(format!("http://{addr}/mockroute/delay"))
        .json(&serde_json::json!({ "method": "GET", "urlMask": "/api/slow", "value": true }))
        .send()
        .await
        .unwrap();

    let res = client
        .get(format!("http://{addr}/api/slow"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), r#""slow""#);

    shutdown.trigger();
}

#[tokio::test]
async fn test_static_files_and_static_404() {
    let dir = tempfile::tempdir().unwrap();
    let static_dir = tempfile::tempdir().unwrap();
    write_fixture(static_dir.path(), "app/index.html", "<h1>hi</h1>");
    write_fixture(dir.path(), "app.GET.200.json", "{}");
    let mut config = test_config(dir.path());
    config.static_dir = Some(static_dir.path().to_path_buf());
    let (addr, shutdown) = start_server(config).await;
    let client = client();

    let res = client
        .get(format!("http://{addr}/app"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "text/html");
    assert_eq!(res.text().await.unwrap(), "<h1>hi</h1>");

    let res = client
        .patch(format!("http://{addr}/mockroute/static-404"))
        .json(&serde_json::json!({ "route": "/app/index.html", "value": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = client
        .get(format!("http://{addr}/app/index.html"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    shutdown.trigger();
}

#[tokio::test]
async fn test_overlong_uri_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.limits.max_uri_length = 64;
    let (addr, shutdown) = start_server(config).await;

    let res = client()
        .get(format!("http://{addr}/{}", "a".repeat(100)))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 414);
    assert!(res.headers().contains_key("x-request-id"));

    shutdown.trigger();
}
