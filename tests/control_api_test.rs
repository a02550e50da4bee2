//! Control API tests.

use serde_json::{json, Value};
use std::time::{Duration, Instant};

mod common;
use common::{client, start_server, test_config, write_fixture};

#[tokio::test]
async fn test_state_reports_brokers_and_settings() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), "api/x(default).GET.200.json", "{}");
    write_fixture(dir.path(), "api/x(empty list).GET.200.json", "[]");
    let (addr, shutdown) = start_server(test_config(dir.path())).await;

    let state: Value = client()
        .get(format!("http://{addr}/mockroute/state"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let broker = &state["brokers"]["GET"]["/api/x"];
    assert_eq!(broker["file"], "api/x(default).GET.200.json");
    assert_eq!(broker["mocks"].as_array().unwrap().len(), 2);
    assert_eq!(state["comments"], json!(["(default)", "(empty list)"]));
    assert_eq!(state["delayMs"], 0);
    assert_eq!(state["proxyFallback"], "");
    assert_eq!(state["corsAllowed"], true);
    assert_eq!(state["watchMocks"], false);

    shutdown.trigger();
}

#[tokio::test]
async fn test_select_and_bulk_select() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), "api/a.GET.200.json", "a-ok");
    write_fixture(dir.path(), "api/a(broken).GET.500.json", "a-broken");
    write_fixture(dir.path(), "api/b.GET.200.json", "b-ok");
    write_fixture(dir.path(), "api/b(broken).GET.503.json", "b-broken");
    let (addr, shutdown) = start_server(test_config(dir.path())).await;
    let client = client();

    let res = client
        .patch(format!("http://{addr}/mockroute/select"))
        .json(&"api/a(broken).GET.500.json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let res = client.get(format!("http://{addr}/api/a")).send().await.unwrap();
    assert_eq!(res.status(), 500);
    assert_eq!(res.text().await.unwrap(), "a-broken");

    let res = client
        .patch(format!("http://{addr}/mockroute/bulk-select-by-comment"))
        .json(&"(broken)")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let res = client.get(format!("http://{addr}/api/b")).send().await.unwrap();
    assert_eq!(res.status(), 503);

    shutdown.trigger();
}

#[tokio::test]
async fn test_invalid_requests_are_422() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path(), "api/a.GET.200.json", "{}");
    let (addr, shutdown) = start_server(test_config(dir.path())).await;
    let client = client();
    let url = |path: &str| format!("http://{addr}/mockroute/{path}");

    let cases = [
        ("select", json!("api/missing.GET.200.json")),
        ("toggle500", json!({ "method": "GET", "urlMask": "/api/none" })),
        ("delay", json!({ "method": "GET", "urlMask": "/api/a", "value": "yes" })),
        ("proxied", json!({ "method": "GET", "urlMask": "/api/a" })),
        ("cookies", json!("nobody")),
        ("fallback", json!("not a url")),
        ("global-delay", json!(-5)),
        ("global-delay-jitter", json!(7.5)),
        ("cors", json!("on")),
        ("static-delay", json!({ "route": "/nope", "value": true })),
    ];
    for (endpoint, body) in cases {
        let res = client.patch(url(endpoint)).json(&body).send().await.unwrap();
        assert_eq!(res.status(), 422, "PATCH {endpoint} with {body}");
    }

    // not JSON at all
    let res = client
        .patch(url("select"))
        .body("{oops")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 422);

    shutdown.trigger();
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.limits.max_body_bytes = 16;
    let (addr, shutdown) = start_server(config).await;

    let res = client()
        .patch(format!("http://{addr}/mockroute/select"))
        .json(&"a-very-long-file-name.GET.200.json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 422);

    shutdown.trigger();
}

#[tokio::test]
async fn test_settings_round_trip_through_state() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, shutdown) = start_server(test_config(dir.path())).await;
    let client = client();
    let url = |path: &str| format!("http://{addr}/mockroute/{path}");

    for (endpoint, body) in [
        ("global-delay", json!(450)),
        ("global-delay-jitter", json!(0.5)),
        ("collect-proxied", json!(true)),
        ("cors", json!(false)),
        ("fallback", json!("http://example.test:9000")),
    ] {
        let res = client.patch(url(endpoint)).json(&body).send().await.unwrap();
        assert_eq!(res.status(), 200, "PATCH {endpoint}");
    }

    let state: Value = client.get(url("state")).send().await.unwrap().json().await.unwrap();
    assert_eq!(state["delayMs"], 450);
    assert_eq!(state["delayJitter"], 0.5);
    assert_eq!(state["collectProxied"], true);
    assert_eq!(state["corsAllowed"], false);
    assert_eq!(state["proxyFallback"], "http://example.test:9000");

    // an empty string clears the fallback
    let res = client.patch(url("fallback")).json(&"").send().await.unwrap();
    assert_eq!(res.status(), 200);
    let state: Value = client.get(url("state")).send().await.unwrap().json().await.unwrap();
    assert_eq!(state["proxyFallback"], "");

    shutdown.trigger();
}

#[tokio::test]
async fn test_sync_version_long_poll() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.limits.long_poll_timeout_ms = 5_000;
    let (addr, shutdown) = start_server(config).await;
    let client = client();
    let url = |path: &str| format!("http://{addr}/mockroute/{path}");

    // stale version answers immediately
    let start = Instant::now();
    let version: u64 = client
        .get(url("sync-version"))
        .header("sync-version", "99")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(version, 0);
    assert!(start.elapsed() < Duration::from_secs(2));

    // current version waits for the next change
    let poll = {
        let client = client.clone();
        let poll_url = url("sync-version");
        tokio::spawn(async move {
            client
                .get(poll_url)
                .header("sync-version", "0")
                .send()
                .await
                .unwrap()
                .json::<u64>()
                .await
                .unwrap()
        })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!poll.is_finished());

    let res = client.patch(url("reset")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    let version = tokio::time::timeout(Duration::from_secs(3), poll)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(version, 1);

    shutdown.trigger();
}

#[tokio::test]
async fn test_cors_preflight() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, shutdown) = start_server(test_config(dir.path())).await;

    let res = client()
        .request(reqwest::Method::OPTIONS, format!("http://{addr}/api/anything"))
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "PATCH")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 204);
    assert_eq!(
        res.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );
    assert!(res.headers()["access-control-allow-methods"]
        .to_str()
        .unwrap()
        .contains("PATCH"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_delay_settings_respect_request_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.limits.request_timeout_secs = 2;
    config.limits.long_poll_timeout_ms = 1_000;
    let (addr, shutdown) = start_server(config).await;
    let client = client();
    let url = |path: &str| format!("http://{addr}/mockroute/{path}");

    let res = client.patch(url("global-delay")).json(&2_500).send().await.unwrap();
    assert_eq!(res.status(), 422);

    let res = client.patch(url("global-delay")).json(&1_500).send().await.unwrap();
    assert_eq!(res.status(), 200);

    // 1500ms plus half again would outlast the two second timeout
    let res = client.patch(url("global-delay-jitter")).json(&0.5).send().await.unwrap();
    assert_eq!(res.status(), 422);
    let res = client.patch(url("global-delay-jitter")).json(&0.2).send().await.unwrap();
    assert_eq!(res.status(), 200);

    let state: Value = client.get(url("state")).send().await.unwrap().json().await.unwrap();
    assert_eq!(state["delayMs"], 1_500);
    assert_eq!(state["delayJitter"], 0.2);

    shutdown.trigger();
}
