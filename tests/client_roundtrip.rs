//! Round trips through a registry-built client against a local mock server.

use mockito::Matcher;
use parking_lot::Mutex;
use profile_http::interceptor::{ExchangeId, LineSink};
use profile_http::protocol::constants::headers::CACHE_STATUS;
use profile_http::transcript::{RecordSink, TranscriptLogger};
use profile_http::{
    ClientError, ClientProfile, ClientRegistry, FormBody, HttpClient, ProxyConfig, ProxyKind, RegistryOptions,
};
use std::sync::Arc;

#[derive(Default)]
struct Records(Mutex<Vec<String>>);

impl RecordSink for Records {
    fn emit(&self, _exchange: ExchangeId, record: &str) {
        self.0.lock().push(record.to_string());
    }
}

fn recording_registry(options: RegistryOptions) -> (ClientRegistry, Arc<Records>) {
    let records = Arc::new(Records::default());
    let logger: Arc<dyn LineSink> = Arc::new(TranscriptLogger::with_sink(records.clone()));
    (ClientRegistry::with_line_sink(options, logger), records)
}

#[tokio::test]
async fn test_defaults_reach_server_and_transcript_is_recorded() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/login")
        .match_header("x-app", "demo")
        .match_body("user=alice&lang=en")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"code":0,"msg":"ok","data":{"token":"abc"}}"#)
        .create_async()
        .await;

    let (registry, records) = recording_registry(RegistryOptions::without_disk_cache());
    registry.set_default_configuration(
        ClientProfile::new(format!("{}/", server.url()))
            .with_default_header("X-App", "demo")
            .with_default_param("lang", "en"),
    );
    let client: HttpClient = registry.create_service().unwrap();

    let mut form = FormBody::new();
    form.add("user", "alice");
    let response = client.post_form("login", form).await.unwrap();
    assert!(response.is_success());
    mock.assert_async().await;

    let records = records.0.lock();
    assert_eq!(records.len(), 1);
    assert!(records[0].contains("--> POST"));
    assert!(records[0].contains("\"token\": \"abc\""));
    assert!(records[0].contains("<-- END HTTP"));
}

#[tokio::test]
async fn test_envelope_roundtrip() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/profile")
        .with_status(200)
        .with_body(r#"{"code":0,"msg":"","data":{"id":7}}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/expired")
        .with_status(200)
        .with_body(r#"{"code":401,"msg":"expired"}"#)
        .create_async()
        .await;

    let registry = ClientRegistry::new(RegistryOptions::without_disk_cache());
    registry.set_default_configuration(ClientProfile::new(server.url()).with_keep_request_method(true));
    let client = registry.client().unwrap();

    let data: Option<serde_json::Value> = client
        .fetch_envelope(profile_http::HttpRequest::get(client.url("/profile").unwrap()))
        .await
        .unwrap();
    assert_eq!(data.unwrap()["id"], 7);

    let expired = client
        .fetch_envelope::<serde_json::Value>(profile_http::HttpRequest::get(client.url("/expired").unwrap()))
        .await;
    assert!(matches!(expired, Err(ClientError::Api { code: 401, .. })));
}

#[tokio::test]
async fn test_proxy_challenge_answered_once_with_credentials() {
    let mut server = mockito::Server::new_async().await;
    let challenge = server
        .mock("GET", "/secure")
        .match_header("proxy-authorization", Matcher::Missing)
        .with_status(407)
        .with_header("proxy-authenticate", "Basic realm=\"proxy\"")
        .expect(1)
        .create_async()
        .await;
    let authorized = server
        .mock("GET", "/secure")
        .match_header("proxy-authorization", "Basic dTpw")
        .with_status(200)
        .with_body("granted")
        .expect(1)
        .create_async()
        .await;

    let registry = ClientRegistry::new(RegistryOptions::without_disk_cache());
    registry.set_default_configuration(
        ClientProfile::new(server.url())
            .with_keep_request_method(true)
            .with_proxy(ProxyConfig::new(ProxyKind::Direct, "", 0).with_credentials("u", "p")),
    );

    let response = registry.client().unwrap().get("/secure").await.unwrap();
    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.text(), "granted");
    challenge.assert_async().await;
    authorized.assert_async().await;
}

#[tokio::test]
async fn test_disk_cache_serves_fresh_get() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/config")
        .with_status(200)
        .with_header("cache-control", "max-age=600")
        .with_body(r#"{"theme":"dark"}"#)
        .expect(1)
        .create_async()
        .await;

    let root = tempfile::tempdir().unwrap();
    let registry = ClientRegistry::new(RegistryOptions::with_cache_root(root.path()));
    registry.set_default_configuration(ClientProfile::new(server.url()).with_keep_request_method(true));
    let client = registry.client().unwrap();

    let first = client.get("/config").await.unwrap();
    assert!(first.headers.get(CACHE_STATUS).is_none());

    let second = client.get("/config").await.unwrap();
    assert_eq!(second.headers[CACHE_STATUS], "HIT");
    assert_eq!(second.text(), r#"{"theme":"dark"}"#);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_temporary_profile_targets_other_server() {
    let mut primary = mockito::Server::new_async().await;
    let mut upload = mockito::Server::new_async().await;
    let primary_mock = primary.mock("GET", "/ping").with_body("primary").expect(2).create_async().await;
    let upload_mock = upload.mock("GET", "/ping").with_body("upload").expect(1).create_async().await;

    let registry = ClientRegistry::new(RegistryOptions::without_disk_cache());
    registry.set_default_configuration(ClientProfile::new(primary.url()).with_keep_request_method(true));

    let a: HttpClient = registry.create_service().unwrap();
    assert_eq!(a.get("/ping").await.unwrap().text(), "primary");

    registry.set_temporary_configuration(ClientProfile::new(upload.url()).with_keep_request_method(true));
    let b: HttpClient = registry.create_service().unwrap();
    assert_eq!(b.get("/ping").await.unwrap().text(), "upload");

    let c: HttpClient = registry.create_service().unwrap();
    assert_eq!(c.get("/ping").await.unwrap().text(), "primary");

    assert_eq!(registry.build_count(), 3);
    primary_mock.assert_async().await;
    upload_mock.assert_async().await;
}

#[tokio::test]
async fn test_concurrent_service_creation_shares_one_client() {
    let registry = Arc::new(ClientRegistry::new(RegistryOptions::without_disk_cache()));
    registry.set_default_configuration(ClientProfile::new("http://localhost:9/"));

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.create_service::<HttpClient>().map(|c| c.id()) })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap().unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(registry.build_count(), 1);
}

#[tokio::test]
async fn test_cookies_replayed_across_rebuilds() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/login")
        .with_status(200)
        .with_header("set-cookie", "session=abc; Path=/")
        .create_async()
        .await;
    let me = server
        .mock("GET", "/me")
        .match_header("cookie", "session=abc")
        .with_status(200)
        .with_body("alice")
        .expect(2)
        .create_async()
        .await;

    let registry = ClientRegistry::new(RegistryOptions::without_disk_cache());
    let profile = ClientProfile::new(server.url()).with_keep_request_method(true);
    registry.set_default_configuration(profile.clone());

    let client = registry.client().unwrap();
    client.get("/login").await.unwrap();
    assert_eq!(client.get("/me").await.unwrap().text(), "alice");

    registry.set_temporary_configuration(profile);
    let rebuilt = registry.client().unwrap();
    assert!(!rebuilt.ptr_eq(&client));
    assert_eq!(rebuilt.get("/me").await.unwrap().text(), "alice");
    me.assert_async().await;
}

#[tokio::test]
async fn test_refreshed_token_sent_to_server() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/orders")
        .match_header("authorization", "Bearer renewed")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let registry = ClientRegistry::new(RegistryOptions::without_disk_cache());
    registry.set_default_configuration(
        ClientProfile::new(server.url())
            .with_keep_request_method(true)
            .with_default_header("Authorization", "Bearer expired"),
    );
    registry.set_token_refresher(
        |profile| profile.default_headers.get("Authorization").map(String::as_str) == Some("Bearer expired"),
        |registry| {
            registry.add_default_header("Authorization", "Bearer renewed");
        },
    );

    let response = registry.client().unwrap().get("/orders").await.unwrap();
    assert!(response.is_success());
    mock.assert_async().await;
}
