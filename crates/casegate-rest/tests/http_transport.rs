//! HttpTransport against a local mock repository.
//!
//! The transport is blocking, so every call runs on `spawn_blocking` while
//! the mock server lives on the tokio runtime.

use casegate_rest::{
    AuthScope, Credentials, Error, HttpTransport, RestConfig, RestRequest, ServiceContext, Transport,
    TransportError,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MEDIA_TYPE: &str = "application/vnd.emc.documentum+json";

fn config(server: &MockServer) -> RestConfig {
    RestConfig::new(&format!("{}/rest", server.uri()), "cms", "clerk", "pw")
}

fn properties_page(names: &[&str], next: bool) -> serde_json::Value {
    let entries: Vec<_> = names
        .iter()
        .map(|name| json!({ "content": { "properties": { "r_object_id": format!("0b-{name}"), "object_name": name } } }))
        .collect();
    let mut links = vec![json!({ "rel": "self", "href": "self" })];
    if next {
        links.push(json!({ "rel": "next", "href": "next" }));
    }
    json!({ "entries": entries, "links": links })
}

// ============================================================================
// Raw transport
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_get_sends_query_and_headers() {
    let server = MockServer::start().await;
    let basic = Credentials::new("clerk", "pw").basic_header();

    Mock::given(method("GET"))
        .and(path("/rest/repositories/cms"))
        .and(query_param("dql", "SELECT r_object_id FROM dm_user WHERE user_name = 'a b'"))
        .and(query_param("page", "1"))
        .and(header("Authorization", basic.as_str()))
        .and(header("Accept", MEDIA_TYPE))
        .respond_with(ResponseTemplate::new(200).set_body_json(properties_page(&["a"], false)))
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server);
    let body = tokio::task::spawn_blocking(move || {
        let transport = HttpTransport::new(&config).unwrap();
        let request = RestRequest::get("", &basic)
            .param("dql", "SELECT r_object_id FROM dm_user WHERE user_name = 'a b'")
            .param("page", 1);
        transport.execute(&request)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(body["entries"][0]["content"]["properties"]["object_name"], json!("a"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_non_success_status_keeps_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("DM_QUERY_E_SYNTAX"))
        .mount(&server)
        .await;

    let config = config(&server);
    let err = tokio::task::spawn_blocking(move || {
        HttpTransport::new(&config)
            .unwrap()
            .execute(&RestRequest::get("", "Basic x"))
    })
    .await
    .unwrap()
    .unwrap_err();

    match err {
        TransportError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "DM_QUERY_E_SYNTAX");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_non_json_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let config = config(&server);
    let err = tokio::task::spawn_blocking(move || {
        HttpTransport::new(&config)
            .unwrap()
            .execute(&RestRequest::get("", "Basic x"))
    })
    .await
    .unwrap()
    .unwrap_err();
    assert!(matches!(err, TransportError::Decode(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_patch_is_post_with_method_override() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/repositories/cms/objects/0901"))
        .and(header("X-Method-Override", "PATCH"))
        .and(header("Content-Type", MEDIA_TYPE))
        .and(body_json(json!({ "properties": { "location": "Delhi" } })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "properties": { "location": "Delhi" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server);
    let body = tokio::task::spawn_blocking(move || {
        let request = RestRequest::patch(
            "/objects/0901",
            "Basic x",
            json!({ "properties": { "location": "Delhi" } }),
        );
        HttpTransport::new(&config).unwrap().execute(&request)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(body["properties"]["location"], json!("Delhi"));
}

// ============================================================================
// Services over HTTP
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_query_walks_pages_over_http() {
    let server = MockServer::start().await;
    let statement = "SELECT r_object_id, object_name FROM cms_case_folder ENABLE(RETURN_TOP 10000)";

    Mock::given(method("GET"))
        .and(path("/rest/repositories/cms"))
        .and(query_param("dql", statement))
        .and(query_param("page", "1"))
        .and(query_param("inline", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(properties_page(&["a", "b"], true)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/repositories/cms"))
        .and(query_param("dql", statement))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(properties_page(&["c"], false)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(&server);
    config.page_size = 2;
    let outcome = tokio::task::spawn_blocking(move || {
        ServiceContext::connect(config)
            .unwrap()
            .query()
            .execute("SELECT object_name FROM cms_case_folder")
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(outcome.statement, statement);
    assert_eq!(outcome.result.total_count(), 3);
    assert_eq!(outcome.result.columns, vec!["r_object_id", "object_name"]);
    assert_eq!(outcome.result.rows[2]["object_name"], json!("c"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_service_scope_posts_for_ticket_once() {
    let server = MockServer::start().await;
    let service_basic = Credentials::new("svc_admin", "svc-pw").basic_header();

    Mock::given(method("POST"))
        .and(path("/rest/repositories/cms/login-tickets"))
        .and(header("Authorization", service_basic.as_str()))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "TKT-42" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/repositories/cms"))
        .and(header("Authorization", "DmTicket TKT-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(properties_page(&["u"], false)))
        .expect(2)
        .mount(&server)
        .await;

    let config = config(&server).with_service_account("svc_admin", "svc-pw");
    tokio::task::spawn_blocking(move || {
        let context = ServiceContext::connect(config).unwrap();
        let service = context.query().with_scope(AuthScope::Service);
        service.execute("SELECT user_name FROM dm_user").unwrap();
        service.execute("SELECT user_name FROM dm_user").unwrap();
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_authenticate_maps_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/repositories/cms/currentuser"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let config = config(&server);
    let result = tokio::task::spawn_blocking(move || {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config).unwrap());
        ServiceContext::new(config, transport)
            .session()
            .authenticate(&Credentials::new("ravi", "wrong"))
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(Error::InvalidCredentials)));
}
