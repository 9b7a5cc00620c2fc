// tests/drupal_http.rs
//
// DrupalClient against an in-process axum server standing in for the site.

use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use news_sync::config::DrupalConfig;
use news_sync::publish::{ArticleRequest, DrupalClient};
use news_sync::{CityConfig, Item, Publisher, SyncError};

const JSON_API: &str = "application/vnd.api+json";

#[derive(Debug, Clone)]
struct Seen {
    method: Method,
    path: String,
    query: String,
    headers: HeaderMap,
    body: String,
}

#[derive(Clone)]
struct MockSite {
    seen: Arc<Mutex<Vec<Seen>>>,
    csrf_status: StatusCode,
    post_status: StatusCode,
    post_body: String,
}

impl MockSite {
    fn new(post_status: StatusCode, post_body: &str) -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
            csrf_status: StatusCode::OK,
            post_status,
            post_body: post_body.to_string(),
        }
    }

    fn csrf(mut self, status: StatusCode) -> Self {
        self.csrf_status = status;
        self
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn posts(&self) -> Vec<Seen> {
        self.seen()
            .into_iter()
            .filter(|s| s.method == Method::POST)
            .collect()
    }
}

async fn handle(
    State(site): State<MockSite>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    site.seen.lock().unwrap().push(Seen {
        method: method.clone(),
        path: uri.path().to_string(),
        query: uri.query().unwrap_or_default().to_string(),
        headers,
        body,
    });

    if uri.path() == "/session/token" {
        return (site.csrf_status, "csrf-abc\n").into_response();
    }
    if method == Method::POST {
        return (
            site.post_status,
            [(header::CONTENT_TYPE, JSON_API)],
            site.post_body.clone(),
        )
            .into_response();
    }
    match uri.path() {
        "/jsonapi/node/article" => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, JSON_API)],
            json!({"data": [{"type": "node--article", "id": "n-1"}]}).to_string(),
        )
            .into_response(),
        "/jsonapi/node/article/n-1" => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, JSON_API)],
            json!({"data": {"type": "node--article", "id": "n-1", "attributes": {"title": "Hello"}}})
                .to_string(),
        )
            .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn(site: MockSite) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(handle).with_state(site);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base: &str, username: &str, auth_method: &str) -> DrupalClient {
    DrupalClient::new(&DrupalConfig {
        url: format!("{base}/"),
        username: username.to_string(),
        token: "s3cret".into(),
        auth_method: auth_method.to_string(),
        skip_tls_verify: false,
        timeout_secs: 5,
    })
    .unwrap()
}

fn header_str<'a>(h: &'a HeaderMap, name: &str) -> Option<&'a str> {
    h.get(name).and_then(|v| v.to_str().ok())
}

fn article() -> ArticleRequest {
    ArticleRequest {
        title: "Police arrest suspect downtown".into(),
        body: "Officers responded on Elm St.".into(),
        url: "https://news.example.test/a".into(),
        group_id: "g-sudbury".into(),
        group_type: "group--crime_news".into(),
        content_type: "node--article".into(),
    }
}

const CREATED: &str = r#"{"data":{"type":"node--article","id":"uuid-1","attributes":{"title":"x"}}}"#;

#[tokio::test]
async fn send_posts_jsonapi_document_with_credentials_and_csrf() {
    let site = MockSite::new(StatusCode::CREATED, CREATED);
    let base = spawn(site.clone()).await;
    let client = client(&base, "editor", "app-1");

    let item = Item {
        id: "A".into(),
        title: "Police arrest suspect downtown".into(),
        body: String::new(),
        url: "https://news.example.test/a".into(),
        published_at: Utc::now(),
        source: "Sudbury Star".into(),
    };
    let city = CityConfig {
        name: "sudbury".into(),
        index: None,
        group_id: "g-sudbury".into(),
    };
    let created = client
        .send(&item, &city, "node--article", "group--crime_news")
        .await
        .unwrap();
    assert_eq!(created.id, "uuid-1");
    assert_eq!(created.kind, "node--article");

    let seen = site.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].method, Method::GET);
    assert_eq!(seen[0].path, "/session/token");

    let post = &seen[1];
    assert_eq!(post.path, "/jsonapi/node/article");
    let h = &post.headers;
    assert_eq!(header_str(h, "api-key"), Some("ZWRpdG9yOnMzY3JldA=="));
    assert_eq!(header_str(h, "authorization"), Some("Basic ZWRpdG9yOnMzY3JldA=="));
    assert_eq!(header_str(h, "auth-method"), Some("app-1"));
    assert_eq!(header_str(h, "x-csrf-token"), Some("csrf-abc"));
    assert_eq!(header_str(h, "content-type"), Some(JSON_API));
    assert_eq!(header_str(h, "accept"), Some(JSON_API));

    let doc: Value = serde_json::from_str(&post.body).unwrap();
    assert_eq!(doc["data"]["type"], "node--article");
    assert_eq!(doc["data"]["attributes"]["title"], "Police arrest suspect downtown");
    assert!(doc["data"]["attributes"].get("body").is_none(), "empty body is omitted");
    assert_eq!(
        doc["data"]["relationships"]["field_group"]["data"],
        json!({"type": "group--crime_news", "id": "g-sudbury"})
    );
}

#[tokio::test]
async fn token_only_credentials_and_no_auth_method_header() {
    let site = MockSite::new(StatusCode::CREATED, CREATED);
    let base = spawn(site.clone()).await;
    client(&base, "", "").post_article(&article()).await.unwrap();

    let post = &site.posts()[0];
    assert_eq!(header_str(&post.headers, "api-key"), Some("czNjcmV0"));
    assert_eq!(header_str(&post.headers, "authorization"), Some("Basic czNjcmV0"));
    assert!(post.headers.get("auth-method").is_none());

    let doc: Value = serde_json::from_str(&post.body).unwrap();
    assert_eq!(doc["data"]["attributes"]["body"], "Officers responded on Elm St.");
}

#[tokio::test]
async fn csrf_failure_does_not_block_the_post() {
    let site = MockSite::new(StatusCode::CREATED, CREATED).csrf(StatusCode::FORBIDDEN);
    let base = spawn(site.clone()).await;
    let created = client(&base, "editor", "").post_article(&article()).await.unwrap();
    assert_eq!(created.id, "uuid-1");

    let posts = site.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].headers.get("x-csrf-token").is_none());
}

#[tokio::test]
async fn structured_rejection_surfaces_first_error() {
    let body = r#"{"errors":[
        {"title":"Unprocessable Entity","detail":"title: This value should not be null.","status":"422"},
        {"title":"Second","detail":"ignored"}
    ]}"#;
    let site = MockSite::new(StatusCode::UNPROCESSABLE_ENTITY, body);
    let base = spawn(site).await;

    let err = client(&base, "editor", "").post_article(&article()).await.unwrap_err();
    match err {
        SyncError::Api {
            status,
            title,
            detail,
        } => {
            assert_eq!(status, 422);
            assert_eq!(title, "Unprocessable Entity");
            assert_eq!(detail, "title: This value should not be null.");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn bare_server_error_reports_status() {
    let site = MockSite::new(StatusCode::INTERNAL_SERVER_ERROR, "");
    let base = spawn(site).await;

    let err = client(&base, "editor", "").post_article(&article()).await.unwrap_err();
    match err {
        SyncError::Status { status } => assert!(status.starts_with("500"), "{status}"),
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_success_body_is_a_decode_error() {
    for body in ["<html>ok</html>", r#"{"data":{"type":"node--article","id":""}}"#] {
        let site = MockSite::new(StatusCode::CREATED, body);
        let base = spawn(site).await;
        let err = client(&base, "editor", "").post_article(&article()).await.unwrap_err();
        assert!(matches!(err, SyncError::Decode(_)), "body {body:?} gave {err:?}");
    }
}

#[tokio::test]
async fn unreachable_site_is_a_transport_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}"), "editor", "")
        .post_article(&article())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn list_and_get_nodes_return_raw_documents() {
    let site = MockSite::new(StatusCode::CREATED, CREATED);
    let base = spawn(site.clone()).await;
    let client = client(&base, "editor", "");

    let list = client.list_nodes("node--article", 5).await.unwrap();
    assert_eq!(list["data"][0]["id"], "n-1");

    let node = client.get_node("node--article", "n-1").await.unwrap();
    assert_eq!(node["data"]["attributes"]["title"], "Hello");

    let missing = client.get_node("node--article", "nope").await.unwrap_err();
    assert!(matches!(missing, SyncError::Status { .. }), "{missing:?}");

    let seen = site.seen();
    assert!(
        seen[0].query == "page%5Blimit%5D=5" || seen[0].query == "page[limit]=5",
        "query {:?}",
        seen[0].query
    );
    assert!(seen
        .iter()
        .all(|s| header_str(&s.headers, "api-key") == Some("ZWRpdG9yOnMzY3JldA==")));
}
