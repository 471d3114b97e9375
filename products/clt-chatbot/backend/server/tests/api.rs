use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use server::config::ServerConfig;
use server::store::Store;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;

fn test_app() -> Router {
    server::app(Store::seeded().into_shared(), CorsLayer::new())
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

#[tokio::test]
async fn lists_seeded_conversations() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/conversations", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(ids, ["uuid-1", "uuid-2"]);
    assert_eq!(body[0]["is_pinned"], true);
}

#[tokio::test]
async fn chat_echoes_and_records_history() {
    let app = test_app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/chat",
        Some(json!({ "conversation_id": "uuid-1", "content": "비자 문의" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "text");
    assert_eq!(body["message"], "Echo: 비자 문의 (Mock Response)");
    assert_eq!(body["slots"], json!({}));
    assert!(body["next_node"].is_null());

    let (_, detail) = send(&app, Method::GET, "/conversations/uuid-1", None).await;
    let messages = detail["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2]["role"], "user");
    assert_eq!(messages[3]["role"], "assistant");
}

#[tokio::test]
async fn chat_rejects_missing_content() {
    let app = test_app();
    let (status, body) = send(&app, Method::POST, "/chat", Some(json!({ "language": "en" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn creates_conversation_at_front() {
    let app = test_app();
    let (status, created) = send(&app, Method::POST, "/conversations", Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["title"], "New Chat");
    assert_eq!(created["is_pinned"], false);

    let (_, list) = send(&app, Method::GET, "/conversations", None).await;
    assert_eq!(list[0]["id"], created["id"]);

    let uri = format!("/conversations/{}", created["id"].as_str().unwrap());
    let (status, detail) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["messages"], json!([]));
}

#[tokio::test]
async fn detail_pages_and_validates_query() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/conversations/uuid-1?limit=1&offset=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "uuid-1");
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    assert_eq!(body["messages"][0]["id"], "msg-2");

    let (status, _) = send(&app, Method::GET, "/conversations/uuid-1?limit=0", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = send(&app, Method::GET, "/conversations/uuid-1?offset=-1", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = send(&app, Method::GET, "/conversations/uuid-1?limit=abc", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_conversation_is_not_found() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/conversations/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Conversation not found" }));

    let (status, _) = send(&app, Method::PATCH, "/conversations/missing", Some(json!({ "title": "x" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_updates_title_and_pin() {
    let app = test_app();
    let (status, body) = send(
        &app,
        Method::PATCH,
        "/conversations/uuid-2",
        Some(json!({ "title": "세금 납부", "is_pinned": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "세금 납부");
    assert_eq!(body["is_pinned"], true);
    assert_eq!(body["id"], "uuid-2");
}

#[tokio::test]
async fn delete_then_gone() {
    let app = test_app();
    let (status, body) = send(&app, Method::DELETE, "/conversations/uuid-2", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = send(&app, Method::GET, "/conversations/uuid-2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, "/conversations/uuid-2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lists_scenarios() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/scenarios", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["category"], "인사");
    assert_eq!(body[1]["items"][0]["id"], "visa");
}

#[tokio::test]
async fn cors_preflight_allows_known_origin_with_credentials() {
    let app = server::app(Store::seeded().into_shared(), ServerConfig::default().cors_layer());
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/conversations")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}

#[tokio::test]
async fn cors_ignores_unknown_origin() {
    let app = server::app(Store::seeded().into_shared(), ServerConfig::default().cors_layer());
    let request = Request::builder()
        .uri("/scenarios")
        .header(header::ORIGIN, "http://evil.test")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn server_is_reachable_over_tcp() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, test_app()).await.unwrap();
    });

    let response = reqwest::get(format!("http://{}/health", addr)).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "Service is up");

    let scenarios: Value = reqwest::get(format!("http://{}/scenarios", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(scenarios.as_array().unwrap().len(), 2);
}
