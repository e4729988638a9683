//! HTTP API tests.

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;

use tasklist_core::{LocalPlatform, User};
use tasklist_gateway::error::ErrorResponse;
use tasklist_gateway::json::{AuthResponse, HealthResponse};
use tasklist_gateway::{create_router, AppState, GatewayConfig};
use tasklist_proto::{TodoItem, TodoList, TodoStatus};

fn server() -> TestServer {
    let platform = LocalPlatform::temporary().unwrap();
    let state = AppState::new(platform, GatewayConfig::default());
    TestServer::new(create_router(state)).unwrap()
}

async fn sign_up(server: &TestServer, email: &str) -> AuthResponse {
    let response = server
        .post("/auth/signup")
        .json(&json!({ "email": email, "password": "password1" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<AuthResponse>()
}

#[tokio::test]
async fn test_health() {
    let server = server();
    let health = server.get("/health").await.json::<HealthResponse>();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.open_channels, 0);
}

#[tokio::test]
async fn test_signup_login_and_user() {
    let server = server();
    let signed_up = sign_up(&server, "alice@example.com").await;
    assert_eq!(signed_up.user.email, "alice@example.com");
    assert_eq!(signed_up.token_type, "bearer");

    let response = server
        .post("/auth/login")
        .json(&json!({ "email": "alice@example.com", "password": "password1" }))
        .await;
    response.assert_status_ok();
    let login = response.json::<AuthResponse>();
    assert_eq!(login.user.id, signed_up.user.id);

    let user = server
        .get("/auth/user")
        .authorization_bearer(&login.access_token)
        .await
        .json::<User>();
    assert_eq!(user.id, signed_up.user.id);

    server
        .post("/auth/logout")
        .authorization_bearer(&login.access_token)
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_auth_failures() {
    let server = server();
    sign_up(&server, "bob@example.com").await;

    let response = server
        .post("/auth/signup")
        .json(&json!({ "email": "bob@example.com", "password": "password1" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let response = server
        .post("/auth/login")
        .json(&json!({ "email": "bob@example.com", "password": "wrong-password" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<ErrorResponse>().code, "UNAUTHENTICATED");

    let response = server
        .post("/auth/signup")
        .json(&json!({ "email": "carol@example.com", "password": "123" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let server = server();

    for path in ["/lists", "/auth/user", "/ws/changes?topic=lists"] {
        let response = server.get(path).await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body = response.json::<ErrorResponse>();
        assert!(body.error);
        assert_eq!(body.code, "UNAUTHENTICATED");
    }

    server
        .get("/lists")
        .authorization_bearer("not-a-token")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_and_item_flow() {
    let server = server();
    let token = sign_up(&server, "alice@example.com").await.access_token;

    let response = server
        .post("/lists")
        .authorization_bearer(&token)
        .json(&json!({ "name": "Groceries" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let list = response.json::<TodoList>();
    assert_eq!(list.name, "Groceries");

    let response = server
        .post(&format!("/lists/{}/items", list.id))
        .authorization_bearer(&token)
        .json(&json!({ "name": "Milk" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let item = response.json::<TodoItem>();
    assert_eq!(item.status, TodoStatus::Pending);
    assert_eq!(item.list_id, list.id);

    let item = server
        .patch(&format!("/items/{}", item.id))
        .authorization_bearer(&token)
        .json(&json!({ "status": "completed" }))
        .await
        .json::<TodoItem>();
    assert_eq!(item.status, TodoStatus::Completed);

    let items = server
        .get(&format!("/lists/{}/items", list.id))
        .authorization_bearer(&token)
        .await
        .json::<Vec<TodoItem>>();
    assert_eq!(items.len(), 1);

    let renamed = server
        .patch(&format!("/lists/{}", list.id))
        .authorization_bearer(&token)
        .json(&json!({ "name": "Shopping" }))
        .await
        .json::<TodoList>();
    assert_eq!(renamed.name, "Shopping");

    server
        .delete(&format!("/lists/{}", list.id))
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let lists = server
        .get("/lists")
        .authorization_bearer(&token)
        .await
        .json::<Vec<TodoList>>();
    assert!(lists.is_empty());
}

#[tokio::test]
async fn test_foreign_rows_are_not_found() {
    let server = server();
    let alice = sign_up(&server, "alice@example.com").await.access_token;
    let bob = sign_up(&server, "bob@example.com").await.access_token;

    let list = server
        .post("/lists")
        .authorization_bearer(&alice)
        .json(&json!({ "name": "Private" }))
        .await
        .json::<TodoList>();

    let response = server
        .patch(&format!("/lists/{}", list.id))
        .authorization_bearer(&bob)
        .json(&json!({ "name": "Stolen" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<ErrorResponse>().code, "NOT_FOUND");

    server
        .post(&format!("/lists/{}/items", list.id))
        .authorization_bearer(&bob)
        .json(&json!({ "name": "Sneaky" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let lists = server
        .get("/lists")
        .authorization_bearer(&bob)
        .await
        .json::<Vec<TodoList>>();
    assert!(lists.is_empty());
}

#[tokio::test]
async fn test_blank_name_is_bad_request() {
    let server = server();
    let token = sign_up(&server, "alice@example.com").await.access_token;

    let response = server
        .post("/lists")
        .authorization_bearer(&token)
        .json(&json!({ "name": "   " }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<ErrorResponse>().code, "BAD_REQUEST");
}

#[tokio::test]
async fn test_unknown_topic_is_bad_request() {
    let server = server();
    let token = sign_up(&server, "alice@example.com").await.access_token;

    // `list` needs a list id.
    let response = server
        .get("/ws/changes?topic=list")
        .authorization_bearer(&token)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .get("/ws/changes?topic=everything")
        .authorization_bearer(&token)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<ErrorResponse>().code, "BAD_REQUEST");
}

#[tokio::test]
async fn test_password_update() {
    let server = server();
    let token = sign_up(&server, "erin@example.com").await.access_token;

    server
        .post("/auth/update-password")
        .authorization_bearer(&token)
        .json(&json!({ "password": "new-password" }))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server
        .post("/auth/login")
        .json(&json!({ "email": "erin@example.com", "password": "new-password" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_password_recovery() {
    let platform = LocalPlatform::temporary().unwrap();
    let state = AppState::new(platform, GatewayConfig::default());
    let auth = state.platform.auth().clone();
    let server = TestServer::new(create_router(state)).unwrap();
    let signed_up = sign_up(&server, "hank@example.com").await;

    server
        .post("/auth/recover")
        .json(&json!({ "email": "nobody@example.com" }))
        .await
        .assert_status(StatusCode::ACCEPTED);
    server
        .post("/auth/recover")
        .json(&json!({ "email": "not-an-email" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let code = auth
        .request_password_reset("hank@example.com")
        .unwrap()
        .unwrap();
    let response = server.get(&format!("/auth/callback?code={code}")).await;
    response.assert_status_ok();
    let recovered = response.json::<AuthResponse>();
    assert_eq!(recovered.user.id, signed_up.user.id);

    server
        .post("/auth/update-password")
        .authorization_bearer(&recovered.access_token)
        .json(&json!({ "password": "brand-new" }))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .post("/auth/login")
        .json(&json!({ "email": "hank@example.com", "password": "brand-new" }))
        .await
        .assert_status_ok();

    let reused = server.get(&format!("/auth/callback?code={code}")).await;
    reused.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(reused.json::<ErrorResponse>().code, "UNAUTHENTICATED");
}
