//! HTTP server tests.
//!
//! Drive the router directly with `oneshot`, and run one full sign-in against
//! a live listener with the client.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;
use url::Url;

use indieauth::challenges::{S256, new_verifier, s256_challenge};
use indieauth::client::profile_from_token;
use indieauth::form::FormValues;
use indieauth::server::MemoryStore;
use indieauth::server::transport::{HttpState, create_router, serve};
use indieauth::{Client, Config, Server};

const BASE_URL: &str = "http://auth.example";
const ME: &str = "https://me.example/";
const CLIENT_ID: &str = "https://app.example/";
const REDIRECT_URI: &str = "https://app.example/callback";

fn router() -> Router {
    let server = Server::with_http_client(true, reqwest::Client::new());
    let state = HttpState::new(server, Arc::new(MemoryStore::default()), BASE_URL, ME);
    create_router(state)
}

fn urlencoded(pairs: &[(&str, &str)]) -> String {
    serde_urlencoded::to_string(pairs).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn get(app: &Router, uri: &str) -> axum::response::Response {
    app.clone().oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap()
}

async fn post_form(app: &Router, uri: &str, pairs: &[(&str, &str)]) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(urlencoded(pairs)))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Run an authorization request and return the issued code.
async fn authorize(app: &Router, verifier: &str) -> String {
    let challenge = s256_challenge(verifier);
    let query = urlencoded(&[
        ("response_type", "code"),
        ("client_id", CLIENT_ID),
        ("redirect_uri", REDIRECT_URI),
        ("state", "xyz"),
        ("scope", "profile create"),
        ("code_challenge", challenge.as_str()),
        ("code_challenge_method", S256),
    ]);

    let response = get(app, &format!("/authorize?{query}")).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = response.headers()[header::LOCATION].to_str().unwrap();
    let location = Url::parse(location).unwrap();
    let params = FormValues::parse(location.query().unwrap_or_default());
    params.get("code").unwrap().to_owned()
}

fn exchange<'a>(code: &'a str, verifier: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("client_id", CLIENT_ID),
        ("redirect_uri", REDIRECT_URI),
        ("code_verifier", verifier),
    ]
}

// =============================================================================
// Discovery
// =============================================================================

#[tokio::test]
async fn test_profile_page_advertises_endpoints() {
    let response = get(&router(), "/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let link = response.headers()[header::LINK].to_str().unwrap().to_owned();
    assert!(link.contains(r#"<http://auth.example/.well-known/oauth-authorization-server>; rel="indieauth-metadata""#));
    assert!(link.contains(r#"<http://auth.example/authorize>; rel="authorization_endpoint""#));
    assert!(link.contains(r#"<http://auth.example/token>; rel="token_endpoint""#));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains(r#"<link rel="authorization_endpoint" href="http://auth.example/authorize">"#));
}

#[tokio::test]
async fn test_server_metadata() {
    let response = get(&router(), "/.well-known/oauth-authorization-server").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["issuer"], "http://auth.example/");
    assert_eq!(json["authorization_endpoint"], "http://auth.example/authorize");
    assert_eq!(json["token_endpoint"], "http://auth.example/token");
    assert_eq!(json["code_challenge_methods_supported"], serde_json::json!(["plain", "S256"]));
    assert_eq!(json["authorization_response_iss_parameter_supported"], true);
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = router();

    let json = body_json(get(&app, "/health").await).await;
    assert_eq!(json["status"], "ok");

    let json = body_json(get(&app, "/ready").await).await;
    assert_eq!(json["status"], "ready");
    assert_eq!(json["issuer"], "http://auth.example/");
    assert_eq!(json["me"], ME);
    assert_eq!(json["require_pkce"], true);
}

// =============================================================================
// Authorization endpoint
// =============================================================================

#[tokio::test]
async fn test_authorize_redirects_with_code_state_and_iss() {
    let app = router();
    let challenge = s256_challenge(&new_verifier().unwrap());
    let query = urlencoded(&[
        ("client_id", CLIENT_ID),
        ("redirect_uri", REDIRECT_URI),
        ("state", "xyz"),
        ("code_challenge", challenge.as_str()),
        ("code_challenge_method", S256),
    ]);

    let response = get(&app, &format!("/authorize?{query}")).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = Url::parse(response.headers()[header::LOCATION].to_str().unwrap()).unwrap();
    assert_eq!(location.path(), "/callback");
    let params = FormValues::parse(location.query().unwrap_or_default());
    assert_eq!(params.get("code").map(str::len), Some(64));
    assert_eq!(params.get("state"), Some("xyz"));
    assert_eq!(params.get("iss"), Some("http://auth.example/"));
}

#[tokio::test]
async fn test_authorize_without_pkce_is_rejected() {
    let query = urlencoded(&[("client_id", CLIENT_ID), ("redirect_uri", REDIRECT_URI), ("state", "xyz")]);

    let response = get(&router(), &format!("/authorize?{query}")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_request");
    assert_eq!(json["error_description"], "code_challenge and code_challenge_method are required");
}

#[tokio::test]
async fn test_authorize_post_returns_me() {
    let app = router();
    let verifier = new_verifier().unwrap();
    let code = authorize(&app, &verifier).await;

    let response = post_form(&app, "/authorize", &exchange(&code, &verifier)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({ "me": ME }));
}

// =============================================================================
// Token endpoint
// =============================================================================

#[tokio::test]
async fn test_token_exchange_and_verification() {
    let app = router();
    let verifier = new_verifier().unwrap();
    let code = authorize(&app, &verifier).await;

    let response = post_form(&app, "/token", &exchange(&code, &verifier)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    assert_eq!(response.headers()[header::PRAGMA], "no-cache");

    let json = body_json(response).await;
    assert_eq!(json["me"], ME);
    assert_eq!(json["token_type"], "Bearer");
    assert_eq!(json["scope"], "profile create");
    assert!(json["expires_in"].as_i64().unwrap() > 0);
    let access_token = json["access_token"].as_str().unwrap().to_owned();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/token")
                .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["me"], ME);
    assert_eq!(json["client_id"], CLIENT_ID);
    assert_eq!(json["scope"], "profile create");
}

#[tokio::test]
async fn test_bearer_scheme_needs_separator() {
    let app = router();
    let verifier = new_verifier().unwrap();
    let code = authorize(&app, &verifier).await;

    let json = body_json(post_form(&app, "/token", &exchange(&code, &verifier)).await).await;
    let access_token = json["access_token"].as_str().unwrap().to_owned();

    let verify = |value: String| {
        app.clone().oneshot(
            Request::builder()
                .uri("/token")
                .header(header::AUTHORIZATION, value)
                .body(Body::empty())
                .unwrap(),
        )
    };

    let response = verify(format!("Bearer{access_token}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "invalid_token");

    let response = verify(format!("bearer {access_token}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_code_is_single_use() {
    let app = router();
    let verifier = new_verifier().unwrap();
    let code = authorize(&app, &verifier).await;

    let first = post_form(&app, "/token", &exchange(&code, &verifier)).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = post_form(&app, "/token", &exchange(&code, &verifier)).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(second).await["error"], "invalid_request");
}

#[tokio::test]
async fn test_wrong_verifier_is_rejected() {
    let app = router();
    let verifier = new_verifier().unwrap();
    let code = authorize(&app, &verifier).await;
    let other = new_verifier().unwrap();

    let response = post_form(&app, "/token", &exchange(&code, &other)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_request");
    assert_eq!(json["error_description"], "code challenge failed");
}

#[tokio::test]
async fn test_refresh_token_grant_is_not_implemented() {
    let response =
        post_form(&router(), "/token", &[("grant_type", "refresh_token"), ("refresh_token", "abc")]).await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body_json(response).await["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn test_unknown_bearer_token() {
    let response = router()
        .oneshot(
            Request::builder()
                .uri("/token")
                .header(header::AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "invalid_token");
}

// =============================================================================
// End to end
// =============================================================================

#[tokio::test]
async fn test_client_signs_in_against_live_server() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let me = format!("{base_url}/");

    let config = Config::for_testing();
    let server = Server::new(&config).unwrap();
    let state = HttpState::new(server, Arc::new(MemoryStore::new(&config)), &base_url, &me);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(serve(listener, create_router(state), async {
        shutdown_rx.await.ok();
    }));

    let client = Client::new(format!("{base_url}/app"), format!("{base_url}/callback"), &config).unwrap();
    let (info, auth_url) = client.authenticate(&me, "profile create").await.unwrap();
    assert_eq!(info.metadata.issuer, me);

    let browser = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none()).build().unwrap();
    let response = browser.get(&auth_url).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::FOUND);

    let location = Url::parse(response.headers()[reqwest::header::LOCATION].to_str().unwrap()).unwrap();
    assert_eq!(location.path(), "/callback");
    let callback = FormValues::parse(location.query().unwrap_or_default());

    let code = client.validate_callback(&info, &callback).unwrap();
    let token = client.get_token(&info, &code).await.unwrap();

    assert_eq!(token.token_type, "Bearer");
    assert_eq!(token.scope.as_deref(), Some("profile create"));
    assert_eq!(profile_from_token(&token).unwrap().me, me);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}
