//! HTTP endpoint handlers for a single-user IndieAuth server.
//!
//! Implements:
//! - IndieAuth server metadata discovery (profile page `Link` headers and
//!   `/.well-known/oauth-authorization-server`)
//! - The authorization endpoint, including the profile URL exchange
//! - The token endpoint and token verification
//!
//! Authorization requests for the configured profile are approved
//! automatically: there is no login page.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{RawQuery, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use url::Url;

use super::transport::HttpState;
use crate::challenges::CODE_CHALLENGE_METHODS;
use crate::client::{AUTHORIZATION_ENDPOINT_REL, INDIEAUTH_METADATA_REL, TOKEN_ENDPOINT_REL};
use crate::error::RequestError;
use crate::form::FormValues;

// ─── Discovery ───────────────────────────────────────────────────────────────

/// `GET /`
///
/// Profile page advertising the server through both `Link` headers and
/// `<link>` elements.
pub async fn handle_profile_page(State(state): State<Arc<HttpState>>) -> Response {
    let rels = [
        (INDIEAUTH_METADATA_REL, state.metadata_url()),
        (AUTHORIZATION_ENDPOINT_REL, state.authorization_endpoint()),
        (TOKEN_ENDPOINT_REL, state.token_endpoint()),
    ];

    let link_header =
        rels.iter().map(|(rel, href)| format!("<{href}>; rel=\"{rel}\"")).collect::<Vec<_>>().join(", ");
    let link_elements: String = rels
        .iter()
        .map(|(rel, href)| format!("    <link rel=\"{rel}\" href=\"{href}\">\n"))
        .collect();

    let body = format!(
        "<!DOCTYPE html>\n<html>\n  <head>\n    <title>IndieAuth</title>\n{link_elements}  </head>\n  <body>\n    <p>Sign in with <code>{}</code>.</p>\n  </body>\n</html>\n",
        state.me
    );

    let mut response = Html(body).into_response();
    if let Ok(value) = HeaderValue::from_str(&link_header) {
        response.headers_mut().insert(header::LINK, value);
    }
    response
}

/// `GET /.well-known/oauth-authorization-server`
pub async fn handle_server_metadata(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "issuer": state.issuer(),
        "authorization_endpoint": state.authorization_endpoint(),
        "token_endpoint": state.token_endpoint(),
        "scopes_supported": ["profile", "email", "create", "update", "delete", "media"],
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code"],
        "code_challenge_methods_supported": CODE_CHALLENGE_METHODS,
        "authorization_response_iss_parameter_supported": true
    }))
}

// ─── Authorization Endpoint ──────────────────────────────────────────────────

/// `GET /authorize`
///
/// Validate the request, store it under a fresh code and redirect back to the
/// client with `code`, `state` and `iss`.
pub async fn handle_authorize_get(
    State(state): State<Arc<HttpState>>,
    RawQuery(query): RawQuery,
) -> Response {
    let form = FormValues::parse(query.as_deref().unwrap_or_default());

    let request = match state.server.parse_authorization(&form) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected authorization request");
            return request_error(&e);
        }
    };

    let Ok(mut redirect) = Url::parse(&request.redirect_uri) else {
        return request_error(&RequestError::InvalidRedirectUri);
    };

    let client_id = request.client_id.clone();
    let oauth_state = request.state.clone();
    let code = state.store.store_authorization(request).await;

    tracing::info!(client_id = %client_id, "Auto-approved authorization");

    redirect
        .query_pairs_mut()
        .append_pair("code", &code)
        .append_pair("state", &oauth_state)
        .append_pair("iss", &state.issuer());

    (StatusCode::FOUND, [(header::LOCATION, redirect.to_string())]).into_response()
}

/// `POST /authorize`
///
/// Exchange an authorization code for the profile URL only.
pub async fn handle_authorize_post(State(state): State<Arc<HttpState>>, body: Bytes) -> Response {
    let form = FormValues::from_bytes(&body);

    if let Err(response) = redeem_code(&state, &form).await {
        return response;
    }

    Json(serde_json::json!({ "me": state.me })).into_response()
}

// ─── Token Endpoint ──────────────────────────────────────────────────────────

/// `POST /token`
///
/// Exchange an authorization code for an access token.
pub async fn handle_token(State(state): State<Arc<HttpState>>, body: Bytes) -> Response {
    let form = FormValues::from_bytes(&body);

    if form.get("grant_type") == Some("refresh_token") {
        return error_response(
            StatusCode::NOT_IMPLEMENTED,
            "unsupported_grant_type",
            "refresh tokens are not supported",
        );
    }

    let request = match redeem_code(&state, &form).await {
        Ok(request) => request,
        Err(response) => return response,
    };

    let token = state.store.issue_token(&state.me, &request).await;

    tracing::info!(client_id = %token.client_id, "Issued access token");

    let mut response = Json(serde_json::json!({
        "me": token.me,
        "access_token": token.access_token,
        "token_type": "Bearer",
        "scope": token.scope(),
        "expires_in": token.expires_in()
    }))
    .into_response();

    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

/// `GET /token`
///
/// Verify the bearer token in the `Authorization` header.
pub async fn handle_token_verify(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
) -> Response {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .unwrap_or_default();

    let Some(token) = state.store.lookup_token(bearer).await else {
        return error_response(StatusCode::UNAUTHORIZED, "invalid_token", "invalid or expired token");
    };

    Json(serde_json::json!({
        "me": token.me,
        "client_id": token.client_id,
        "scope": token.scope(),
        "issued_at": token.issued_at,
        "expires_at": token.expires_at
    }))
    .into_response()
}

/// Take the stored request for the form's `code` and validate the exchange.
async fn redeem_code(
    state: &HttpState,
    form: &FormValues,
) -> Result<super::AuthenticationRequest, Response> {
    let Some(request) = state.store.take_authorization(form.get("code").unwrap_or_default()).await
    else {
        return Err(error_response(StatusCode::BAD_REQUEST, "invalid_request", "invalid authorization"));
    };

    if let Err(e) = state.server.validate_token_exchange(&request, form) {
        tracing::debug!(client_id = %request.client_id, error = %e, "Rejected code exchange");
        return Err(request_error(&e));
    }

    Ok(request)
}

/// Token of an `Authorization: Bearer <token>` value. The scheme is matched
/// case-insensitively and must be followed by a space.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("Bearer").then(|| token.trim()).filter(|t| !t.is_empty())
}

fn request_error(err: &RequestError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
    error_response(status, err.error_code(), &err.to_string())
}

fn error_response(status: StatusCode, error: &str, description: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": error,
            "error_description": description
        })),
    )
        .into_response()
}
