//! IndieAuth client (relying party).
//!
//! Drives the authorization code flow against a user's own authorization
//! server:
//! - [`Client::authenticate`] discovers the server and builds the redirect URL
//! - [`Client::validate_callback`] checks the redirect back
//! - [`Client::get_token`] or [`Client::fetch_profile`] redeems the code
//!
//! No request is retried. Dropping a returned future aborts the request in
//! flight; [`CancelExt::cancel_on`] turns a [`CancellationToken`] into
//! [`ClientError::Cancelled`].

pub mod discovery;
pub mod links;

use std::future::Future;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::challenges;
use crate::config::Config;
use crate::error::{ClientError, ClientResult};
use crate::form::FormValues;

pub use discovery::{AUTHORIZATION_ENDPOINT_REL, INDIEAUTH_METADATA_REL, TOKEN_ENDPOINT_REL};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Authorization server metadata.
///
/// See <https://indieauth.spec.indieweb.org/#indieauth-server-metadata>. Members
/// missing from the document are left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub introspection_endpoint: String,
    pub introspection_endpoint_auth_methods_supported: Vec<String>,
    pub revocation_endpoint: String,
    pub revocation_endpoint_auth_methods_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub service_documentation: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    pub authorization_response_iss_parameter_supported: bool,
    pub userinfo_endpoint: String,
}

/// State of one authentication attempt.
///
/// Persist it across the redirect (for example in an encrypted cookie) and hand
/// it back to [`Client::validate_callback`] and then to [`Client::get_token`]
/// or [`Client::fetch_profile`].
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthInfo {
    pub metadata: Metadata,
    pub me: String,
    pub state: String,
    pub code_verifier: String,
}

impl std::fmt::Debug for AuthInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInfo")
            .field("metadata", &self.metadata)
            .field("me", &self.me)
            .field("code_verifier", &"[redacted]")
            .finish()
    }
}

/// Profile information returned by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub me: String,
    #[serde(default)]
    pub profile: ProfileInfo,
}

/// The optional `profile` member of a profile or token response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileInfo {
    pub name: String,
    pub url: String,
    pub photo: String,
    pub email: String,
}

/// Access token response.
///
/// Members beyond the OAuth 2.0 ones, such as `me` and `profile`, are kept in
/// [`Token::extra`].
#[derive(Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Token {
    /// Extra member of the token response.
    #[must_use]
    pub fn extra(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra.get(key)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("extra", &self.extra)
            .finish()
    }
}

/// Build a [`Profile`] from the `me` and `profile` extras of a token response.
///
/// Returns `None` if the token carries no `me`.
#[must_use]
pub fn profile_from_token(token: &Token) -> Option<Profile> {
    let me = token.extra("me")?.as_str().filter(|me| !me.is_empty())?;

    let mut profile = Profile { me: me.to_owned(), ..Profile::default() };

    if let Some(info) = token.extra("profile").and_then(serde_json::Value::as_object) {
        let field = |key: &str| {
            info.get(key).and_then(serde_json::Value::as_str).unwrap_or_default().to_owned()
        };
        profile.profile = ProfileInfo {
            name: field("name"),
            url: field("url"),
            photo: field("photo"),
            email: field("email"),
        };
    }

    Some(profile)
}

/// IndieAuth client.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    client_id: String,
    redirect_url: String,
}

impl Client {
    /// Create a new client with an HTTP client built from `config`.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(
        client_id: impl Into<String>,
        redirect_url: impl Into<String>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        Ok(Self::with_http_client(client_id, redirect_url, config.http_client()?))
    }

    /// Create a new client on top of an existing HTTP client.
    #[must_use]
    pub fn with_http_client(
        client_id: impl Into<String>,
        redirect_url: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self { http, client_id: client_id.into(), redirect_url: redirect_url.into() }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }

    /// Discover the endpoints for `profile`, generate state and a PKCE verifier,
    /// and build the authorization URL to redirect the user to.
    ///
    /// The challenge method is always `S256`.
    pub async fn authenticate(&self, profile: &str, scope: &str) -> ClientResult<(AuthInfo, String)> {
        let metadata = self.discover_metadata(profile).await?;

        let state = challenges::new_state()?;
        let code_verifier = challenges::new_verifier()?;

        let mut url = Url::parse(&metadata.authorization_endpoint)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_url)
            .append_pair("state", &state)
            .append_pair("scope", scope)
            .append_pair("code_challenge_method", challenges::S256)
            .append_pair("code_challenge", &challenges::s256_challenge(&code_verifier));

        tracing::debug!(me = %profile, endpoint = %metadata.authorization_endpoint, "Built authorization URL");

        let info = AuthInfo { metadata, me: profile.to_owned(), state, code_verifier };
        Ok((info, url.into()))
    }

    /// Check the query of the redirect back to this client and return the code.
    ///
    /// Servers implementing older revisions of IndieAuth publish no issuer and
    /// send no `iss`; both sides are then empty and compare equal.
    pub fn validate_callback(&self, info: &AuthInfo, query: &FormValues) -> ClientResult<String> {
        let code = query.get("code").ok_or(ClientError::CodeNotFound)?;
        let state = query.get("state").ok_or(ClientError::StateNotFound)?;

        if state != info.state {
            return Err(ClientError::InvalidState);
        }

        if query.get("iss").unwrap_or_default() != info.metadata.issuer {
            return Err(ClientError::InvalidIssuer);
        }

        Ok(code.to_owned())
    }

    /// Redeem `code` at the token endpoint.
    pub async fn get_token(&self, info: &AuthInfo, code: &str) -> ClientResult<Token> {
        if info.metadata.token_endpoint.is_empty() {
            return Err(ClientError::NoEndpointFound);
        }

        let response = self.post_exchange(&info.metadata.token_endpoint, info, code).await?;
        let response = Self::handle_response(response).await?;
        let body = response.text().await?;
        let token: Token = serde_json::from_str(&body)?;

        tracing::info!(me = %info.me, "Obtained access token");
        Ok(token)
    }

    /// Redeem `code` at the authorization endpoint for the user's profile only.
    ///
    /// This consumes the code.
    pub async fn fetch_profile(&self, info: &AuthInfo, code: &str) -> ClientResult<Profile> {
        let response = self.post_exchange(&info.metadata.authorization_endpoint, info, code).await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::unexpected_status(status.as_u16(), text));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn post_exchange(
        &self,
        endpoint: &str,
        info: &AuthInfo,
        code: &str,
    ) -> ClientResult<reqwest::Response> {
        let form: FormValues = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_url.as_str()),
            ("client_id", self.client_id.as_str()),
            ("code_verifier", info.code_verifier.as_str()),
        ]
        .into_iter()
        .collect();

        let response = self
            .http
            .post(endpoint)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header(ACCEPT, "application/json")
            .body(form.encode())
            .send()
            .await?;

        Ok(response)
    }

    /// Handle response status codes.
    async fn handle_response(response: reqwest::Response) -> ClientResult<reqwest::Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(ClientError::unexpected_status(status.as_u16(), text))
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("client_id", &self.client_id)
            .field("redirect_url", &self.redirect_url)
            .finish()
    }
}

/// Cancellation for client futures.
pub trait CancelExt<T>: Future<Output = ClientResult<T>> + Sized {
    /// Resolve to [`ClientError::Cancelled`] as soon as `token` is cancelled,
    /// dropping the inner future and with it any request in flight.
    fn cancel_on(self, token: &CancellationToken) -> impl Future<Output = ClientResult<T>> {
        let token = token.clone();
        async move {
            tokio::select! {
                biased;
                () = token.cancelled() => Err(ClientError::Cancelled),
                result = self => result,
            }
        }
    }
}

impl<T, F: Future<Output = ClientResult<T>>> CancelExt<T> for F {}
