//! IndieAuth authorization server building blocks.
//!
//! [`Server`] validates inbound authorization requests and code exchanges. It
//! never persists anything: the caller stores the returned
//! [`AuthenticationRequest`] under an opaque code and hands it back when the
//! code is redeemed.
//!
//! The `handlers` and `transport` modules wire these checks into a small
//! single-user HTTP server.

pub mod application;
pub mod handlers;
pub mod store;
pub mod transport;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::challenges;
use crate::config::Config;
use crate::error::{RequestError, RequestResult};
use crate::form::FormValues;
use crate::identifier::{is_valid_client_identifier, raw_host_port};

pub use application::ApplicationMetadata;
pub use store::{AuthorizationStore, IssuedToken, MemoryStore};

const RESPONSE_TYPE_CODE: &str = "code";
const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";

/// A validated authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationRequest {
    pub redirect_uri: String,
    pub client_id: String,
    /// Scopes in the order they were requested.
    pub scopes: Vec<String>,
    pub state: String,
    /// Empty when the client did not use PKCE.
    pub code_challenge: String,
    pub code_challenge_method: String,
}

/// IndieAuth authorization server.
#[derive(Clone)]
pub struct Server {
    http: reqwest::Client,
    require_pkce: bool,
}

impl Server {
    /// Create a new server with an HTTP client built from `config`.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::with_http_client(config.require_pkce, config.http_client()?))
    }

    /// Create a new server using the given HTTP client for outbound requests.
    #[must_use]
    pub fn with_http_client(require_pkce: bool, http: reqwest::Client) -> Self {
        Self { http, require_pkce }
    }

    /// Whether PKCE is mandatory.
    #[must_use]
    pub const fn require_pkce(&self) -> bool {
        self.require_pkce
    }

    pub(crate) const fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Parse and validate an authorization request.
    ///
    /// `response_type` defaults to `code` for legacy clients. A `scope` value is
    /// split on spaces; legacy clients may instead send repeated `scopes`
    /// fields.
    pub fn parse_authorization(&self, form: &FormValues) -> RequestResult<AuthenticationRequest> {
        let response_type = form.get("response_type").unwrap_or(RESPONSE_TYPE_CODE);
        if response_type != RESPONSE_TYPE_CODE {
            return Err(RequestError::InvalidResponseType);
        }

        let client_id = form.get("client_id").unwrap_or_default();
        is_valid_client_identifier(client_id).map_err(RequestError::InvalidClientIdentifier)?;

        let redirect_uri = form.get("redirect_uri").unwrap_or_default();
        validate_redirect_uri(client_id, redirect_uri)?;

        let code_challenge = form.get("code_challenge").unwrap_or_default();
        let mut code_challenge_method = "";
        if !code_challenge.is_empty() {
            if !challenges::is_valid_length(code_challenge.len()) {
                return Err(RequestError::WrongCodeChallengeLength);
            }

            code_challenge_method = form.get("code_challenge_method").unwrap_or_default();
            if !challenges::is_valid_code_challenge_method(code_challenge_method) {
                return Err(RequestError::InvalidCodeChallengeMethod);
            }
        } else if self.require_pkce {
            return Err(RequestError::PkceRequired);
        }

        let scopes = match form.get("scope") {
            Some(scope) => {
                scope.split(' ').filter(|s| !s.is_empty()).map(str::to_owned).collect()
            }
            None => form.get_all("scopes").into_iter().map(str::to_owned).collect(),
        };

        Ok(AuthenticationRequest {
            redirect_uri: redirect_uri.to_owned(),
            client_id: client_id.to_owned(),
            scopes,
            state: form.get("state").unwrap_or_default().to_owned(),
            code_challenge: code_challenge.to_owned(),
            code_challenge_method: code_challenge_method.to_owned(),
        })
    }

    /// Validate a code exchange against the request the code was issued for.
    ///
    /// Used both for the profile URL exchange at the authorization endpoint and
    /// for the token exchange; the caller decides whether to mint a token once
    /// this succeeds.
    pub fn validate_token_exchange(
        &self,
        request: &AuthenticationRequest,
        form: &FormValues,
    ) -> RequestResult<()> {
        let grant_type = form.get("grant_type").unwrap_or(GRANT_TYPE_AUTHORIZATION_CODE);
        if grant_type != GRANT_TYPE_AUTHORIZATION_CODE {
            return Err(RequestError::InvalidGrantType);
        }

        if form.get("client_id").unwrap_or_default() != request.client_id {
            return Err(RequestError::NoMatchClientId);
        }

        if form.get("redirect_uri").unwrap_or_default() != request.redirect_uri {
            return Err(RequestError::NoMatchRedirectUri);
        }

        if request.code_challenge.is_empty() {
            return if self.require_pkce { Err(RequestError::PkceRequired) } else { Ok(()) };
        }

        let verifier = form.get("code_verifier").unwrap_or_default();
        if !challenges::is_valid_length(verifier.len()) {
            return Err(RequestError::WrongCodeVerifierLength);
        }

        if !challenges::is_valid_length(request.code_challenge.len()) {
            return Err(RequestError::WrongCodeChallengeLength);
        }

        if !challenges::is_valid_code_challenge_method(&request.code_challenge_method) {
            return Err(RequestError::InvalidCodeChallengeMethod);
        }

        if !challenges::validate_code_challenge(
            &request.code_challenge_method,
            &request.code_challenge,
            verifier,
        ) {
            return Err(RequestError::CodeChallengeFailed);
        }

        Ok(())
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server").field("require_pkce", &self.require_pkce).finish()
    }
}

/// The redirect URI must live on the same host (and port) as the client.
///
/// Hosts are compared as written, so case and explicit default ports must match
/// too. Redirect URIs on other hosts would need discovery of the client's
/// published redirect URLs, which is not supported.
fn validate_redirect_uri(client_id: &str, redirect_uri: &str) -> RequestResult<()> {
    Url::parse(redirect_uri).map_err(|_| RequestError::InvalidRedirectUri)?;

    match (raw_host_port(client_id), raw_host_port(redirect_uri)) {
        (Some(client), Some(redirect)) if client == redirect => Ok(()),
        _ => Err(RequestError::InvalidRedirectUri),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(require_pkce: bool) -> Server {
        Server::with_http_client(require_pkce, reqwest::Client::new())
    }

    fn base_form() -> FormValues {
        [
            ("client_id", "https://example.com/"),
            ("redirect_uri", "https://example.com/callback"),
            ("state", "abc123"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_scope_split_preserves_order() {
        let mut form = base_form();
        form.append("scope", "profile create  email");
        let req = server(false).parse_authorization(&form).unwrap();
        assert_eq!(req.scopes, vec!["profile", "create", "email"]);
    }

    #[test]
    fn test_legacy_scopes_fallback() {
        let mut form = base_form();
        form.append("scopes", "profile");
        form.append("scopes", "email");
        let req = server(false).parse_authorization(&form).unwrap();
        assert_eq!(req.scopes, vec!["profile", "email"]);
    }

    #[test]
    fn test_no_scope_is_empty() {
        let req = server(false).parse_authorization(&base_form()).unwrap();
        assert!(req.scopes.is_empty());
        assert!(req.code_challenge.is_empty());
        assert!(req.code_challenge_method.is_empty());
    }

    #[test]
    fn test_redirect_on_other_port_is_rejected() {
        let form: FormValues = [
            ("client_id", "http://127.0.0.1:3000/"),
            ("redirect_uri", "http://127.0.0.1:4000/callback"),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            server(false).parse_authorization(&form),
            Err(RequestError::InvalidRedirectUri)
        );
    }

    #[test]
    fn test_redirect_host_is_compared_as_written() {
        for (client_id, redirect_uri) in [
            ("https://Example.com/", "https://example.com/callback"),
            ("https://example.com:443/", "https://example.com/callback"),
            ("https://example.com/", "https://example.com:443/callback"),
        ] {
            let form: FormValues =
                [("client_id", client_id), ("redirect_uri", redirect_uri)].into_iter().collect();
            assert_eq!(
                server(false).parse_authorization(&form),
                Err(RequestError::InvalidRedirectUri),
                "{client_id} {redirect_uri}"
            );
        }
    }

    #[test]
    fn test_challenge_method_ignored_without_challenge() {
        let mut form = base_form();
        form.append("code_challenge_method", "unknown");
        let req = server(false).parse_authorization(&form).unwrap();
        assert!(req.code_challenge_method.is_empty());
    }

    #[test]
    fn test_s256_exchange() {
        let verifier = challenges::new_verifier().unwrap();
        let request = AuthenticationRequest {
            redirect_uri: "https://example.com/callback".into(),
            client_id: "https://example.com/".into(),
            scopes: vec![],
            state: String::new(),
            code_challenge: challenges::s256_challenge(&verifier),
            code_challenge_method: challenges::S256.into(),
        };

        let mut form = base_form();
        form.append("code_verifier", verifier.as_str());
        assert_eq!(server(true).validate_token_exchange(&request, &form), Ok(()));
    }
}
