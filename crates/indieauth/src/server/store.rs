//! Authorization code and access token storage.
//!
//! [`Server`](super::Server) never persists anything itself. The HTTP layer
//! goes through the [`AuthorizationStore`] capability so deployments can swap
//! the in-memory [`MemoryStore`] for a database without touching the handlers.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;

use super::AuthenticationRequest;
use crate::config::Config;

/// Storage for pending authorization codes and issued access tokens.
#[async_trait]
pub trait AuthorizationStore: Send + Sync {
    /// Persist an approved request and return the code it was stored under.
    async fn store_authorization(&self, request: AuthenticationRequest) -> String;

    /// Remove and return the request stored under `code`.
    ///
    /// Codes are single use: a second call with the same code returns `None`,
    /// as does a call after the code expired.
    async fn take_authorization(&self, code: &str) -> Option<AuthenticationRequest>;

    /// Mint an access token for `me` covering the scopes of `request`.
    async fn issue_token(&self, me: &str, request: &AuthenticationRequest) -> IssuedToken;

    /// Look up a live access token.
    async fn lookup_token(&self, access_token: &str) -> Option<IssuedToken>;
}

/// An access token and what it grants.
#[derive(Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub me: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// Space-separated scope string, as sent on the wire.
    #[must_use]
    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }

    /// Seconds until the token expires, never negative.
    #[must_use]
    pub fn expires_in(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }

    /// Whether the token is past its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("me", &self.me)
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// In-memory store with time-to-live expiry.
///
/// Entries are evicted by `moka` once their lifetime passes, so no cleanup task
/// is needed.
#[derive(Clone)]
pub struct MemoryStore {
    codes: Cache<String, AuthenticationRequest>,
    tokens: Cache<String, IssuedToken>,
    token_ttl: Duration,
}

impl MemoryStore {
    /// Create a store with the lifetimes and capacity from `config`.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_ttl(
            config.authorization_code_ttl,
            config.access_token_ttl,
            config.store_max_capacity,
        )
    }

    /// Create a store with explicit lifetimes.
    #[must_use]
    pub fn with_ttl(code_ttl: Duration, token_ttl: Duration, max_capacity: u64) -> Self {
        Self {
            codes: Cache::builder().max_capacity(max_capacity).time_to_live(code_ttl).build(),
            tokens: Cache::builder().max_capacity(max_capacity).time_to_live(token_ttl).build(),
            token_ttl,
        }
    }

    /// Generate a random code or token using two UUIDs (256 bits).
    fn generate_token() -> String {
        format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("codes", &self.codes.entry_count())
            .field("tokens", &self.tokens.entry_count())
            .finish()
    }
}

#[async_trait]
impl AuthorizationStore for MemoryStore {
    async fn store_authorization(&self, request: AuthenticationRequest) -> String {
        let code = Self::generate_token();
        self.codes.insert(code.clone(), request).await;
        code
    }

    async fn take_authorization(&self, code: &str) -> Option<AuthenticationRequest> {
        self.codes.remove(code).await
    }

    async fn issue_token(&self, me: &str, request: &AuthenticationRequest) -> IssuedToken {
        let issued_at = Utc::now();
        let lifetime = chrono::Duration::from_std(self.token_ttl).unwrap_or(chrono::Duration::MAX);

        let token = IssuedToken {
            access_token: Self::generate_token(),
            me: me.to_owned(),
            client_id: request.client_id.clone(),
            scopes: request.scopes.clone(),
            issued_at,
            expires_at: issued_at.checked_add_signed(lifetime).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        self.tokens.insert(token.access_token.clone(), token.clone()).await;
        token
    }

    async fn lookup_token(&self, access_token: &str) -> Option<IssuedToken> {
        self.tokens.get(access_token).await.filter(|t| !t.is_expired())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AuthenticationRequest {
        AuthenticationRequest {
            redirect_uri: "https://app.example/callback".into(),
            client_id: "https://app.example/".into(),
            scopes: vec!["profile".into(), "create".into()],
            state: "state".into(),
            code_challenge: String::new(),
            code_challenge_method: String::new(),
        }
    }

    #[tokio::test]
    async fn test_code_is_single_use() {
        let store = MemoryStore::default();
        let code = store.store_authorization(request()).await;
        assert_eq!(code.len(), 64);

        assert_eq!(store.take_authorization(&code).await, Some(request()));
        assert!(store.take_authorization(&code).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let store = MemoryStore::default();
        assert!(store.take_authorization("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_code_expires() {
        let store =
            MemoryStore::with_ttl(Duration::from_millis(50), Duration::from_secs(60), 100);
        let code = store.store_authorization(request()).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(store.take_authorization(&code).await.is_none());
    }

    #[tokio::test]
    async fn test_token_lifecycle() {
        let store = MemoryStore::default();
        let token = store.issue_token("https://me.example/", &request()).await;

        assert_eq!(token.scope(), "profile create");
        assert!(token.expires_in() > 24 * 3600 - 60);

        let found = store.lookup_token(&token.access_token).await.unwrap();
        assert_eq!(found.me, "https://me.example/");
        assert_eq!(found.client_id, "https://app.example/");

        assert!(store.lookup_token("invalid").await.is_none());
    }

    #[test]
    fn test_debug_hides_access_token() {
        let token = IssuedToken {
            access_token: "secret-value".into(),
            me: "https://me.example/".into(),
            client_id: "https://app.example/".into(),
            scopes: vec![],
            issued_at: Utc::now(),
            expires_at: Utc::now(),
        };
        assert!(!format!("{token:?}").contains("secret-value"));
        assert!(token.is_expired());
    }
}
