//! Error types for IndieAuth clients and servers.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! Every failure is a distinct variant so callers can match on the kind instead of
//! the message text.

/// Violations of the profile URL and client identifier shape rules.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// The input could not be parsed as a URL.
    #[error("invalid URL: {0}")]
    Parse(#[from] url::ParseError),

    /// Scheme is neither `http` nor `https`.
    #[error("scheme must be either http or https")]
    InvalidScheme,

    /// The URL has no path component.
    #[error("path must not be empty")]
    EmptyPath,

    /// The path contains single or double dots.
    #[error("path cannot contain single or double dots")]
    InvalidPath,

    /// The URL carries a fragment.
    #[error("fragment must be empty")]
    InvalidFragment,

    /// The URL carries a user and/or password.
    #[error("user and or password must not be set")]
    UserIsSet,

    /// The URL carries an explicit port.
    #[error("port must not be set")]
    PortIsSet,

    /// The host is a literal IP address.
    #[error("profile cannot be ip address")]
    IsIp,

    /// The host is a literal IP address that is not a loopback address.
    #[error("client id cannot be non-loopback ip")]
    IsNonLoopback,
}

/// Errors in inbound authorization and token exchange requests.
///
/// All of these are client mistakes (or tampering) and surface as HTTP 400 with the
/// OAuth error code `invalid_request`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("response_type must be code")]
    InvalidResponseType,

    #[error("invalid client_id: {0}")]
    InvalidClientIdentifier(#[source] IdentifierError),

    #[error("redirect uri has different host from client id")]
    InvalidRedirectUri,

    #[error("code_challenge length must be between 43 and 128 characters long")]
    WrongCodeChallengeLength,

    #[error("code_challenge_method not supported")]
    InvalidCodeChallengeMethod,

    #[error("code_challenge and code_challenge_method are required")]
    PkceRequired,

    #[error("grant_type must be authorization_code")]
    InvalidGrantType,

    #[error("client_id differs")]
    NoMatchClientId,

    #[error("redirect_uri differs")]
    NoMatchRedirectUri,

    #[error("code_verifier length must be between 43 and 128 characters long")]
    WrongCodeVerifierLength,

    #[error("code challenge failed")]
    CodeChallengeFailed,
}

impl RequestError {
    /// OAuth 2.0 error code for the response body (RFC 6749 §5.2).
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        "invalid_request"
    }

    /// HTTP status code the error should be served with.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        400
    }
}

/// The operating system random source failed.
#[derive(thiserror::Error, Debug)]
#[error("random source failure: {0}")]
pub struct RandomSourceError(#[from] rand::Error);

/// Errors from outbound HTTP calls and the client-side flow.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// A discovered or configured URL is not valid
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The remote answered with a status other than the expected one
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },

    /// The remote answered with an unexpected content type
    #[error("Unexpected content type: {0:?}")]
    UnexpectedContentType(String),

    /// No endpoint for the requested relation was found
    #[error("no endpoint found")]
    NoEndpointFound,

    /// No `h-app` or `h-x-app` item was found at the client identifier URL
    #[error("application metadata (h-app, h-x-app) not found")]
    NoApplicationMetadata,

    #[error("code not found")]
    CodeNotFound,

    #[error("state not found")]
    StateNotFound,

    #[error("state does not match")]
    InvalidState,

    #[error("issuer does not match")]
    InvalidIssuer,

    /// The URL to fetch failed identifier validation
    #[error("Invalid identifier: {0}")]
    Identifier(#[from] IdentifierError),

    #[error(transparent)]
    RandomSource(#[from] RandomSourceError),

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,
}

impl ClientError {
    /// Create an unexpected status error.
    #[must_use]
    pub fn unexpected_status(status: u16, message: impl Into<String>) -> Self {
        Self::UnexpectedStatus { status, message: message.into() }
    }

    /// Returns true if the error comes from the network or the remote response
    /// rather than from the protocol flow itself.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Parse(_) | Self::UnexpectedStatus { .. } | Self::UnexpectedContentType(_)
        )
    }

    /// Returns true if the callback or metadata did not match what was issued.
    #[must_use]
    pub const fn is_mismatch(&self) -> bool {
        matches!(self, Self::InvalidState | Self::InvalidIssuer)
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type alias for inbound request validation.
pub type RequestResult<T> = Result<T, RequestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_errors_are_invalid_request() {
        for err in [
            RequestError::InvalidResponseType,
            RequestError::PkceRequired,
            RequestError::CodeChallengeFailed,
            RequestError::InvalidClientIdentifier(IdentifierError::IsIp),
        ] {
            assert_eq!(err.error_code(), "invalid_request");
            assert_eq!(err.status_code(), 400);
        }
    }

    #[test]
    fn test_invalid_client_identifier_keeps_source() {
        let err = RequestError::InvalidClientIdentifier(IdentifierError::EmptyPath);
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("path must not be empty"));
        assert!(err.to_string().contains("invalid client_id"));
    }

    #[test]
    fn test_client_error_classification() {
        assert!(ClientError::unexpected_status(500, "boom").is_transport());
        assert!(!ClientError::NoEndpointFound.is_transport());

        assert!(ClientError::InvalidState.is_mismatch());
        assert!(ClientError::InvalidIssuer.is_mismatch());
        assert!(!ClientError::CodeNotFound.is_mismatch());
    }
}
