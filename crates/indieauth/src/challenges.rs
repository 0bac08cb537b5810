//! PKCE (Proof Key for Code Exchange) generation and verification.
//!
//! Implements the `plain` and `S256` code challenge methods of RFC 7636.
//!
//! Length bounds are not checked here. Callers validate that challenges and
//! verifiers received from the network are within [`MIN_LENGTH`]..=[`MAX_LENGTH`]
//! before asking whether they match.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::error::RandomSourceError;

/// Minimum length of a code verifier or code challenge (RFC 7636 §4.1).
pub const MIN_LENGTH: usize = 43;

/// Maximum length of a code verifier or code challenge (RFC 7636 §4.1).
pub const MAX_LENGTH: usize = 128;

/// Code challenge methods supported by this crate.
pub const CODE_CHALLENGE_METHODS: &[&str] = &[PLAIN, S256];

/// The `plain` method: the challenge is the verifier itself.
pub const PLAIN: &str = "plain";

/// The `S256` method: the challenge is the SHA-256 of the verifier.
pub const S256: &str = "S256";

/// Random bytes behind every verifier and state value.
const RANDOM_BYTES: usize = 64;

/// Returns whether `method` is a supported code challenge method.
#[must_use]
pub fn is_valid_code_challenge_method(method: &str) -> bool {
    CODE_CHALLENGE_METHODS.contains(&method)
}

/// Returns whether `len` is within the RFC 7636 bounds.
#[must_use]
pub const fn is_valid_length(len: usize) -> bool {
    len >= MIN_LENGTH && len <= MAX_LENGTH
}

/// Validate a code challenge against its code verifier.
///
/// Unknown methods never match. No normalisation is applied to either side.
#[must_use]
pub fn validate_code_challenge(method: &str, challenge: &str, verifier: &str) -> bool {
    match method {
        PLAIN => verifier == challenge,
        S256 => s256_challenge(verifier) == challenge,
        _ => false,
    }
}

/// Compute `BASE64URL-ENCODE(SHA256(ASCII(code_verifier)))`.
///
/// The output is always 43 characters: base64url of 32 bytes without padding.
#[must_use]
pub fn s256_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate a new code verifier.
///
/// 64 random bytes become 86 characters of unreserved base64url alphabet, which
/// sits inside the 43..=128 window.
pub fn new_verifier() -> Result<String, RandomSourceError> {
    random_token()
}

/// Generate a new `state` value.
///
/// OAuth 2.0 requires state to be printable ASCII (RFC 6749 Appendix A.5), which
/// base64url satisfies.
pub fn new_state() -> Result<String, RandomSourceError> {
    random_token()
}

fn random_token() -> Result<String, RandomSourceError> {
    let mut bytes = [0u8; RANDOM_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
