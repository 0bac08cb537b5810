//! Profile URL and client identifier validation.
//!
//! See <https://indieauth.spec.indieweb.org/#user-profile-url> and
//! <https://indieauth.spec.indieweb.org/#client-identifier>.
//!
//! Checks run in a fixed order and the first violated rule is reported. The
//! path and port rules look at the URL as written: the `url` crate normalises
//! away dot segments, default ports and empty paths, all of which must still be
//! rejected here.

use percent_encoding::percent_decode_str;
use url::{Host, Url};

use crate::error::IdentifierError;

/// Validate a user profile URL.
pub fn is_valid_profile_url(profile: &str) -> Result<(), IdentifierError> {
    let url = check_common(profile)?;

    if has_port(&url, profile) {
        return Err(IdentifierError::PortIsSet);
    }

    match url.host() {
        Some(Host::Ipv4(_) | Host::Ipv6(_)) => Err(IdentifierError::IsIp),
        _ => Ok(()),
    }
}

/// Validate a client identifier.
///
/// Looser than profile URLs: ports are allowed, and literal IP hosts are allowed
/// as long as they are loopback addresses, to support clients under development.
pub fn is_valid_client_identifier(identifier: &str) -> Result<(), IdentifierError> {
    let url = check_common(identifier)?;

    let loopback = match url.host() {
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        _ => true,
    };

    if loopback { Ok(()) } else { Err(IdentifierError::IsNonLoopback) }
}

/// Canonicalize a URL: default to `https://` when no scheme is given and make
/// sure the path is at least `/`.
///
/// Never fails; input that cannot be parsed is returned unchanged.
#[must_use]
pub fn canonicalize_url(input: &str) -> String {
    let with_scheme = if input.starts_with("http://") || input.starts_with("https://") {
        input.to_owned()
    } else {
        format!("https://{input}")
    };

    match Url::parse(&with_scheme) {
        Ok(mut url) => {
            if url.path().is_empty() {
                url.set_path("/");
            }
            url.into()
        }
        Err(_) => input.to_owned(),
    }
}

/// Rules shared by profile URLs and client identifiers: scheme, path, fragment
/// and userinfo.
fn check_common(input: &str) -> Result<Url, IdentifierError> {
    let url = match Url::parse(input) {
        Ok(url) => url,
        // A bare host such as "example.com" has no scheme at all.
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            return Err(IdentifierError::InvalidScheme);
        }
        Err(e) => return Err(e.into()),
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(IdentifierError::InvalidScheme);
    }

    let path = raw_path(input).unwrap_or_else(|| url.path());
    if path.is_empty() {
        return Err(IdentifierError::EmptyPath);
    }

    // NOTE: this rejects any dot in the path, e.g. "/about.html", not only
    // "." and ".." segments. Encoded dots ("%2e") count too.
    if percent_decode_str(path).decode_utf8_lossy().contains('.') {
        return Err(IdentifierError::InvalidPath);
    }

    if url.fragment().is_some_and(|f| !f.is_empty()) {
        return Err(IdentifierError::InvalidFragment);
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(IdentifierError::UserIsSet);
    }

    Ok(url)
}

/// The authority of `input` as written, if it has the `scheme://` form.
fn raw_authority(input: &str) -> Option<&str> {
    let (_, rest) = input.split_once("://")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// `host[:port]` of `input` as written, without any userinfo.
pub(crate) fn raw_host_port(input: &str) -> Option<&str> {
    let authority = raw_authority(input)?;
    Some(authority.rsplit_once('@').map_or(authority, |(_, hp)| hp))
}

/// The path of `input` as written, if it has the `scheme://` form.
fn raw_path(input: &str) -> Option<&str> {
    let authority = raw_authority(input)?;
    let (_, rest) = input.split_once("://")?;
    let tail = &rest[authority.len()..];
    let end = tail.find(['?', '#']).unwrap_or(tail.len());
    Some(&tail[..end])
}

/// Whether a port is present, including a default port the parser dropped.
fn has_port(url: &Url, input: &str) -> bool {
    if url.port().is_some() {
        return true;
    }

    let Some(host_port) = raw_host_port(input) else {
        return false;
    };

    let after_host = if host_port.starts_with('[') {
        host_port.split_once(']').map_or("", |(_, rest)| rest)
    } else {
        host_port.find(':').map_or("", |i| &host_port[i..])
    };

    after_host.strip_prefix(':').is_some_and(|port| !port.is_empty())
}
