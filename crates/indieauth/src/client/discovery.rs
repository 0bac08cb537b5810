//! Authorization server discovery.
//!
//! Tries the `indieauth-metadata` document first and falls back to the legacy
//! `authorization_endpoint` / `token_endpoint` relations. Each relation lookup
//! asks with `HEAD` first and only then with `GET`; that is a fixed two-step
//! lookup, not a retry.

use reqwest::Method;
use reqwest::header::ACCEPT;
use url::Url;

use super::links::{header_links, html_links};
use super::{Client, Metadata};
use crate::error::{ClientError, ClientResult};

pub const AUTHORIZATION_ENDPOINT_REL: &str = "authorization_endpoint";
pub const TOKEN_ENDPOINT_REL: &str = "token_endpoint";
pub const INDIEAUTH_METADATA_REL: &str = "indieauth-metadata";

/// Endpoints found by one request, one slot per relation asked for.
type Endpoints = Vec<Option<String>>;

impl Client {
    /// Discover the authorization server metadata for `url`.
    ///
    /// When only legacy relations are published, the returned metadata carries
    /// just the authorization endpoint and the token endpoint (copied into
    /// `revocation_endpoint` as well). A missing token endpoint is not an error.
    ///
    /// # Errors
    ///
    /// `ClientError::NoEndpointFound` if no authorization endpoint can be found,
    /// or the transport error of the last request if every request failed.
    pub async fn discover_metadata(&self, url: &str) -> ClientResult<Metadata> {
        match self.fetch_metadata(url).await {
            Ok(metadata) => return Ok(metadata),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "No metadata document, trying legacy endpoints");
            }
        }

        let mut endpoints = self
            .discover_endpoints(url, &[AUTHORIZATION_ENDPOINT_REL, TOKEN_ENDPOINT_REL])
            .await?
            .into_iter();

        let authorization_endpoint = endpoints.next().flatten();
        let token_endpoint = endpoints.next().flatten().unwrap_or_default();

        let Some(authorization_endpoint) = authorization_endpoint else {
            tracing::warn!(url = %url, "No authorization endpoint found");
            return Err(ClientError::NoEndpointFound);
        };

        Ok(Metadata {
            authorization_endpoint,
            revocation_endpoint: token_endpoint.clone(),
            token_endpoint,
            ..Metadata::default()
        })
    }

    /// Discover the endpoint published at `url` under relation `rel`.
    ///
    /// The result is absolute, resolved against the final URL after redirects.
    pub async fn discover_link_endpoint(&self, url: &str, rel: &str) -> ClientResult<String> {
        self.discover_endpoints(url, &[rel])
            .await?
            .into_iter()
            .next()
            .flatten()
            .ok_or(ClientError::NoEndpointFound)
    }

    async fn fetch_metadata(&self, url: &str) -> ClientResult<Metadata> {
        let metadata_url = self.discover_link_endpoint(url, INDIEAUTH_METADATA_REL).await?;

        let response = self.http.get(&metadata_url).header(ACCEPT, "application/json").send().await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ClientError::unexpected_status(
                status.as_u16(),
                format!("expected 200 from {metadata_url}"),
            ));
        }

        let body = response.text().await?;
        let metadata: Metadata = serde_json::from_str(&body)?;

        tracing::debug!(url = %metadata_url, issuer = %metadata.issuer, "Fetched server metadata");
        Ok(metadata)
    }

    /// Look up `rels` with `HEAD`, then `GET`, merging partial answers.
    ///
    /// A relation found by `HEAD` wins over the same relation found by `GET`.
    async fn discover_endpoints(&self, url: &str, rels: &[&str]) -> ClientResult<Endpoints> {
        let head = self.discover_request(Method::HEAD, url, rels).await;
        if let Ok((endpoints, true)) = &head {
            return Ok(endpoints.clone());
        }

        let get = self.discover_request(Method::GET, url, rels).await;
        if let Ok((endpoints, true)) = &get {
            return Ok(endpoints.clone());
        }

        match (head, get) {
            (Err(_), Err(e)) => Err(e),
            (head, get) => {
                let head = head.map(|(e, _)| e).unwrap_or_default();
                let get = get.map(|(e, _)| e).unwrap_or_default();
                Ok((0..rels.len())
                    .map(|i| {
                        head.get(i).cloned().flatten().or_else(|| get.get(i).cloned().flatten())
                    })
                    .collect())
            }
        }
    }

    /// One discovery request. Returns the endpoints found and whether every
    /// relation was found.
    async fn discover_request(
        &self,
        method: Method,
        url: &str,
        rels: &[&str],
    ) -> ClientResult<(Endpoints, bool)> {
        let response = self.http.request(method.clone(), url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::unexpected_status(
                status.as_u16(),
                format!("{method} {url} failed"),
            ));
        }

        let base = response.url().clone();

        // Link headers first; the body is only read when they are incomplete.
        let mut endpoints = header_links(response.headers(), rels);
        if endpoints.iter().any(Option::is_none) {
            let body = response.text().await?;
            let from_html = html_links(&body, rels);
            for (slot, html) in endpoints.iter_mut().zip(from_html) {
                if slot.is_none() {
                    *slot = html;
                }
            }
        }

        let endpoints = endpoints
            .into_iter()
            .map(|e| e.map(|href| resolve(&base, &href)).transpose())
            .collect::<ClientResult<Endpoints>>()?;

        let found = endpoints.iter().all(Option::is_some);
        tracing::debug!(method = %method, url = %url, found, "Discovery request");
        Ok((endpoints, found))
    }
}

fn resolve(base: &Url, href: &str) -> ClientResult<String> {
    Ok(base.join(href)?.into())
}
