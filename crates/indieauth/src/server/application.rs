//! Client application metadata (`h-app`) discovery.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::Server;
use crate::error::{ClientError, ClientResult};
use crate::identifier::is_valid_client_identifier;
use crate::microformats;

const APP_TYPES: &[&str] = &["h-app", "h-x-app"];

/// Information a client publishes about itself, for display on the
/// authorization page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationMetadata {
    pub name: String,
    pub url: String,
    pub logo: String,
    pub summary: String,
    pub author: String,
}

impl ApplicationMetadata {
    fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.url.is_empty()
            && self.logo.is_empty()
            && self.summary.is_empty()
            && self.author.is_empty()
    }
}

impl Server {
    /// Fetch the client identifier URL and read the first `h-app` (or legacy
    /// `h-x-app`) item that carries any information.
    ///
    /// Failure here is not fatal to an authorization: callers can show the bare
    /// client identifier instead.
    ///
    /// # Errors
    ///
    /// - `ClientError::Identifier` if `client_id` is not a valid client identifier
    /// - `ClientError::UnexpectedStatus` unless the response is 200
    /// - `ClientError::UnexpectedContentType` unless the response is HTML
    /// - `ClientError::NoApplicationMetadata` if no usable item is found
    pub async fn discover_application_metadata(
        &self,
        client_id: &str,
    ) -> ClientResult<ApplicationMetadata> {
        is_valid_client_identifier(client_id)?;

        let response = self.http().get(client_id).header(ACCEPT, "text/html").send().await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ClientError::unexpected_status(
                status.as_u16(),
                format!("expected 200 from {client_id}"),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        if !content_type.contains("text/html") {
            return Err(ClientError::UnexpectedContentType(content_type));
        }

        let base = response.url().clone();
        let body = response.text().await?;

        let metadata = microformats::parse(&body, &base)
            .iter()
            .filter(|item| APP_TYPES.iter().any(|ty| item.has_type(ty)))
            .map(|item| {
                let string = |name: &str| item.first_string(name).unwrap_or_default().to_owned();
                let logo = item.first_string("logo").or_else(|| item.first_string("photo"));
                ApplicationMetadata {
                    name: string("name"),
                    url: string("url"),
                    logo: logo.unwrap_or_default().to_owned(),
                    summary: string("summary"),
                    author: string("author"),
                }
            })
            .find(|metadata| !metadata.is_empty());

        match metadata {
            Some(metadata) => {
                tracing::debug!(client_id = %client_id, name = %metadata.name, "Discovered application metadata");
                Ok(metadata)
            }
            None => Err(ClientError::NoApplicationMetadata),
        }
    }
}
