//! IndieAuth
//!
//! Client and server building blocks for IndieAuth, the OAuth 2.0 based
//! protocol where users sign in with a URL they own.
//!
//! # Features
//!
//! - **PKCE**: `plain` and `S256` challenges, verifier and state generation
//! - **Identifiers**: profile URL and client identifier validation and
//!   canonicalization
//! - **Server**: authorization request parsing and code exchange validation,
//!   client `h-app` metadata discovery, and a small axum server
//! - **Client**: metadata and endpoint discovery, authorization URL building,
//!   callback validation, token and profile exchange
//!
//! # Example
//!
//! ```no_run
//! use indieauth::{Client, Config, form::FormValues};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let client = Client::new("https://app.example/", "https://app.example/callback", &config)?;
//!
//!     let (info, url) = client.authenticate("https://me.example/", "profile create").await?;
//!     println!("redirect the user to {url}");
//!
//!     // ...later, with the query string of the callback request:
//!     let code = client.validate_callback(&info, &FormValues::parse("code=...&state=..."))?;
//!     let token = client.get_token(&info, &code).await?;
//!     println!("signed in as {:?}", indieauth::client::profile_from_token(&token));
//!     Ok(())
//! }
//! ```

pub mod challenges;
pub mod client;
pub mod config;
pub mod error;
pub mod form;
pub mod identifier;
pub mod microformats;
pub mod server;

pub use client::{AuthInfo, CancelExt, Client, Metadata, Profile, Token};
pub use config::Config;
pub use error::{ClientError, IdentifierError, RequestError};
pub use server::{AuthenticationRequest, Server};
