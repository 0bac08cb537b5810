//! IndieAuth Server - Entry Point
//!
//! Single-user authorization and token endpoint for one profile URL.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use indieauth::{
    Config, Server,
    identifier::{canonicalize_url, is_valid_profile_url},
    server::{MemoryStore, transport},
};

#[derive(Parser, Debug)]
#[command(name = "indieauth-server")]
#[command(about = "Single-user IndieAuth authorization server")]
#[command(version)]
struct Cli {
    /// Profile URL of the user this server signs in
    #[arg(long, env = "INDIEAUTH_ME")]
    me: String,

    /// HTTP server port
    #[arg(long, default_value = "8080", env = "PORT")]
    port: u16,

    /// Public base URL of this server (e.g., https://auth.example.com)
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,

    /// Require PKCE on every authorization request
    #[arg(long, env = "INDIEAUTH_REQUIRE_PKCE")]
    require_pkce: Option<bool>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    let mut config = Config::from_env()?;
    if let Some(require_pkce) = cli.require_pkce {
        config.require_pkce = require_pkce;
    }

    let me = canonicalize_url(&cli.me);
    if let Err(e) = is_valid_profile_url(&me) {
        tracing::warn!(me = %me, error = %e, "Profile URL does not meet IndieAuth requirements");
    }

    let base_url = cli.base_url.unwrap_or_else(|| format!("http://localhost:{}", cli.port));

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        me = %me,
        base_url = %base_url,
        require_pkce = config.require_pkce,
        "Starting IndieAuth server"
    );

    let server = Server::new(&config)?;
    let store = Arc::new(MemoryStore::new(&config));
    let state = transport::HttpState::new(server, store, base_url, me);

    transport::run_http(state, cli.port).await
}
