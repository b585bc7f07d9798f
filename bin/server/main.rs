//! Chat Completion Proxy Server
//!
//! Runs the proxy as a standalone HTTP server.

use anyhow::Result;
use clap::Parser;
use completion_proxy::config::{DEFAULT_MAX_BODY_BYTES, DEFAULT_ROUTE, DEFAULT_UPSTREAM_URL};
use completion_proxy::{run_server, ProxyConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "completion-proxy")]
#[command(about = "Forwards chat completion requests upstream with a server-held API key")]
struct Args {
    /// Upstream API key (sent as a bearer token)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Upstream chat completion endpoint
    #[arg(long, default_value = DEFAULT_UPSTREAM_URL, env = "UPSTREAM_URL")]
    upstream_url: String,

    /// Upstream request timeout in seconds (transport default when unset)
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Server host
    #[arg(long, default_value = "0.0.0.0", env = "PROXY_HOST")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "8888", env = "PROXY_PORT")]
    port: u16,

    /// Path the proxy is served on
    #[arg(long, default_value = DEFAULT_ROUTE, env = "PROXY_ROUTE")]
    route: String,

    /// Maximum inbound body size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES, env = "MAX_BODY_BYTES")]
    max_body_bytes: usize,
}

impl From<Args> for ProxyConfig {
    fn from(args: Args) -> Self {
        Self {
            upstream_url: args.upstream_url,
            api_key: args.api_key,
            timeout_secs: args.timeout_secs,
            host: args.host,
            port: args.port,
            route: args.route,
            max_body_bytes: args.max_body_bytes,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("completion_proxy=debug,info")),
        )
        .init();

    let config = ProxyConfig::from(Args::parse());

    info!("Starting Chat Completion Proxy");
    info!("  Config: {:?}", config);

    run_server(config).await
}
