//! Chat Completion Proxy
//!
//! Relays chat-completion requests from browsers to an upstream LLM API,
//! attaching a server-held API key so it never reaches the client.
//!
//! ## Module Structure
//!
//! - `config`: Proxy configuration (upstream URL, API key, listener)
//! - `error`: Error taxonomy and its HTTP encoding
//! - `proxy`: The request handler
//! - `server`: axum router and server startup

/// Proxy configuration
pub mod config;

/// Error types and HTTP responses
pub mod error;

/// Chat completion proxy handler
pub mod proxy;

/// HTTP server
pub mod server;

pub use config::ProxyConfig;
pub use error::{ErrorBody, ProxyError};
pub use proxy::ProxyHandler;
pub use server::{router, run_server, ProxyServerState};
