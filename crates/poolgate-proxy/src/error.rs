//! Proxy error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("No route for {0}")]
    NoRoute(String),

    #[error("Invalid forwarding target: {0}")]
    InvalidTarget(String),

    #[error("Forwarding failed: {0}")]
    Forwarding(#[from] reqwest::Error),
}
