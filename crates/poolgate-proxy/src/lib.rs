//! Poolgate Forwarding Client
//!
//! This crate builds and sends the outbound half of a proxied request:
//! retargeting to a node, header hygiene and client-address propagation.

pub mod error;
pub mod forwarder;

pub use error::ProxyError;
pub use forwarder::{Forwarder, ForwarderConfig, outbound_headers};
