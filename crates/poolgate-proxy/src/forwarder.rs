//! Outbound request forwarding to backend nodes

use http::header::{CONNECTION, TRANSFER_ENCODING};
use http::request::Parts;
use http::{HeaderMap, HeaderValue, Version};
use reqwest::redirect::Policy;
use reqwest::{Body, Client, Request, Response, Url};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::ProxyError;

/// Forwarder configuration
#[derive(Clone, Debug)]
pub struct ForwarderConfig {
    /// How long an idle keep-alive connection to a node is kept
    pub pool_idle_timeout: Option<Duration>,
    /// Idle keep-alive connections kept per node
    pub pool_max_idle_per_host: usize,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

/// HTTP/1.1 client that relays requests to nodes.
///
/// Redirects are never followed and no request timeout is applied; a slow
/// node holds only its own request.
#[derive(Clone, Debug)]
pub struct Forwarder {
    client: Client,
}

impl Forwarder {
    pub fn new(config: ForwarderConfig) -> Result<Self, ProxyError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .http1_only()
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()?;

        info!(
            "Created forwarder (idle timeout: {:?}, max idle per node: {})",
            config.pool_idle_timeout, config.pool_max_idle_per_host
        );

        Ok(Self { client })
    }

    /// Build the outbound copy of an inbound request aimed at `node_host`.
    ///
    /// The scheme becomes plain `http`, the version HTTP/1.1, and the headers
    /// go through [`outbound_headers`].
    pub fn build_request(
        &self,
        node_host: &str,
        parts: &Parts,
        remote: Option<SocketAddr>,
        body: Body,
    ) -> Result<Request, ProxyError> {
        let url = target_url(node_host, parts)?;

        let mut request = Request::new(parts.method.clone(), url);
        *request.version_mut() = Version::HTTP_11;
        *request.headers_mut() = outbound_headers(&parts.headers, remote);
        *request.body_mut() = Some(body);

        Ok(request)
    }

    /// Execute an outbound request. Failures are not retried.
    pub async fn send(&self, request: Request) -> Result<Response, ProxyError> {
        debug!("Forwarding {} {}", request.method(), request.url());
        Ok(self.client.execute(request).await?)
    }

    /// Build and send in one step
    pub async fn forward(
        &self,
        node_host: &str,
        parts: &Parts,
        remote: Option<SocketAddr>,
        body: Body,
    ) -> Result<Response, ProxyError> {
        let request = self.build_request(node_host, parts, remote, body)?;
        self.send(request).await
    }
}

/// `http://{node_host}{path_and_query}`
fn target_url(node_host: &str, parts: &Parts) -> Result<Url, ProxyError> {
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let raw = format!("http://{}{}", node_host, path_and_query);
    Url::parse(&raw).map_err(|e| ProxyError::InvalidTarget(format!("{}: {}", raw, e)))
}

/// Header set sent to the node.
///
/// The inbound headers are copied, including `Host`. A `Connection` header is
/// stripped, `Transfer-Encoding` is left for the client to recompute, and
/// `X-Forwarded-For` is set to the caller's IP when it is known.
pub fn outbound_headers(inbound: &HeaderMap, remote: Option<SocketAddr>) -> HeaderMap {
    let mut headers = inbound.clone();

    headers.remove(CONNECTION);
    headers.remove(TRANSFER_ENCODING);

    if let Some(addr) = remote
        && let Ok(value) = HeaderValue::from_str(&addr.ip().to_string())
    {
        headers.insert("x-forwarded-for", value);
    }

    headers
}
