//! Data-plane forwarding handler
//!
//! Each request is resolved to a node under the registry lock, counted
//! against it, forwarded without the lock, and streamed back. The count is
//! released once the response body has been fully relayed, the client went
//! away, or forwarding failed.

use axum::{
    body::{Body, HttpBody},
    extract::{ConnectInfo, Request, State},
    response::Response,
};
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use poolgate_core::{ConnectionLease, RouteRequest};
use poolgate_proxy::ProxyError;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, error};

use super::metrics::PROXY_REQUESTS;
use crate::error::ApiError;
use crate::state::AppState;

/// Fallback handler of the data plane
pub(super) async fn forward(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let (parts, body) = request.into_parts();

    let route = RouteRequest::from_parts(&parts);
    let Some(lease) = state.registry.acquire(&route) else {
        metrics::counter!(PROXY_REQUESTS, "outcome" => "no_route").increment(1);
        return Err(ProxyError::NoRoute(format!("{}{}", route.host, route.path)).into());
    };

    let outbound_body = if body.size_hint().exact() == Some(0) {
        reqwest::Body::from(Bytes::new())
    } else {
        reqwest::Body::wrap_stream(body.into_data_stream())
    };

    let target = lease.target();
    let upstream = match state
        .forwarder
        .forward(lease.host(), &parts, remote, outbound_body)
        .await
    {
        Ok(upstream) => upstream,
        Err(e) => {
            error!(
                "Forwarding {} {} to node {} ({}) failed: {}",
                parts.method, parts.uri, target.node, target.host, e
            );
            metrics::counter!(PROXY_REQUESTS, "outcome" => "failed").increment(1);
            // The lease drops here, releasing the connection
            return Err(e.into());
        }
    };

    debug!(
        "Node {} answered {} {} with {}",
        target.node,
        parts.method,
        parts.uri,
        upstream.status()
    );
    metrics::counter!(PROXY_REQUESTS, "outcome" => "forwarded").increment(1);

    let status = upstream.status();
    let headers = upstream.headers().clone();
    let body = LeasedBody {
        inner: upstream.bytes_stream().boxed(),
        lease: Some(lease),
    };

    let mut response = Response::new(Body::from_stream(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Response body stream that holds the node's connection lease until the
/// last chunk has been relayed or the stream is dropped
struct LeasedBody {
    inner: BoxStream<'static, reqwest::Result<Bytes>>,
    lease: Option<ConnectionLease>,
}

impl Stream for LeasedBody {
    type Item = reqwest::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let item = self.inner.poll_next_unpin(cx);
        if let Poll::Ready(None | Some(Err(_))) = &item {
            self.lease.take();
        }
        item
    }
}
