//! End-to-end data-plane tests against real backends on ephemeral ports

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::stream::{self, StreamExt};
use poolgate_api::{AppState, create_proxy_router};
use poolgate_core::{
    LbPolicy, NewNode, NewService, Node, NodeStatus, Pattern, PoolKind, Registry, UpdateNode,
    UpdatePool,
};
use poolgate_proxy::{Forwarder, ForwarderConfig};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

#[derive(Clone)]
struct Backend {
    name: &'static str,
    gate: Arc<Notify>,
}

/// Echoes what the node saw: path, Host, X-Forwarded-For and body
async fn echo(
    State(backend): State<Backend>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let seen = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };

    (
        [
            ("x-backend", backend.name.to_string()),
            ("x-seen-host", seen(header::HOST)),
            ("x-seen-forwarded-for", seen(header::HeaderName::from_static("x-forwarded-for"))),
        ],
        format!("{}|{}", uri, String::from_utf8_lossy(&body)),
    )
}

/// Responds only once the test opens the gate
async fn slow(State(backend): State<Backend>) -> &'static str {
    backend.gate.notified().await;
    backend.name
}

/// Sends one chunk right away and the rest once the gate opens
async fn partial(State(backend): State<Backend>) -> Body {
    let head = stream::once(async { Ok::<_, Infallible>(Bytes::from_static(b"head")) });
    let tail = stream::once(async move {
        backend.gate.notified().await;
        Ok(Bytes::from_static(b"tail"))
    });
    Body::from_stream(head.chain(tail))
}

async fn redirect() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/elsewhere")])
}

async fn spawn_backend(name: &'static str) -> (SocketAddr, Arc<Notify>) {
    let gate = Arc::new(Notify::new());
    let app = Router::new()
        .route("/slow", get(slow))
        .route("/partial", get(partial))
        .route("/redirect", get(redirect))
        .fallback(echo)
        .with_state(Backend {
            name,
            gate: gate.clone(),
        });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, gate)
}

async fn spawn_proxy(registry: &Registry) -> SocketAddr {
    let forwarder = Arc::new(Forwarder::new(ForwarderConfig::default()).unwrap());
    let app = create_proxy_router(AppState::new(registry.clone(), forwarder));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn add_service(registry: &Registry, name: &str, host: &str, url: &str) {
    registry
        .create_service(NewService {
            name: name.to_string(),
            host: host.to_string(),
            url: url.to_string(),
        })
        .unwrap();
}

fn add_node(registry: &Registry, service: &str, kind: PoolKind, name: &str, addr: SocketAddr) {
    registry
        .create_node(
            service,
            kind,
            NewNode {
                name: name.to_string(),
                host: addr.to_string(),
                status: NodeStatus::On,
                weight: 1,
            },
        )
        .unwrap();
}

/// Poll a node until the predicate holds; releases happen when the relayed
/// body is dropped, which can trail the client's read slightly
async fn wait_for_node(
    registry: &Registry,
    service: &str,
    kind: PoolKind,
    name: &str,
    pred: impl Fn(&Node) -> bool,
) -> Node {
    for _ in 0..200 {
        let node = registry.get_node(service, kind, name).unwrap();
        if pred(&node) {
            return node;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("node {} never reached the expected state", name);
}

#[tokio::test]
async fn test_forwards_and_relays_response() {
    let (backend, _) = spawn_backend("prod-1").await;
    let registry = Registry::new();
    add_service(&registry, "web", "", "/");
    add_node(&registry, "web", PoolKind::Prod, "prod-1", backend);
    let proxy = spawn_proxy(&registry).await;

    let response = client()
        .post(format!("http://{}/api/items?q=1", proxy))
        .header(header::HOST, "shop.example")
        .body("hello")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-backend"], "prod-1");
    assert_eq!(response.headers()["x-seen-host"], "shop.example");
    assert_eq!(response.headers()["x-seen-forwarded-for"], "127.0.0.1");
    assert_eq!(response.text().await.unwrap(), "/api/items?q=1|hello");

    wait_for_node(&registry, "web", PoolKind::Prod, "prod-1", |n| n.conn_num == 0).await;
}

#[tokio::test]
async fn test_host_and_header_routing() {
    let (api, _) = spawn_backend("api").await;
    let (fallback, _) = spawn_backend("fallback").await;
    let (debug, _) = spawn_backend("debug").await;

    let registry = Registry::new();
    add_service(&registry, "api", "a.com", "/api");
    add_service(&registry, "fallback", "", "/");
    add_node(&registry, "api", PoolKind::Prod, "api-1", api);
    add_node(&registry, "fallback", PoolKind::Prod, "fallback-1", fallback);
    registry
        .update_pool(
            "api",
            PoolKind::Debug,
            UpdatePool {
                pattern: Some(Pattern::header("debug-token")),
                lb_policy: LbPolicy::Random,
            },
        )
        .unwrap();
    add_node(&registry, "api", PoolKind::Debug, "debug-1", debug);
    let proxy = spawn_proxy(&registry).await;
    let client = client();

    let backend_for = |host: &'static str, path: &'static str, token: Option<&'static str>| {
        let mut request = client
            .get(format!("http://{}{}", proxy, path))
            .header(header::HOST, host);
        if let Some(token) = token {
            request = request.header("x-whatever", token);
        }
        async move {
            let response = request.send().await.unwrap();
            (
                response.status(),
                response
                    .headers()
                    .get("x-backend")
                    .map(|v| v.to_str().unwrap().to_string()),
            )
        }
    };

    assert_eq!(
        backend_for("a.com:10001", "/api/x", None).await,
        (StatusCode::OK, Some("api".to_string()))
    );
    assert_eq!(
        backend_for("a.com", "/api/x", Some("debug-token")).await,
        (StatusCode::OK, Some("debug".to_string()))
    );
    assert_eq!(
        backend_for("b.com", "/x", None).await,
        (StatusCode::OK, Some("fallback".to_string()))
    );
    // Exact host matched, so no fallback on a path miss
    assert_eq!(
        backend_for("a.com", "/other", None).await,
        (StatusCode::NOT_FOUND, None)
    );
}

#[tokio::test]
async fn test_no_route_is_empty_not_found() {
    let registry = Registry::new();
    add_service(&registry, "web", "", "/");
    let proxy = spawn_proxy(&registry).await;

    let response = client()
        .get(format!("http://{}/anything", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_node_is_bad_gateway() {
    // Bind and drop to get a port nobody listens on
    let dead = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let registry = Registry::new();
    add_service(&registry, "web", "", "/");
    add_node(&registry, "web", PoolKind::Prod, "dead", dead);
    let proxy = spawn_proxy(&registry).await;

    let response = client()
        .get(format!("http://{}/x", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let node = registry.get_node("web", PoolKind::Prod, "dead").unwrap();
    assert_eq!(node.conn_num, 0);
    assert_eq!(node.status, NodeStatus::On);
}

#[tokio::test]
async fn test_redirects_are_relayed() {
    let (backend, _) = spawn_backend("prod-1").await;
    let registry = Registry::new();
    add_service(&registry, "web", "", "/");
    add_node(&registry, "web", PoolKind::Prod, "prod-1", backend);
    let proxy = spawn_proxy(&registry).await;

    let response = client()
        .get(format!("http://{}/redirect", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/elsewhere");
}

#[tokio::test]
async fn test_unloading_node_drains_in_flight_request() {
    let (backend, gate) = spawn_backend("prod-1").await;
    let registry = Registry::new();
    add_service(&registry, "web", "", "/");
    add_node(&registry, "web", PoolKind::Prod, "prod-1", backend);
    let proxy = spawn_proxy(&registry).await;
    let client = client();

    let in_flight = tokio::spawn({
        let client = client.clone();
        async move {
            let response = client
                .get(format!("http://{}/slow", proxy))
                .send()
                .await
                .unwrap();
            (response.status(), response.text().await.unwrap())
        }
    });

    wait_for_node(&registry, "web", PoolKind::Prod, "prod-1", |n| n.conn_num == 1).await;

    let node = registry
        .update_node(
            "web",
            PoolKind::Prod,
            "prod-1",
            UpdateNode {
                weight: None,
                status: Some(NodeStatus::Unloading),
            },
        )
        .unwrap();
    assert_eq!(node.status, NodeStatus::Unloading);

    // No new traffic reaches an unloading node
    let response = client
        .get(format!("http://{}/x", proxy))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    gate.notify_one();
    let (status, body) = in_flight.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "prod-1");

    let node = wait_for_node(&registry, "web", PoolKind::Prod, "prod-1", |n| {
        n.status == NodeStatus::Off
    })
    .await;
    assert_eq!(node.conn_num, 0);
}

#[tokio::test]
async fn test_client_abort_releases_connection() {
    let (backend, gate) = spawn_backend("prod-1").await;
    let registry = Registry::new();
    add_service(&registry, "web", "", "/");
    add_node(&registry, "web", PoolKind::Prod, "prod-1", backend);
    let proxy = spawn_proxy(&registry).await;

    let impatient = reqwest::Client::builder()
        .timeout(Duration::from_millis(300))
        .build()
        .unwrap();
    let err = impatient
        .get(format!("http://{}/slow", proxy))
        .send()
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    // Released while the node is still working on the request
    wait_for_node(&registry, "web", PoolKind::Prod, "prod-1", |n| n.conn_num == 0).await;

    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let node = registry.get_node("web", PoolKind::Prod, "prod-1").unwrap();
    assert_eq!(node.conn_num, 0);
    assert_eq!(node.status, NodeStatus::On);
}

#[tokio::test]
async fn test_abort_mid_body_releases_connection() {
    let (backend, gate) = spawn_backend("prod-1").await;
    let registry = Registry::new();
    add_service(&registry, "web", "", "/");
    add_node(&registry, "web", PoolKind::Prod, "prod-1", backend);
    let proxy = spawn_proxy(&registry).await;

    let mut response = client()
        .get(format!("http://{}/partial", proxy))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first = response.chunk().await.unwrap().unwrap();
    assert_eq!(&first[..], b"head");

    // Still counted while the body is being relayed
    assert_eq!(
        registry.get_node("web", PoolKind::Prod, "prod-1").unwrap().conn_num,
        1
    );

    drop(response);
    gate.notify_one();

    let node = wait_for_node(&registry, "web", PoolKind::Prod, "prod-1", |n| n.conn_num == 0).await;
    assert_eq!(node.status, NodeStatus::On);
}
