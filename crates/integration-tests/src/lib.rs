//! Integration tests for the Kaline commerce engine.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p kaline-integration-tests
//! ```
//!
//! Every test runs against stub servers bound to an ephemeral localhost
//! port, so no external services are needed.
//!
//! # Stubs
//!
//! - [`CatalogService`] - the remote catalog endpoint, with a switchable reply
//! - [`image_router`] - image URLs covering the success and failure shapes

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use kaline_commerce::{ImageConfig, RemoteConfig};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// A PNG signature followed by an IHDR chunk header.
pub const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D',
    b'R', 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00,
];

/// How long `/slow.png` waits before answering.
pub const SLOW_DELAY: Duration = Duration::from_secs(2);

/// A server running on a background task. Stops when dropped.
pub struct StubServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl StubServer {
    /// Serve `router` on an ephemeral localhost port.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    #[allow(clippy::expect_used)]
    pub async fn start(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind stub server");
        let addr = listener.local_addr().expect("Stub server has no address");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Self { addr, handle }
    }

    /// Absolute URL for `path` on this server.
    ///
    /// # Panics
    ///
    /// Panics if `path` does not form a valid URL.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{path}", self.addr)).expect("Invalid stub URL")
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// What the catalog stub answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogReply {
    /// `200 {"success": true}`
    Accept,
    /// `200 {"success": false, "message": ...}`
    Reject,
    /// `500` with a plain-text body
    ServerError,
    /// `200` with a body that is not JSON
    Malformed,
}

/// One request received by the catalog stub.
#[derive(Debug, Clone)]
pub struct RecordedSync {
    pub body: Value,
    pub authorization: Option<String>,
}

/// Stub of the remote catalog service.
#[derive(Clone)]
pub struct CatalogService {
    reply: Arc<Mutex<CatalogReply>>,
    requests: Arc<Mutex<Vec<RecordedSync>>>,
}

impl CatalogService {
    /// Reject message sent with [`CatalogReply::Reject`].
    pub const REJECT_MESSAGE: &'static str = "produto duplicado";

    #[must_use]
    pub fn new(reply: CatalogReply) -> Self {
        Self {
            reply: Arc::new(Mutex::new(reply)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Change the reply for subsequent requests.
    pub fn set_reply(&self, reply: CatalogReply) {
        *self.reply.lock().unwrap_or_else(PoisonError::into_inner) = reply;
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedSync> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `POST /sync` handled by this stub.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/sync", post(sync))
            .with_state(self.clone())
    }

    /// Start the stub and return it with its remote configuration.
    pub async fn start(reply: CatalogReply) -> (Self, StubServer, RemoteConfig) {
        let service = Self::new(reply);
        let server = StubServer::start(service.router()).await;
        let mut config = RemoteConfig::new(server.url("/sync"));
        config.timeout = Duration::from_secs(2);
        (service, server, config)
    }
}

async fn sync(
    State(service): State<CatalogService>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    service
        .requests
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(RecordedSync {
            body,
            authorization,
        });

    let reply = *service.reply.lock().unwrap_or_else(PoisonError::into_inner);
    match reply {
        CatalogReply::Accept => Json(json!({"success": true})).into_response(),
        CatalogReply::Reject => Json(json!({
            "success": false,
            "message": CatalogService::REJECT_MESSAGE,
        }))
        .into_response(),
        CatalogReply::ServerError => {
            (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response()
        }
        CatalogReply::Malformed => (StatusCode::OK, "<html>maintenance</html>").into_response(),
    }
}

/// Image stub routes.
///
/// - `/photo.png` - PNG with an `image/png` header; counted in `hits`
/// - `/raw` - PNG bytes as `application/octet-stream`
/// - `/missing.png` - 404
/// - `/page` - an HTML page
/// - `/huge.png` - a PNG header over a 2 MiB body
/// - `/slow.png` - PNG after [`SLOW_DELAY`]
pub fn image_router(hits: Arc<AtomicUsize>) -> Router {
    Router::new()
        .route(
            "/photo.png",
            get(move || {
                hits.fetch_add(1, Ordering::SeqCst);
                async { png() }
            }),
        )
        .route("/raw", get(|| async { PNG_BYTES.to_vec() }))
        .route(
            "/missing.png",
            get(|| async { (StatusCode::NOT_FOUND, "not found") }),
        )
        .route(
            "/page",
            get(|| async { Html("<html><body>Vitrine</body></html>") }),
        )
        .route(
            "/huge.png",
            get(|| async {
                let mut body = PNG_BYTES.to_vec();
                body.resize(2 * 1024 * 1024, 0);
                ([(header::CONTENT_TYPE, "image/png")], body)
            }),
        )
        .route(
            "/slow.png",
            get(|| async {
                tokio::time::sleep(SLOW_DELAY).await;
                png()
            }),
        )
}

fn png() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES)
}

/// Image limits for tests: 1 MiB, half a second.
#[must_use]
pub fn image_config() -> ImageConfig {
    ImageConfig {
        timeout: Duration::from_millis(500),
        max_bytes: 1024 * 1024,
    }
}
