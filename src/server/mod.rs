//! Server Lifecycle
//!
//! Binds the HTTP listener, mounts the websocket endpoint at
//! `/figwheel-ws`, serves static files from the configured resource roots,
//! and hands out a handle whose `stop()` closes the listener and every open
//! session. A user-supplied router registered at startup is chained ahead of
//! the static fallback.

pub mod state;

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use axum::{
    Router,
    body::Body,
    extract::{State, WebSocketUpgrade, ws::WebSocket},
    http::{Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};

use crate::log;
use crate::reload::session;
use crate::utils::mime;

use state::ServerState;

/// Websocket endpoint path clients connect to.
pub const WS_PATH: &str = "/figwheel-ws";

/// Ports tried past the configured one before giving up.
const MAX_PORT_RETRIES: u16 = 10;

/// Shared handler context: server state plus the shutdown signal every
/// session observes.
#[derive(Clone)]
pub struct AppState {
    pub state: Arc<ServerState>,
    shutdown: watch::Receiver<bool>,
}

/// A running server. Dropping the handle leaves the server running; call
/// [`stop`](Self::stop) for an orderly shutdown.
pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ServerHandle {
    /// Close the listener and all open sessions, then wait for the serve
    /// task to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

/// Bind and start serving. `user_routes`, when given, takes precedence over
/// the static fallback for the paths it declares.
pub async fn start_server(
    state: Arc<ServerState>,
    user_routes: Option<Router>,
) -> Result<ServerHandle> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app_state = AppState {
        state: Arc::clone(&state),
        shutdown: shutdown_rx.clone(),
    };

    let core = Router::new()
        .route(WS_PATH, get(ws_handler))
        .fallback(static_handler)
        .with_state(app_state);

    let app = match user_routes {
        Some(user) => user.merge(core),
        None => core,
    }
    // Permissive by design for a dev server: fonts served cross-origin
    // need it.
    .layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::HEAD, Method::OPTIONS, Method::GET]),
    );

    let (listener, addr) = bind_with_retry(state.config.server_port).await?;
    log!("serve"; "http://localhost:{}", addr.port());

    let mut serve_shutdown = shutdown_rx;
    let join = tokio::spawn(async move {
        let shutdown = async move {
            let _ = serve_shutdown.changed().await;
        };
        if let Err(reason) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            log!("serve"; "server error: {}", reason);
        }
    });

    Ok(ServerHandle {
        addr,
        shutdown: shutdown_tx,
        join,
    })
}

/// Bind the listen port, retrying on successive ports when taken.
async fn bind_with_retry(base_port: u16) -> Result<(TcpListener, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => {
                let addr = listener.local_addr().context("failed to read bound address")?;
                return Ok((listener, addr));
            }
            Err(reason) => last_error = Some(reason),
        }
    }

    Err(anyhow!(
        "failed to bind HTTP server after {} attempts: {}",
        MAX_PORT_RETRIES,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// =============================================================================
// Handlers
// =============================================================================

/// Upgrade `/figwheel-ws` requests into sessions.
async fn ws_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> Response {
    let state = Arc::clone(&app.state);
    let shutdown = app.shutdown.clone();
    ws.on_upgrade(move |socket: WebSocket| session::run_session(socket, state, shutdown))
}

/// Serve static files from every resource root; `/` maps to `index.html`.
async fn static_handler(State(app): State<AppState>, uri: Uri) -> Response {
    let request_path = uri.path();
    let relative = if request_path == "/" {
        "index.html"
    } else {
        request_path.trim_start_matches('/')
    };

    let Some(relative) = sanitize(relative) else {
        return plain_response(StatusCode::FORBIDDEN, "Forbidden");
    };

    let config = &app.state.config;
    for resource_root in &config.resource_paths {
        let file = app
            .state
            .root
            .join(resource_root)
            .join(&config.http_server_root)
            .join(&relative);
        if !file.is_file() {
            continue;
        }
        match tokio::fs::read(&file).await {
            Ok(contents) => return file_response(&file, contents),
            Err(reason) => {
                log!("serve"; "failed to read {}: {}", file.display(), reason);
            }
        }
    }

    plain_response(
        StatusCode::NOT_FOUND,
        &format!("File not found: {request_path}"),
    )
}

/// Reject traversal and other non-normal components.
fn sanitize(relative: &str) -> Option<PathBuf> {
    let path = Path::new(relative);
    path.components()
        .all(|component| matches!(component, Component::Normal(_)))
        .then(|| path.to_path_buf())
}

fn file_response(path: &Path, contents: Vec<u8>) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime::from_path(path))
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from(contents))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn plain_response(status: StatusCode, message: &str) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, mime::types::PLAIN)
        .body(Body::from(message.to_string()))
        .unwrap_or_else(|_| status.into_response())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_accepts_normal_paths() {
        assert_eq!(sanitize("index.html"), Some(PathBuf::from("index.html")));
        assert_eq!(
            sanitize("js/out/app/core.js"),
            Some(PathBuf::from("js/out/app/core.js"))
        );
    }

    #[test]
    fn test_sanitize_rejects_traversal() {
        assert_eq!(sanitize("../etc/passwd"), None);
        assert_eq!(sanitize("js/../../secret"), None);
        assert_eq!(sanitize("/absolute"), None);
    }

    #[tokio::test]
    async fn test_bind_with_retry_skips_taken_port() {
        // Occupy a port, then ask for it: the next one should be handed out.
        let taken = TcpListener::bind(("0.0.0.0", 0)).await.unwrap();
        let base = taken.local_addr().unwrap().port();

        let (listener, addr) = bind_with_retry(base).await.unwrap();
        assert_ne!(addr.port(), base);
        assert!(addr.port() > base);
        drop(listener);
    }
}
