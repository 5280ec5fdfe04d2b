//! Server State
//!
//! The single configuration-plus-runtime record owned by a running server:
//! project identity, digest store, message bus, connection accounting, and
//! the CSS pass timestamp. Created once at startup and shared by every
//! component through an `Arc`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use crate::config::ServerConfig;
use crate::digest::DigestStore;
use crate::project;
use crate::reload::bus::MessageBus;
use crate::reload::message::{Envelope, Payload};
use crate::utils::path::normalize_path;

/// Shared runtime state of one server instance.
#[derive(Debug)]
pub struct ServerState {
    /// Loaded configuration
    pub config: ServerConfig,
    /// Canonical project root (working directory at startup)
    pub root: PathBuf,
    /// Stable identity sent on every message
    pub project_id: String,
    /// Content-hash cache over compiler artifacts
    pub digest: DigestStore,
    /// Broadcast queue feeding all sessions
    pub bus: MessageBus,
    /// Timestamp of the last CSS scan pass
    pub css_last_pass: Mutex<SystemTime>,
    /// Open websocket connections
    connections: AtomicUsize,
}

impl ServerState {
    /// Wrap a payload in this server's envelope.
    pub fn envelope(&self, payload: Payload) -> Envelope {
        Envelope::new(self.project_id.clone(), payload)
    }

    /// Number of currently open sessions.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    fn connection_opened(&self) {
        self.connections.fetch_add(1, Ordering::SeqCst);
    }

    fn connection_closed(&self) {
        self.connections.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Build the initial server state: resolve the project root and identity,
/// then seed the digest store over the dependency-file set so the first real
/// change check is quiet.
pub fn create_initial_state(config: ServerConfig) -> Arc<ServerState> {
    let root = normalize_path(Path::new("."));
    create_initial_state_at(config, root)
}

/// As [`create_initial_state`], rooted at an explicit directory.
pub fn create_initial_state_at(config: ServerConfig, root: PathBuf) -> Arc<ServerState> {
    let project_id = project::project_id(&root, config.unique_id.as_deref());
    let digest = DigestStore::new(root.clone());
    digest.seed(config.dependency_files().iter().map(|p| root.join(p)));

    let bus = MessageBus::new(Duration::from_millis(config.compile_wait_time));

    Arc::new(ServerState {
        config,
        root,
        project_id,
        digest,
        bus,
        css_last_pass: Mutex::new(SystemTime::now()),
        connections: AtomicUsize::new(0),
    })
}

/// RAII handle for connection accounting: constructing it counts a session
/// in, dropping it counts the session out.
pub struct ConnectionGuard {
    state: Arc<ServerState>,
}

impl ConnectionGuard {
    pub fn new(state: Arc<ServerState>) -> Self {
        state.connection_opened();
        Self { state }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.state.connection_closed();
    }
}
