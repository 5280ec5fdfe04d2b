//! Session
//!
//! One session per accepted websocket connection. The outbound half relays
//! every bus head change plus an independent 5-second heartbeat; the inbound
//! half parses client events. Any transport failure, peer close, or server
//! shutdown ends the session, cancels the heartbeat, and releases the
//! connection count.

use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::callbacks;
use crate::debug;
use crate::server::state::{ConnectionGuard, ServerState};

use super::bus::HeadReceiver;
use super::message::{ClientEvent, Envelope, Payload};

/// Interval between keep-alive pings on each session's own channel.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Drive one client connection until it closes.
pub async fn run_session(
    socket: WebSocket,
    state: Arc<ServerState>,
    shutdown: watch::Receiver<bool>,
) {
    let _guard = ConnectionGuard::new(Arc::clone(&state));
    debug!("session"; "client connected ({} open)", state.connection_count());

    let (sink, stream) = socket.split();
    let head = state.bus.subscribe();
    let ping = state.envelope(Payload::Ping);

    let mut outbound = tokio::spawn(outbound_loop(sink, head, ping, shutdown));

    tokio::select! {
        _ = &mut outbound => {}
        _ = inbound_loop(stream, Arc::clone(&state)) => {
            outbound.abort();
        }
    }

    debug!("session"; "client disconnected");
}

/// Relay bus heads and heartbeats into the socket until a send fails, the
/// bus goes away, or shutdown is signalled.
async fn outbound_loop<S>(
    mut sink: S,
    mut head: HeadReceiver,
    ping: Envelope,
    mut shutdown: watch::Receiver<bool>,
) where
    S: Sink<Message> + Unpin,
{
    let start = tokio::time::Instant::now() + HEARTBEAT_INTERVAL;
    let mut heartbeat = tokio::time::interval_at(start, HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = head.changed() => {
                if changed.is_err() {
                    break;
                }
                let Some(message) = head.borrow_and_update().clone() else {
                    continue;
                };
                if sink.send(Message::Text(message.to_json().into())).await.is_err() {
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if sink.send(Message::Text(ping.to_json().into())).await.is_err() {
                    break;
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

/// Consume inbound frames until the peer closes or the transport fails.
async fn inbound_loop<S>(mut stream: S, state: Arc<ServerState>)
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_client_event(&state, &text),
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

/// Parse and dispatch one inbound text frame.
pub fn handle_client_event(state: &ServerState, raw: &str) {
    match serde_json::from_str::<ClientEvent>(raw) {
        Ok(ClientEvent::Callback {
            callback_name,
            content,
        }) => {
            if !callbacks::dispatch(&callback_name, content) {
                debug!("session"; "callback {} not registered, dropped", callback_name);
            }
        }
        Ok(ClientEvent::FileSelected {
            file_name,
            file_line,
        }) => open_file(state, &file_name, &file_line.to_string()),
        Ok(ClientEvent::Unknown) => {
            debug!("session"; "unknown client event dropped");
        }
        Err(reason) => {
            eprintln!("wheelhouse: dropped malformed client frame ({reason}): {raw}");
        }
    }
}

/// Spawn the configured editor command for a file-selected event. The
/// child's exit is not awaited; spawn failures are logged and swallowed.
fn open_file(state: &ServerState, file: &str, line: &str) {
    let Some(command) = &state.config.open_file_command else {
        debug!("session"; "file-selected ignored, no open-file-command configured");
        return;
    };

    let argv = open_file_argv(command, file, line);
    debug!("session"; "spawning {:?}", argv);
    if let Err(reason) = Command::new(&argv[0]).args(&argv[1..]).spawn() {
        eprintln!("wheelhouse: open-file command {:?} failed: {reason}", argv[0]);
    }
}

/// The argv for an open-file spawn. `emacsclient` gets its native
/// no-wait/+line form; anything else is called as `cmd file line`.
pub fn open_file_argv(command: &str, file: &str, line: &str) -> Vec<String> {
    if command == "emacsclient" {
        vec![
            "emacsclient".to_string(),
            "-n".to_string(),
            format!("+{line}"),
            file.to_string(),
        ]
    } else {
        vec![command.to_string(), file.to_string(), line.to_string()]
    }
}

// =============================================================================
// Tests
// =============================================================================
