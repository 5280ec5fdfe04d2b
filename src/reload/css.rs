//! CSS Watcher
//!
//! Fast path for stylesheet edits, independent of the namespace pipeline:
//! each pass scans the configured CSS directories for `.css` files modified
//! since the previous pass and publishes one `css-files-changed` message.
//! Clients swap stylesheets in place, no code reload involved.

use std::path::PathBuf;
use std::time::SystemTime;

use jwalk::WalkDir;

use crate::server::state::ServerState;
use crate::utils::path::{extension, wire_path};
use crate::{debug, log};

use super::message::{CssRecord, Payload};

/// Scan for stylesheets modified since the last pass and publish the result.
/// Does nothing when no CSS directories are configured.
pub async fn check_for_css_changes(state: &ServerState) {
    if state.config.css_dirs.is_empty() {
        return;
    }

    let since = *state.css_last_pass.lock();
    let pass_started = SystemTime::now();

    let mut changed: Vec<PathBuf> = Vec::new();
    for dir in &state.config.css_dirs {
        let dir = if dir.is_absolute() {
            dir.clone()
        } else {
            state.root.join(dir)
        };
        for entry in WalkDir::new(&dir).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if extension(&path) != "css" {
                continue;
            }
            let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
            if modified.is_some_and(|mtime| mtime > since) {
                changed.push(path);
            }
        }
    }

    *state.css_last_pass.lock() = pass_started;

    if changed.is_empty() {
        debug!("css"; "pass clean");
        return;
    }

    changed.sort();
    let files: Vec<CssRecord> = changed
        .iter()
        .map(|path| CssRecord::new(wire_path(&state.root, path)))
        .collect();

    for record in &files {
        log!("css"; "changed: {}", record.file);
    }

    state
        .bus
        .publish(state.envelope(Payload::CssFilesChanged { files }))
        .await;
}
