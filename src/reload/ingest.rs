//! Change Ingest
//!
//! Turns a pair of mtime snapshots (supplied by the compiler toolchain) into
//! one `files-changed` message: diff the snapshots, classify by extension,
//! map browser-target sources to their declared namespaces, run the planner,
//! prepend dependency-manifest updates, publish.
//!
//! A change to any macro-bearing source (which compiles into every browser
//! artifact) widens the browser-target group to the whole snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::log;
use crate::oracle::{self, DependencyOracle};
use crate::reload::message::{Envelope, FileRecord, NsMeta, Payload};
use crate::reload::planner::expand_reload_plan;
use crate::server::state::ServerState;
use crate::utils::path::{extension, wire_path};

/// Source-only files whose macros expand into browser artifacts.
pub const MACRO_SOURCE_EXT: &str = "clj";

/// Browser-target source files, one namespace each.
pub const BROWSER_TARGET_EXT: &str = "cljs";

/// Snapshot of modification times, keyed by artifact path.
pub type MtimeMap = FxHashMap<PathBuf, i64>;

// =============================================================================
// Snapshot diffing
// =============================================================================

/// Paths whose mtime differs between the two snapshots, over the union of
/// both key sets. Sorted for determinism.
pub fn changed_paths(old: &MtimeMap, new: &MtimeMap) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = old
        .keys()
        .chain(new.keys())
        .filter(|path| old.get(*path) != new.get(*path))
        .cloned()
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

/// Group paths by extension suffix (letters after the final `.`).
pub fn group_by_extension(paths: &[PathBuf]) -> FxHashMap<String, Vec<PathBuf>> {
    let mut groups: FxHashMap<String, Vec<PathBuf>> = FxHashMap::default();
    for path in paths {
        groups.entry(extension(path)).or_default().push(path.clone());
    }
    groups
}

/// The browser-target paths to re-map to namespaces. When a macro-bearing
/// source changed, every browser-target key of the new snapshot is affected,
/// not just the ones whose mtime moved.
pub fn browser_targets(
    groups: &FxHashMap<String, Vec<PathBuf>>,
    new: &MtimeMap,
) -> Vec<PathBuf> {
    let macro_changed = groups.get(MACRO_SOURCE_EXT).is_some_and(|g| !g.is_empty());

    let mut targets: Vec<PathBuf> = if macro_changed {
        new.keys()
            .filter(|path| extension(path) == BROWSER_TARGET_EXT)
            .cloned()
            .collect()
    } else {
        groups.get(BROWSER_TARGET_EXT).cloned().unwrap_or_default()
    };
    targets.sort();
    targets
}

// =============================================================================
// Namespace extraction
// =============================================================================

/// Read the namespace name from the leading `(ns ...)` form of a source
/// file. Comments and reader metadata before the name are skipped. `None`
/// for anything malformed.
pub fn extract_namespace(source: &str) -> Option<String> {
    let mut rest = source;

    // Skip leading whitespace and line comments.
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        match rest.strip_prefix(';') {
            Some(comment) => rest = comment.split_once('\n')?.1,
            None => break,
        }
    }

    let body = rest.strip_prefix('(')?.trim_start();
    let mut tail = body.strip_prefix("ns")?;
    if !tail.starts_with(char::is_whitespace) {
        return None;
    }
    tail = tail.trim_start();

    // Skip reader metadata: ^:keyword or ^{...}
    while let Some(meta) = tail.strip_prefix('^') {
        match meta.strip_prefix('{') {
            Some(map) => tail = map.split_once('}')?.1,
            None => {
                let end = meta.find(char::is_whitespace)?;
                tail = &meta[end..];
            }
        }
        tail = tail.trim_start();
    }

    let end = tail
        .find(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';'))
        .unwrap_or(tail.len());
    let name = &tail[..end];
    (!name.is_empty()).then(|| name.to_string())
}

// =============================================================================
// Message assembly
// =============================================================================

/// Build the `files-changed` message for one compile cycle, or `None` when
/// there is nothing to send. Dependency manifests are re-checked even for an
/// empty change set.
pub fn build_reload_message(
    state: &ServerState,
    oracle: &dyn DependencyOracle,
    old_mtimes: &MtimeMap,
    new_mtimes: &MtimeMap,
    additional_ns: &[String],
) -> Option<Envelope> {
    let changed = changed_paths(old_mtimes, new_mtimes);
    let groups = group_by_extension(&changed);
    let targets = browser_targets(&groups, new_mtimes);

    // Map each browser-target path to its declared namespace; unreadable or
    // malformed files contribute nothing.
    let mut changed_ns: Vec<String> = Vec::new();
    let mut source_for: FxHashMap<String, PathBuf> = FxHashMap::default();
    let mut seen = FxHashSet::default();
    for path in &targets {
        let full = resolve(&state.root, path);
        let Some(ns) = fs::read_to_string(&full).ok().and_then(|s| extract_namespace(&s)) else {
            continue;
        };
        if seen.insert(ns.clone()) {
            source_for.insert(ns.clone(), path.clone());
            changed_ns.push(ns);
        }
    }

    let output_dir = state.config.output_dir.as_deref();
    let plan = expand_reload_plan(oracle, &state.digest, output_dir, &changed_ns, additional_ns);

    let mut files: Vec<FileRecord> = Vec::new();

    // Dependency-manifest updates come first so clients refresh their
    // dependency index before evaluating namespaces against it.
    for dep in state.config.dependency_files() {
        let full = resolve(&state.root, &dep);
        if state.digest.dependency_changed(&full)
            && let Ok(body) = fs::read_to_string(&full)
        {
            files.push(FileRecord::dependency_update(
                wire_path(&state.root, &dep),
                body,
            ));
        }
    }

    for planned in &plan {
        let artifact = oracle
            .target_file_for(&planned.name, output_dir)
            .or_else(|| source_for.get(&planned.name).cloned())
            .unwrap_or_else(|| oracle::default_target_file(&planned.name, output_dir));
        let file = wire_path(&state.root, &artifact);
        log!("reload"; "notifying: {}", file);
        files.push(FileRecord::namespace(
            file,
            oracle::munge(&planned.name),
            NsMeta {
                file_changed_on_disk: planned.file_changed_on_disk,
                always_reload: planned.always_reload,
            },
        ));
    }

    if files.is_empty() {
        return None;
    }
    Some(state.envelope(Payload::FilesChanged { files }))
}

/// Run one ingest pass and publish the result to the bus, if any.
pub async fn check_for_changes(
    state: &ServerState,
    oracle: &dyn DependencyOracle,
    old_mtimes: &MtimeMap,
    new_mtimes: &MtimeMap,
    additional_ns: &[String],
) {
    if let Some(message) = build_reload_message(state, oracle, old_mtimes, new_mtimes, additional_ns)
    {
        state.bus.publish(message).await;
    }
}

/// Resolve a snapshot path against the project root.
fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

// =============================================================================
// Tests
// =============================================================================
