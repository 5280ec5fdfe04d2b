//! Content-addressed change detection over compiler artifacts.
//!
//! Mtimes on generated files are noisy: the toolchain rewrites them even when
//! nothing changed. The digest store keeps a blake3 hash per artifact and
//! reports "changed" only on a real content transition.
//!
//! # Invariants
//! - The first observation of a path stores its digest and reports unchanged.
//! - A missing or unreadable file reports unchanged and mutates nothing.
//! - Dependency-manifest checks are gated on the [`DEPENDENCY_MARKER`] token
//!   so half-written outputs never register a transition.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::utils::path::wire_path;

/// Token a fully-written dependency manifest always contains.
pub const DEPENDENCY_MARKER: &str = "addDependency";

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Create a new ContentHash from raw bytes.
    #[inline]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash a byte buffer.
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    /// Convert to hex string (for debugging/display).
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Process-wide digest cache over artifact paths.
///
/// Keys are wire-normalized relative to the project root so the same file
/// observed through different spellings shares one entry.
#[derive(Debug)]
pub struct DigestStore {
    root: PathBuf,
    entries: Mutex<FxHashMap<String, ContentHash>>,
}

impl DigestStore {
    /// Create an empty store rooted at the project directory.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    /// Check whether a file's contents changed since the last observation,
    /// updating the stored digest.
    pub fn changed(&self, path: &Path) -> bool {
        self.check(path, None)
    }

    /// Like [`changed`](Self::changed), but for dependency manifests: a file
    /// missing the [`DEPENDENCY_MARKER`] token is treated as unchanged and
    /// left out of the store entirely.
    pub fn dependency_changed(&self, path: &Path) -> bool {
        self.check(path, Some(DEPENDENCY_MARKER))
    }

    /// Warm the store over the dependency-file set so the first real change
    /// check does not produce spurious hits.
    pub fn seed<P: AsRef<Path>>(&self, paths: impl IntoIterator<Item = P>) {
        for path in paths {
            self.dependency_changed(path.as_ref());
        }
    }

    /// Number of tracked paths.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn check(&self, path: &Path, required_token: Option<&str>) -> bool {
        let Some(bytes) = read_file_bytes(path) else {
            return false;
        };

        if let Some(token) = required_token {
            let marker = token.as_bytes();
            if !bytes.windows(marker.len()).any(|window| window == marker) {
                return false;
            }
        }

        let hash = ContentHash::of(&bytes);
        let key = wire_path(&self.root, path);

        let mut entries = self.entries.lock();
        match entries.insert(key, hash) {
            None => false,
            Some(previous) => previous != hash,
        }
    }
}

/// Read a file fully, buffered. `None` on any I/O failure.
fn read_file_bytes(path: &Path) -> Option<Vec<u8>> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::with_capacity(64 * 1024, file);
    let mut bytes = Vec::new();
    loop {
        let mut buffer = [0u8; 64 * 1024];
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => bytes.extend_from_slice(&buffer[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return None,
        }
    }
    Some(bytes)
}
