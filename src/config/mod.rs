//! Server configuration for `wheelhouse.toml`.
//!
//! Recognized keys (kebab-case on disk):
//!
//! | Key                 | Default        | Purpose                               |
//! |---------------------|----------------|---------------------------------------|
//! | `server-port`       | `3449`         | HTTP listen port                      |
//! | `http-server-root`  | `"public"`     | static root within each resource path |
//! | `resource-paths`    | `["resources"]`| static serving roots                  |
//! | `ring-handler`      | -              | user HTTP handler name (informational)|
//! | `output-to`         | -              | compiler bundle file                  |
//! | `output-dir`        | -              | compiler artifact directory           |
//! | `css-dirs`          | `[]`           | directories watched for CSS changes   |
//! | `open-file-command` | -              | editor command for file-selected      |
//! | `unique-id`         | -              | project identity override             |
//! | `compile-wait-time` | `10`           | bus settle delay in milliseconds      |
//! | `server-logfile`    | -              | opaque, passed through                |
//! | `repl`              | `false`        | opaque, passed through                |

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default HTTP listen port.
pub const DEFAULT_PORT: u16 = 3449;

/// Default settle delay between a publish and its delivery, in milliseconds.
pub const DEFAULT_COMPILE_WAIT_MS: u64 = 10;

/// Server configuration loaded from `wheelhouse.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ServerConfig {
    /// HTTP listen port
    pub server_port: u16,

    /// Static root within each resource path
    pub http_server_root: String,

    /// Static serving roots (empty list is coerced to the default)
    pub resource_paths: Vec<PathBuf>,

    /// Optional user HTTP handler, by name. Resolution happens through the
    /// registration API on [`crate::server::start_server`]; this field is
    /// informational.
    pub ring_handler: Option<String>,

    /// Compiler bundle output file
    pub output_to: Option<PathBuf>,

    /// Compiler artifact output directory
    pub output_dir: Option<PathBuf>,

    /// Directories watched for CSS changes
    pub css_dirs: Vec<PathBuf>,

    /// Command for file-selected events (special-cased for "emacsclient")
    pub open_file_command: Option<String>,

    /// Override for the derived project id
    pub unique_id: Option<String>,

    /// Bus settle delay in milliseconds
    pub compile_wait_time: u64,

    /// Opaque, passed through to embedding tooling
    pub server_logfile: Option<PathBuf>,

    /// Opaque, passed through to embedding tooling
    pub repl: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_PORT,
            http_server_root: "public".to_string(),
            resource_paths: vec![PathBuf::from("resources")],
            ring_handler: None,
            output_to: None,
            output_dir: None,
            css_dirs: Vec::new(),
            open_file_command: None,
            unique_id: None,
            compile_wait_time: DEFAULT_COMPILE_WAIT_MS,
            server_logfile: None,
            repl: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields pure defaults (a fresh project needs no config).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.finalize();
        Ok(config)
    }

    /// Apply post-load fixups.
    pub fn finalize(&mut self) {
        if self.resource_paths.is_empty() {
            self.resource_paths = vec![PathBuf::from("resources")];
        }
    }

    /// The generated manifest files that are content-hashed instead of
    /// namespace-reloaded: the bundle file plus the two dependency indexes
    /// under the output directory.
    pub fn dependency_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        if let Some(output_to) = &self.output_to {
            files.push(output_to.clone());
        }
        if let Some(output_dir) = &self.output_dir {
            files.push(output_dir.join("goog/deps.js"));
            files.push(output_dir.join("cljs_deps.js"));
        }
        files
    }
}
