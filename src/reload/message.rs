//! Wire Protocol
//!
//! JSON message format for the websocket channel between the server and
//! browser clients. Every outbound message is an [`Envelope`]: a `msg-name`
//! tagged payload plus the project identity. Inbound messages are client
//! events tagged by `figwheel-event`; frames without that field are dropped.

use serde::{Deserialize, Serialize};

// =============================================================================
// Outbound
// =============================================================================

/// An outbound message with project identity attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Stable identity of the working tree this server fronts
    #[serde(rename = "project-id")]
    pub project_id: String,

    /// Optional build identity within the project
    #[serde(rename = "build-id", skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,

    #[serde(flatten)]
    pub payload: Payload,
}

impl Envelope {
    /// Wrap a payload with project identity.
    pub fn new(project_id: impl Into<String>, payload: Payload) -> Self {
        Self {
            project_id: project_id.into(),
            build_id: None,
            payload,
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"msg-name":"ping","project-id":{:?}}}"#, self.project_id)
        })
    }

    /// Parse from a JSON string.
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}

/// Message payloads, tagged by `msg-name` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg-name", rename_all = "kebab-case")]
pub enum Payload {
    /// Ordered reload plan: dependency-update records first, then namespace
    /// records in leaves-first order
    FilesChanged { files: Vec<FileRecord> },

    /// Changed stylesheets (fast path, no namespace analysis)
    CssFilesChanged { files: Vec<CssRecord> },

    /// Compilation failed; clients render the exception
    CompileFailed {
        #[serde(rename = "exception-data")]
        exception_data: ExceptionData,
        #[serde(rename = "formatted-exception")]
        formatted_exception: String,
    },

    /// Compilation warning
    CompileWarning { message: String },

    /// Keep-alive ping (per-session, does not go through the bus)
    Ping,
}

/// One entry of a `files-changed` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FileRecord {
    /// A shared dependency manifest whose full contents the client evaluates
    DependencyUpdate {
        file: String,
        #[serde(rename = "eval-body")]
        eval_body: String,
        #[serde(rename = "dependency-file")]
        dependency_file: bool,
    },

    /// A namespace artifact to re-evaluate
    Namespace {
        file: String,
        /// Mangled namespace name as it appears in the emitted JavaScript
        namespace: String,
        meta: NsMeta,
    },
}

impl FileRecord {
    /// Create a dependency-update record.
    pub fn dependency_update(file: impl Into<String>, eval_body: impl Into<String>) -> Self {
        Self::DependencyUpdate {
            file: file.into(),
            eval_body: eval_body.into(),
            dependency_file: true,
        }
    }

    /// Create a namespace record.
    pub fn namespace(file: impl Into<String>, namespace: impl Into<String>, meta: NsMeta) -> Self {
        Self::Namespace {
            file: file.into(),
            namespace: namespace.into(),
            meta,
        }
    }

    /// Whether this is a dependency-update record.
    pub fn is_dependency_update(&self) -> bool {
        matches!(self, Self::DependencyUpdate { .. })
    }
}

/// Reload-relevant metadata carried on a namespace record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NsMeta {
    /// Set when the planner added this namespace by expansion and its
    /// artifact contents actually changed on disk
    #[serde(rename = "file-changed-on-disk")]
    pub file_changed_on_disk: bool,

    /// Namespace is flagged to ride every non-empty reload plan
    #[serde(rename = "figwheel-always")]
    pub always_reload: bool,
}

/// One entry of a `css-files-changed` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CssRecord {
    pub file: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl CssRecord {
    /// Create a css record for a stylesheet path.
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            kind: "css".to_string(),
        }
    }
}

/// Structured rendering of a compile exception.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExceptionData {
    /// Top-level error message
    pub message: String,
    /// Messages of the underlying causes, outermost first
    #[serde(rename = "cause-chain")]
    pub cause_chain: Vec<String>,
}

// =============================================================================
// Inbound
// =============================================================================

/// Client events, tagged by `figwheel-event` on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "figwheel-event", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Invoke a registered browser callback with the given content
    Callback {
        #[serde(rename = "callback-name")]
        callback_name: String,
        #[serde(default)]
        content: serde_json::Value,
    },

    /// Open a source file in the configured editor
    FileSelected {
        #[serde(rename = "file-name")]
        file_name: String,
        #[serde(rename = "file-line")]
        file_line: FileLine,
    },

    /// Any other event name: accepted and dropped
    #[serde(other)]
    Unknown,
}

/// A line number that clients may send as a number or a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FileLine {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for FileLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
