//! Reload Module
//!
//! The change-notification pipeline, from mtime snapshots to browser frames:
//!
//! ```text
//! ingest -> planner -> bus -> session -> browser
//! ```
//!
//! # Modules
//!
//! - `bus` - bounded broadcast queue with settle-delay delivery
//! - `css` - stylesheet fast path, independent of the namespace pipeline
//! - `errors` - compile error/warning fan-out
//! - `ingest` - mtime diffing, namespace extraction, message assembly
//! - `message` - wire protocol types (outbound envelopes, client events)
//! - `planner` - dependent expansion and topological ordering
//! - `session` - per-connection protocol and heartbeat

pub mod bus;
pub mod css;
pub mod errors;
pub mod ingest;
pub mod message;
pub mod planner;
pub mod session;
