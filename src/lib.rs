//! Wheelhouse - live-reload change notifications for compiled browser code.
//!
//! An external compiler toolchain writes artifacts into an output tree and
//! tells wheelhouse what changed (as mtime snapshots). Wheelhouse expands the
//! changed namespaces to everything that depends on them, orders the result
//! leaves-first, and pushes the reload plan to every connected browser over a
//! websocket. CSS updates and compile diagnostics ride the same channel.
//!
//! ```text
//! toolchain → ingest → planner → bus → sessions → browsers
//!                ↑         ↑
//!            digest     oracle (compiler adapter)
//! ```

pub mod callbacks;
pub mod config;
pub mod digest;
pub mod logger;
pub mod oracle;
pub mod project;
pub mod reload;
pub mod server;
pub mod utils;
