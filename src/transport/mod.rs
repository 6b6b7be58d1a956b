//! Transport layer
//!
//! Exposes the access evaluator to SSH front-ends.

pub mod stdio;

pub use stdio::{
    DEFAULT_RELOAD_DEBOUNCE, Query, WatchTargets, answer, run_stdio, serve_lines,
    spawn_reload_task,
};
