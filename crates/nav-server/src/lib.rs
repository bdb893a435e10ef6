//! Shared library surface for the navigation server, its tools and tests.

pub mod alerts;
pub mod api;
pub mod config;
pub mod loops;
pub mod providers;
pub mod runtime;
pub mod state;

pub use runtime::{init_tracing, spawn_runtime, Collaborators};
