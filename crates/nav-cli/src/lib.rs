//! Navigation CLI - command line tools for the rerouting pipeline.
//!
//! - demo_scenario: runs detection and rerouting in-process against a
//!   scripted classifier

pub mod scenario;

pub use scenario::{default_script, resolve_location, InlineLoader};
