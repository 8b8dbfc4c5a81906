//! CodeDoc Core - Core data structures and trait definitions
//!
//! This module defines the error taxonomy, configuration, logging and the shared data model
//! used by the repository cache and the command-line front end

pub mod config;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use traits::*;
pub use types::*;

// Re-export commonly used external types
pub use tracing;
