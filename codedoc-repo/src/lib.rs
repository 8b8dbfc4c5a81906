//! CodeDoc Repository - cached working copies and change inspection
//!
//! Resolves repository identifiers to cache keys, keeps one working copy per key under the
//! cache root, and answers metadata and history questions about it.

pub mod analyzer;
pub mod cache;
pub mod filter;
pub mod git;
pub mod identifier;
pub mod lock;

pub use analyzer::*;
pub use cache::*;
pub use filter::*;
pub use git::*;
pub use identifier::*;
pub use lock::*;
