//! Core trait definitions

use crate::error::CodedocResult;
use crate::types::*;
use std::path::Path;

/// Narrow capability interface over a version-control implementation
///
/// The repository cache only ever talks to version control through this trait, so its
/// clone/update/recovery policy can be exercised against a fake implementation.
pub trait VersionControl: Send + Sync {
    /// Clone `source` (URL or local path) into `dest`, which must not exist yet
    fn clone_repository(&self, source: &str, dest: &Path) -> CodedocResult<()>;

    /// Bring an existing working copy up to date with its origin.
    ///
    /// Must return [`CodedocError::Corrupted`](crate::CodedocError::Corrupted) when the
    /// working copy metadata is missing or unreadable, and a network error when the remote
    /// cannot be reached. On network failure the working copy is left as it was.
    fn fetch(&self, workdir: &Path) -> CodedocResult<()>;

    /// Walk commit history newest-first
    fn log(&self, workdir: &Path, query: &LogQuery) -> CodedocResult<Vec<CommitSummary>>;

    /// Changes introduced by one commit relative to its first parent
    fn diff(&self, workdir: &Path, commit: &str) -> CodedocResult<CommitAnalysis>;

    /// Changes between two arbitrary revisions
    fn diff_range(&self, workdir: &Path, from: &str, to: &str) -> CodedocResult<Vec<FileChange>>;

    /// Branch HEAD points at, including an unborn branch in an empty repository
    fn default_branch(&self, workdir: &Path) -> CodedocResult<Option<String>>;

    /// Commit id HEAD resolves to
    fn head_commit(&self, workdir: &Path) -> CodedocResult<Option<String>>;
}
