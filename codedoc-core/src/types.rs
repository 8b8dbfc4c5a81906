//! Core data type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// Filesystem-safe directory name for one logical repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a working copy was brought up to date by `ensure`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum EnsureOutcome {
    /// No entry existed; a fresh clone was moved into place
    Cloned,
    /// An existing entry was fetched and fast-forwarded
    Updated,
    /// The existing entry was corrupted and has been replaced by a fresh clone
    Recreated { reason: String },
}

impl EnsureOutcome {
    pub fn was_recovered(&self) -> bool {
        matches!(self, EnsureOutcome::Recreated { .. })
    }
}

/// Snapshot of repository metadata, derived from a working copy at query time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryInfo {
    /// Identifier the working copy was resolved from
    pub source: String,
    /// Directory of the working copy
    pub local_path: PathBuf,
    /// Branch HEAD points at (None for a detached HEAD)
    pub default_branch: Option<String>,
    /// Commit id HEAD resolves to (None for an empty repository)
    pub head_commit: Option<String>,
    pub total_commits: usize,
    /// Distinct author names
    pub authors: BTreeSet<String>,
    /// Language -> line count
    pub languages: BTreeMap<String, usize>,
    /// Language -> number of files
    pub language_files: BTreeMap<String, usize>,
    /// Every file walked, classified or not
    pub file_count: usize,
}

impl RepositoryInfo {
    pub fn total_lines(&self) -> usize {
        self.languages.values().sum()
    }

    /// Language with the most lines, ties broken by name
    pub fn primary_language(&self) -> Option<&str> {
        self.languages
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(language, _)| language.as_str())
    }
}

/// Kind of change a commit made to one path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    TypeChanged,
}

impl ChangeKind {
    /// Single-letter status as printed by `git diff --name-status`
    pub fn as_letter(&self) -> char {
        match self {
            ChangeKind::Added => 'A',
            ChangeKind::Modified => 'M',
            ChangeKind::Deleted => 'D',
            ChangeKind::Renamed => 'R',
            ChangeKind::Copied => 'C',
            ChangeKind::TypeChanged => 'T',
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Renamed => "renamed",
            ChangeKind::Copied => "copied",
            ChangeKind::TypeChanged => "type_changed",
        };
        f.write_str(name)
    }
}

/// One file touched by a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Path after the change (the deleted path for deletions)
    pub path: String,
    pub kind: ChangeKind,
    /// Source path for renames and copies
    pub old_path: Option<String>,
    pub additions: usize,
    pub deletions: usize,
}

/// A single log entry, without its diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub id: String,
    pub author: String,
    pub author_email: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub parent_count: usize,
}

/// A commit's metadata together with the files it changed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitAnalysis {
    pub id: String,
    pub short_id: String,
    pub author: String,
    pub author_email: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub changes: Vec<FileChange>,
    pub total_additions: usize,
    pub total_deletions: usize,
}

impl CommitAnalysis {
    /// First line of the commit message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }

    pub fn count_of(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }
}

/// A file that changes often across recent history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHotspot {
    pub path: String,
    /// Number of scanned commits that touched the file
    pub changes: usize,
}

/// Filter for walking commit history
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// Revision to start from (HEAD when None)
    pub start: Option<String>,
    /// Maximum number of commits to return
    pub max_count: Option<usize>,
    /// Stop at the first commit older than this
    pub since: Option<DateTime<Utc>>,
    /// Only commits touching this path
    pub path: Option<String>,
}

impl LogQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn latest(count: usize) -> Self {
        Self {
            max_count: Some(count),
            ..Self::default()
        }
    }

    pub fn since(mut self, since: Option<DateTime<Utc>>) -> Self {
        self.since = since;
        self
    }

    pub fn touching(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}
