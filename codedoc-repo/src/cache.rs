//! Repository cache - clone-once, fetch-after working copies keyed by repository identity
//!
//! Layout under the configured root:
//! - `repos/<key>/`     working copies
//! - `staging/<key>/`   clones in progress, renamed into `repos/` only on success
//! - `locks/<key>.lock` per-entry advisory locks shared across processes

use crate::analyzer::analyze_languages;
use crate::filter::FileFilter;
use crate::git::Git2Backend;
use crate::identifier::{self, RepositoryIdentifier};
use crate::lock::EntryLock;
use codedoc_core::performance::measure_sync;
use codedoc_core::{
    input_error, log_operation_error, log_operation_start, log_operation_success, not_found_error,
    AnalysisConfig, CacheConfig, CacheKey, CodedocError, CodedocResult, CommitAnalysis,
    EnsureOutcome, FileChange, FileHotspot, LogQuery, RepositoryInfo, VersionControl,
};
use chrono::{DateTime, Utc};
use git2::{Repository, RepositoryOpenFlags};
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

const COMPONENT: &str = "repository_cache";
const REPOS_DIR: &str = "repos";
const STAGING_DIR: &str = "staging";
const LOCKS_DIR: &str = "locks";

/// A cached working copy, locked for as long as the handle lives
///
/// The cache never deletes or replaces the directory while a handle for its key is held.
#[derive(Debug)]
pub struct WorkingCopyHandle {
    key: CacheKey,
    path: PathBuf,
    source: String,
    outcome: EnsureOutcome,
    lock: EntryLock,
}

impl WorkingCopyHandle {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Directory of the working copy
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identifier the handle was ensured from, with URL credentials removed
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn outcome(&self) -> &EnsureOutcome {
        &self.outcome
    }

    /// Give up the entry lock
    pub fn release(self) -> CodedocResult<()> {
        debug!(key = %self.key, "Releasing working copy");
        self.lock.release()
    }
}

/// Cache of working copies under one root directory
pub struct RepositoryCache {
    config: CacheConfig,
    analysis: AnalysisConfig,
    filter: FileFilter,
    vcs: Arc<dyn VersionControl>,
}

impl std::fmt::Debug for RepositoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryCache")
            .field("config", &self.config)
            .field("analysis", &self.analysis)
            .finish_non_exhaustive()
    }
}

impl RepositoryCache {
    /// Cache backed by libgit2
    pub fn new(config: CacheConfig, analysis: AnalysisConfig) -> CodedocResult<Self> {
        Self::with_backend(config, analysis, Arc::new(Git2Backend::new()))
    }

    /// Cache backed by any [`VersionControl`] implementation
    pub fn with_backend(
        config: CacheConfig,
        analysis: AnalysisConfig,
        vcs: Arc<dyn VersionControl>,
    ) -> CodedocResult<Self> {
        let filter = FileFilter::new(&analysis)?;
        Ok(Self {
            config,
            analysis,
            filter,
            vcs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    fn repos_dir(&self) -> PathBuf {
        self.config.root.join(REPOS_DIR)
    }

    fn staging_dir(&self) -> PathBuf {
        self.config.root.join(STAGING_DIR)
    }

    fn locks_dir(&self) -> PathBuf {
        self.config.root.join(LOCKS_DIR)
    }

    /// Normalize an identifier into its cache key without touching the filesystem
    pub fn resolve(&self, identifier: &str) -> CodedocResult<CacheKey> {
        identifier::resolve(identifier)
    }

    /// Directory the working copy for `key` lives in, whether or not it exists yet
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.repos_dir().join(key.as_str())
    }

    /// Bring the working copy for `identifier` up to date and lock it
    pub fn ensure(&self, identifier: &str) -> CodedocResult<WorkingCopyHandle> {
        let id = self.identify(identifier)?;
        let key = id.cache_key();
        let source = id.clone_source();
        // Remotes are labelled by their clone URL, which carries no credentials
        let label = if id.is_local() {
            identifier.trim().to_string()
        } else {
            source.clone()
        };

        log_operation_start!("ensure", key = %key);

        let lock = self.acquire(&key)?;
        self.sweep_staging(&key);

        let path = self.entry_path(&key);
        match self.refresh(&source, &key, &path) {
            Ok(outcome) => {
                log_operation_success!("ensure", key = %key, outcome = ?outcome);
                Ok(WorkingCopyHandle {
                    key,
                    path,
                    source: label,
                    outcome,
                    lock,
                })
            }
            Err(e) => {
                log_operation_error!("ensure", e, key = %key);
                if let Err(release_error) = lock.release() {
                    warn!(key = %key, error = %release_error, "Failed to release entry lock");
                }
                Err(e)
            }
        }
    }

    /// Parse an identifier, validating and canonicalizing local paths
    fn identify(&self, identifier: &str) -> CodedocResult<RepositoryIdentifier> {
        match RepositoryIdentifier::parse(identifier)? {
            RepositoryIdentifier::Local(path) => {
                Ok(RepositoryIdentifier::Local(validate_local_repository(&path)?))
            }
            remote => Ok(remote),
        }
    }

    fn acquire(&self, key: &CacheKey) -> CodedocResult<EntryLock> {
        EntryLock::acquire(
            &self.locks_dir(),
            key,
            Duration::from_secs(self.config.lock_timeout_secs),
            Duration::from_millis(self.config.lock_retry_ms),
        )
    }

    fn refresh(&self, source: &str, key: &CacheKey, path: &Path) -> CodedocResult<EnsureOutcome> {
        if !path.exists() {
            info!(key = %key, "📦 No cached copy, cloning");
            self.clone_into_place(source, key, path)?;
            return Ok(EnsureOutcome::Cloned);
        }

        match measure_sync("fetch", || self.vcs.fetch(path)) {
            Ok(()) => Ok(EnsureOutcome::Updated),
            Err(CodedocError::Corrupted { reason, .. }) if self.config.recreate_corrupted => {
                warn!(
                    key = %key,
                    path = %path.display(),
                    reason = %reason,
                    "🩹 Cached working copy is corrupted, recreating"
                );
                self.clone_into_place(source, key, path)?;
                Ok(EnsureOutcome::Recreated { reason })
            }
            Err(e) => Err(e),
        }
    }

    /// Clone into staging, then rename over `dest`; any existing entry is swapped out only
    /// once the new clone is complete
    fn clone_into_place(&self, source: &str, key: &CacheKey, dest: &Path) -> CodedocResult<()> {
        let result = self.swap_in_clone(source, key, dest);
        self.sweep_staging(key);
        result
    }

    fn swap_in_clone(&self, source: &str, key: &CacheKey, dest: &Path) -> CodedocResult<()> {
        let staging_dir = self.key_staging_dir(key);
        fs::create_dir_all(&staging_dir)?;
        fs::create_dir_all(self.repos_dir())?;

        let staging = staging_dir.join(staging_name());
        measure_sync("clone", || self.vcs.clone_repository(source, &staging))?;

        let displaced = if dest.exists() {
            let displaced = staging_dir.join(format!("{}.old", staging_name()));
            fs::rename(dest, &displaced)?;
            Some(displaced)
        } else {
            None
        };

        if let Err(e) = fs::rename(&staging, dest) {
            if let Some(displaced) = &displaced {
                // Put the previous entry back so a failed swap loses nothing
                let _ = fs::rename(displaced, dest);
            }
            return Err(e.into());
        }

        debug!(key = %key, path = %dest.display(), "Working copy moved into place");
        Ok(())
    }

    /// Staging area owned by `key` alone
    fn key_staging_dir(&self, key: &CacheKey) -> PathBuf {
        self.staging_dir().join(key.as_str())
    }

    /// Remove the key's staging area, including leftovers of crashed runs; only valid while
    /// holding the key's lock
    fn sweep_staging(&self, key: &CacheKey) {
        let staging_dir = self.key_staging_dir(key);
        if staging_dir.exists() {
            debug!(path = %staging_dir.display(), "Removing staging directory");
            discard(&staging_dir);
        }
    }

    /// Repository metadata derived from the working copy
    pub fn info(&self, copy: &WorkingCopyHandle) -> CodedocResult<RepositoryInfo> {
        let path = copy.path();
        info!(key = %copy.key(), "🔍 Analyzing working copy");

        let max_file_size = self.analysis.max_file_size_mb.saturating_mul(1024 * 1024);
        let breakdown = measure_sync("language_analysis", || {
            analyze_languages(path, &self.filter, max_file_size)
        });

        let history = measure_sync("history_scan", || self.vcs.log(path, &LogQuery::all()))?;
        let authors = history.iter().map(|commit| commit.author.clone()).collect();

        Ok(RepositoryInfo {
            source: copy.source().to_string(),
            local_path: path.to_path_buf(),
            default_branch: self.vcs.default_branch(path)?,
            head_commit: self.vcs.head_commit(path)?,
            total_commits: history.len(),
            authors,
            languages: breakdown.lines,
            language_files: breakdown.files,
            file_count: breakdown.file_count,
        })
    }

    /// Files a single commit changed, against its first parent
    pub fn changes(&self, copy: &WorkingCopyHandle, commit: &str) -> CodedocResult<CommitAnalysis> {
        let commit = commit.trim();
        if commit.is_empty() {
            return Err(input_error!("Commit id is empty", "commit", COMPONENT));
        }
        self.vcs.diff(copy.path(), commit)
    }

    /// Newest-first analyses of up to `count` commits, stopping at `since`
    pub fn recent_commits(
        &self,
        copy: &WorkingCopyHandle,
        count: usize,
        since: Option<DateTime<Utc>>,
    ) -> CodedocResult<Vec<CommitAnalysis>> {
        let query = LogQuery::latest(count).since(since);
        self.analyze_log(copy, &query)
    }

    /// Files that differ between two revisions; `to` defaults to HEAD
    pub fn changed_between(
        &self,
        copy: &WorkingCopyHandle,
        from: &str,
        to: Option<&str>,
    ) -> CodedocResult<Vec<FileChange>> {
        self.vcs.diff_range(copy.path(), from, to.unwrap_or("HEAD"))
    }

    /// Up to `max` newest commits that touched `path`
    pub fn file_history(
        &self,
        copy: &WorkingCopyHandle,
        path: &str,
        max: usize,
    ) -> CodedocResult<Vec<CommitAnalysis>> {
        let path = path.trim().trim_start_matches("./");
        if path.is_empty() {
            return Err(input_error!("File path is empty", "path", COMPONENT));
        }
        let query = LogQuery::latest(max).touching(path);
        self.analyze_log(copy, &query)
    }

    /// Files changed in at least `threshold` of the last `scan_limit` commits
    ///
    /// `scan_limit` falls back to `analysis.hotspot_scan_limit`. Sorted by change count,
    /// most frequent first, then by path.
    pub fn hotspots(
        &self,
        copy: &WorkingCopyHandle,
        threshold: usize,
        scan_limit: Option<usize>,
    ) -> CodedocResult<Vec<FileHotspot>> {
        let scan_limit = scan_limit.unwrap_or(self.analysis.hotspot_scan_limit);
        let commits = self.vcs.log(copy.path(), &LogQuery::latest(scan_limit))?;

        let mut counts: HashMap<String, usize> = HashMap::new();
        for commit in &commits {
            let analysis = self.vcs.diff(copy.path(), &commit.id)?;
            for change in analysis.changes {
                *counts.entry(change.path).or_insert(0) += 1;
            }
        }

        let mut hotspots: Vec<FileHotspot> = counts
            .into_iter()
            .filter(|(_, changes)| *changes >= threshold)
            .map(|(path, changes)| FileHotspot { path, changes })
            .collect();
        hotspots.sort_by(|a, b| b.changes.cmp(&a.changes).then_with(|| a.path.cmp(&b.path)));

        debug!(scanned = commits.len(), found = hotspots.len(), "Hotspot scan finished");
        Ok(hotspots)
    }

    /// Directory -> file names, using the same filter as [`RepositoryCache::info`]
    ///
    /// The working-copy root is reported as `.`.
    pub fn structure(&self, copy: &WorkingCopyHandle) -> BTreeMap<String, Vec<String>> {
        let mut tree: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for relative in self.filter.walk(copy.path()) {
            let Some(name) = relative.file_name() else {
                continue;
            };
            let dir = match relative.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => {
                    parent.to_string_lossy().replace('\\', "/")
                }
                _ => ".".to_string(),
            };
            tree.entry(dir)
                .or_default()
                .push(name.to_string_lossy().to_string());
        }

        for files in tree.values_mut() {
            files.sort();
        }
        tree
    }

    /// Key `ensure` would use for `identifier`
    ///
    /// Unlike [`RepositoryCache::resolve`], existing local paths are canonicalized first, so
    /// `./repo` and its absolute path map to the same entry. Nothing is written.
    pub fn locate(&self, identifier: &str) -> CodedocResult<CacheKey> {
        let key = match RepositoryIdentifier::parse(identifier)? {
            RepositoryIdentifier::Local(path) => match fs::canonicalize(expand_home(&path)) {
                Ok(canonical) => RepositoryIdentifier::Local(canonical).cache_key(),
                Err(_) => RepositoryIdentifier::Local(path).cache_key(),
            },
            remote => remote.cache_key(),
        };
        Ok(key)
    }

    /// Remove the cache entry for `identifier`; returns whether one existed
    pub fn evict(&self, identifier: &str) -> CodedocResult<bool> {
        let key = self.locate(identifier)?;
        let lock = self.acquire(&key)?;
        let path = self.entry_path(&key);
        let existed = path.exists();
        if existed {
            fs::remove_dir_all(&path)?;
            info!(key = %key, "🗑️ Evicted cached working copy");
        }
        self.sweep_staging(&key);
        lock.release_and_remove()?;

        Ok(existed)
    }

    /// Keys of every cached working copy, sorted
    pub fn entries(&self) -> CodedocResult<Vec<CacheKey>> {
        let repos_dir = self.repos_dir();
        if !repos_dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in fs::read_dir(&repos_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                keys.push(CacheKey::new(entry.file_name().to_string_lossy()));
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn analyze_log(
        &self,
        copy: &WorkingCopyHandle,
        query: &LogQuery,
    ) -> CodedocResult<Vec<CommitAnalysis>> {
        let commits = self.vcs.log(copy.path(), query)?;
        commits
            .iter()
            .map(|commit| self.vcs.diff(copy.path(), &commit.id))
            .collect()
    }
}

/// Expand a leading `~` to the home directory
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

/// A local identifier must name an existing repository root (working tree or bare)
fn validate_local_repository(path: &Path) -> CodedocResult<PathBuf> {
    let expanded = expand_home(path);
    if !expanded.exists() {
        return Err(not_found_error!(expanded.display(), COMPONENT));
    }

    let canonical = fs::canonicalize(&expanded)?;
    let not_a_root = |reason: String| {
        input_error!(
            format!("{} is not a repository root: {}", canonical.display(), reason),
            "identifier",
            COMPONENT
        )
    };

    let repo = Repository::open_ext(&canonical, RepositoryOpenFlags::NO_SEARCH, &[] as &[&OsStr])
        .map_err(|e| not_a_root(e.message().to_string()))?;
    let root = repo.workdir().unwrap_or_else(|| repo.path());
    let root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    if root != canonical {
        return Err(not_a_root(format!("the repository root is {}", root.display())));
    }

    Ok(canonical)
}

fn staging_name() -> String {
    Uuid::new_v4().simple().to_string()
}

fn discard(path: &Path) {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    if let Err(e) = result {
        if path.exists() {
            warn!(path = %path.display(), error = %e, "Failed to remove temporary directory");
        }
    }
}
