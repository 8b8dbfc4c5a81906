//! libgit2-backed implementation of [`VersionControl`]

use crate::filter::METADATA_DIR;
use chrono::{DateTime, Utc};
use codedoc_core::{
    git_error, input_error, ChangeKind, CodedocError, CodedocResult, CommitAnalysis, CommitSummary,
    ErrorContext, FileChange, LogQuery, VersionControl,
};
use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    Commit, Cred, CredentialType, Delta, Diff, DiffOptions, ErrorClass, ErrorCode, FetchOptions,
    Oid, Patch, RemoteCallbacks, Repository, ResetType, Sort, Tree,
};
use std::path::Path;
use tracing::{debug, info, warn};

const COMPONENT: &str = "git_backend";
const ORIGIN: &str = "origin";
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Version control through libgit2
#[derive(Debug, Clone, Default)]
pub struct Git2Backend {
    /// Token offered for HTTPS remotes asking for a username/password
    token: Option<String>,
}

impl Git2Backend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer `token` as the password for HTTPS authentication
    pub fn with_token(token: Option<String>) -> Self {
        Self { token }
    }

    fn fetch_options(&self) -> FetchOptions<'_> {
        let mut callbacks = RemoteCallbacks::new();
        let mut attempts = 0;
        callbacks.credentials(move |url, username_from_url, allowed| {
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str("authentication failed"));
            }

            if allowed.contains(CredentialType::SSH_KEY) {
                let username = username_from_url.unwrap_or("git");
                debug!(username = %username, "Attempting SSH agent authentication");
                return Cred::ssh_key_from_agent(username);
            }

            if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
                if let Some(token) = &self.token {
                    return Cred::userpass_plaintext("oauth2", token);
                }
                if let Ok(config) = git2::Config::open_default() {
                    return Cred::credential_helper(&config, url, username_from_url);
                }
            }

            Cred::default()
        });

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);
        fetch_options.prune(git2::FetchPrune::On);
        fetch_options.download_tags(git2::AutotagOption::All);
        fetch_options
    }

    /// Open a working copy, reporting any failure as corruption
    fn open_for_update(&self, workdir: &Path) -> CodedocResult<Repository> {
        let metadata = workdir.join(METADATA_DIR);
        if !metadata.is_dir() {
            return Err(corrupted(workdir, format!("{} directory is missing", METADATA_DIR)));
        }

        let repo = Repository::open(workdir)
            .map_err(|e| corrupted(workdir, format!("cannot open repository: {}", e.message())))?;

        match repo.head() {
            Ok(head) => {
                if let Err(e) = head.peel_to_commit() {
                    return Err(corrupted(
                        workdir,
                        format!("HEAD points at an unreadable commit: {}", e.message()),
                    ));
                }
            }
            Err(e) if e.code() == ErrorCode::UnbornBranch => {}
            Err(e) => {
                return Err(corrupted(workdir, format!("HEAD is unreadable: {}", e.message())));
            }
        }

        if repo.find_remote(ORIGIN).is_err() {
            return Err(corrupted(workdir, "origin remote is missing".to_string()));
        }

        Ok(repo)
    }

    /// Move the checked-out branch to what origin has for it
    fn fast_forward(&self, repo: &Repository) -> Result<(), git2::Error> {
        let Some(branch) = head_branch(repo)? else {
            debug!("HEAD is detached, leaving working copy as is");
            return Ok(());
        };

        let remote_ref = format!("refs/remotes/{}/{}", ORIGIN, branch);
        let target = match repo.find_reference(&remote_ref) {
            Ok(reference) => reference.peel_to_commit()?,
            Err(e) if e.code() == ErrorCode::NotFound => {
                warn!(branch = %branch, "Remote has no such branch, nothing to update");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match repo.head() {
            Ok(_) => {
                repo.reset(target.as_object(), ResetType::Hard, None)?;
            }
            Err(e) if e.code() == ErrorCode::UnbornBranch => {
                repo.reference(
                    &format!("refs/heads/{}", branch),
                    target.id(),
                    true,
                    "codedoc: initial fetch",
                )?;
                repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
            }
            Err(e) => return Err(e),
        }

        debug!(branch = %branch, commit = %target.id(), "Fast-forwarded working copy");
        Ok(())
    }
}

impl VersionControl for Git2Backend {
    fn clone_repository(&self, source: &str, dest: &Path) -> CodedocResult<()> {
        info!(source = %source, dest = %dest.display(), "📥 Cloning repository");

        let mut builder = RepoBuilder::new();
        builder.fetch_options(self.fetch_options());
        builder
            .clone(source, dest)
            .map_err(|e| transport_error(e, "clone", source))?;

        info!(source = %source, "✅ Repository cloned successfully");
        Ok(())
    }

    fn fetch(&self, workdir: &Path) -> CodedocResult<()> {
        let repo = self.open_for_update(workdir)?;
        let mut remote = repo
            .find_remote(ORIGIN)
            .map_err(|e| git_failure(e, "fetch", workdir))?;
        let url = remote.url().unwrap_or_default().to_string();

        info!(remote = %url, workdir = %workdir.display(), "🔄 Fetching latest changes");
        let mut fetch_options = self.fetch_options();
        remote
            .fetch(&[] as &[&str], Some(&mut fetch_options), None)
            .map_err(|e| transport_error(e, "fetch", &url))?;
        drop(remote);

        self.fast_forward(&repo)
            .map_err(|e| git_failure(e, "fast_forward", workdir))?;
        Ok(())
    }

    fn log(&self, workdir: &Path, query: &LogQuery) -> CodedocResult<Vec<CommitSummary>> {
        let repo = open(workdir)?;
        let mut revwalk = repo.revwalk().map_err(|e| git_failure(e, "log", workdir))?;
        revwalk
            .set_sorting(Sort::TIME)
            .map_err(|e| git_failure(e, "log", workdir))?;

        match &query.start {
            Some(start) => {
                let commit = resolve_commit(&repo, start)?;
                revwalk
                    .push(commit.id())
                    .map_err(|e| git_failure(e, "log", workdir))?;
            }
            None => match repo.head() {
                Ok(_) => revwalk.push_head().map_err(|e| git_failure(e, "log", workdir))?,
                Err(e) if e.code() == ErrorCode::UnbornBranch => return Ok(Vec::new()),
                Err(e) => return Err(git_failure(e, "log", workdir)),
            },
        }

        let mut commits = Vec::new();
        for oid in revwalk {
            if query.max_count.is_some_and(|max| commits.len() >= max) {
                break;
            }

            let oid = oid.map_err(|e| git_failure(e, "log", workdir))?;
            let commit = repo
                .find_commit(oid)
                .map_err(|e| git_failure(e, "log", workdir))?;

            let summary = summarize(&commit);
            if query.since.is_some_and(|since| summary.timestamp < since) {
                break;
            }

            if let Some(path) = &query.path {
                let touched =
                    touches_path(&commit, path).map_err(|e| git_failure(e, "log", workdir))?;
                if !touched {
                    continue;
                }
            }

            commits.push(summary);
        }

        Ok(commits)
    }

    fn diff(&self, workdir: &Path, commit: &str) -> CodedocResult<CommitAnalysis> {
        let repo = open(workdir)?;
        let commit = resolve_commit(&repo, commit)?;

        let tree = commit.tree().map_err(|e| git_failure(e, "diff", workdir))?;
        let parent_tree = match commit.parent_count() {
            0 => None,
            _ => Some(
                commit
                    .parent(0)
                    .and_then(|parent| parent.tree())
                    .map_err(|e| git_failure(e, "diff", workdir))?,
            ),
        };

        let changes = diff_trees(&repo, parent_tree.as_ref(), &tree)
            .map_err(|e| git_failure(e, "diff", workdir))?;

        let summary = summarize(&commit);
        let total_additions = changes.iter().map(|c| c.additions).sum();
        let total_deletions = changes.iter().map(|c| c.deletions).sum();

        Ok(CommitAnalysis {
            short_id: short_id(commit.id()),
            id: summary.id,
            author: summary.author,
            author_email: summary.author_email,
            timestamp: summary.timestamp,
            message: summary.message,
            changes,
            total_additions,
            total_deletions,
        })
    }

    fn diff_range(&self, workdir: &Path, from: &str, to: &str) -> CodedocResult<Vec<FileChange>> {
        let repo = open(workdir)?;
        let from_tree = resolve_commit(&repo, from)?
            .tree()
            .map_err(|e| git_failure(e, "diff_range", workdir))?;
        let to_tree = resolve_commit(&repo, to)?
            .tree()
            .map_err(|e| git_failure(e, "diff_range", workdir))?;

        diff_trees(&repo, Some(&from_tree), &to_tree)
            .map_err(|e| git_failure(e, "diff_range", workdir))
    }

    fn default_branch(&self, workdir: &Path) -> CodedocResult<Option<String>> {
        let repo = open(workdir)?;
        head_branch(&repo).map_err(|e| git_failure(e, "default_branch", workdir))
    }

    fn head_commit(&self, workdir: &Path) -> CodedocResult<Option<String>> {
        let repo = open(workdir)?;
        let head = match repo.head() {
            Ok(head) => head
                .peel_to_commit()
                .map(|commit| Some(commit.id().to_string()))
                .map_err(|e| git_failure(e, "head_commit", workdir)),
            Err(e) if e.code() == ErrorCode::UnbornBranch => Ok(None),
            Err(e) => Err(git_failure(e, "head_commit", workdir)),
        };
        head
    }
}

fn open(workdir: &Path) -> CodedocResult<Repository> {
    Repository::open(workdir).map_err(|e| {
        git_error!(
            format!("Failed to open repository at {}: {}", workdir.display(), e.message()),
            COMPONENT,
            "open",
            e
        )
    })
}

/// Branch name HEAD refers to, born or not; None when detached
fn head_branch(repo: &Repository) -> Result<Option<String>, git2::Error> {
    let head = repo.find_reference("HEAD")?;
    Ok(head
        .symbolic_target()
        .and_then(|target| target.strip_prefix("refs/heads/"))
        .map(str::to_string))
}

fn resolve_commit<'r>(repo: &'r Repository, revision: &str) -> CodedocResult<Commit<'r>> {
    repo.revparse_single(revision)
        .and_then(|object| object.peel_to_commit())
        .map_err(|e| {
            input_error!(
                format!("Unknown revision '{}': {}", revision, e.message()),
                "revision",
                COMPONENT
            )
        })
}

fn summarize(commit: &Commit<'_>) -> CommitSummary {
    let author = commit.author();
    CommitSummary {
        id: commit.id().to_string(),
        author: author.name().unwrap_or("Unknown").to_string(),
        author_email: author.email().map(str::to_string),
        timestamp: DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0).unwrap_or_default(),
        message: commit.message().unwrap_or_default().trim().to_string(),
        parent_count: commit.parent_count(),
    }
}

fn short_id(oid: Oid) -> String {
    oid.to_string().chars().take(8).collect()
}

/// Whether `commit` changed `path` relative to its first parent
fn touches_path(commit: &Commit<'_>, path: &str) -> Result<bool, git2::Error> {
    let path = Path::new(path);
    let entry_id = |tree: &Tree<'_>| tree.get_path(path).ok().map(|entry| entry.id());

    let current = entry_id(&commit.tree()?);
    let previous = match commit.parent_count() {
        0 => None,
        _ => entry_id(&commit.parent(0)?.tree()?),
    };

    Ok(current != previous)
}

fn diff_trees(
    repo: &Repository,
    old: Option<&Tree<'_>>,
    new: &Tree<'_>,
) -> Result<Vec<FileChange>, git2::Error> {
    let mut diff_opts = DiffOptions::new();
    diff_opts.include_untracked(false);
    diff_opts.ignore_filemode(false);

    let mut diff = repo.diff_tree_to_tree(old, Some(new), Some(&mut diff_opts))?;
    let mut find_opts = git2::DiffFindOptions::new();
    find_opts.renames(true);
    diff.find_similar(Some(&mut find_opts))?;

    collect_changes(&diff)
}

fn collect_changes(diff: &Diff<'_>) -> Result<Vec<FileChange>, git2::Error> {
    let mut changes = Vec::new();

    for (idx, delta) in diff.deltas().enumerate() {
        let kind = match delta.status() {
            Delta::Added => ChangeKind::Added,
            Delta::Deleted => ChangeKind::Deleted,
            Delta::Modified => ChangeKind::Modified,
            Delta::Renamed => ChangeKind::Renamed,
            Delta::Copied => ChangeKind::Copied,
            Delta::Typechange => ChangeKind::TypeChanged,
            _ => continue,
        };

        let old_path = delta
            .old_file()
            .path()
            .map(|p| p.to_string_lossy().to_string());
        let new_path = delta
            .new_file()
            .path()
            .map(|p| p.to_string_lossy().to_string());

        let path = match kind {
            ChangeKind::Deleted => old_path.clone(),
            _ => new_path.or_else(|| old_path.clone()),
        }
        .unwrap_or_default();

        let (additions, deletions) = match Patch::from_diff(diff, idx)? {
            Some(patch) => {
                let (_, additions, deletions) = patch.line_stats()?;
                (additions, deletions)
            }
            None => (0, 0),
        };

        changes.push(FileChange {
            path,
            kind,
            old_path: match kind {
                ChangeKind::Renamed | ChangeKind::Copied => old_path,
                _ => None,
            },
            additions,
            deletions,
        });
    }

    Ok(changes)
}

fn corrupted(workdir: &Path, reason: String) -> CodedocError {
    CodedocError::Corrupted {
        path: workdir.to_path_buf(),
        reason,
        context: ErrorContext::new(COMPONENT).with_operation("open_for_update"),
    }
}

/// Errors while talking to a remote are network errors unless they are clearly local
fn transport_error(error: git2::Error, operation: &str, remote: &str) -> CodedocError {
    let message = format!("git {} of {} failed: {}", operation, remote, error.message());

    if is_local_source(remote)
        && (error.code() == ErrorCode::NotFound || error.class() == ErrorClass::Repository)
    {
        return input_error!(
            format!("{} is not a repository: {}", remote, error.message()),
            "identifier",
            COMPONENT
        );
    }

    let local = matches!(error.code(), ErrorCode::Exists | ErrorCode::Locked)
        || matches!(error.class(), ErrorClass::Filesystem | ErrorClass::Index);
    if local {
        return git_error!(message, COMPONENT, operation, error);
    }

    let mut context = ErrorContext::new(COMPONENT)
        .with_operation(operation)
        .with_metadata("remote", remote)
        .with_suggestion("Check the repository URL and your network connection");
    if error.code() == ErrorCode::Auth {
        context = context.with_suggestion("Provide an access token for private repositories");
    }

    CodedocError::Network {
        message,
        source: Some(Box::new(error)),
        context,
    }
}

/// Local paths and `file://` URLs are read without any network involved
fn is_local_source(remote: &str) -> bool {
    Path::new(remote).is_absolute() || remote.to_ascii_lowercase().starts_with("file://")
}

fn git_failure(error: git2::Error, operation: &str, workdir: &Path) -> CodedocError {
    git_error!(
        format!("{} failed in {}: {}", operation, workdir.display(), error.message()),
        COMPONENT,
        operation,
        error
    )
}
