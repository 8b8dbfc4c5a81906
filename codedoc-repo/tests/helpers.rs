//! Shared fixtures for repository cache integration tests

#![allow(dead_code)]

use codedoc_core::{AnalysisConfig, CacheConfig};
use codedoc_repo::RepositoryCache;
use git2::{Commit, IndexAddOption, Oid, Repository, RepositoryInitOptions, Signature, Time};
use std::cell::Cell;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const AUTHOR: &str = "Test Author";
pub const AUTHOR_EMAIL: &str = "author@example.com";
pub const INIT_BRANCH: &str = "main";

/// A throwaway upstream repository built with libgit2
pub struct FixtureRepo {
    dir: TempDir,
    repo: Repository,
    clock: Cell<i64>,
}

impl FixtureRepo {
    pub fn init() -> Self {
        let dir = TempDir::new().expect("Failed to create fixture dir");
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(INIT_BRANCH);
        let repo = Repository::init_opts(dir.path(), &opts).expect("Failed to init repository");

        Self {
            dir,
            repo,
            clock: Cell::new(1_700_000_000),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Identifier for this fixture as a user would type it
    pub fn identifier(&self) -> String {
        self.path().to_string_lossy().to_string()
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn write_lines(&self, relative: &str, line: &str, count: usize) {
        self.write(relative, &format!("{}\n", line).repeat(count));
    }

    pub fn remove(&self, relative: &str) {
        fs::remove_file(self.path().join(relative)).unwrap();
    }

    /// Stage everything in the work tree and commit it, one minute after the previous commit
    pub fn commit(&self, message: &str) -> Oid {
        let mut index = self.repo.index().unwrap();
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .unwrap();
        index.update_all(["*"].iter(), None).unwrap();
        index.write().unwrap();

        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();

        let seconds = self.clock.get() + 60;
        self.clock.set(seconds);
        let signature = Signature::new(AUTHOR, AUTHOR_EMAIL, &Time::new(seconds, 0)).unwrap();

        let parents: Vec<Commit<'_>> = match self.repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap()],
            Err(_) => vec![],
        };
        let parent_refs: Vec<&Commit<'_>> = parents.iter().collect();

        self.repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                message,
                &tree,
                &parent_refs,
            )
            .unwrap()
    }
}

/// Cache rooted in its own temp dir, backed by libgit2
pub fn git2_cache(root: &Path) -> RepositoryCache {
    RepositoryCache::new(CacheConfig::with_root(root), AnalysisConfig::default())
        .expect("Failed to create cache")
}
