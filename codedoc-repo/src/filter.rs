//! File filtering utilities for working-copy walks

use codedoc_core::{AnalysisConfig, CodedocError, CodedocResult, ErrorContext};
use glob::Pattern;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Version-control metadata directory, never walked regardless of configuration
pub const METADATA_DIR: &str = ".git";

/// Compiled file filter
#[derive(Debug, Clone)]
pub struct FileFilter {
    /// Whether to use .gitignore files
    use_gitignore: bool,
    /// Directory names that are never descended into
    excluded_dirs: Vec<String>,
    /// Compiled glob patterns for skipped files
    compiled_patterns: Vec<Pattern>,
}

impl FileFilter {
    /// Create a filter, compiling the configured glob patterns
    pub fn new(config: &AnalysisConfig) -> CodedocResult<Self> {
        let mut compiled_patterns = Vec::with_capacity(config.excluded_files.len());

        for pattern in &config.excluded_files {
            match Pattern::new(pattern) {
                Ok(compiled) => compiled_patterns.push(compiled),
                Err(e) => {
                    return Err(CodedocError::Config {
                        message: format!("Invalid glob pattern '{}': {}", pattern, e),
                        source: Some(Box::new(e)),
                        context: ErrorContext::new("file_filter")
                            .with_operation("compile_patterns")
                            .with_suggestion("Fix analysis.excluded_files in the config file"),
                    });
                }
            }
        }

        Ok(Self {
            use_gitignore: config.use_gitignore,
            excluded_dirs: config.excluded_dirs.clone(),
            compiled_patterns,
        })
    }

    /// Check if a directory should be traversed
    pub fn should_traverse_directory<P: AsRef<Path>>(&self, dir_path: P) -> bool {
        match dir_path.as_ref().file_name().and_then(|name| name.to_str()) {
            Some(METADATA_DIR) => false,
            Some(name) => !self.excluded_dirs.iter().any(|d| d == name),
            None => true,
        }
    }

    /// Check if a file should be included, given its path relative to the walk root
    pub fn should_include_file<P: AsRef<Path>>(&self, relative_path: P) -> bool {
        let path = relative_path.as_ref();
        let path_str = path.to_string_lossy().replace('\\', "/");
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("");

        !self
            .compiled_patterns
            .iter()
            .any(|pattern| pattern.matches(&path_str) || pattern.matches(filename))
    }

    /// All included files below `root`, as paths relative to `root`, sorted
    ///
    /// Hidden files and directories are skipped, as are `.gitignore`d paths when enabled.
    pub fn walk(&self, root: &Path) -> Vec<PathBuf> {
        let mut builder = WalkBuilder::new(root);
        builder.git_ignore(self.use_gitignore);
        builder.git_exclude(self.use_gitignore);
        builder.git_global(false);

        let dir_filter = self.clone();
        builder.filter_entry(move |entry| {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            !is_dir || entry.depth() == 0 || dir_filter.should_traverse_directory(entry.path())
        });

        let mut files = Vec::new();
        for result in builder.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };

            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };

            if self.should_include_file(relative) {
                files.push(relative.to_path_buf());
            }
        }

        files.sort();
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_walk_skips_excluded_entries() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/main.rs", "fn main() {}\n");
        write(root, "README.md", "# demo\n");
        write(root, ".git/config", "[core]\n");
        write(root, "node_modules/pkg/index.js", "module.exports = 1;\n");
        write(root, "logs/run.log", "boot\n");
        write(root, ".hidden/secret.txt", "x\n");

        let filter = FileFilter::new(&AnalysisConfig::default()).unwrap();
        let files = filter.walk(root);

        assert_eq!(
            files,
            vec![PathBuf::from("README.md"), PathBuf::from("src/main.rs")]
        );
    }

    #[test]
    fn test_metadata_dir_is_always_skipped() {
        let config = AnalysisConfig {
            excluded_dirs: vec![],
            ..AnalysisConfig::default()
        };
        let filter = FileFilter::new(&config).unwrap();
        assert!(!filter.should_traverse_directory("/repo/.git"));
        assert!(filter.should_traverse_directory("/repo/node_modules"));
    }

    #[test]
    fn test_invalid_pattern() {
        let config = AnalysisConfig {
            excluded_files: vec!["[".to_string()],
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            FileFilter::new(&config),
            Err(CodedocError::Config { .. })
        ));
    }

    #[test]
    fn test_pattern_matches_path_or_name() {
        let config = AnalysisConfig {
            excluded_files: vec!["docs/*.md".to_string(), "*.lock".to_string()],
            ..AnalysisConfig::default()
        };
        let filter = FileFilter::new(&config).unwrap();
        assert!(!filter.should_include_file("docs/guide.md"));
        assert!(!filter.should_include_file("nested/Cargo.lock"));
        assert!(filter.should_include_file("README.md"));
    }
}
