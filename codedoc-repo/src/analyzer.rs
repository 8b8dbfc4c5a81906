//! Language statistics for a working copy

use crate::filter::FileFilter;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Extension (lower-case, without the dot) -> language
const LANGUAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("py", "Python"),
    ("js", "JavaScript"),
    ("mjs", "JavaScript"),
    ("cjs", "JavaScript"),
    ("ts", "TypeScript"),
    ("java", "Java"),
    ("cpp", "C++"),
    ("cc", "C++"),
    ("cxx", "C++"),
    ("hpp", "C++"),
    ("c", "C"),
    ("h", "C"),
    ("cs", "C#"),
    ("php", "PHP"),
    ("rb", "Ruby"),
    ("go", "Go"),
    ("rs", "Rust"),
    ("swift", "Swift"),
    ("kt", "Kotlin"),
    ("kts", "Kotlin"),
    ("scala", "Scala"),
    ("html", "HTML"),
    ("htm", "HTML"),
    ("css", "CSS"),
    ("scss", "SCSS"),
    ("sass", "Sass"),
    ("less", "Less"),
    ("vue", "Vue"),
    ("jsx", "JSX"),
    ("tsx", "TSX"),
    ("md", "Markdown"),
    ("yml", "YAML"),
    ("yaml", "YAML"),
    ("json", "JSON"),
    ("toml", "TOML"),
    ("xml", "XML"),
    ("sql", "SQL"),
    ("sh", "Shell"),
    ("bash", "Bash"),
    ("zsh", "Zsh"),
    ("dockerfile", "Dockerfile"),
    ("r", "R"),
    ("m", "MATLAB"),
    ("pl", "Perl"),
    ("lua", "Lua"),
    ("dart", "Dart"),
    ("ex", "Elixir"),
    ("exs", "Elixir"),
    ("hs", "Haskell"),
];

/// Whole file names that identify a language without an extension
const LANGUAGE_FILENAMES: &[(&str, &str)] = &[
    ("Dockerfile", "Dockerfile"),
    ("Makefile", "Makefile"),
    ("CMakeLists.txt", "CMake"),
];

/// Detect a file's language from its name
pub fn detect_language(path: &Path) -> Option<&'static str> {
    let file_name = path.file_name()?.to_str()?;

    if let Some((_, language)) = LANGUAGE_FILENAMES.iter().find(|(name, _)| *name == file_name) {
        return Some(*language);
    }

    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    LANGUAGE_EXTENSIONS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, language)| *language)
}

/// Number of lines, counting a final line without a trailing newline
pub fn count_lines(content: &[u8]) -> usize {
    if content.is_empty() {
        return 0;
    }
    let newlines = content.iter().filter(|&&b| b == b'\n').count();
    if content.ends_with(b"\n") {
        newlines
    } else {
        newlines + 1
    }
}

/// Per-language totals for one working copy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageBreakdown {
    /// Language -> lines
    pub lines: BTreeMap<String, usize>,
    /// Language -> files
    pub files: BTreeMap<String, usize>,
    /// Every file walked, classified or not
    pub file_count: usize,
}

/// Walk `root` and count lines per detected language
pub fn analyze_languages(root: &Path, filter: &FileFilter, max_file_size: u64) -> LanguageBreakdown {
    let mut breakdown = LanguageBreakdown::default();

    for relative in filter.walk(root) {
        breakdown.file_count += 1;

        let Some(language) = detect_language(&relative) else {
            continue;
        };
        *breakdown.files.entry(language.to_string()).or_insert(0) += 1;

        let full_path = root.join(&relative);
        let too_large = std::fs::metadata(&full_path)
            .map(|meta| meta.len() > max_file_size)
            .unwrap_or(false);
        if too_large {
            debug!(path = %relative.display(), "Skipping line count for oversized file");
            breakdown.lines.entry(language.to_string()).or_insert(0);
            continue;
        }

        match std::fs::read(&full_path) {
            Ok(content) => {
                *breakdown.lines.entry(language.to_string()).or_insert(0) += count_lines(&content);
            }
            Err(e) => {
                debug!(path = %relative.display(), error = %e, "Skipping unreadable file");
            }
        }
    }

    breakdown
}
