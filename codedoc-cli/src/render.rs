//! Plain-text rendering of command results

use codedoc_core::{CommitAnalysis, EnsureOutcome, FileChange, FileHotspot, RepositoryInfo};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Note printed when `ensure` had to do more than a fetch
pub fn outcome_note(outcome: &EnsureOutcome) -> Option<String> {
    match outcome {
        EnsureOutcome::Cloned => Some("📥 Cloned into the cache".to_string()),
        EnsureOutcome::Updated => None,
        EnsureOutcome::Recreated { reason } => Some(format!(
            "🩹 Cached copy was corrupted ({}) and has been recreated",
            reason
        )),
    }
}

pub fn repository_info(info: &RepositoryInfo, structure: Option<&BTreeMap<String, Vec<String>>>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "📊 Repository: {}", info.source);
    let _ = writeln!(out, "   Path:    {}", info.local_path.display());
    let _ = writeln!(
        out,
        "   Branch:  {}",
        info.default_branch.as_deref().unwrap_or("(detached)")
    );
    let _ = writeln!(
        out,
        "   HEAD:    {}",
        info.head_commit.as_deref().unwrap_or("(no commits)")
    );
    let _ = writeln!(out, "   Commits: {}", info.total_commits);
    let _ = writeln!(out, "   Files:   {}", info.file_count);

    let authors: Vec<&str> = info.authors.iter().map(String::as_str).collect();
    let _ = writeln!(out, "   Authors ({}): {}", authors.len(), authors.join(", "));

    let total_lines = info.total_lines();
    if total_lines > 0 || !info.languages.is_empty() {
        let _ = writeln!(out, "\n🗂️ Languages ({} lines)", total_lines);

        let mut languages: Vec<(&String, &usize)> = info.languages.iter().collect();
        languages.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (language, lines) in languages {
            let files = info.language_files.get(language).copied().unwrap_or(0);
            let share = if total_lines == 0 {
                0.0
            } else {
                *lines as f64 * 100.0 / total_lines as f64
            };
            let _ = writeln!(
                out,
                "   {:<14} {:>8} lines {:>5} files {:>6.1}%",
                language, lines, files, share
            );
        }
    }

    if let Some(structure) = structure {
        let _ = writeln!(out, "\n📁 Structure");
        for (dir, files) in structure {
            let _ = writeln!(out, "   {}/", dir);
            for file in files {
                let _ = writeln!(out, "      {}", file);
            }
        }
    }

    out
}

pub fn file_change(change: &FileChange) -> String {
    let path = match &change.old_path {
        Some(old) => format!("{} -> {}", old, change.path),
        None => change.path.clone(),
    };
    format!(
        "{} {} (+{} -{})",
        change.kind.as_letter(),
        path,
        change.additions,
        change.deletions
    )
}

pub fn commit(analysis: &CommitAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "🔖 {} {} {}",
        analysis.short_id,
        analysis.timestamp.format("%Y-%m-%d %H:%M"),
        analysis.author
    );
    let _ = writeln!(out, "   {}", analysis.summary());
    for change in &analysis.changes {
        let _ = writeln!(out, "   {}", file_change(change));
    }
    let _ = writeln!(
        out,
        "   {} files changed, +{} -{}",
        analysis.changes.len(),
        analysis.total_additions,
        analysis.total_deletions
    );
    out
}

pub fn commits(analyses: &[CommitAnalysis]) -> String {
    if analyses.is_empty() {
        return "No commits found\n".to_string();
    }
    analyses.iter().map(commit).collect::<Vec<_>>().join("\n")
}

pub fn hotspots(hotspots: &[FileHotspot], threshold: usize) -> String {
    if hotspots.is_empty() {
        return format!("No files changed in {} or more commits\n", threshold);
    }

    let mut out = String::new();
    let _ = writeln!(out, "🔥 Files changed in at least {} commits", threshold);
    for hotspot in hotspots {
        let _ = writeln!(out, "   {:>5}  {}", hotspot.changes, hotspot.path);
    }
    out
}
