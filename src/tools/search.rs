//! Search tools: Glob and Grep.

use crate::error::ToolError;
use globset::{Glob, GlobMatcher};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Hard cap on grep matches; the report is marked truncated past this.
pub const MAX_GREP_MATCHES: usize = 100;

/// Directory names grep never descends into.
const SKIP_DIRS: &[&str] = &["node_modules", "target", "build", "dist", "__pycache__"];

/// File extensions grep treats as binary and skips.
const BINARY_EXTENSIONS: &[&str] = &[
    "class", "jar", "war", "ear", "zip", "tar", "gz", "png", "jpg", "jpeg", "gif", "ico", "pdf",
    "exe", "dll", "so", "dylib",
];

/// Recursively enumerate regular files under `base` whose path relative to
/// `base` matches `pattern`.
pub fn glob_files(pattern: &str, base: &Path) -> Result<String, ToolError> {
    if !base.is_dir() {
        return Err(ToolError::MissingDirectory(base.display().to_string()));
    }
    let matcher = Glob::new(pattern)
        .map_err(|e| ToolError::InvalidGlob {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?
        .compile_matcher();

    let mut matches = Vec::new();
    collect_glob_matches(base, base, &matcher, &mut matches)?;
    matches.sort();

    if matches.is_empty() {
        Ok(format!("No files matched pattern {pattern:?}"))
    } else {
        Ok(matches.join("\n"))
    }
}

fn collect_glob_matches(
    base: &Path,
    dir: &Path,
    matcher: &GlobMatcher,
    out: &mut Vec<String>,
) -> Result<(), ToolError> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| ToolError::io(dir.display().to_string(), e))?;
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            collect_glob_matches(base, &path, matcher, out)?;
        } else if file_type.is_file() {
            let relative = path.strip_prefix(base).unwrap_or(&path);
            if matcher.is_match(relative) {
                out.push(relative.display().to_string());
            }
        }
    }
    Ok(())
}

/// Regex line search across files under `base`, capped at
/// [`MAX_GREP_MATCHES`] records of the form `file:line: text`.
///
/// Hidden directories, the well-known build/dependency directories and
/// binary file extensions are skipped. `glob_filter` restricts the search to
/// files whose relative path matches the glob.
pub fn grep_files(
    pattern: &str,
    base: &Path,
    glob_filter: Option<&str>,
) -> Result<String, ToolError> {
    if !base.exists() {
        return Err(ToolError::MissingDirectory(base.display().to_string()));
    }
    let regex = Regex::new(pattern).map_err(|e| ToolError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    let filter = match glob_filter {
        Some(raw) => Some(
            Glob::new(raw)
                .map_err(|e| ToolError::InvalidGlob {
                    pattern: raw.to_string(),
                    reason: e.to_string(),
                })?
                .compile_matcher(),
        ),
        None => None,
    };

    let mut files = Vec::new();
    if base.is_file() {
        files.push(base.to_path_buf());
    } else {
        collect_grep_files(base, base, filter.as_ref(), &mut files);
        files.sort();
    }

    let mut records = Vec::new();
    let mut truncated = false;
    'files: for file in &files {
        let Ok(content) = std::fs::read_to_string(file) else {
            continue; // unreadable or non-UTF-8, skip
        };
        let relative = file.strip_prefix(base).unwrap_or(file);
        let label = if relative.as_os_str().is_empty() {
            file.display().to_string()
        } else {
            relative.display().to_string()
        };
        for (index, line) in content.lines().enumerate() {
            if regex.is_match(line) {
                if records.len() >= MAX_GREP_MATCHES {
                    truncated = true;
                    break 'files;
                }
                records.push(format!("{}:{}: {}", label, index + 1, line));
            }
        }
    }

    if records.is_empty() {
        return Ok(format!("No matches found for pattern {pattern:?}"));
    }
    let mut report = records.join("\n");
    if truncated {
        report.push_str(&format!(
            "\n(truncated: showing first {MAX_GREP_MATCHES} matches)"
        ));
    }
    Ok(report)
}

fn collect_grep_files(
    base: &Path,
    dir: &Path,
    filter: Option<&GlobMatcher>,
    out: &mut Vec<PathBuf>,
) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if name.starts_with('.') || SKIP_DIRS.contains(&name.as_ref()) {
                continue;
            }
            collect_grep_files(base, &path, filter, out);
        } else if file_type.is_file() {
            if let Some(ext) = path.extension().and_then(|e| e.to_str())
                && BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
            {
                continue;
            }
            if let Some(matcher) = filter {
                let relative = path.strip_prefix(base).unwrap_or(&path);
                if !matcher.is_match(relative) {
                    continue;
                }
            }
            out.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_glob_matches_recursively() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/a.rs", "");
        write(&dir, "src/deep/b.rs", "");
        write(&dir, "src/c.txt", "");
        let out = glob_files("**/*.rs", dir.path()).unwrap();
        assert!(out.contains("src/a.rs"));
        assert!(out.contains("src/deep/b.rs"));
        assert!(!out.contains("c.txt"));
    }

    #[test]
    fn test_glob_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = glob_files("*.rs", &dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, ToolError::MissingDirectory(_)));
    }

    #[test]
    fn test_glob_invalid_pattern() {
        let dir = TempDir::new().unwrap();
        let err = glob_files("a{b", dir.path()).unwrap_err();
        assert!(matches!(err, ToolError::InvalidGlob { .. }));
    }

    #[test]
    fn test_grep_emits_file_line_records() {
        let dir = TempDir::new().unwrap();
        write(&dir, "notes.txt", "alpha\nneedle here\nomega\n");
        let out = grep_files("needle", dir.path(), None).unwrap();
        assert_eq!(out, "notes.txt:2: needle here");
    }

    #[test]
    fn test_grep_skips_hidden_and_build_dirs() {
        let dir = TempDir::new().unwrap();
        write(&dir, ".git/config", "needle");
        write(&dir, "node_modules/pkg/index.js", "needle");
        write(&dir, "target/out.txt", "needle");
        write(&dir, "src/keep.txt", "needle");
        let out = grep_files("needle", dir.path(), None).unwrap();
        assert!(out.contains("src/keep.txt"));
        assert!(!out.contains(".git"));
        assert!(!out.contains("node_modules"));
        assert!(!out.contains("target"));
    }

    #[test]
    fn test_grep_skips_binary_extensions() {
        let dir = TempDir::new().unwrap();
        write(&dir, "image.png", "needle");
        write(&dir, "archive.JAR", "needle");
        write(&dir, "code.py", "needle");
        let out = grep_files("needle", dir.path(), None).unwrap();
        assert!(out.contains("code.py"));
        assert!(!out.contains("image.png"));
        assert!(!out.contains("archive.JAR"));
    }

    #[test]
    fn test_grep_truncates_at_cap() {
        let dir = TempDir::new().unwrap();
        let body = "needle\n".repeat(MAX_GREP_MATCHES + 20);
        write(&dir, "big.txt", &body);
        let out = grep_files("needle", dir.path(), None).unwrap();
        assert_eq!(
            out.lines().filter(|l| l.contains("big.txt")).count(),
            MAX_GREP_MATCHES
        );
        assert!(out.contains("truncated"));
    }

    #[test]
    fn test_grep_glob_filter() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.py", "needle");
        write(&dir, "b.js", "needle");
        let out = grep_files("needle", dir.path(), Some("*.py")).unwrap();
        assert!(out.contains("a.py"));
        assert!(!out.contains("b.js"));
    }

    #[test]
    fn test_grep_invalid_regex() {
        let dir = TempDir::new().unwrap();
        let err = grep_files("(unclosed", dir.path(), None).unwrap_err();
        assert!(matches!(err, ToolError::InvalidRegex { .. }));
    }

    #[test]
    fn test_grep_no_matches() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.txt", "nothing");
        let out = grep_files("needle", dir.path(), None).unwrap();
        assert!(out.contains("No matches"));
    }
}
