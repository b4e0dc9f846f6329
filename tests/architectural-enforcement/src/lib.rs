//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - No sleep() calls in production code (timers use `tokio::time::interval`)
//! - No blocking I/O inside async functions
//!
//! The helpers here scan source text line by line. They are heuristics, tuned
//! to the layout used across the workspace: one `#[cfg(test)] mod tests` at the
//! bottom of a file, and `fn` signatures on a single line.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["askflow/core/src", "askflow/cli/src"];

/// Workspace root
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
}

/// A production source file, read into lines
pub struct SourceFile {
    /// Path of the file
    pub path: PathBuf,
    /// File contents split into lines
    pub lines: Vec<String>,
}

impl SourceFile {
    /// Format a violation at zero-based line `idx`
    #[must_use]
    pub fn violation(&self, idx: usize, what: &str) -> String {
        format!(
            "{}:{} - {}: {}",
            self.path.display(),
            idx + 1,
            what,
            self.lines[idx].trim()
        )
    }

    /// Line indices outside test code, paired with their comment-free text
    pub fn production_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        let test_start = self
            .lines
            .iter()
            .position(|l| l.trim() == "#[cfg(test)]")
            .unwrap_or(self.lines.len());
        self.lines[..test_start]
            .iter()
            .enumerate()
            .map(|(idx, line)| (idx, strip_comment(line)))
    }
}

/// Every `.rs` file under the production directories
#[must_use]
pub fn production_sources() -> Vec<SourceFile> {
    let root = workspace_root();
    let mut files = Vec::new();

    for dir in PRODUCTION_DIRS {
        let path = root.join(dir);
        if !path.exists() {
            continue;
        }
        for entry in walkdir::WalkDir::new(&path)
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.path().extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }
            // Shared test doubles are test code even though they live in src/
            if entry.path().file_name().and_then(|s| s.to_str()) == Some("test_utils.rs") {
                continue;
            }
            if let Ok(content) = fs::read_to_string(entry.path()) {
                files.push(SourceFile {
                    path: entry.path().to_path_buf(),
                    lines: content.lines().map(str::to_string).collect(),
                });
            }
        }
    }

    files
}

/// The part of a line before any `//` comment
#[must_use]
pub fn strip_comment(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Kind of function enclosing a line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Enclosing {
    /// Inside an `async fn`
    AsyncFn,
    /// Inside a plain `fn`
    SyncFn,
    /// At module level, or the signature could not be found
    Unknown,
}

/// Find the function enclosing `lines[idx]` by scanning backwards for a signature
#[must_use]
pub fn enclosing_function<S: AsRef<str>>(lines: &[S], idx: usize) -> Enclosing {
    for line in lines[..idx].iter().rev() {
        let line = strip_comment(line.as_ref()).trim();
        if is_fn_signature(line) {
            return if line.contains("async fn ") {
                Enclosing::AsyncFn
            } else {
                Enclosing::SyncFn
            };
        }
        if line.starts_with("mod ") || line.starts_with("impl") {
            return Enclosing::Unknown;
        }
    }
    Enclosing::Unknown
}

fn is_fn_signature(line: &str) -> bool {
    let without_vis = line
        .strip_prefix("pub(crate) ")
        .or_else(|| line.strip_prefix("pub "))
        .unwrap_or(line);
    without_vis.starts_with("fn ") || without_vis.starts_with("async fn ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enclosing_function() {
        let code = [
            "pub async fn load() {",
            "    let x = 1;",
            "}",
            "pub(crate) fn parse() {",
            "    let y = 2;",
            "}",
        ];
        assert_eq!(enclosing_function(&code, 1), Enclosing::AsyncFn);
        assert_eq!(enclosing_function(&code, 4), Enclosing::SyncFn);
        assert_eq!(enclosing_function(&code, 0), Enclosing::Unknown);
    }

    #[test]
    fn test_impl_block_boundary() {
        let code = ["impl Foo {", "    const X: u32 = 1;"];
        assert_eq!(enclosing_function(&code, 1), Enclosing::Unknown);
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("let a = 1; // sleep(1)"), "let a = 1; ");
        assert_eq!(strip_comment("no comment"), "no comment");
    }

    #[test]
    fn test_test_module_excluded() {
        let file = SourceFile {
            path: PathBuf::from("x.rs"),
            lines: vec![
                "fn a() {}".to_string(),
                "#[cfg(test)]".to_string(),
                "mod tests {}".to_string(),
            ],
        };
        assert_eq!(file.production_lines().count(), 1);
    }

    #[test]
    fn test_workspace_root_has_sources() {
        assert!(workspace_root().join("askflow/core/src/lib.rs").exists());
    }
}
