//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Async functions in production code MUST NOT use blocking I/O.
//! **Required**: `reqwest` async client, `tokio::io` for stdin.
//! **Acceptable**: blocking calls in plain `fn` (config loading happens before
//! any request is made), test code.

use architectural_enforcement::{enclosing_function, production_sources, Enclosing};

const BLOCKING_PATTERNS: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("std::net::", "Blocking network I/O"),
    ("std::process::Command", "Blocking process I/O"),
    ("reqwest::blocking", "Blocking HTTP client"),
    ("std::io::stdin()", "Blocking stdin"),
    ("std::io::stdout()", "Blocking stdout"),
    ("std::thread::sleep", "Blocking sleep"),
];

/// Test that async production code does not use blocking I/O
#[test]
fn test_no_blocking_io_in_async_code() {
    let mut violations = Vec::new();

    for file in production_sources() {
        for (idx, code) in file.production_lines() {
            // reqwest's blocking client is never allowed
            if code.contains("reqwest::blocking") {
                violations.push(file.violation(idx, "Blocking HTTP client"));
                continue;
            }

            if enclosing_function(&file.lines, idx) != Enclosing::AsyncFn {
                continue;
            }
            for (pattern, what) in BLOCKING_PATTERNS {
                if code.contains(pattern) {
                    violations.push(file.violation(idx, what));
                }
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking I/O calls found in async code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ REQUIRED async I/O:");
        eprintln!("  - reqwest::Client (async)");
        eprintln!("  - tokio::io::stdin() with AsyncBufReadExt");

        panic!(
            "\nFound {} blocking I/O violation(s) in async code.\nFix these before merging!",
            violations.len()
        );
    }
}

/// The core engine must not own a terminal
#[test]
fn test_core_does_not_print() {
    let mut violations = Vec::new();

    for file in production_sources() {
        if !file.path.to_string_lossy().contains("askflow/core") {
            continue;
        }
        for (idx, code) in file.production_lines() {
            if code.contains("println!(") || code.contains("eprintln!(") {
                violations.push(file.violation(idx, "Direct terminal output"));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "core must render through Presenter and log through tracing:\n{}",
        violations.join("\n")
    );
}
