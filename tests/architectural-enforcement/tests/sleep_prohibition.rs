//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT call sleep. Periodic work (insights
//! polling, the progress ticker) uses `tokio::time::interval` /
//! `interval_at`, and waiting on a reply uses the reply itself.
//! **Exceptions**: test code

use architectural_enforcement::production_sources;

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = Vec::new();

    for file in production_sources() {
        for (idx, code) in file.production_lines() {
            if code.contains("::sleep(") || code.contains(".sleep(") || code.contains("sleep_until(") {
                violations.push(file.violation(idx, "Sleep call"));
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ Use tokio::time::interval / interval_at for periodic tasks");
        eprintln!("✅ Use CancellationToken or the I/O future itself to wait");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

/// The poller must schedule checks with an interval, not a sleep loop
#[test]
fn test_poller_uses_interval() {
    let poller = production_sources()
        .into_iter()
        .find(|f| f.path.ends_with("enrichment.rs"))
        .expect("enrichment.rs should exist");

    let uses_interval = poller
        .production_lines()
        .any(|(_, code)| code.contains("interval_at("));
    let sets_missed_tick = poller
        .production_lines()
        .any(|(_, code)| code.contains("MissedTickBehavior::Delay"));

    assert!(uses_interval, "poller should use tokio::time::interval_at");
    assert!(sets_missed_tick, "poller should delay missed ticks");
}
