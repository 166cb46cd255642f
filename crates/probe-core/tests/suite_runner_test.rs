//! Integration tests for running whole suites against scripted servers.
//!
//! Each test writes a small `/bin/sh` server into a temporary directory and
//! drives the built-in suite through it.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use probe_core::launch::LaunchSpec;
use probe_core::runner::{InvocationOutcome, RunOptions, run_suite};
use probe_core::scenario::builtin_suite;
use probe_core::verdict::Verdict;

// -----------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------

fn write_server(dir: &Path, body: &str) -> LaunchSpec {
    let path = dir.join("server.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    LaunchSpec::new(path.to_str().unwrap())
}

fn options(timeout: Duration) -> RunOptions {
    RunOptions {
        timeout,
        kill_grace: Duration::from_millis(200),
        handshake: false,
    }
}

/// Replies to whatever numeric id it receives with an empty result.
const RESPONDER: &str = r#"read line
id=$(printf '%s' "$line" | sed 's/.*"id":\([0-9]*\).*/\1/')
printf '{"jsonrpc":"2.0","id":%s,"result":{}}\n' "$id""#;

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[tokio::test]
async fn builtin_suite_launches_three_independent_processes() {
    let tmp = tempfile::tempdir().unwrap();
    let log = tmp.path().join("pids");
    let spec = write_server(
        tmp.path(),
        &format!(
            "echo $$ >> {log}\ncat > {dir}/stdin.$$",
            log = log.display(),
            dir = tmp.path().display()
        ),
    );

    let reports = run_suite(&spec, &builtin_suite(), &options(Duration::from_secs(5)), |_, _| {})
        .await;
    assert_eq!(reports.len(), 3);

    let pids: Vec<String> = std::fs::read_to_string(&log)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect();
    assert_eq!(pids.len(), 3, "expected one process per scenario, got {pids:?}");
    let mut unique = pids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 3, "processes must not be reused: {pids:?}");

    // Every server saw exactly one request line: its own.
    for (pid, scenario) in pids.iter().zip(builtin_suite()) {
        let received = std::fs::read_to_string(tmp.path().join(format!("stdin.{pid}"))).unwrap();
        assert_eq!(received, scenario.request.to_line().unwrap());
    }
}

#[tokio::test]
async fn current_weather_request_reaches_stdin_byte_exact() {
    let tmp = tempfile::tempdir().unwrap();
    let spec = write_server(tmp.path(), "cat");

    let reports = run_suite(&spec, &builtin_suite(), &options(Duration::from_secs(5)), |_, _| {})
        .await;
    let echoed = &reports[1].outcome.output().unwrap().stdout;
    assert_eq!(
        echoed,
        concat!(
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":"#,
            r#"{"name":"GetCurrentWeather","arguments":{"city":"Moscow","countryCode":"RU"}}}"#,
            "\n"
        )
    );
}

#[tokio::test]
async fn responder_passes_every_builtin_scenario() {
    let tmp = tempfile::tempdir().unwrap();
    let spec = write_server(tmp.path(), RESPONDER);

    let reports = run_suite(&spec, &builtin_suite(), &options(Duration::from_secs(5)), |_, _| {})
        .await;
    for report in &reports {
        assert_eq!(
            report.verdict,
            Verdict::Pass,
            "scenario {} failed: {:?}",
            report.scenario.name,
            report.outcome
        );
    }
}

#[tokio::test]
async fn timeout_in_first_scenario_does_not_stop_the_rest() {
    let tmp = tempfile::tempdir().unwrap();
    let spec = write_server(
        tmp.path(),
        &format!(
            "read line\ncase \"$line\" in *'\"id\":1,'*) exec sleep 60;; esac\n{}",
            RESPONDER.trim_start_matches("read line\n")
        ),
    );

    let mut finished = Vec::new();
    let reports = run_suite(
        &spec,
        &builtin_suite(),
        &options(Duration::from_secs(1)),
        |index, _| finished.push(index),
    )
    .await;

    assert_eq!(finished, vec![0, 1, 2]);
    assert!(matches!(
        reports[0].outcome,
        InvocationOutcome::Timeout { .. }
    ));
    assert!(!reports[0].verdict.is_pass());
    assert!(reports[1].verdict.is_pass(), "got {:?}", reports[1]);
    assert!(reports[2].verdict.is_pass(), "got {:?}", reports[2]);
}

#[tokio::test]
async fn missing_server_fails_every_scenario_without_panicking() {
    let spec = LaunchSpec::new("/nonexistent/probe-server");

    let reports = run_suite(&spec, &builtin_suite(), &options(Duration::from_secs(1)), |_, _| {})
        .await;
    assert_eq!(reports.len(), 3);
    for report in &reports {
        assert!(matches!(report.outcome, InvocationOutcome::LaunchError(_)));
        assert!(!report.verdict.is_pass());
    }
}
