//! `probe run` command: drive every scenario of a suite against the server
//! and print request / response / error triples.

use std::path::Path;

use anyhow::{Context, Result};

use probe_core::runner::{InvocationOutcome, ScenarioReport, run_suite};
use probe_core::scenario::{self, Scenario};

use crate::config::ProbeConfig;

/// Load the suite at `path`, or the built-in one.
pub fn load_scenarios(path: Option<&Path>) -> Result<Vec<Scenario>> {
    match path {
        Some(path) => scenario::load_suite_file(path)
            .with_context(|| format!("invalid suite {}", path.display())),
        None => Ok(scenario::builtin_suite()),
    }
}

/// Run the suite and print each report as it completes.
///
/// Returns `true` when every scenario passed.
pub async fn run_probe(config: &ProbeConfig, scenarios: &[Scenario]) -> bool {
    println!("=== Probing {} ===", config.launch.display_command());
    println!();

    let reports = run_suite(&config.launch, scenarios, &config.options, |index, report| {
        print!("{}", render_report(index, report));
    })
    .await;

    let passed = reports.iter().filter(|r| r.verdict.is_pass()).count();
    println!("{}", render_summary(passed, reports.len()));
    passed == reports.len()
}

/// Render one scenario's block, ending with a blank line.
///
/// Captured stdout and stderr are printed exactly as received; only a
/// missing final newline is supplied.
pub fn render_report(index: usize, report: &ScenarioReport) -> String {
    let mut out = format!(
        "{}. {}...\nRequest: {}\n",
        index + 1,
        report.scenario.title,
        report.scenario.request
    );

    match &report.outcome {
        InvocationOutcome::Success(output) => {
            push_section(&mut out, "Response", &output.stdout);
            if !output.stderr.is_empty() {
                push_section(&mut out, "Errors", &output.stderr);
            }
        }
        failed => push_section(&mut out, "Error", &failed.to_string()),
    }

    out.push_str(&format!("Verdict: {}\n\n", report.verdict));
    out
}

fn push_section(out: &mut String, label: &str, text: &str) {
    out.push_str(label);
    out.push_str(": ");
    out.push_str(text);
    if !text.ends_with('\n') {
        out.push('\n');
    }
}

pub fn render_summary(passed: usize, total: usize) -> String {
    format!("=== Probe completed: {passed}/{total} scenarios passed ===")
}
