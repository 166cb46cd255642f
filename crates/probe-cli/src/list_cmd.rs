//! `probe list` command: show a suite's scenarios without launching anything.

use anyhow::Result;

use probe_core::scenario::Scenario;

/// Print the scenario table followed by the exact line each would send.
pub fn run_list(scenarios: &[Scenario]) -> Result<()> {
    print!("{}", render_list(scenarios)?);
    Ok(())
}

fn render_list(scenarios: &[Scenario]) -> Result<String> {
    let mut out = format!(
        "{:<24} {:<12} {:<14} {:<24} {:<8}\n{}\n",
        "SCENARIO",
        "ID",
        "METHOD",
        "TOOL",
        "EXPECT",
        "-".repeat(86)
    );

    for s in scenarios {
        out.push_str(&format!(
            "{:<24} {:<12} {:<14} {:<24} {:<8}\n",
            s.name,
            s.request.id.to_string(),
            s.request.method,
            s.request.tool_name().unwrap_or("-"),
            s.expect.to_string(),
        ));
    }

    out.push_str("\nRequests:\n");
    for s in scenarios {
        out.push_str(&format!("  {}: {}", s.name, s.request.to_line()?));
    }

    Ok(out)
}
