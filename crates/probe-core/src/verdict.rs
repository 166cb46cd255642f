//! Pass/fail judgement on a scenario's captured reply.
//!
//! The runner treats server output as opaque text. This module scans it
//! for the JSON-RPC response answering the scenario's request and checks
//! it against the scenario's [`Expectation`].

use std::fmt;

use tracing::trace;

use crate::rpc::{RequestId, Response, ResponsePayload};
use crate::runner::InvocationOutcome;
use crate::scenario::Expectation;

/// Outcome of validating one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail { reason: String },
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    fn fail(reason: impl Into<String>) -> Self {
        Verdict::Fail {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("PASS"),
            Verdict::Fail { reason } => write!(f, "FAIL ({reason})"),
        }
    }
}

/// Find the first response on `stdout` whose id is `id`.
///
/// Blank lines, log lines and responses to other ids (such as the
/// handshake) are skipped.
pub fn find_response(stdout: &str, id: &RequestId) -> Option<Response> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match Response::parse(line) {
            Ok(response) => Some(response),
            Err(e) => {
                trace!(error = %e, "skipping non-response line");
                None
            }
        })
        .find(|response| response.id.as_ref() == Some(id))
}

/// Judge an invocation outcome against the scenario's expectation.
pub fn evaluate(id: &RequestId, expect: Expectation, outcome: &InvocationOutcome) -> Verdict {
    let Some(output) = outcome.output() else {
        return Verdict::fail(outcome.to_string());
    };

    let Some(response) = find_response(&output.stdout, id) else {
        return Verdict::fail(format!("no response with id {id} on stdout"));
    };

    match (expect, &response.payload) {
        (Expectation::Result, ResponsePayload::Error(err)) => Verdict::fail(format!(
            "expected result, got error {}: {}",
            err.code, err.message
        )),
        (Expectation::Error, ResponsePayload::Result(_)) => {
            Verdict::fail("expected error, got result")
        }
        _ => Verdict::Pass,
    }
}
