//! Suite TOML parser with validation.
//!
//! Parses a suite file into [`Scenario`] values and validates:
//! - The suite contains at least one scenario.
//! - Scenario names and request ids are unique.
//! - `tools/call` scenarios name a `tool`; `arguments` only appear with one.
//! - `expect` is one of `any`, `result`, `error`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::{Expectation, Scenario};
use crate::rpc::{Params, Request, RequestId, ToolCallParams};

/// Errors that can occur while loading a suite.
#[derive(Debug, Error)]
pub enum SuiteParseError {
    #[error("failed to read suite file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("suite must contain at least one scenario")]
    NoScenarios,

    #[error("duplicate scenario name: {0:?}")]
    DuplicateName(String),

    #[error("duplicate request id {id} on scenario {scenario:?}")]
    DuplicateId { scenario: String, id: RequestId },

    #[error("scenario {0:?} calls tools/call but names no `tool`")]
    MissingTool(String),

    #[error("scenario {0:?} has `arguments` but no `tool`")]
    ArgumentsWithoutTool(String),

    #[error("invalid expect {value:?} on scenario {scenario:?} (expected any, result, or error)")]
    InvalidExpect { scenario: String, value: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SuiteToml {
    #[serde(default)]
    scenarios: Vec<ScenarioToml>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioToml {
    name: String,
    title: Option<String>,
    id: RequestId,
    method: String,
    tool: Option<String>,
    arguments: Option<Map<String, Value>>,
    expect: Option<String>,
}

/// Parse and validate a suite TOML string.
pub fn parse_suite_toml(content: &str) -> Result<Vec<Scenario>, SuiteParseError> {
    let suite: SuiteToml = toml::from_str(content)?;
    if suite.scenarios.is_empty() {
        return Err(SuiteParseError::NoScenarios);
    }

    let mut names = HashSet::new();
    let mut ids = HashSet::new();
    let mut scenarios = Vec::with_capacity(suite.scenarios.len());

    for raw in suite.scenarios {
        if !names.insert(raw.name.clone()) {
            return Err(SuiteParseError::DuplicateName(raw.name));
        }
        if !ids.insert(raw.id.clone()) {
            return Err(SuiteParseError::DuplicateId {
                scenario: raw.name,
                id: raw.id,
            });
        }
        scenarios.push(build_scenario(raw)?);
    }

    Ok(scenarios)
}

/// Read and parse a suite file from disk.
pub fn load_suite_file(path: &Path) -> Result<Vec<Scenario>, SuiteParseError> {
    let content = std::fs::read_to_string(path).map_err(|source| SuiteParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_suite_toml(&content)
}

fn build_scenario(raw: ScenarioToml) -> Result<Scenario, SuiteParseError> {
    let expect = match raw.expect.as_deref() {
        None => Expectation::default(),
        Some(value) => value
            .parse::<Expectation>()
            .map_err(|_| SuiteParseError::InvalidExpect {
                scenario: raw.name.clone(),
                value: value.to_owned(),
            })?,
    };

    let mut request = Request::new(raw.id, raw.method);
    match (raw.tool, raw.arguments) {
        (Some(name), arguments) => {
            request = request.with_params(Params::ToolCall(ToolCallParams {
                name,
                arguments: arguments.unwrap_or_default(),
            }));
        }
        (None, Some(_)) => return Err(SuiteParseError::ArgumentsWithoutTool(raw.name)),
        (None, None) if request.method == "tools/call" => {
            return Err(SuiteParseError::MissingTool(raw.name));
        }
        (None, None) => {}
    }

    Ok(Scenario {
        title: raw.title.unwrap_or_else(|| raw.name.clone()),
        name: raw.name,
        request,
        expect,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(extra: &str) -> String {
        format!(
            r#"
[[scenarios]]
name = "list"
id = 1
method = "tools/list"
{extra}
"#
        )
    }

    #[test]
    fn parses_minimal_suite_with_defaults() {
        let suite = parse_suite_toml(&minimal("")).unwrap();
        assert_eq!(suite.len(), 1);
        assert_eq!(suite[0].title, "list");
        assert_eq!(suite[0].expect, Expectation::Any);
        assert!(suite[0].request.params.is_none());
    }

    #[test]
    fn parses_string_ids_and_expectations() {
        let suite = parse_suite_toml(
            r#"
[[scenarios]]
name = "unknown_tool"
title = "Calling a tool that does not exist"
id = "call-1"
method = "tools/call"
tool = "NoSuchTool"
expect = "error"
"#,
        )
        .unwrap();
        let s = &suite[0];
        assert_eq!(s.request.id, RequestId::from("call-1"));
        assert_eq!(s.expect, Expectation::Error);
        assert_eq!(s.request.tool_name(), Some("NoSuchTool"));
        match &s.request.params {
            Some(Params::ToolCall(call)) => assert!(call.arguments.is_empty()),
            other => panic!("expected tool call params, got {other:?}"),
        }
    }

    #[test]
    fn tool_on_other_method_still_produces_params() {
        let suite = parse_suite_toml(
            r#"
[[scenarios]]
name = "custom"
id = 9
method = "tools/describe"
tool = "Echo"
arguments = { verbose = true }
"#,
        )
        .unwrap();
        assert_eq!(suite[0].request.method, "tools/describe");
        assert_eq!(suite[0].request.tool_name(), Some("Echo"));
    }

    #[test]
    fn rejects_empty_suite() {
        assert!(matches!(
            parse_suite_toml(""),
            Err(SuiteParseError::NoScenarios)
        ));
    }

    #[test]
    fn rejects_duplicate_names() {
        let content = format!("{}{}", minimal(""), minimal("").replace("id = 1", "id = 2"));
        assert!(matches!(
            parse_suite_toml(&content),
            Err(SuiteParseError::DuplicateName(name)) if name == "list"
        ));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let content = format!(
            "{}{}",
            minimal(""),
            minimal("").replace("name = \"list\"", "name = \"again\"")
        );
        let err = parse_suite_toml(&content).unwrap_err();
        assert!(
            matches!(&err, SuiteParseError::DuplicateId { scenario, id }
                if scenario == "again" && *id == RequestId::Number(1)),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn rejects_tool_call_without_tool() {
        let content = minimal("").replace("tools/list", "tools/call");
        assert!(matches!(
            parse_suite_toml(&content),
            Err(SuiteParseError::MissingTool(name)) if name == "list"
        ));
    }

    #[test]
    fn rejects_arguments_without_tool() {
        let content = minimal("arguments = { city = \"Paris\" }");
        assert!(matches!(
            parse_suite_toml(&content),
            Err(SuiteParseError::ArgumentsWithoutTool(_))
        ));
    }

    #[test]
    fn rejects_invalid_expect() {
        let content = minimal("expect = \"maybe\"");
        let err = parse_suite_toml(&content).unwrap_err();
        assert!(err.to_string().contains("invalid expect \"maybe\""), "got: {err}");
    }

    #[test]
    fn rejects_unknown_keys() {
        let content = minimal("timeout = 5");
        assert!(matches!(
            parse_suite_toml(&content),
            Err(SuiteParseError::TomlError(_))
        ));
    }

    #[test]
    fn load_suite_file_reports_missing_path() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.toml");
        let err = load_suite_file(&missing).unwrap_err();
        assert!(matches!(err, SuiteParseError::Read { .. }));
        assert!(err.to_string().contains("nope.toml"));
    }

    #[test]
    fn load_suite_file_reads_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("suite.toml");
        std::fs::write(&path, minimal("")).unwrap();
        let suite = load_suite_file(&path).unwrap();
        assert_eq!(suite[0].name, "list");
    }
}
