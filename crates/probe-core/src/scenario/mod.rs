//! Scenario definitions.
//!
//! A scenario is one fixed request sent to a fresh server process. Suites
//! come from the embedded `weather.toml` library or from a user TOML file
//! parsed by [`suite::parse_suite_toml`].

pub mod suite;

use std::fmt;
use std::str::FromStr;

use crate::rpc::Request;

pub use suite::{SuiteParseError, load_suite_file, parse_suite_toml};

/// Name of the suite compiled into the binary.
pub const BUILTIN_SUITE_NAME: &str = "weather";

/// The embedded built-in suite.
static BUILTIN_SUITE_TOML: &str = include_str!("weather.toml");

/// What a scenario's response must contain to pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expectation {
    /// Either a `result` or an `error` response.
    #[default]
    Any,
    /// A `result` response.
    Result,
    /// An `error` response.
    Error,
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Expectation::Any => "any",
            Expectation::Result => "result",
            Expectation::Error => "error",
        };
        f.write_str(s)
    }
}

impl FromStr for Expectation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "any" => Ok(Expectation::Any),
            "result" => Ok(Expectation::Result),
            "error" => Ok(Expectation::Error),
            other => Err(format!("unknown expectation: {other}")),
        }
    }
}

/// One request/response exchange run against its own server process.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    /// Unique slug (e.g. `current_weather`).
    pub name: String,
    /// Human-readable label printed before the exchange.
    pub title: String,
    /// The request written to the server's stdin.
    pub request: Request,
    /// What the reply must contain to pass.
    pub expect: Expectation,
}

/// Load the built-in `weather` suite: list tools, current weather for
/// Moscow, and a three-day forecast for London.
///
/// # Panics
///
/// Panics if the embedded TOML is malformed. This is a compile-time
/// invariant -- if the binary was built, the TOML is valid.
pub fn builtin_suite() -> Vec<Scenario> {
    parse_suite_toml(BUILTIN_SUITE_TOML).expect("embedded weather.toml is invalid")
}
