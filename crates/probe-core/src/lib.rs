//! Core library for `probe`, a smoke-test harness for tool servers that
//! speak newline-delimited JSON-RPC 2.0 over stdio.
//!
//! - [`rpc`]: request envelopes and response parsing.
//! - [`launch`]: how to start the subordinate process.
//! - [`runner`]: one fresh process per scenario, bounded by a timeout.
//! - [`scenario`]: built-in and user-defined scenario suites.
//! - [`verdict`]: pass/fail judgement on a captured reply.

pub mod launch;
pub mod rpc;
pub mod runner;
pub mod scenario;
pub mod verdict;
