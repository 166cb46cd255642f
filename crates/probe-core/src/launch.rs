//! Launch specification for the subordinate process.
//!
//! Use [`LaunchSpec::new`] for the command, then chain optional setters
//! (builder-style) before handing it to the runner.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

/// How to start the server under test.
#[derive(Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// The executable to run (e.g. `dotnet`).
    pub command: String,
    /// Arguments passed to the command.
    pub args: Vec<String>,
    /// Working directory; `None` inherits the harness's own.
    pub working_dir: Option<PathBuf>,
    /// Variables set on top of the inherited environment. Credentials
    /// arrive here from configuration.
    pub env: BTreeMap<String, String>,
}

// Values in `env` may be secrets, so only their names are shown.
impl fmt::Debug for LaunchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchSpec")
            .field("command", &self.command)
            .field("args", &self.args)
            .field("working_dir", &self.working_dir)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl LaunchSpec {
    /// Create a spec with no arguments, no working directory override and
    /// no environment overrides.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    /// Replace the argument list.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Override one environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// `command arg1 arg2 ...`, for banners and diagnostics.
    pub fn display_command(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Build the child command with all three standard streams piped.
    ///
    /// On Unix the child leads a new process group whose id equals its pid,
    /// so anything it starts can be signalled together with it.
    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}
