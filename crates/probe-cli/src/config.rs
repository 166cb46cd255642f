//! Configuration file management for probe.
//!
//! Provides a TOML-based config file at `~/.config/probe/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use probe_core::launch::LaunchSpec;
use probe_core::runner::{DEFAULT_TIMEOUT, RunOptions};

/// Whitespace-separated server command line.
pub const SERVER_COMMAND_ENV: &str = "PROBE_SERVER_COMMAND";
/// Per-scenario timeout in seconds.
pub const TIMEOUT_ENV: &str = "PROBE_TIMEOUT_SECS";
/// Credential value injected under `credential.env_var`.
pub const CREDENTIAL_ENV: &str = "PROBE_CREDENTIAL";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub server: ServerSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<CredentialSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<RunSection>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServerSection {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialSection {
    /// Name of the variable the server reads its API key from.
    pub env_var: String,
    /// The key itself. Prefer `PROBE_CREDENTIAL` over storing it here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RunSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub handshake: bool,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the probe config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/probe` or `~/.config/probe`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("probe");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("probe")
}

/// Return the default path to the probe config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse a config file. Returns an error if it does not exist.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Load the config file for this invocation.
///
/// An explicit `--config` path must exist. The default location is
/// optional: when nothing is there, `None` is returned.
pub fn load_optional_config(explicit: Option<&Path>) -> Result<Option<ConfigFile>> {
    match explicit {
        Some(path) => load_config(path).map(Some),
        None => {
            let path = config_path();
            if path.exists() {
                load_config(&path).map(Some)
            } else {
                Ok(None)
            }
        }
    }
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix, since it may hold a credential.
pub fn save_config(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values taken from the command line. Empty/`None` means "not given".
#[derive(Debug, Default)]
pub struct CliOverrides<'a> {
    /// Trailing `-- <command> [args...]`.
    pub server: &'a [String],
    pub working_dir: Option<&'a Path>,
    pub timeout_secs: Option<u64>,
    pub handshake: bool,
    /// Extra `KEY=VALUE` variables for the server.
    pub env: &'a [(String, String)],
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct ProbeConfig {
    pub launch: LaunchSpec,
    pub options: RunOptions,
}

impl ProbeConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - Server: `overrides.server` > `PROBE_SERVER_COMMAND` > `server.command`/`server.args` > error
    /// - Working dir: `overrides.working_dir` > `server.working_dir` > inherited
    /// - Timeout: `overrides.timeout_secs` > `PROBE_TIMEOUT_SECS` > `run.timeout_secs` > 10s
    /// - Credential (only when `[credential]` is configured):
    ///   `PROBE_CREDENTIAL` > `credential.value` > the harness's own `env_var` > error
    pub fn resolve(file_config: Option<&ConfigFile>, overrides: &CliOverrides<'_>) -> Result<Self> {
        // Server command resolution.
        let mut launch = if let Some((command, args)) = overrides.server.split_first() {
            LaunchSpec::new(command).args(args.iter().cloned())
        } else if let Ok(line) = std::env::var(SERVER_COMMAND_ENV) {
            let mut parts = line.split_whitespace();
            let Some(command) = parts.next() else {
                bail!("{SERVER_COMMAND_ENV} is set but empty");
            };
            LaunchSpec::new(command).args(parts)
        } else if let Some(cfg) = file_config {
            LaunchSpec::new(cfg.server.command.as_str()).args(cfg.server.args.iter().cloned())
        } else {
            bail!(
                "no server command configured; pass `probe run -- <command> [args...]`, \
                 set {SERVER_COMMAND_ENV}, or run `probe init`"
            );
        };

        // Working directory resolution.
        if let Some(dir) = overrides.working_dir {
            launch = launch.working_dir(dir);
        } else if let Some(dir) = file_config.and_then(|c| c.server.working_dir.as_ref()) {
            launch = launch.working_dir(dir);
        }

        // Credential injection.
        if let Some(cred) = file_config.and_then(|c| c.credential.as_ref()) {
            let value = if let Ok(value) = std::env::var(CREDENTIAL_ENV) {
                value
            } else if let Some(value) = &cred.value {
                value.clone()
            } else if let Ok(value) = std::env::var(&cred.env_var) {
                value
            } else {
                bail!(
                    "credential for {} not found; set {CREDENTIAL_ENV}, export {}, \
                     or add credential.value to the config file",
                    cred.env_var,
                    cred.env_var
                );
            };
            launch = launch.env(cred.env_var.as_str(), value);
        }

        for (key, value) in overrides.env {
            launch = launch.env(key.as_str(), value.as_str());
        }

        // Timeout resolution.
        let run = file_config.and_then(|c| c.run.as_ref());
        let timeout = if let Some(secs) = overrides.timeout_secs {
            Duration::from_secs(secs.max(1))
        } else if let Ok(raw) = std::env::var(TIMEOUT_ENV) {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{TIMEOUT_ENV} is not a whole number of seconds: {raw:?}"))?;
            Duration::from_secs(secs.max(1))
        } else if let Some(secs) = run.and_then(|r| r.timeout_secs) {
            Duration::from_secs(secs.max(1))
        } else {
            DEFAULT_TIMEOUT
        };

        let options = RunOptions {
            timeout,
            handshake: overrides.handshake || run.is_some_and(|r| r.handshake),
            ..RunOptions::default()
        };

        Ok(Self { launch, options })
    }
}

/// Parse a `KEY=VALUE` pair for `--env`.
pub fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
