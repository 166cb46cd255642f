mod config;
mod list_cmd;
mod run_cmd;
#[cfg(test)]
mod test_util;

use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};

use config::{CliOverrides, ProbeConfig};

#[derive(Parser)]
#[command(
    name = "probe",
    version,
    about = "Smoke-test a JSON-RPC tool server over stdio"
)]
struct Cli {
    /// Config file path (overrides ~/.config/probe/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Defaults to `run` when omitted
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a probe config file
    Init {
        /// Server executable (e.g. "dotnet")
        #[arg(long)]
        command: String,
        /// Server argument; repeat for each one
        #[arg(long = "arg", allow_hyphen_values = true)]
        args: Vec<String>,
        /// Working directory for the server
        #[arg(long)]
        cwd: Option<PathBuf>,
        /// Environment variable the server reads its API key from
        #[arg(long)]
        credential_var: Option<String>,
        /// Per-scenario timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Send the MCP initialize handshake before each request
        #[arg(long)]
        handshake: bool,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Run a scenario suite against the server
    Run(RunArgs),
    /// List a suite's scenarios without launching the server
    List {
        /// Suite TOML file (defaults to the built-in weather suite)
        #[arg(long)]
        suite: Option<PathBuf>,
    },
    /// Print shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

#[derive(Args, Default)]
pub struct RunArgs {
    /// Suite TOML file (defaults to the built-in weather suite)
    #[arg(long)]
    suite: Option<PathBuf>,
    /// Per-scenario timeout in seconds (default: 10)
    #[arg(long)]
    timeout: Option<u64>,
    /// Send the MCP initialize handshake before each request
    #[arg(long)]
    handshake: bool,
    /// Exit with status 1 if any scenario fails
    #[arg(long)]
    strict: bool,
    /// Working directory for the server
    #[arg(long)]
    cwd: Option<PathBuf>,
    /// Extra environment variable for the server; repeatable
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = config::parse_env_pair)]
    env: Vec<(String, String)>,
    /// Server command and arguments (overrides the configured command)
    #[arg(last = true, value_name = "SERVER")]
    server: Vec<String>,
}

/// Parameters for `probe init`.
struct InitParams {
    command: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    credential_var: Option<String>,
    timeout: Option<u64>,
    handshake: bool,
    force: bool,
}

/// Execute the `probe init` command: write config file.
fn cmd_init(path: &Path, params: InitParams) -> anyhow::Result<()> {
    if path.exists() && !params.force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let run = (params.timeout.is_some() || params.handshake).then(|| config::RunSection {
        timeout_secs: params.timeout,
        handshake: params.handshake,
    });

    let cfg = config::ConfigFile {
        server: config::ServerSection {
            command: params.command,
            args: params.args,
            working_dir: params.cwd,
        },
        credential: params
            .credential_var
            .map(|env_var| config::CredentialSection {
                env_var,
                value: None,
            }),
        run,
    };

    config::save_config(path, &cfg)?;

    println!("Config written to {}", path.display());
    println!(
        "  server = {}",
        std::iter::once(cfg.server.command.as_str())
            .chain(cfg.server.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    );
    if let Some(cred) = &cfg.credential {
        println!();
        println!(
            "The server reads its key from {}. Set {} (or {}) before `probe run`.",
            cred.env_var,
            config::CREDENTIAL_ENV,
            cred.env_var
        );
    }

    Ok(())
}

/// Execute the `probe run` command. Returns whether every scenario passed.
async fn cmd_run(config_path: Option<&Path>, args: RunArgs) -> anyhow::Result<bool> {
    let file_config = config::load_optional_config(config_path)?;
    let overrides = CliOverrides {
        server: &args.server,
        working_dir: args.cwd.as_deref(),
        timeout_secs: args.timeout,
        handshake: args.handshake,
        env: &args.env,
    };
    let resolved = ProbeConfig::resolve(file_config.as_ref(), &overrides)?;
    let scenarios = run_cmd::load_scenarios(args.suite.as_deref())?;
    tracing::debug!(
        launch = ?resolved.launch,
        options = ?resolved.options,
        scenarios = scenarios.len(),
        "resolved probe configuration"
    );

    Ok(run_cmd::run_probe(&resolved, &scenarios).await)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or_else(|| Commands::Run(RunArgs::default())) {
        Commands::Init {
            command,
            args,
            cwd,
            credential_var,
            timeout,
            handshake,
            force,
        } => {
            let path = cli.config.unwrap_or_else(config::config_path);
            cmd_init(
                &path,
                InitParams {
                    command,
                    args,
                    cwd,
                    credential_var,
                    timeout,
                    handshake,
                    force,
                },
            )?;
        }
        Commands::Run(args) => {
            let strict = args.strict;
            let all_passed = cmd_run(cli.config.as_deref(), args).await?;
            if strict && !all_passed {
                std::process::exit(1);
            }
        }
        Commands::List { suite } => {
            let scenarios = run_cmd::load_scenarios(suite.as_deref())?;
            list_cmd::run_list(&scenarios)?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "probe", &mut std::io::stdout());
        }
    }

    Ok(())
}
