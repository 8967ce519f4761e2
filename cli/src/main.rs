use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use branch_policy_kernel::policy::status_check::StatusCheckPolicy;
use branch_policy_kernel::policy::PolicyMapper;
use branch_policy_kernel::remote::PolicyConfiguration;
use branch_policy_kernel::resource::PolicyResource;
use branch_policy_kernel::state::ResourceData;

/// Status check branch policy mapper CLI
#[derive(Parser, Debug)]
#[command(name = "branch-policy")]
#[command(about = "Map status check branch policies between local state and remote JSON", long_about = None)]
struct Cli {
    /// Log filter (overrides RUST_LOG), e.g. `debug`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the resource schema
    Schema,

    /// Validate a user configuration and print it with defaults applied
    Validate {
        /// Path to configuration JSON
        #[arg(long)]
        config: String,
    },

    /// Convert a remote policy configuration into local state
    Flatten {
        /// Path to remote policy configuration JSON
        #[arg(long)]
        remote: String,

        /// Project the policy belongs to
        #[arg(long)]
        project_id: String,
    },

    /// Convert local state into a remote policy configuration
    Expand {
        /// Path to local state JSON
        #[arg(long)]
        state: String,
    },
}

/// Wrapper for expand output
#[derive(Debug, Serialize)]
struct ExpandOutput {
    project_id: String,
    policy: PolicyConfiguration,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ----------------------------
    // Logging (stderr, stdout carries JSON)
    // ----------------------------
    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mapper = StatusCheckPolicy;
    tracing::debug!(command = ?cli.command, resource = mapper.name(), "running");

    match cli.command {
        Command::Schema => print_json(&mapper.schema()),

        Command::Validate { config } => {
            let raw: serde_json::Value = read_json(&config)?;
            let data = PolicyResource::new(mapper).plan(&raw)?;
            print_json(&data)
        }

        Command::Flatten { remote, project_id } => {
            let config: PolicyConfiguration = read_json(&remote)?;
            let mut data = ResourceData::new();
            mapper.flatten(&mut data, &config, &project_id)?;
            print_json(&data)
        }

        Command::Expand { state } => {
            let data: ResourceData = read_json(&state)?;
            let (policy, project_id) = mapper.expand(&data, mapper.policy_type())?;
            print_json(&ExpandOutput { project_id, policy })
        }
    }
}

fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "read input");
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
