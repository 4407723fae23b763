//! RCA Cascade command line.
//!
//! - `run`: replay an investigation script against a dataset
//! - `serve`: expose one role's tools over stdio JSON-RPC
//! - `tools`: print the built-in tool definitions

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use rca_cascade::models::settings::AppConfig;
use rca_cascade::services::session::{ScriptedProposer, Session};
use rca_cascade::services::tools::{builtin_registry, serve, StdioToolServer};
use rca_cascade::utils::telemetry::{init_logging, Verbosity};
use rca_cascade::{DatasetScope, Role};
use rca_cascade_tools::{AuditSink, JsonlAuditLog, NoopAuditLog, ToolHandler};

const DEFAULT_TASK: &str = "Analyze the traces, logs and span metrics collected during the fault \
injection period, compare them with the normal period, and identify which service is the root cause.";

#[derive(Parser)]
#[command(name = "rca-cascade")]
#[command(about = "Two-role root-cause analysis over parquet observability data")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log to stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an investigation driven by a replay script
    Run {
        /// Dataset directory the data tools are confined to
        #[arg(long)]
        scope: PathBuf,

        /// JSON script of per-role actions
        #[arg(long)]
        script: PathBuf,

        /// Investigation task handed to the Planning role
        #[arg(long)]
        task: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Serve one role's tools over stdio
    Serve {
        /// Dataset directory the data tools are confined to
        #[arg(long)]
        scope: PathBuf,

        /// Role whose tools are exposed
        #[arg(long, value_enum, default_value = "analysis")]
        role: RoleArg,
    },

    /// List the built-in tools
    Tools {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Planning,
    Analysis,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Planning => Role::Planning,
            RoleArg::Analysis => Role::Analysis,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run_cli().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_cli() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = AppConfig::load_or_default(cli.config.as_deref())?;
    init_logging(
        Verbosity::from_occurrences(cli.verbose),
        config.logging.filter.as_deref(),
    )?;

    match cli.command {
        Commands::Run {
            scope,
            script,
            task,
            json,
        } => run_investigation(&config, scope, &script, task, json).await,
        Commands::Serve { scope, role } => {
            let scope = DatasetScope::new(scope)?;
            let registry = Arc::new(builtin_registry(&config.tools)?);
            let server = StdioToolServer::new(role.into(), scope, registry, open_audit(&config)?);
            serve(&server).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Tools { json } => {
            let registry = builtin_registry(&config.tools)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&registry.definitions())?);
            } else {
                for role in Role::ALL {
                    println!("{}:", role);
                    for name in registry.tools_for_role(role) {
                        let description = registry
                            .entry(&name)
                            .map(|entry| entry.handler().description().to_string())
                            .unwrap_or_default();
                        println!("  {:<26} {}", name, description);
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_investigation(
    config: &AppConfig,
    scope: PathBuf,
    script: &std::path::Path,
    task: Option<String>,
    json: bool,
) -> Result<ExitCode> {
    let scope = DatasetScope::new(scope)?;
    let registry = Arc::new(builtin_registry(&config.tools)?);
    let proposer = Arc::new(
        ScriptedProposer::from_file(script)
            .with_context(|| format!("loading script {}", script.display()))?,
    );

    let session = Session::builder()
        .scope(scope)
        .registry(registry)
        .audit(open_audit(config)?)
        .planner(proposer.clone())
        .analyst(proposer)
        .settings(&config.session)
        .build()?;

    let (report, code) = match session.run(task.unwrap_or_else(|| DEFAULT_TASK.to_string())).await {
        Ok(report) => (report, ExitCode::SUCCESS),
        Err(incomplete) => {
            eprintln!("{}", incomplete);
            (*incomplete.report, ExitCode::from(2))
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }
    Ok(code)
}

fn open_audit(config: &AppConfig) -> Result<Arc<dyn AuditSink>> {
    Ok(match &config.audit.path {
        Some(path) => Arc::new(
            JsonlAuditLog::open(path)
                .with_context(|| format!("opening audit log {}", path.display()))?,
        ),
        None => Arc::new(NoopAuditLog),
    })
}
