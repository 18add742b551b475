//! `agentflow` command-line front end: build plans, validate planning data
//! and execute plans with the built-in dry-run executor.

use agentflow_core::{ExecutionStrategy, WorkflowPlan};
use agentflow_orchestrator::{
    build_workflow_plan, create_fallback_plan, validate_plan, DryRunExecutor, EngineConfig,
    StaticPlanningSource, WorkflowEngine, WorkflowPlanner,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agentflow", about = "Agentflow: plan and run agent task graphs")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "agentflow.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a plan and print it
    Plan {
        /// Goal the plan should achieve
        #[arg(short, long)]
        goal: String,
        /// Planning data (JSON) to build the plan from
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Ignore any planning data and use the built-in fallback plan
        #[arg(long)]
        fallback: bool,
    },
    /// Build a plan and execute it with the dry-run executor
    Run {
        /// Goal the plan should achieve
        #[arg(short, long)]
        goal: String,
        /// Planning data (JSON) to build the plan from
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Execution strategy (overrides the plan)
        #[arg(short, long)]
        strategy: Option<ExecutionStrategy>,
        /// Maximum concurrently running tasks (overrides config)
        #[arg(long)]
        max_parallel: Option<usize>,
    },
    /// Check planning data for cycles, dangling references and duplicates
    Validate {
        /// Planning data (JSON) to check
        #[arg(short, long)]
        data: PathBuf,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Engine settings from `path`; a missing file yields the defaults.
async fn load_config(path: &Path) -> anyhow::Result<EngineConfig> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        info!(path = %path.display(), "No config file, using defaults");
        return Ok(EngineConfig::default());
    }
    Ok(EngineConfig::load(path).await?)
}

async fn read_planning_data(path: &Path) -> anyhow::Result<StaticPlanningSource> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        anyhow::anyhow!("Failed to read planning data '{}': {e}", path.display())
    })?;
    Ok(StaticPlanningSource::from_json(&raw)?)
}

/// Plan for `goal`, from `data` when given and usable, else the fallback.
async fn resolve_plan(goal: &str, data: Option<&Path>) -> WorkflowPlan {
    let Some(path) = data else {
        return WorkflowPlanner::fallback_only().plan(goal).await;
    };
    match read_planning_data(path).await {
        Ok(source) => WorkflowPlanner::new(Arc::new(source)).plan(goal).await,
        Err(e) => {
            warn!(error = %e, "Unusable planning data, using fallback plan");
            WorkflowPlanner::fallback_only().plan(goal).await
        }
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    match cli.command {
        Commands::Plan {
            goal,
            data,
            fallback,
        } => {
            let plan = if fallback {
                build_workflow_plan(&goal, &create_fallback_plan(&goal))
            } else {
                resolve_plan(&goal, data.as_deref()).await
            };
            print_json(&plan)?;
        }
        Commands::Run {
            goal,
            data,
            strategy,
            max_parallel,
        } => {
            let mut config = load_config(&cli.config).await?;
            if let Some(max) = max_parallel {
                config = config.with_max_parallel_tasks(max);
            }

            let mut plan = resolve_plan(&goal, data.as_deref()).await;
            if let Some(strategy) = strategy {
                plan = plan.with_strategy(strategy);
            }

            let engine = WorkflowEngine::new(config, Arc::new(DryRunExecutor));
            let run = engine.execute(&plan).await?;
            print_json(&run)?;
            if !run.success {
                std::process::exit(2);
            }
        }
        Commands::Validate { data } => {
            let source = read_planning_data(&data).await?;
            let plan = WorkflowPlanner::new(Arc::new(source))
                .plan("validation")
                .await;
            let report = validate_plan(&plan);
            print_json(&report)?;
            if !report.is_clean() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
