use agentflow_core::{AgentflowError, AgentflowResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Execution engine settings, usually read from the `[engine]` table of
/// `agentflow.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on concurrently running tasks, for every strategy.
    #[serde(default = "default_max_parallel_tasks")]
    pub max_parallel_tasks: usize,
    /// Prepended to `collab:{plan_id}` to form collaboration channel names.
    #[serde(default = "default_coordination_prefix")]
    pub coordination_prefix: String,
    /// Reject plans with cycles, dangling references or a diverged
    /// dependency graph instead of running them best-effort.
    #[serde(default)]
    pub strict_validation: bool,
}

fn default_max_parallel_tasks() -> usize {
    5
}

fn default_coordination_prefix() -> String {
    "agentflow:".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel_tasks: default_max_parallel_tasks(),
            coordination_prefix: default_coordination_prefix(),
            strict_validation: false,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    engine: EngineConfig,
}

impl EngineConfig {
    pub fn with_max_parallel_tasks(mut self, max: usize) -> Self {
        self.max_parallel_tasks = max;
        self
    }

    pub fn with_coordination_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.coordination_prefix = prefix.into();
        self
    }

    pub fn with_strict_validation(mut self, strict: bool) -> Self {
        self.strict_validation = strict;
        self
    }

    /// Concurrency cap, never below one.
    pub fn effective_parallelism(&self) -> usize {
        self.max_parallel_tasks.max(1)
    }

    /// Channel name used by the collaborative strategy for one plan run.
    pub fn collaboration_channel(&self, plan_id: &str) -> String {
        format!("{}collab:{plan_id}", self.coordination_prefix)
    }

    /// Parse a TOML document. Engine settings live under `[engine]`; a
    /// document without that table yields the defaults.
    pub fn from_toml_str(raw: &str) -> AgentflowResult<Self> {
        let file: ConfigFile = toml::from_str(raw)
            .map_err(|e| AgentflowError::Config(format!("Invalid engine config: {e}")))?;
        Ok(file.engine)
    }

    /// Load the engine settings from a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> AgentflowResult<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AgentflowError::Config(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&raw)
    }
}
