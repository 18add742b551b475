use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

/// Metadata key marking a task whose failure does not fail the plan.
pub const OPTIONAL_KEY: &str = "optional";
/// Metadata key holding the collaboration channel a task is bound to.
pub const COLLABORATION_CHANNEL_KEY: &str = "collaboration_channel";
/// Metadata key enabling context sharing between collaborating agents.
pub const ENABLE_SHARING_KEY: &str = "enable_sharing";

/// Capability an agent must have to take on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentCapability {
    /// Free-form text handling.
    TextProcessing,
    /// Labelling or routing a request.
    Classification,
    /// Condensing content.
    Summarization,
    /// Writing source code.
    CodeGeneration,
    /// Reading and reviewing source code.
    CodeAnalysis,
    /// Working with structured or tabular data.
    DataAnalysis,
    /// Searching the web.
    WebSearch,
    /// Reading and writing files.
    FileOperations,
    /// Calling external APIs.
    ApiIntegration,
    /// Decomposing goals into steps.
    Planning,
    /// Coordinating other agents.
    Coordination,
}

impl AgentCapability {
    /// Wire name of the capability.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentCapability::TextProcessing => "text_processing",
            AgentCapability::Classification => "classification",
            AgentCapability::Summarization => "summarization",
            AgentCapability::CodeGeneration => "code_generation",
            AgentCapability::CodeAnalysis => "code_analysis",
            AgentCapability::DataAnalysis => "data_analysis",
            AgentCapability::WebSearch => "web_search",
            AgentCapability::FileOperations => "file_operations",
            AgentCapability::ApiIntegration => "api_integration",
            AgentCapability::Planning => "planning",
            AgentCapability::Coordination => "coordination",
        }
    }
}

impl std::fmt::Display for AgentCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentCapability {
    type Err = String;

    /// Accepts any casing, with `_`, `-` or spaces between words.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        let cap = match normalized.as_str() {
            "text_processing" => AgentCapability::TextProcessing,
            "classification" => AgentCapability::Classification,
            "summarization" => AgentCapability::Summarization,
            "code_generation" => AgentCapability::CodeGeneration,
            "code_analysis" => AgentCapability::CodeAnalysis,
            "data_analysis" => AgentCapability::DataAnalysis,
            "web_search" => AgentCapability::WebSearch,
            "file_operations" => AgentCapability::FileOperations,
            "api_integration" => AgentCapability::ApiIntegration,
            "planning" => AgentCapability::Planning,
            "coordination" => AgentCapability::Coordination,
            _ => return Err(format!("unknown capability '{s}'")),
        };
        Ok(cap)
    }
}

/// An atomic unit of work targeting one agent and action.
///
/// `task_id` is unique within a plan. `dependencies` may name tasks that are
/// not in the plan, or form a cycle; neither is rejected here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTask {
    pub task_id: String,
    pub agent_type: String,
    pub action: String,
    #[serde(default)]
    pub inputs: HashMap<String, serde_json::Value>,
    /// Predecessor task ids, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Higher runs first among otherwise-ready tasks.
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub capabilities_required: BTreeSet<AgentCapability>,
    /// Execution-context scratchpad (collaboration channel, optional flag, ...).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AgentTask {
    pub fn new(
        task_id: impl Into<String>,
        agent_type: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            agent_type: agent_type.into(),
            action: action.into(),
            inputs: HashMap::new(),
            dependencies: Vec::new(),
            priority: 0,
            capabilities_required: BTreeSet::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.inputs.insert(key.into(), value);
        self
    }

    pub fn with_capability(mut self, capability: AgentCapability) -> Self {
        self.capabilities_required.insert(capability);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Mark the task optional: its failure neither halts execution nor fails the plan.
    pub fn optional(self) -> Self {
        self.with_metadata(OPTIONAL_KEY, serde_json::Value::Bool(true))
    }

    /// Whether `metadata.optional` is `true` (boolean or the string `"true"`).
    pub fn is_optional(&self) -> bool {
        match self.metadata.get(OPTIONAL_KEY) {
            Some(serde_json::Value::Bool(flag)) => *flag,
            Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// The collaboration channel stamped on this task, if any.
    pub fn collaboration_channel(&self) -> Option<&str> {
        self.metadata
            .get(COLLABORATION_CHANNEL_KEY)
            .and_then(serde_json::Value::as_str)
    }
}
