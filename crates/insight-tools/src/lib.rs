use async_trait::async_trait;
use insight_core::{InsightError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub mod transcript;
pub mod web_search;

pub use transcript::TranscriptTool;
pub use web_search::WebSearchTool;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn schema(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<Value>;
}

/// Registry of tools a server instance advertises.
///
/// Built once at startup and handed to the consumers that need it; nothing
/// mutates it while a connection is being served.
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registry pre-populated with the built-in search and transcript tools.
    pub fn with_builtin_tools() -> Self {
        let registry = Self::new();

        registry.register(WebSearchTool::new()).unwrap();
        registry.register(TranscriptTool::new()).unwrap();

        registry
    }

    /// Register a tool. Names must be unique within a registry.
    pub fn register(&self, tool: impl Tool + 'static) -> Result<()> {
        let mut tools = self.tools.write().unwrap();
        let name = tool.name().to_string();
        if tools.contains_key(&name) {
            return Err(InsightError::ConfigError(format!(
                "Tool '{name}' is already registered"
            )));
        }
        tools.insert(name, Arc::new(tool));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().unwrap();
        tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<String> {
        let tools = self.tools.read().unwrap();
        tools.keys().cloned().collect()
    }

    pub fn get_all(&self) -> Vec<Arc<dyn Tool>> {
        let tools = self.tools.read().unwrap();
        tools.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().unwrap().is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
