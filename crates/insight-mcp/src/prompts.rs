//! Prompt registry for the `prompts/list` and `prompts/get` handlers

use insight_core::{InsightError, Result};
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{McpPrompt, PromptArgument};

/// A named prompt template the server can render on request.
pub trait Prompt: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn arguments(&self) -> Vec<PromptArgument>;
    fn render(&self, args: &HashMap<String, String>) -> Result<String>;
}

/// Prompts a server instance advertises. Built before the server is
/// constructed and immutable afterwards, like the tool registry.
#[derive(Default)]
pub struct PromptRegistry {
    prompts: HashMap<String, Arc<dyn Prompt>>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, prompt: impl Prompt + 'static) -> Result<()> {
        let name = prompt.name().to_string();
        if self.prompts.contains_key(&name) {
            return Err(InsightError::ConfigError(format!(
                "Prompt '{name}' is already registered"
            )));
        }
        self.prompts.insert(name, Arc::new(prompt));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Prompt>> {
        self.prompts.get(name).cloned()
    }

    /// Wire descriptors, sorted by name for stable listings.
    pub fn descriptors(&self) -> Vec<McpPrompt> {
        let mut prompts: Vec<McpPrompt> = self
            .prompts
            .values()
            .map(|p| McpPrompt {
                name: p.name().to_string(),
                description: p.description().to_string(),
                arguments: p.arguments(),
            })
            .collect();
        prompts.sort_by(|a, b| a.name.cmp(&b.name));
        prompts
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}
