use insight_core::{InsightError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

pub mod env_substitution;

pub use env_substitution::substitute_env_vars;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent: AgentSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub transcript: TranscriptSettings,
    #[serde(default)]
    pub mcp: McpSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSettings {
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Extra `mcpServers` YAML files to merge in, in order.
    #[serde(default)]
    pub config_files: Vec<String>,

    /// Server definitions declared inline, same shape as a `mcpServers` entry.
    #[serde(default)]
    pub inline_servers: HashMap<String, Value>,

    /// Names of servers to start; empty means every enabled server.
    #[serde(default)]
    pub servers: Vec<String>,
}

impl AgentConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            InsightError::ConfigError(format!("Failed to read config file: {e}"))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut raw: Value = serde_yaml::from_str(yaml)
            .map_err(|e| InsightError::ConfigError(format!("Failed to parse YAML: {e}")))?;

        substitute_env_vars(&mut raw)?;

        let config: AgentConfig = serde_json::from_value(raw)
            .map_err(|e| InsightError::ConfigError(format!("Invalid configuration: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.agent.name.is_empty() {
            return Err(InsightError::ConfigError(
                "Agent name cannot be empty".into(),
            ));
        }
        if self.search.max_results == 0 || self.search.max_results > 10 {
            return Err(InsightError::ConfigError(
                "search.max_results must be between 1 and 10".into(),
            ));
        }
        if self.transcript.language.is_empty() {
            return Err(InsightError::ConfigError(
                "transcript.language cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent: AgentSettings {
                name: "insight-agent".to_string(),
                version: default_version(),
            },
            search: SearchSettings::default(),
            transcript: TranscriptSettings::default(),
            mcp: McpSettings::default(),
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
        }
    }
}

impl Default for TranscriptSettings {
    fn default() -> Self {
        Self {
            language: default_language(),
        }
    }
}

impl Default for McpSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            config_files: Vec::new(),
            inline_servers: HashMap::new(),
            servers: Vec::new(),
        }
    }
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_language() -> String {
    "en".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let yaml = r#"
agent:
  name: insight-agent
"#;
        let config = AgentConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.agent.name, "insight-agent");
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.transcript.language, "en");
        assert!(!config.mcp.enabled);
    }

    #[test]
    fn parses_full_config() {
        let yaml = r#"
agent:
  name: business-agent
  version: "0.2.0"
search:
  max_results: 3
transcript:
  language: de
mcp:
  enabled: true
  config_files:
    - mcp-servers.yaml
  inline_servers:
    filesystem:
      command: npx
      args: ["-y", "@modelcontextprotocol/server-filesystem", "/tmp/workspace"]
  servers:
    - filesystem
"#;
        let config = AgentConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.agent.version, "0.2.0");
        assert_eq!(config.search.max_results, 3);
        assert_eq!(config.transcript.language, "de");
        assert!(config.mcp.enabled);
        assert_eq!(config.mcp.servers, vec!["filesystem"]);
        assert!(config.mcp.inline_servers.contains_key("filesystem"));
    }

    #[test]
    fn env_vars_are_substituted() {
        std::env::set_var("INSIGHT_AGENT_NAME", "env-agent");

        let yaml = r#"
agent:
  name: "${INSIGHT_AGENT_NAME}"
transcript:
  language: "${INSIGHT_AGENT_LANG:-en}"
"#;
        let config = AgentConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.agent.name, "env-agent");
        assert_eq!(config.transcript.language, "en");
    }

    #[test]
    fn rejects_out_of_range_max_results() {
        let yaml = r#"
agent:
  name: insight-agent
search:
  max_results: 50
"#;
        let err = AgentConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("max_results"));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "agent:\n  name: from-file").unwrap();

        let config = AgentConfig::from_yaml(file.path()).unwrap();
        assert_eq!(config.agent.name, "from-file");
    }
}
