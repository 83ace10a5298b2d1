use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use mantis_history::{MAX_CONVERSATIONS, MAX_HISTORY_LENGTH, StoreLimits};

const CONFIG_DIR: &str = "mantis";
const CONFIG_FILE: &str = "config.json";
const HISTORY_FILE: &str = "history.json";
const API_KEY_ENV: &str = "GEMINI_API_KEY";
const API_KEY_PLACEHOLDER: &str = "your-gemini-api-key-here";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub agents: AgentsConfig,
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentsConfig {
    pub defaults: AgentDefaults,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentDefaults {
    pub model: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub gemini: GeminiConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Attach the Google Search grounding tool to every request
    #[serde(default = "GeminiConfig::default_google_search")]
    pub google_search: bool,
}

impl GeminiConfig {
    const fn default_google_search() -> bool {
        true
    }

    /// Configured key, or `GEMINI_API_KEY` when the file holds none.
    pub fn resolve_api_key(&self) -> anyhow::Result<String> {
        if !self.api_key.is_empty() && self.api_key != API_KEY_PLACEHOLDER {
            return Ok(self.api_key.clone());
        }

        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No Gemini API key configured. Set providers.gemini.api_key or {API_KEY_ENV}."
                )
            })
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HistoryConfig {
    /// History file location; `None` means next to the config file
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "HistoryConfig::default_max_history_length")]
    pub max_history_length: usize,
    #[serde(default = "HistoryConfig::default_max_conversations")]
    pub max_conversations: usize,
    #[serde(default = "HistoryConfig::default_recent_days")]
    pub recent_days: u32,
    #[serde(default = "HistoryConfig::default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_history_length: Self::default_max_history_length(),
            max_conversations: Self::default_max_conversations(),
            recent_days: Self::default_recent_days(),
            recent_limit: Self::default_recent_limit(),
        }
    }
}

impl HistoryConfig {
    const fn default_max_history_length() -> usize {
        MAX_HISTORY_LENGTH
    }

    const fn default_max_conversations() -> usize {
        MAX_CONVERSATIONS
    }

    const fn default_recent_days() -> u32 {
        7
    }

    const fn default_recent_limit() -> usize {
        100
    }

    #[must_use]
    pub fn limits(&self) -> StoreLimits {
        StoreLimits::default()
            .with_max_history_length(self.max_history_length)
            .with_max_conversations(self.max_conversations)
    }
}

impl Config {
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join(CONFIG_DIR))
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'mantis init' to create config.",
                config_path.display()
            );
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config at {}: {e}", path.display()))?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Resolved history file location.
    pub fn history_path(&self) -> anyhow::Result<PathBuf> {
        match &self.history.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join(HISTORY_FILE)),
        }
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join(CONFIG_FILE);
        Self::write_template(&config_path)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Edit the config file and add your Gemini API key (or export {API_KEY_ENV})");
        println!("   2. Run 'mantis chat' to start a conversation");
        println!();
        println!("🔧 Configuration options:");
        println!("   - model: default model (see 'mantis models')");
        println!("   - history.path: where conversations are saved (null = next to this file)");
        println!("   - history.recent_days: age window used by /history");
        println!();
        Ok(())
    }

    /// Write the default template to `path`; refuses to overwrite.
    pub fn write_template(path: &Path) -> anyhow::Result<()> {
        if path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                path.display()
            );
        }

        let config_template = r#"{
  "agents": {
    "defaults": {
      "model": "gemini-2.5-flash"
    }
  },
  "providers": {
    "gemini": {
      "api_key": "your-gemini-api-key-here",
      "google_search": true
    }
  },
  "history": {
    "path": null,
    "max_history_length": 200,
    "max_conversations": 200,
    "recent_days": 7,
    "recent_limit": 100
  }
}"#;

        std::fs::write(path, config_template)?;
        Ok(())
    }
}
