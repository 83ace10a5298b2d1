use mantis_config::Config;
use mantis_history::HistoryError;

use super::open_store;

/// Strategy for displaying configuration information.
///
/// Prints the masked API key, model defaults, history location and limits,
/// and whether the history file can currently be read.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;

        println!("=== mantis Configuration ===\n");

        println!("API Key:");
        match config.providers.gemini.resolve_api_key() {
            Ok(key) => println!("  Gemini: {}", mask_key(&key)),
            Err(_) => println!("  Gemini: (not set)"),
        }
        if let Some(base_url) = &config.providers.gemini.base_url {
            println!("  Base URL: {base_url}");
        }
        println!("  Google Search: {}", config.providers.gemini.google_search);
        println!();

        println!("Agent Defaults:");
        println!("  Model: {}", config.agents.defaults.model);
        println!();

        let store = open_store(&config)?;
        println!("History:");
        println!("  Path: {}", store.path().display());
        println!("  Max Messages Per Conversation: {}", config.history.max_history_length);
        println!("  Max Conversations: {}", config.history.max_conversations);
        println!("  Recent Window: {} days", config.history.recent_days);
        println!("  Listing Limit: {}", config.history.recent_limit);
        match store.try_load() {
            Ok(collection) => println!("  Status: {} saved conversation(s)", collection.len()),
            Err(HistoryError::StorageCorrupt { .. }) => {
                println!("  Status: unreadable JSON; it will be replaced on the next save");
            }
            Err(e) => println!("  Status: {e}"),
        }

        Ok(())
    }
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("AIzaSyExample1234"), "AIza...1234");
        assert_eq!(mask_key("short"), "***");
    }
}
