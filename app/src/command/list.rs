use mantis_config::Config;
use mantis_history::summarize;

use super::open_store;

/// Input parameters for the List command strategy.
#[derive(Debug, Clone)]
pub struct ListInput {
    /// Include conversations older than the configured recent window
    pub all: bool,
    /// Maximum number of entries; defaults to `history.recent_limit`
    pub limit: Option<usize>,
}

/// Print saved conversations, most recently written last.
#[derive(Debug, Clone, Copy)]
pub struct ListStrategy;

impl super::CommandStrategy for ListStrategy {
    type Input = ListInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let store = open_store(&config)?;
        let limit = input.limit.unwrap_or(config.history.recent_limit);

        let conversations = if input.all {
            store.list_all(limit)
        } else {
            store.list_recent(config.history.recent_days, limit)
        };

        if conversations.is_empty() {
            if input.all {
                println!("No saved conversations.");
            } else {
                println!(
                    "No conversations in the last {} days. Use --all to see older ones.",
                    config.history.recent_days
                );
            }
            return Ok(());
        }

        for (i, conversation) in conversations.iter().enumerate() {
            println!("\n{}. {}", i + 1, summarize(conversation, None));
        }
        Ok(())
    }
}
