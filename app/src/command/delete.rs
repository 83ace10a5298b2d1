use std::collections::HashSet;

use mantis_config::Config;
use tracing::info;

use super::{open_store, resolve_conversation_id};

/// Input parameters for the Delete command strategy.
#[derive(Debug, Clone)]
pub struct DeleteInput {
    /// Conversation ids or unique id prefixes
    pub ids: Vec<String>,
}

/// Remove the named conversations from the history file.
#[derive(Debug, Clone, Copy)]
pub struct DeleteStrategy;

impl super::CommandStrategy for DeleteStrategy {
    type Input = DeleteInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let store = open_store(&config)?;
        let saved = store.list_all(usize::MAX);

        let ids = input
            .ids
            .iter()
            .map(|query| resolve_conversation_id(&saved, query))
            .collect::<anyhow::Result<HashSet<String>>>()?;

        let removed = store.delete(&ids)?;
        info!("Deleted {removed} conversations");
        println!("Deleted {removed} conversation(s).");
        Ok(())
    }
}

/// Input parameters for the Purge command strategy.
#[derive(Debug, Clone, Copy)]
pub struct PurgeInput {
    /// Confirmation flag; nothing is deleted without it
    pub yes: bool,
}

/// Empty the history file.
#[derive(Debug, Clone, Copy)]
pub struct PurgeStrategy;

impl super::CommandStrategy for PurgeStrategy {
    type Input = PurgeInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        if !input.yes {
            anyhow::bail!("Refusing to delete every conversation without --yes");
        }

        let config = Config::load()?;
        let store = open_store(&config)?;
        let count = store.list_all(usize::MAX).len();

        store.delete_all()?;
        println!("Deleted all {count} saved conversation(s).");
        Ok(())
    }
}
