use mantis_config::Config;
use mantis_history::{TranscriptView, render_transcript, summarize};

use super::{open_store, resolve_conversation_id};

/// Input parameters for the Show command strategy.
#[derive(Debug, Clone)]
pub struct ShowInput {
    /// Conversation id or unique id prefix
    pub id: String,
    /// Print every message in full instead of truncating long ones
    pub full: bool,
}

/// Print one saved conversation without starting a chat.
#[derive(Debug, Clone, Copy)]
pub struct ShowStrategy;

impl super::CommandStrategy for ShowStrategy {
    type Input = ShowInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let store = open_store(&config)?;

        let id = resolve_conversation_id(&store.list_all(usize::MAX), &input.id)?;
        let conversation = store
            .find_by_id(&id)
            .ok_or_else(|| anyhow::anyhow!("Conversation not found: {id}"))?;

        let view = if input.full {
            TranscriptView::Full
        } else {
            TranscriptView::Loaded
        };

        println!("{}", summarize(&conversation, None));
        if !conversation.session_duration.is_empty() {
            println!("    Session duration: {}", conversation.session_duration);
        }
        println!(
            "{}",
            render_transcript(
                &conversation.messages,
                conversation.name.as_deref(),
                Some(&conversation.id),
                view,
            )
        );
        Ok(())
    }
}
