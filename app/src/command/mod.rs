//! Static strategy pattern for CLI commands.
//!
//! Each subcommand is a separate strategy type with its own input, so
//! dispatch in `main` is monomorphized and adding a command only means
//! implementing [`CommandStrategy`].

use std::sync::Arc;

use mantis_config::Config;
use mantis_core::LLMProvider;
use mantis_history::{Conversation, ConversationStore};
use mantis_providers::GeminiProvider;
use tracing::info;

mod chat;
mod delete;
mod info;
mod init;
mod list;
mod models;
mod show;
mod slash;
mod version;

pub use chat::{ChatInput, ChatStrategy};
pub use delete::{DeleteInput, DeleteStrategy, PurgeInput, PurgeStrategy};
pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use list::{ListInput, ListStrategy};
pub use models::{ModelsStrategy, TestModelsInput, TestModelsStrategy};
pub use show::{ShowInput, ShowStrategy};
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
pub trait CommandStrategy: Send + Sync + 'static {
    /// The input type this strategy accepts.
    type Input;

    /// Execute the command with the given input.
    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// Everything a command that talks to the model needs.
pub struct CommonComponents {
    pub config: Config,
    pub store: ConversationStore,
    pub provider: Arc<dyn LLMProvider>,
}

/// Load config, then build the history store and the Gemini transport.
pub fn init_common_components() -> anyhow::Result<CommonComponents> {
    let config = Config::load()?;
    let store = open_store(&config)?;
    let provider = build_provider(&config)?;

    Ok(CommonComponents {
        config,
        store,
        provider,
    })
}

/// History store configured from `config`; does not need an API key.
pub fn open_store(config: &Config) -> anyhow::Result<ConversationStore> {
    let path = config.history_path()?;
    info!("History path: {}", path.display());
    Ok(ConversationStore::new(path).with_limits(config.history.limits()))
}

fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn LLMProvider>> {
    let gemini = &config.providers.gemini;
    let mut provider =
        GeminiProvider::new(gemini.resolve_api_key()?).with_google_search(gemini.google_search);
    if let Some(base_url) = &gemini.base_url {
        provider = provider.with_base_url(base_url.clone());
    }
    Ok(Arc::new(provider))
}

/// Resolve what a user typed to a saved conversation id: an exact id, or a
/// prefix shared by exactly one saved conversation. Listings only show the
/// first 20 characters of an id, so prefixes are the common case.
pub fn resolve_conversation_id(
    conversations: &[Conversation],
    query: &str,
) -> anyhow::Result<String> {
    let query = query.trim();
    if query.is_empty() {
        anyhow::bail!("No conversation id given");
    }
    if let Some(exact) = conversations.iter().find(|c| c.id == query) {
        return Ok(exact.id.clone());
    }

    let matches: Vec<&Conversation> = conversations
        .iter()
        .filter(|c| c.id.starts_with(query))
        .collect();

    match matches.as_slice() {
        [] => anyhow::bail!("Conversation not found: {query}"),
        [only] => Ok(only.id.clone()),
        many => anyhow::bail!(
            "Ambiguous id '{query}' matches {} conversations; type more characters",
            many.len()
        ),
    }
}
