#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

mod command;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use command::{
    ChatInput, ChatStrategy, CommandStrategy, DeleteInput, DeleteStrategy, InfoStrategy,
    InitStrategy, ListInput, ListStrategy, ModelsStrategy, PurgeInput, PurgeStrategy, ShowInput,
    ShowStrategy, TestModelsInput, TestModelsStrategy, VersionStrategy,
};

#[derive(Parser)]
#[command(name = "mantis")]
#[command(about = "Gemini chat with saved conversation history", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat
    Chat {
        /// Model to use
        #[arg(short = 'M', long)]
        model: Option<String>,

        /// Continue a saved conversation (id or unique id prefix)
        #[arg(short, long)]
        resume: Option<String>,
    },
    /// List saved conversations
    List {
        /// Include conversations outside the recent window
        #[arg(short, long)]
        all: bool,

        /// Maximum number of conversations to show
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Print a saved conversation
    Show {
        /// Conversation id or unique id prefix
        id: String,

        /// Do not truncate long messages
        #[arg(long)]
        full: bool,
    },
    /// Delete saved conversations
    Delete {
        /// Conversation ids or unique id prefixes
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Delete every saved conversation
    Purge {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
    /// List available models
    Models,
    /// Send one prompt to every available model
    TestModels {
        /// Prompt to send
        #[arg(short, long, default_value = "Say hello in one short sentence.")]
        prompt: String,
    },
    /// Initialize configuration
    Init,
    /// Show configuration
    Info,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat { model, resume } => {
            ChatStrategy
                .execute(ChatInput { model, resume })
                .await
        }
        Commands::List { all, limit } => ListStrategy.execute(ListInput { all, limit }).await,
        Commands::Show { id, full } => ShowStrategy.execute(ShowInput { id, full }).await,
        Commands::Delete { ids } => DeleteStrategy.execute(DeleteInput { ids }).await,
        Commands::Purge { yes } => PurgeStrategy.execute(PurgeInput { yes }).await,
        Commands::Models => ModelsStrategy.execute(()).await,
        Commands::TestModels { prompt } => {
            TestModelsStrategy.execute(TestModelsInput { prompt }).await
        }
        Commands::Init => InitStrategy.execute(()).await,
        Commands::Info => InfoStrategy.execute(()).await,
        Commands::Version => VersionStrategy.execute(()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_chat_resume() {
        let cli = Cli::try_parse_from(["mantis", "chat", "-M", "gemini-2.0-flash", "--resume", "conv_2025"]);
        let Ok(Cli {
            command: Commands::Chat { model, resume },
        }) = cli
        else {
            panic!("chat command should parse");
        };
        assert_eq!(model.as_deref(), Some("gemini-2.0-flash"));
        assert_eq!(resume.as_deref(), Some("conv_2025"));
    }

    #[test]
    fn test_delete_requires_ids() {
        assert!(Cli::try_parse_from(["mantis", "delete"]).is_err());
        assert!(Cli::try_parse_from(["mantis", "list", "--all", "-n", "5"]).is_ok());
    }
}
