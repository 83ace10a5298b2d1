//! Interactive multi-turn chat shell.
//!
//! Every completed turn is auto-saved by the controller. The shell only adds
//! prompt flows on top: loading, naming, deleting, and offering a final save
//! when the user leaves with `/exit`, end of input or Ctrl-C.

use std::collections::HashSet;
use std::io::{self, BufRead, Write};

use mantis_config::HistoryConfig;
use mantis_conversation::{ConversationSession, RetentionConfig, SessionController};
use mantis_history::{Conversation, TranscriptView, format_duration, local_now, render_transcript};
use mantis_providers::{AVAILABLE_MODELS, select_model, supports_thinking};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::slash::{
    DELETE_MENU_LIMIT, FULL_VIEW_HINT, HELP_TEXT, HISTORY_MENU_LIMIT, LIST_LIMIT, SlashCommand,
    is_yes, parse_indexes,
};
use super::{init_common_components, resolve_conversation_id};

/// Input parameters for the Chat command strategy.
#[derive(Debug, Clone)]
pub struct ChatInput {
    /// Optional model override
    pub model: Option<String>,
    /// Saved conversation to continue (id or unique id prefix)
    pub resume: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

impl super::CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let common = init_common_components()?;
        let model = input
            .model
            .unwrap_or_else(|| common.config.agents.defaults.model.clone());
        let history = common.config.history.clone();

        let controller = SessionController::new(common.provider, common.store, model)
            .with_retention(
                RetentionConfig::default().with_max_history_length(history.max_history_length),
            );
        let mut shell = ChatShell::new(controller, history);

        if let Some(query) = input.resume {
            shell.resume(&query)?;
        }

        shell.run().await
    }
}

enum Input {
    Line(String),
    Eof,
    Interrupted,
}

#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

struct ChatShell {
    controller: SessionController,
    history: HistoryConfig,
    input: mpsc::UnboundedReceiver<String>,
}

/// Blocking stdin lives on its own thread so a pending read never holds up
/// runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Transcript of `session`; the truncated view points at `/all`.
fn transcript_text(session: &ConversationSession, view: TranscriptView) -> String {
    let mut text = render_transcript(
        &session.messages,
        session.name.as_deref(),
        Some(&session.id),
        view,
    );
    if view == TranscriptView::Loaded && !session.is_empty() {
        text.push_str(FULL_VIEW_HINT);
    }
    text
}

fn flush_stdout() {
    let _ = io::stdout().flush();
}

impl ChatShell {
    fn new(controller: SessionController, history: HistoryConfig) -> Self {
        Self::with_input(controller, history, spawn_stdin_reader())
    }

    const fn with_input(
        controller: SessionController,
        history: HistoryConfig,
        input: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self {
            controller,
            history,
            input,
        }
    }

    fn resume(&mut self, query: &str) -> anyhow::Result<()> {
        let saved = self.controller.list_all(usize::MAX);
        let id = resolve_conversation_id(&saved, query)?;
        self.controller.switch_to(&id)?;
        self.print_loaded();
        Ok(())
    }

    async fn run(&mut self) -> anyhow::Result<()> {
        self.print_banner();

        loop {
            match self.read_line("\nYou: ").await {
                Input::Line(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let flow = match SlashCommand::parse(line) {
                        Some(command) => self.handle_command(command).await,
                        None => self.chat_turn(line).await,
                    };
                    if flow == Flow::Exit {
                        break;
                    }
                }
                Input::Eof | Input::Interrupted => {
                    self.offer_save_before_exit().await;
                    break;
                }
            }
        }

        info!(
            "Chat ended: {} messages in {}",
            self.controller.session().message_count(),
            self.controller.session().id
        );
        println!("Goodbye!");
        Ok(())
    }

    async fn read_line(&mut self, prompt: &str) -> Input {
        print!("{prompt}");
        flush_stdout();

        tokio::select! {
            line = self.input.recv() => line.map_or(Input::Eof, Input::Line),
            _ = tokio::signal::ctrl_c() => {
                println!();
                Input::Interrupted
            }
        }
    }

    /// Answer to a prompt; `None` on end of input or Ctrl-C.
    async fn ask(&mut self, prompt: &str) -> Option<String> {
        match self.read_line(prompt).await {
            Input::Line(line) => Some(line.trim().to_string()),
            Input::Eof | Input::Interrupted => None,
        }
    }

    async fn confirm(&mut self, prompt: &str) -> bool {
        self.ask(prompt).await.is_some_and(|answer| is_yes(&answer))
    }

    async fn chat_turn(&mut self, text: &str) -> Flow {
        print!("\nAI: ");
        flush_stdout();

        let outcome = {
            let turn = self.controller.process_turn(text, |chunk| {
                print!("{chunk}");
                flush_stdout();
            });
            tokio::select! {
                result = turn => Some(result),
                _ = tokio::signal::ctrl_c() => None,
            }
        };
        println!();

        match outcome {
            Some(Ok(result)) => {
                debug!("Turn {} complete", result.turn_number);
                if result.autosave.is_none() {
                    println!("(auto-save failed; the conversation is still in memory)");
                }
                Flow::Continue
            }
            Some(Err(e)) => {
                println!("Error: {e}");
                Flow::Continue
            }
            None => {
                self.controller.discard_unanswered();
                println!("Interrupted.");
                self.offer_save_before_exit().await;
                Flow::Exit
            }
        }
    }

    async fn handle_command(&mut self, command: SlashCommand) -> Flow {
        match command {
            SlashCommand::Help => println!("{HELP_TEXT}"),
            SlashCommand::Clear => self.clear().await,
            SlashCommand::Current => self.print_transcript(TranscriptView::Loaded),
            SlashCommand::All => self.print_transcript(TranscriptView::Full),
            SlashCommand::History => {
                let limit = HISTORY_MENU_LIMIT.min(self.history.recent_limit);
                let recent = self.controller.list_recent(self.history.recent_days, limit);
                self.pick_and_load(recent, "recent").await;
            }
            SlashCommand::List => {
                let saved = self.controller.list_all(LIST_LIMIT);
                if saved.is_empty() {
                    println!("No saved conversations.");
                } else {
                    self.print_numbered(&saved);
                }
            }
            SlashCommand::Info => self.print_info(),
            SlashCommand::Model => self.choose_model().await,
            SlashCommand::Save(name) => {
                let name = match name {
                    Some(name) => Some(name),
                    None => self.ask_name().await,
                };
                self.save(name);
            }
            SlashCommand::Rename(name) => self.rename(name).await,
            SlashCommand::Delete => self.delete().await,
            SlashCommand::Exit => {
                self.offer_save_before_exit().await;
                return Flow::Exit;
            }
            SlashCommand::Unknown(command) => {
                println!("Unknown command: {command}. Type /help for the list.");
            }
        }
        Flow::Continue
    }

    async fn ask_name(&mut self) -> Option<String> {
        self.ask("Conversation name (Enter to keep current): ")
            .await
            .filter(|name| !name.is_empty())
    }

    fn save(&mut self, name: Option<String>) {
        match self.controller.save(name) {
            Ok(_) => println!("Conversation saved: {}", self.controller.session().id),
            Err(e) => println!("Failed to save conversation: {e}"),
        }
    }

    async fn offer_save_before_exit(&mut self) {
        if self.controller.session().is_empty() {
            return;
        }
        if self.confirm("\nSave conversation before exiting? (y/n): ").await {
            let name = self.ask_name().await;
            self.save(name);
        }
    }

    async fn clear(&mut self) {
        if !self.controller.session().is_empty()
            && self.confirm("Save current conversation first? (y/n): ").await
        {
            let name = self.ask_name().await;
            self.save(name);
        }
        self.controller.start();
        println!("Started a new conversation: {}", self.controller.session().id);
    }

    async fn rename(&mut self, name: Option<String>) {
        let name = match name {
            Some(name) => Some(name),
            None => self.ask("New name: ").await.filter(|n| !n.is_empty()),
        };
        let Some(name) = name else {
            println!("Rename cancelled.");
            return;
        };

        match self.controller.rename(name) {
            Ok(_) => println!("Conversation renamed and saved."),
            Err(e) => println!("Failed to rename conversation: {e}"),
        }
    }

    async fn pick_and_load(&mut self, conversations: Vec<Conversation>, label: &str) {
        if conversations.is_empty() {
            println!("No {label} conversations found.");
            return;
        }
        self.print_numbered(&conversations);

        let Some(answer) = self
            .ask("\nEnter number or ID to load (Enter to cancel): ")
            .await
            .filter(|a| !a.is_empty())
        else {
            return;
        };

        let id = match parse_indexes(&answer, conversations.len()) {
            (indexes, rejected) if indexes.len() == 1 && rejected.is_empty() => {
                Ok(conversations[indexes[0]].id.clone())
            }
            _ => resolve_conversation_id(&conversations, &answer),
        };

        let id = match id {
            Ok(id) => id,
            Err(e) => {
                println!("{e}");
                return;
            }
        };

        let session = self.controller.session();
        if !session.is_empty()
            && session.id != id
            && self
                .confirm("Save current conversation before switching? (y/n): ")
                .await
        {
            let name = self.ask_name().await;
            self.save(name);
        }

        match self.controller.switch_to(&id) {
            Ok(()) => self.print_loaded(),
            Err(e) => println!("{e}"),
        }
    }

    async fn delete(&mut self) {
        let saved = self.controller.list_all(DELETE_MENU_LIMIT);
        if saved.is_empty() {
            println!("No saved conversations.");
            return;
        }
        self.print_numbered(&saved);

        let Some(answer) = self
            .ask("\nNumbers to delete (comma separated), 'all', or Enter to cancel: ")
            .await
            .filter(|a| !a.is_empty())
        else {
            return;
        };

        if answer.eq_ignore_ascii_case("all") {
            let total = self.controller.list_all(usize::MAX).len();
            let prompt = format!("Delete ALL {total} saved conversations? (y/n): ");
            if !self.confirm(&prompt).await {
                return;
            }
            match self.controller.delete_all() {
                Ok(()) => println!("All conversations deleted. Started a new conversation."),
                Err(e) => println!("Failed to delete conversations: {e}"),
            }
            return;
        }

        let (indexes, rejected) = parse_indexes(&answer, saved.len());
        if !rejected.is_empty() {
            println!("Ignoring invalid selection: {}", rejected.join(", "));
        }
        if indexes.is_empty() {
            return;
        }

        let ids: HashSet<String> = indexes.iter().map(|&i| saved[i].id.clone()).collect();
        let prompt = format!("Delete {} conversation(s)? (y/n): ", ids.len());
        if !self.confirm(&prompt).await {
            return;
        }

        let was_current = ids.contains(&self.controller.session().id);
        match self.controller.delete(&ids) {
            Ok(removed) => {
                println!("Deleted {removed} conversation(s).");
                if was_current {
                    println!("The active conversation was deleted; started a new one.");
                }
            }
            Err(e) => println!("Failed to delete conversations: {e}"),
        }
    }

    async fn choose_model(&mut self) {
        println!("\nAvailable models:");
        for (i, model) in AVAILABLE_MODELS.iter().enumerate() {
            let current = if *model == self.controller.model() {
                " (current)"
            } else {
                ""
            };
            let thinking = if supports_thinking(model) {
                " [thinking]"
            } else {
                ""
            };
            println!("  {}. {model}{thinking}{current}", i + 1);
        }

        let Some(answer) = self
            .ask("Select model (number or name, Enter to keep current): ")
            .await
            .filter(|a| !a.is_empty())
        else {
            return;
        };

        let model = select_model(&answer);
        self.controller.set_model(model);
        println!("Using model: {model}");
    }

    fn print_banner(&self) {
        println!("Mantis chat | model: {}", self.controller.model());
        println!("History: {}", self.controller.store().path().display());
        println!("Type /help for commands, /exit to quit.");
    }

    fn print_numbered(&self, conversations: &[Conversation]) {
        for (i, conversation) in conversations.iter().enumerate() {
            println!("\n{}. {}", i + 1, self.controller.summarize(conversation));
        }
    }

    fn print_loaded(&self) {
        let session = self.controller.session();
        println!(
            "Loaded conversation {} ({} messages, model {})",
            session.id,
            session.message_count(),
            session.model
        );
        self.print_transcript(TranscriptView::Loaded);
    }

    fn print_transcript(&self, view: TranscriptView) {
        println!("{}", transcript_text(self.controller.session(), view));
    }

    fn print_info(&self) {
        let session = self.controller.session();
        println!("\nSession info:");
        println!("  ID: {}", session.id);
        println!("  Name: {}", session.name.as_deref().unwrap_or("(unnamed)"));
        println!("  Model: {}", session.model);
        println!("  Started: {}", session.started_at.format("%Y-%m-%d %H:%M:%S"));
        println!("  Duration: {}", format_duration(session.elapsed(local_now())));
        println!("  Messages: {}", session.message_count());
        println!("  History file: {}", self.controller.store().path().display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use mantis_core::{ChatMessage, LLMProvider, LLMResponse};
    use mantis_history::{ConversationStore, SaveMode};
    use tempfile::TempDir;

    struct OfflineProvider;

    #[async_trait]
    impl LLMProvider for OfflineProvider {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _model: &str,
        ) -> anyhow::Result<LLMResponse> {
            anyhow::bail!("offline")
        }

        fn get_default_model(&self) -> &'static str {
            "gemini-2.5-flash"
        }
    }

    /// Shell whose prompts are answered, in order, by `answers`; end of
    /// input follows the last one.
    fn shell_with_answers(answers: &[&str]) -> (TempDir, ChatShell) {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let store = ConversationStore::new(dir.path().join("history.json"));
        let provider: Arc<dyn LLMProvider> = Arc::new(OfflineProvider);
        let controller = SessionController::new(provider, store, "gemini-2.5-flash");

        let (tx, rx) = mpsc::unbounded_channel();
        for answer in answers {
            let _ = tx.send((*answer).to_string());
        }
        (
            dir,
            ChatShell::with_input(controller, HistoryConfig::default(), rx),
        )
    }

    fn seed(shell: &ChatShell, id: &str) {
        let conversation = Conversation {
            id: id.to_string(),
            model: "gemini-2.5-flash".to_string(),
            messages: vec![
                ChatMessage::user(format!("question for {id}")),
                ChatMessage::model("answer"),
            ],
            ..Conversation::default()
        };
        shell
            .controller
            .store()
            .upsert(conversation, SaveMode::Manual)
            .unwrap_or_else(|e| panic!("seed {id}: {e}"));
    }

    fn saved_ids(shell: &ChatShell) -> Vec<String> {
        shell
            .controller
            .list_all(usize::MAX)
            .into_iter()
            .map(|c| c.id)
            .collect()
    }

    #[tokio::test]
    async fn test_switching_offers_to_save_unsaved_session() {
        let (_dir, mut shell) = shell_with_answers(&["1", "y", "Draft"]);
        seed(&shell, "conv_saved_1");
        shell.controller.append_user_message("unsaved question");
        let draft_id = shell.controller.session().id.clone();

        shell.handle_command(SlashCommand::History).await;

        assert_eq!(shell.controller.session().id, "conv_saved_1");
        let Some(draft) = shell.controller.find(&draft_id) else {
            panic!("draft was not saved before switching");
        };
        assert_eq!(draft.name.as_deref(), Some("Draft"));
        assert_eq!(draft.messages, vec![ChatMessage::user("unsaved question")]);
    }

    #[tokio::test]
    async fn test_switching_without_saving_drops_unsaved_session() {
        let (_dir, mut shell) = shell_with_answers(&["1", "n"]);
        seed(&shell, "conv_saved_1");
        shell.controller.append_user_message("unsaved question");
        let draft_id = shell.controller.session().id.clone();

        shell.handle_command(SlashCommand::History).await;

        assert_eq!(shell.controller.session().id, "conv_saved_1");
        assert!(shell.controller.find(&draft_id).is_none());
        assert_eq!(saved_ids(&shell), vec!["conv_saved_1".to_string()]);
    }

    #[tokio::test]
    async fn test_all_prints_current_session_instead_of_picking() {
        let (_dir, mut shell) = shell_with_answers(&["1"]);
        seed(&shell, "conv_saved_1");
        shell.controller.append_user_message("still here");
        let current_id = shell.controller.session().id.clone();

        shell.handle_command(SlashCommand::All).await;
        shell.handle_command(SlashCommand::Current).await;

        assert_eq!(shell.controller.session().id, current_id);
        assert_eq!(shell.input.try_recv().ok().as_deref(), Some("1"));
    }

    #[test]
    fn test_truncated_view_points_at_full_view() {
        let mut session = ConversationSession::new("gemini-2.5-flash");
        session.add_message(mantis_core::Role::User, "x".repeat(1000));

        let loaded = transcript_text(&session, TranscriptView::Loaded);
        let full = transcript_text(&session, TranscriptView::Full);

        assert!(loaded.ends_with(FULL_VIEW_HINT));
        assert!(!loaded.contains(&"x".repeat(1000)));
        assert!(full.contains(&"x".repeat(1000)));
        assert!(!full.contains(FULL_VIEW_HINT));
        assert!(
            !transcript_text(&ConversationSession::new("m"), TranscriptView::Loaded)
                .contains(FULL_VIEW_HINT)
        );
    }

    #[tokio::test]
    async fn test_history_menu_offers_ten_most_recent() {
        let (_dir, mut shell) = shell_with_answers(&["11"]);
        for i in 0..12 {
            seed(&shell, &format!("conv_seed_{i:02}"));
        }
        let current_id = shell.controller.session().id.clone();

        shell.handle_command(SlashCommand::History).await;

        assert_eq!(shell.controller.session().id, current_id);
    }

    #[tokio::test]
    async fn test_delete_menu_offers_twenty_most_recent() {
        let (_dir, mut shell) = shell_with_answers(&["21"]);
        for i in 0..25 {
            seed(&shell, &format!("conv_seed_{i:02}"));
        }

        shell.handle_command(SlashCommand::Delete).await;
        assert_eq!(saved_ids(&shell).len(), 25);

        let (_dir, mut shell) = shell_with_answers(&["1", "y"]);
        for i in 0..25 {
            seed(&shell, &format!("conv_seed_{i:02}"));
        }

        shell.handle_command(SlashCommand::Delete).await;
        let remaining = saved_ids(&shell);
        assert_eq!(remaining.len(), 24);
        assert!(!remaining.contains(&"conv_seed_05".to_string()));
        assert!(remaining.contains(&"conv_seed_00".to_string()));
    }
}
