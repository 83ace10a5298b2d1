//! Parsing for the chat shell's `/` commands and numbered-list selections.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    /// Start a new conversation
    Clear,
    /// Print the active conversation with long messages truncated
    Current,
    /// Print the active conversation in full
    All,
    /// Pick from conversations saved in the last few days
    History,
    /// Print saved conversations without loading one
    List,
    Info,
    Model,
    Save(Option<String>),
    Rename(Option<String>),
    Delete,
    Exit,
    Unknown(String),
}

pub const HELP_TEXT: &str = "\
Commands:
  /help            Show this help
  /clear           Start a new conversation
  /current         Show the current conversation (long messages truncated)
  /all             Show the current conversation in full
  /history         Browse the 10 most recent conversations and load one
  /list            List the 20 most recent saved conversations
  /info            Show current session info
  /model           Switch model
  /save [name]     Save the conversation, optionally naming it
  /rename [name]   Rename the conversation
  /delete          Delete saved conversations
  /exit            Leave the chat (offers to save)";

/// Entries offered by `/history`
pub const HISTORY_MENU_LIMIT: usize = 10;
/// Entries printed by `/list`
pub const LIST_LIMIT: usize = 20;
/// Entries offered by `/delete`
pub const DELETE_MENU_LIMIT: usize = 20;

pub const FULL_VIEW_HINT: &str = "Type '/all' to see full content without truncation.";

impl SlashCommand {
    /// `None` when `line` is a chat message rather than a command.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let rest = line.strip_prefix('/')?;
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim())),
            None => (rest, None),
        };
        let arg = arg.filter(|a| !a.is_empty()).map(str::to_string);

        let command = match name.to_lowercase().as_str() {
            "help" | "?" => Self::Help,
            "clear" | "new" => Self::Clear,
            "current" => Self::Current,
            "all" => Self::All,
            "history" => Self::History,
            "list" => Self::List,
            "info" => Self::Info,
            "model" => Self::Model,
            "save" => Self::Save(arg),
            "rename" => Self::Rename(arg),
            "delete" => Self::Delete,
            "exit" | "quit" => Self::Exit,
            _ => Self::Unknown(line.to_string()),
        };
        Some(command)
    }
}

/// Parse a selection such as `1, 3 5` against a list of `len` entries into
/// zero-based indexes. Out-of-range or non-numeric tokens are returned
/// separately so the caller can report them.
#[must_use]
pub fn parse_indexes(input: &str, len: usize) -> (Vec<usize>, Vec<String>) {
    let mut indexes = Vec::new();
    let mut rejected = Vec::new();

    for token in input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        match token.parse::<usize>() {
            Ok(n) if (1..=len).contains(&n) => {
                if !indexes.contains(&(n - 1)) {
                    indexes.push(n - 1);
                }
            }
            _ => rejected.push(token.to_string()),
        }
    }

    (indexes, rejected)
}

/// Whether a prompt answer means yes.
#[must_use]
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
