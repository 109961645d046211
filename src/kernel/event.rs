use serde::{Deserialize, Serialize};

use crate::records::types::{Location, UserId, VisaStatus};

pub type ChatId = i64;

#[derive(Debug, Clone)]
pub enum Event {
    /// Text delivered by the transport (plain message or command).
    Inbound(InboundMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub text: String,
}

impl InboundMessage {
    pub fn new(chat_id: ChatId, user_id: UserId, text: &str) -> Self {
        Self {
            chat_id,
            user_id,
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Ask(String),
    Report,
    Stats,
    History(String),
    Unknown(String),
    /// Addressed to another bot in the same chat.
    ForOtherBot(String),
}

impl Command {
    /// `None` for plain text. Accepts `/cmd@botname args` for any bot name.
    pub fn parse(text: &str) -> Option<Command> {
        Self::parse_addressed(text, None)
    }

    /// Like `parse`, but when `bot_username` is known a `/cmd@name` suffix
    /// naming a different bot yields `ForOtherBot`. Usernames compare
    /// case-insensitively.
    pub fn parse_addressed(text: &str, bot_username: Option<&str>) -> Option<Command> {
        let rest = text.trim_start().strip_prefix('/')?;
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args),
            None => (rest, ""),
        };
        let (name, target) = match head.split_once('@') {
            Some((name, target)) => (name, Some(target)),
            None => (head, None),
        };
        if let (Some(target), Some(me)) = (target, bot_username) {
            if !target.eq_ignore_ascii_case(me.trim_start_matches('@')) {
                return Some(Command::ForOtherBot(target.to_string()));
            }
        }
        let name = name.to_lowercase();
        // Runs of whitespace between arguments collapse to one space.
        let args = args.split_whitespace().collect::<Vec<_>>().join(" ");

        Some(match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "ask" => Command::Ask(args),
            "report" => Command::Report,
            "stats" => Command::Stats,
            "history" => Command::History(args),
            _ => Command::Unknown(name),
        })
    }
}

pub const HELP_TEXT: &str = "/start - Start the bot\n\
/help - Show help\n\
/report - Show latest monthly report\n\
/ask [question] - Log a question\n\
/stats - Show daily analysis\n\
/history [month/year] - Show past reports";

/// Everything an inbound message can resolve to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Welcome,
    Help,
    Report(String),
    QuestionLogged,
    /// `/ask` without a question.
    MissingQuestion,
    /// Second question from the same user this month.
    AlreadyAsked,
    /// Command exists but has no implementation yet.
    Unimplemented(&'static str),
    StatusRecorded { status: VisaStatus, location: Location },
    /// Status already on file for this user this month.
    StatusDuplicate,
    /// Plain text without both a status and a location.
    Unclassified,
    StorageFailure,
    Ignored,
}

impl CommandOutcome {
    /// Text to send back to the originating chat. Status messages are
    /// observed silently.
    pub fn reply_text(&self) -> Option<String> {
        match self {
            CommandOutcome::Welcome => Some("Welcome! Use /help to see available commands.".to_string()),
            CommandOutcome::Help => Some(HELP_TEXT.to_string()),
            CommandOutcome::Report(text) => Some(text.clone()),
            CommandOutcome::QuestionLogged => Some("Question logged.".to_string()),
            CommandOutcome::MissingQuestion => Some("Please provide a question.".to_string()),
            CommandOutcome::AlreadyAsked => Some("You have already asked a question this month.".to_string()),
            CommandOutcome::Unimplemented(_) => Some("This feature is under development.".to_string()),
            CommandOutcome::StorageFailure => Some("Sorry, something went wrong. Please try again later.".to_string()),
            CommandOutcome::StatusRecorded { .. }
            | CommandOutcome::StatusDuplicate
            | CommandOutcome::Unclassified
            | CommandOutcome::Ignored => None,
        }
    }
}
