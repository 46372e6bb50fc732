use paylink_core::session::{Draft, Lookup, Session, SessionStore, UserId};

use crate::replies;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BotCommand {
    Start,
    Cancel,
    Help,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TelegramCommandSpec {
    pub command: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CommandDef {
    command: BotCommand,
    patterns: &'static [&'static str],
    telegram_spec: TelegramCommandSpec,
}

const COMMAND_DEFS: &[CommandDef] = &[
    CommandDef {
        command: BotCommand::Start,
        patterns: &["/start", "/reset"],
        telegram_spec: TelegramCommandSpec {
            command: "start",
            description: "Begin payment link creation",
        },
    },
    CommandDef {
        command: BotCommand::Cancel,
        patterns: &["/cancel"],
        telegram_spec: TelegramCommandSpec {
            command: "cancel",
            description: "Cancel current operation",
        },
    },
    CommandDef {
        command: BotCommand::Status,
        patterns: &["/status"],
        telegram_spec: TelegramCommandSpec {
            command: "status",
            description: "Check your current input progress",
        },
    },
    CommandDef {
        command: BotCommand::Help,
        patterns: &["/help"],
        telegram_spec: TelegramCommandSpec {
            command: "help",
            description: "Show usage instructions",
        },
    },
];

pub(crate) fn telegram_command_specs() -> Vec<TelegramCommandSpec> {
    COMMAND_DEFS.iter().map(|def| def.telegram_spec).collect()
}

/// Matches the whole message against the command table, ignoring case.
///
/// `/command@username` is accepted only when `username` is this bot's.
pub(crate) fn parse_command(text: &str, bot_username: Option<&str>) -> Option<BotCommand> {
    let command = strip_bot_mention(text.trim(), bot_username)?;

    COMMAND_DEFS.iter().find_map(|def| {
        def.patterns
            .iter()
            .any(|pattern| pattern.eq_ignore_ascii_case(command))
            .then_some(def.command)
    })
}

fn strip_bot_mention<'a>(text: &'a str, bot_username: Option<&str>) -> Option<&'a str> {
    match text.split_once('@') {
        None => Some(text),
        Some((command, mention)) => bot_username
            .filter(|username| username.eq_ignore_ascii_case(mention))
            .map(|_| command),
    }
}

/// Runs a command regardless of the user's current stage.
pub(crate) fn execute(command: BotCommand, sessions: &SessionStore, user: UserId) -> String {
    match command {
        BotCommand::Start => {
            sessions.put(user, Session::start());
            replies::PRICE_PROMPT.to_string()
        }
        BotCommand::Cancel => {
            sessions.clear(user);
            replies::CANCELLED.to_string()
        }
        BotCommand::Help => replies::HELP.to_string(),
        BotCommand::Status => match sessions.lookup(user) {
            Lookup::Active(session) => render_status(&session),
            Lookup::Expired | Lookup::Absent => {
                sessions.clear(user);
                replies::NO_SESSION.to_string()
            }
        },
    }
}

fn render_status(session: &Session) -> String {
    let draft = session.draft();
    format!(
        "📝 Current Status\nState: {}\n\nPrice: {}\nCurrency: {}\nProduct: {}\nQuantity: {}",
        session.stage().label(),
        format_price(draft),
        draft.currency().unwrap_or(replies::NOT_SET),
        draft.name().unwrap_or(replies::NOT_SET),
        // Quantity completes the draft, so a live session never holds one.
        replies::NOT_SET,
    )
}

fn format_price(draft: &Draft) -> String {
    match draft.price_minor_units() {
        0 => replies::NOT_SET.to_string(),
        minor => format!("{}.{:02}", minor / 100, minor % 100),
    }
}
