//! Per-message routing: commands first, then the expiry check, then the
//! handler for the session's stage.

use std::sync::Arc;

use paylink_core::providers::LinkProvider;
use paylink_core::session::{Lookup, SessionStore, UserId};
use tracing::debug;

use crate::{commands, replies, stages};

pub struct Dispatcher<P> {
    sessions: Arc<SessionStore>,
    provider: P,
    bot_username: Option<String>,
}

impl<P: LinkProvider> Dispatcher<P> {
    pub fn new(sessions: Arc<SessionStore>, provider: P) -> Self {
        Self {
            sessions,
            provider,
            bot_username: None,
        }
    }

    /// Accept `/command@username` for this bot username.
    #[must_use]
    pub fn with_bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username
            .map(|name| name.trim().trim_start_matches('@').to_string())
            .filter(|name| !name.is_empty());
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn bot_username(&self) -> Option<&str> {
        self.bot_username.as_deref()
    }

    /// Handles one inbound text message and returns the reply to send.
    pub async fn dispatch(&self, user: UserId, text: &str) -> String {
        let text = text.trim();

        if let Some(command) = commands::parse_command(text, self.bot_username.as_deref()) {
            debug!(user, ?command, "handling command");
            return commands::execute(command, &self.sessions, user);
        }

        let session = match self.sessions.lookup(user) {
            Lookup::Active(session) => session,
            Lookup::Expired | Lookup::Absent => {
                debug!(user, "no live session for input");
                self.sessions.clear(user);
                return replies::SESSION_EXPIRED.to_string();
            }
        };

        debug!(user, stage = ?session.stage(), "handling stage input");
        stages::handle_input(&self.sessions, &self.provider, user, session, text).await
    }
}
