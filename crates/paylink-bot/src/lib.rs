//! Telegram front-end that walks a user through price, product name and
//! quantity, then replies with a Stripe Checkout link.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use paylink_core::config::Config;
use paylink_core::providers::{StripeClient, StripeSettings};
use paylink_core::session::SessionStore;
use tracing::{debug, error, info, warn};

use crate::bot::{BotContext, dispatch_message, new_chat_queues};
use crate::telegram::{TelegramClient, TelegramSettings};

mod bot;
mod commands;
pub mod dispatch;
mod handlers;
mod replies;
mod stages;
pub mod telegram;

pub use dispatch::Dispatcher;
pub use stages::{PriceError, parse_price};

const POLL_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Runs the bot with long polling until Ctrl-C.
///
/// # Errors
/// Returns an error if Telegram or Stripe settings are incomplete.
pub async fn run(config: Config) -> Result<()> {
    let telegram = TelegramSettings::from_config(&config)?;
    let stripe = StripeSettings::from_config(&config)?;
    let provider = StripeClient::new(stripe)?;
    let sessions = Arc::new(SessionStore::new(config.session.ttl()));

    info!(
        ttl_secs = config.session.ttl_secs,
        sweep_interval_secs = config.session.sweep_interval_secs,
        "session settings"
    );

    let client = TelegramClient::with_base_url(telegram.bot_token, &telegram.base_url);
    let bot_username = match telegram.bot_username {
        Some(username) => Some(username),
        None => lookup_bot_username(&client).await,
    };
    register_commands(&client).await;

    if let Some(interval) = config.session.sweep_interval() {
        spawn_session_sweeper(Arc::clone(&sessions), interval);
    }

    let dispatcher = Dispatcher::new(sessions, provider).with_bot_username(bot_username);
    let context = Arc::new(BotContext::new(client.clone(), dispatcher));
    run_bot(&client, &context).await;
    Ok(())
}

async fn run_bot(client: &TelegramClient, context: &Arc<BotContext>) {
    let chat_queues = new_chat_queues();
    let mut offset: Option<i64> = None;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        username = context.dispatcher().bot_username().unwrap_or("<unknown>"),
        "paylink bot started, polling for updates"
    );

    loop {
        let current_offset = offset;
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutting down Telegram bot");
                break;
            }
            updates = client.get_updates(current_offset, POLL_TIMEOUT) => {
                let updates = match updates {
                    Ok(updates) => updates,
                    Err(err) => {
                        error!("Telegram polling error: {err:#}");
                        tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                        continue;
                    }
                };

                if !updates.is_empty() {
                    debug!(count = updates.len(), "received updates");
                }
                for update in updates {
                    offset = Some(update.update_id + 1);
                    if let Some(message) = update.message {
                        dispatch_message(&chat_queues, context, message).await;
                    }
                }
            }
        }
    }
}

async fn lookup_bot_username(client: &TelegramClient) -> Option<String> {
    match client.get_me().await {
        Ok(me) => me.username,
        Err(err) => {
            warn!("getMe failed, /command@bot mentions will not match: {err:#}");
            None
        }
    }
}

async fn register_commands(client: &TelegramClient) {
    if let Err(err) = client
        .set_my_commands(&commands::telegram_command_specs())
        .await
    {
        warn!("failed to register bot commands: {err:#}");
    }
}

fn spawn_session_sweeper(sessions: Arc<SessionStore>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = sessions.purge_expired();
            if removed > 0 {
                debug!(removed, "purged expired sessions");
            }
        }
    });
}
