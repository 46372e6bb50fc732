use anyhow::{Context, Result};
use paylink_core::providers::LinkProvider;
use tracing::{debug, info};

use crate::bot::context::BotContext;
use crate::telegram::Message;

pub(crate) async fn handle_message<P: LinkProvider>(
    context: &BotContext<P>,
    message: Message,
) -> Result<()> {
    let Some(text) = message.text.as_deref() else {
        return Ok(());
    };
    let chat_id = message.chat.id;
    debug!(chat_id, message_id = message.message_id, text, "accepted message");

    let reply = context.dispatcher().dispatch(chat_id, text).await;

    // Session state is already settled; a failed send is reported, not retried.
    context
        .client()
        .send_message(chat_id, &reply)
        .await
        .with_context(|| format!("send reply to chat {chat_id}"))?;
    info!(chat_id, "reply sent");
    Ok(())
}
