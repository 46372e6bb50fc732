use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use paylink_core::providers::LinkProvider;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

use crate::bot::context::BotContext;
use crate::handlers::message::handle_message;
use crate::telegram::Message;

/// Queue key: the chat id, which is also the session key.
type QueueKey = i64;

/// Workers with nothing to do for this long shut down; the next message for
/// that chat starts a new one.
const WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

pub(crate) type ChatQueueMap = Arc<Mutex<HashMap<QueueKey, mpsc::UnboundedSender<Message>>>>;

pub(crate) fn new_chat_queues() -> ChatQueueMap {
    Arc::new(Mutex::new(HashMap::new()))
}

/// Route a message to its chat's queue. Chats are processed concurrently;
/// messages within one chat are handled in arrival order.
pub(crate) async fn dispatch_message<P: LinkProvider + 'static>(
    queues: &ChatQueueMap,
    context: &Arc<BotContext<P>>,
    message: Message,
) {
    if !should_process_message(&message) {
        return;
    }
    enqueue_message(queues, context, message).await;
}

/// Only human text messages reach the conversation engine.
fn should_process_message(message: &Message) -> bool {
    if message.text.is_none() {
        debug!(chat_id = message.chat.id, "ignoring non-text message");
        return false;
    }

    if message.from.as_ref().is_some_and(|user| user.is_bot) {
        debug!(chat_id = message.chat.id, "ignoring message from a bot");
        return false;
    }

    true
}

async fn enqueue_message<P: LinkProvider + 'static>(
    queues: &ChatQueueMap,
    context: &Arc<BotContext<P>>,
    message: Message,
) {
    let key = message.chat.id;
    // Sending under the map lock pairs with `retire`: a worker only stops once
    // its queue is empty and its sender is gone from the map.
    let mut queues_guard = queues.lock().await;
    let message = match queues_guard.get(&key) {
        Some(sender) => match sender.send(message) {
            Ok(()) => return,
            // The worker died without retiring.
            Err(err) => err.0,
        },
        None => message,
    };

    let (sender, receiver) = mpsc::unbounded_channel();
    spawn_queue_worker(
        key,
        &sender,
        receiver,
        Arc::clone(queues),
        Arc::clone(context),
    );
    if sender.send(message).is_err() {
        warn!(chat_id = key, "queue worker exited before its first message");
    }
    queues_guard.insert(key, sender);
}

fn spawn_queue_worker<P: LinkProvider + 'static>(
    key: QueueKey,
    sender: &mpsc::UnboundedSender<Message>,
    mut receiver: mpsc::UnboundedReceiver<Message>,
    queues: ChatQueueMap,
    context: Arc<BotContext<P>>,
) {
    let own = sender.downgrade();
    tokio::spawn(async move {
        loop {
            match tokio::time::timeout(WORKER_IDLE_TIMEOUT, receiver.recv()).await {
                Ok(Some(message)) => process(&context, key, message).await,
                Ok(None) => break,
                Err(_) => {
                    if retire(&queues, key, &own, &receiver).await {
                        debug!(chat_id = key, "queue worker idle, stopping");
                        break;
                    }
                }
            }
        }
    });
}

/// Drops this worker's map entry if nothing is waiting in its queue.
///
/// Returns `false` when a message arrived in the meantime; the worker keeps going.
async fn retire(
    queues: &ChatQueueMap,
    key: QueueKey,
    own: &mpsc::WeakUnboundedSender<Message>,
    receiver: &mpsc::UnboundedReceiver<Message>,
) -> bool {
    let mut queues = queues.lock().await;
    if !receiver.is_empty() {
        return false;
    }

    let is_ours = own.upgrade().is_some_and(|own| {
        queues
            .get(&key)
            .is_some_and(|sender| sender.same_channel(&own))
    });
    if is_ours {
        queues.remove(&key);
    }
    true
}

async fn process<P: LinkProvider>(context: &BotContext<P>, key: QueueKey, message: Message) {
    if let Err(err) = handle_message(context, message).await {
        warn!(chat_id = key, "message handling error: {err:#}");
    }
}
