use paylink_core::providers::{LinkProvider, StripeClient};

use crate::dispatch::Dispatcher;
use crate::telegram::TelegramClient;

pub(crate) struct BotContext<P = StripeClient> {
    client: TelegramClient,
    dispatcher: Dispatcher<P>,
}

impl<P: LinkProvider> BotContext<P> {
    pub(crate) fn new(client: TelegramClient, dispatcher: Dispatcher<P>) -> Self {
        Self { client, dispatcher }
    }

    pub(crate) fn client(&self) -> &TelegramClient {
        &self.client
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher<P> {
        &self.dispatcher
    }
}
