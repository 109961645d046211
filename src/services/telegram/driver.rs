use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::{split_message, TelegramClient, MAX_MESSAGE_LEN};
use crate::kernel::event::{ChatId, Event};
use crate::kernel::scheduler::SideEffect;

const RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Long-polls the Bot API and forwards text messages to the reactor.
pub async fn poll_updates(client: TelegramClient, tx: mpsc::Sender<Event>, shutdown: CancellationToken) {
    let mut offset = 0;
    info!("telegram poller started");

    loop {
        let batch = tokio::select! {
            _ = shutdown.cancelled() => break,
            batch = client.get_updates(offset) => batch,
        };

        let updates = match batch {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "getUpdates failed; backing off");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(RETRY_BACKOFF) => continue,
                }
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(inbound) = update.into_inbound() else {
                continue;
            };
            debug!(chat_id = inbound.chat_id, user_id = inbound.user_id, "inbound message");
            if tx.send(Event::Inbound(inbound)).await.is_err() {
                info!("reactor gone; poller stopping");
                return;
            }
        }
    }

    info!("telegram poller stopped");
}

/// Sends replies to their chat and broadcasts to `broadcast_chat_id`,
/// splitting texts over the Bot API limit. Failed parts are logged and
/// dropped.
pub async fn deliver(client: TelegramClient, mut rx: mpsc::Receiver<SideEffect>, broadcast_chat_id: ChatId) {
    while let Some(effect) = rx.recv().await {
        let (chat_id, text) = match &effect {
            SideEffect::Reply { chat_id, text } => (*chat_id, text.as_str()),
            SideEffect::Broadcast { text, .. } => (broadcast_chat_id, text.as_str()),
        };
        let chunks = split_message(text, MAX_MESSAGE_LEN);
        let parts = chunks.len();
        for (part, chunk) in chunks.iter().enumerate() {
            if let Err(e) = client.send_message(chat_id, chunk).await {
                warn!(chat_id, part, parts, error = %e, "sendMessage failed");
            }
        }
    }
    debug!("delivery channel drained");
}
