use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::kernel::event::{ChatId, Event, InboundMessage};
use crate::kernel::reactor::Reactor;
use crate::kernel::scheduler::SideEffect;
use crate::records::types::UserId;

pub const CONSOLE_CHAT: ChatId = 0;

/// Feeds each non-empty line of `input` to the reactor as a message from
/// `user_id` and writes every side effect to `output`.
///
/// `inbound` must be the only sender for the reactor's receiver. Returns
/// once input is exhausted and every side effect has been written.
pub async fn session<R, W>(
    input: R,
    output: W,
    user_id: UserId,
    inbound: mpsc::Sender<Event>,
    reactor: &mut Reactor,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx_output, rx_output) = mpsc::channel(100);

    let reader = async move {
        let mut lines = input.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    let event = Event::Inbound(InboundMessage::new(CONSOLE_CHAT, user_id, &line));
                    if inbound.send(event).await.is_err() {
                        warn!("reactor gone; console input stopping");
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "reading console input");
                    break;
                }
            }
        }
        // `inbound` drops here, which ends the reactor loop.
    };

    let (_, _, written) = tokio::join!(
        reader,
        reactor.run(tx_output, CancellationToken::new()),
        print_effects(rx_output, output),
    );
    written
}

async fn print_effects<W>(mut rx: mpsc::Receiver<SideEffect>, mut output: W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(effect) = rx.recv().await {
        let rendered = match effect {
            SideEffect::Reply { text, .. } => format!("{}\n", text),
            SideEffect::Broadcast { job, text } => format!("[broadcast {:?}]\n{}\n", job, text),
        };
        output.write_all(rendered.as_bytes()).await?;
        output.flush().await?;
    }
    Ok(())
}
