use linewire_channel::{ChannelConfig, ChannelError, TextChannel};
use linewire_transport::Listener;
use tokio::sync::mpsc;

use crate::cmd::ListenArgs;
use crate::exit::{channel_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_line, OutputFormat};

struct Received {
    peer: String,
    line: String,
}

pub async fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let mut listener = Listener::bind(&args.endpoint)
        .await
        .map_err(|err| transport_error("bind failed", err))?;

    let (tx, mut rx) = mpsc::unbounded_channel::<Received>();
    let mut channels: Vec<TextChannel> = Vec::new();
    let mut printed = 0usize;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("interrupted");
                break;
            }
            Some(received) = rx.recv() => {
                print_line(&received.line, &received.peer, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            accepted = listener.accept() => {
                let stream = accepted.map_err(|err| transport_error("accept failed", err))?;
                let config = ChannelConfig::labeled(stream.peer());
                let channel = TextChannel::with_config(stream, args.encoding, config)
                    .map_err(|err| channel_error("channel setup failed", err))?;
                channels.retain(|channel| !channel.is_shut_down());
                channels.push(channel.clone());
                tokio::spawn(forward_lines(channel, tx.clone()));
            }
        }
    }

    for channel in &channels {
        channel.shutdown();
    }
    Ok(SUCCESS)
}

/// Forward every line from `channel` until the peer closes it.
async fn forward_lines(channel: TextChannel, tx: mpsc::UnboundedSender<Received>) {
    tracing::info!(peer = channel.label(), "peer connected");
    loop {
        match channel.read_line().await {
            Ok(Some(line)) => {
                let received = Received {
                    peer: channel.label().to_string(),
                    line,
                };
                if tx.send(received).is_err() {
                    break;
                }
            }
            Ok(None) | Err(ChannelError::Shutdown) => break,
            Err(err) => {
                tracing::warn!(peer = channel.label(), error = %err, "receive failed");
                break;
            }
        }
    }
    tracing::info!(peer = channel.label(), "peer disconnected");
    channel.shutdown();
}
