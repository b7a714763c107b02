use linewire_channel::{ChannelConfig, ChannelError, TextChannel, TextEncoding};
use linewire_transport::{Listener, Stream};
use tokio::task::JoinSet;

use crate::cmd::{parse_duration, EchoArgs};
use crate::exit::{channel_error, transport_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub async fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let idle_timeout = args
        .idle_timeout
        .as_deref()
        .map(parse_duration)
        .transpose()?;
    let mut listener = Listener::bind(&args.endpoint)
        .await
        .map_err(|err| transport_error("bind failed", err))?;

    let mut sessions = JoinSet::new();
    let mut channels: Vec<TextChannel> = Vec::new();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let stream = tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!(sessions = channels.len(), "interrupted; closing sessions");
                break;
            }
            Some(_) = sessions.join_next(), if !sessions.is_empty() => {
                channels.retain(|channel| !channel.is_shut_down());
                continue;
            }
            accepted = listener.accept() => {
                accepted.map_err(|err| transport_error("accept failed", err))?
            }
        };

        let channel = open_channel(stream, args.encoding, idle_timeout)
            .map_err(|err| channel_error("channel setup failed", err))?;
        channels.push(channel.clone());
        sessions.spawn(echo_session(channel));
    }

    for channel in &channels {
        channel.shutdown();
    }
    while sessions.join_next().await.is_some() {}

    Ok(SUCCESS)
}

fn open_channel(
    stream: Stream,
    encoding: TextEncoding,
    idle_timeout: Option<std::time::Duration>,
) -> Result<TextChannel, ChannelError> {
    let config = ChannelConfig {
        read_timeout: idle_timeout,
        ..ChannelConfig::labeled(stream.peer())
    };
    TextChannel::with_config(stream, encoding, config)
}

/// Echo lines back until the peer closes, errors, or goes idle.
async fn echo_session(channel: TextChannel) {
    tracing::info!(peer = channel.label(), "session started");
    let mut echoed = 0usize;

    loop {
        match channel.read_line().await {
            Ok(Some(line)) => {
                tracing::debug!(
                    peer = channel.label(),
                    chars = line.chars().count(),
                    "echoing line"
                );
                if let Err(err) = channel.send_text(&format!("{line}\n")).await {
                    tracing::warn!(peer = channel.label(), error = %err, "echo send failed");
                    break;
                }
                echoed += 1;
            }
            Ok(None) => break,
            Err(ChannelError::Shutdown) => break,
            Err(err) => {
                tracing::warn!(peer = channel.label(), error = %err, "receive failed");
                break;
            }
        }
    }

    tracing::info!(peer = channel.label(), lines = echoed, "session ended");
    channel.shutdown();
}
