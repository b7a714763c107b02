use std::fs;

use linewire_channel::{ChannelConfig, ChannelError, TextChannel};
use linewire_transport::connect;
use tokio::sync::mpsc;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{channel_error, io_error, transport_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_line, OutputFormat};

pub async fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let lines = resolve_lines(&args)?;

    let stream = connect(&args.endpoint)
        .await
        .map_err(|err| transport_error("connect failed", err))?;
    let config = ChannelConfig {
        read_timeout: Some(wait_timeout),
        ..ChannelConfig::labeled(stream.peer())
    };
    let channel = TextChannel::with_config(stream, args.encoding, config)
        .map_err(|err| channel_error("channel setup failed", err))?;

    let result = exchange(&channel, &lines, args.wait, format).await;
    channel.shutdown();
    result.map(|_| SUCCESS)
}

/// Queue every line at once, wait for all of them to be written, then
/// collect `wait` replies.
async fn exchange(
    channel: &TextChannel,
    lines: &[String],
    wait: usize,
    format: OutputFormat,
) -> CliResult<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Result<(), ChannelError>>();
    for line in lines {
        let tx = tx.clone();
        channel.send(&format!("{line}\n"), move |result| {
            let _ = tx.send(result);
        });
    }
    drop(tx);

    let mut sent = 0usize;
    while let Some(result) = rx.recv().await {
        result.map_err(|err| channel_error("send failed", err))?;
        sent += 1;
    }
    tracing::debug!(peer = channel.label(), lines = sent, "lines sent");

    for received in 0..wait {
        match channel.read_line().await {
            Ok(Some(line)) => print_line(&line, channel.label(), format),
            Ok(None) => {
                return Err(CliError::new(
                    FAILURE,
                    format!("connection closed after {received} of {wait} replies"),
                ))
            }
            Err(err) => return Err(channel_error("receive failed", err)),
        }
    }
    Ok(())
}

fn resolve_lines(args: &SendArgs) -> CliResult<Vec<String>> {
    let mut lines = args.data.clone();
    if let Some(path) = &args.file {
        let text = fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), &err))?;
        lines.extend(text.lines().map(str::to_string));
    }
    Ok(lines)
}
