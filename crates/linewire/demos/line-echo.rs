//! Minimal line echo server: accepts one connection and echoes lines back.
//!
//! Run with:
//!   cargo run --example line-echo
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1:7070 --data hello --wait 1

use linewire::{Endpoint, Listener, TextChannel, TextEncoding};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let endpoint: Endpoint = "127.0.0.1:7070".parse()?;
    let mut listener = Listener::bind(&endpoint).await?;
    eprintln!("Listening on {endpoint}");

    let stream = listener.accept().await?;
    eprintln!("Peer connected: {}", stream.peer());
    let channel = TextChannel::new(stream, TextEncoding::Utf8)?;

    while let Some(line) = channel.read_line().await? {
        eprintln!("Received {} chars", line.chars().count());
        channel.send_text(&format!("{line}\n")).await?;
    }

    eprintln!("Peer disconnected");
    channel.shutdown();
    Ok(())
}
