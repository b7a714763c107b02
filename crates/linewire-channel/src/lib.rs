//! Thread-safe, newline-framed text over a connected byte stream.
//!
//! A [`TextChannel`] wraps one connection and lets any number of threads
//! queue outgoing text and requests for incoming lines or fixed-length runs
//! of characters. Every request completes asynchronously through a callback,
//! in the order it was made.
//!
//! ```no_run
//! # async fn demo() -> linewire_channel::Result<()> {
//! use linewire_channel::{TextChannel, TextEncoding};
//!
//! let (local, _remote) = tokio::io::duplex(1024);
//! let channel = TextChannel::new(local, TextEncoding::Utf8)?;
//!
//! channel.send("hello\n", |result| {
//!     if let Err(err) = result {
//!         eprintln!("send failed: {err}");
//!     }
//! });
//! let reply = channel.read_line().await?;
//! # let _ = reply;
//! # Ok(())
//! # }
//! ```

mod buffer;
mod dispatch;

pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
mod reader;
mod writer;

pub use channel::{ReceiveCallback, SendCallback, TextChannel};
pub use codec::{Decoder, TextEncoding};
pub use config::{ChannelConfig, DEFAULT_LABEL, DEFAULT_READ_BUFFER_SIZE};
pub use error::{ChannelError, Result};
