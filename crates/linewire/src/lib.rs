//! Ordered, thread-safe, newline-framed text channels over sockets.
//!
//! linewire wraps a connected byte stream in a [`channel::TextChannel`]: many
//! threads may queue text to send and requests for lines or fixed-length runs
//! of characters, and each completes through a callback in the order it was
//! made.
//!
//! # Crate Structure
//!
//! - [`transport`]: connected streams, endpoints, listeners (TCP, Unix sockets)
//! - [`channel`]: the text channel, its encodings and configuration

/// Re-export transport types.
pub mod transport {
    pub use linewire_transport::*;
}

/// Re-export channel types.
pub mod channel {
    pub use linewire_channel::*;
}

pub use linewire_channel::{ChannelConfig, ChannelError, TextChannel, TextEncoding};
pub use linewire_transport::{connect, Endpoint, Listener, Stream};
