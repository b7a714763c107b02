//! Connected byte-stream transports for linewire.
//!
//! Provides the [`Connection`] seam a text channel is built on, plus concrete
//! streams and listeners:
//! - TCP (all platforms)
//! - Unix domain sockets (Linux/macOS)
//!
//! This is the lowest layer of linewire. It moves bytes only; turning them
//! into lines of text happens in `linewire-channel`.

pub mod endpoint;
pub mod error;
pub mod stream;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use endpoint::{connect, Endpoint, Listener};
pub use error::{Result, TransportError};
pub use stream::Stream;
pub use traits::Connection;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
