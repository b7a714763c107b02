use tokio::io::{AsyncRead, AsyncWrite};

/// A connected duplex byte stream.
///
/// Anything that can be read and written asynchronously, moved between
/// runtime workers, and owned for the life of the process qualifies. A text
/// channel takes exclusive ownership of one connection; the caller must not
/// touch the stream afterwards.
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Connection for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}
