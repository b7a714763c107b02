use std::sync::Arc;
use std::time::Duration;

/// Errors delivered by a text channel.
///
/// Cloneable so that a single transport failure can be handed to every
/// callback it affects.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    /// The underlying connection failed while reading or writing.
    #[error("channel I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// Incoming bytes are not valid in the channel's encoding.
    #[error("invalid {encoding} byte sequence in incoming stream")]
    Decode { encoding: &'static str },

    /// Outgoing text contains a character the channel's encoding cannot represent.
    #[error("character {ch:?} cannot be encoded as {encoding}")]
    Unencodable { encoding: &'static str, ch: char },

    /// `receive_exact` was called with a length of zero.
    #[error("exact receive length must be greater than zero")]
    InvalidLength,

    /// A configured read or write timeout elapsed.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The channel was shut down before the request completed.
    #[error("channel shut down")]
    Shutdown,

    /// No tokio runtime was available to drive the channel.
    #[error("no async runtime available: {0}")]
    NoRuntime(String),
}

impl From<std::io::Error> for ChannelError {
    fn from(err: std::io::Error) -> Self {
        ChannelError::Io(Arc::new(err))
    }
}

impl ChannelError {
    /// The I/O error kind, if this is a transport failure.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            ChannelError::Io(err) => Some(err.kind()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
