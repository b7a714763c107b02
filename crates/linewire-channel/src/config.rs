use std::time::Duration;

/// Default size of the scratch buffer each underlying read fills.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Default label attached to a channel's log events.
pub const DEFAULT_LABEL: &str = "text-channel";

/// Configuration for a text channel.
///
/// The defaults reproduce plain callback behavior: no timeouts, so a request
/// for a line that never arrives stays pending.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Bytes requested per underlying read. Default: 1024.
    pub read_buffer_size: usize,
    /// Fail pending receives if a single read takes longer than this.
    pub read_timeout: Option<Duration>,
    /// Fail pending sends if a single write takes longer than this.
    pub write_timeout: Option<Duration>,
    /// Name used in log events, e.g. the peer address.
    pub label: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            read_timeout: None,
            write_timeout: None,
            label: DEFAULT_LABEL.to_string(),
        }
    }
}

impl ChannelConfig {
    /// Default configuration with a custom log label.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}
