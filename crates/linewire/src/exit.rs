use std::fmt;
use std::io;

use linewire_channel::ChannelError;
use linewire_transport::TransportError;

// Process exit codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: &io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe => FAILURE,
        io::ErrorKind::NotFound
        | io::ErrorKind::AddrInUse
        | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match &err {
        TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
            let mut mapped = io_error(context, source);
            mapped.message = format!("{context}: {err}");
            mapped
        }
        TransportError::Accept(source) | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        TransportError::PathTooLong { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
    }
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    match &err {
        ChannelError::Io(source) => io_error(context, source),
        ChannelError::Decode { .. } | ChannelError::Unencodable { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ChannelError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ChannelError::InvalidLength => CliError::new(USAGE, format!("{context}: {err}")),
        ChannelError::Shutdown => CliError::new(FAILURE, format!("{context}: {err}")),
        ChannelError::NoRuntime(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn connect_refused_is_plain_failure() {
        let err = transport_error(
            "connect failed",
            TransportError::Connect {
                addr: "127.0.0.1:1".to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            },
        );
        assert_eq!(err.code, FAILURE);
        assert!(err.message.contains("127.0.0.1:1"));
    }

    #[test]
    fn bad_endpoint_is_usage_error() {
        let err = transport_error(
            "bind failed",
            TransportError::InvalidEndpoint {
                input: "nope".to_string(),
                reason: "expected host:port or a socket path",
            },
        );
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn channel_errors_map_to_codes() {
        assert_eq!(
            channel_error("x", ChannelError::Timeout(Duration::from_secs(1))).code,
            TIMEOUT
        );
        assert_eq!(
            channel_error("x", ChannelError::Decode { encoding: "UTF-8" }).code,
            DATA_INVALID
        );
        assert_eq!(channel_error("x", ChannelError::Shutdown).code, FAILURE);
        assert_eq!(
            channel_error("x", io::Error::from(io::ErrorKind::PermissionDenied).into()).code,
            PERMISSION_DENIED
        );
    }
}
