use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::Stream;
#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// Where to listen or connect.
///
/// Parsed from text:
/// - `tcp://host:port` or bare `host:port` selects TCP
/// - `unix:/path/to.sock`, or anything containing a `/`, selects a Unix socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(String),
    Unix(PathBuf),
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self> {
        let invalid = |reason| TransportError::InvalidEndpoint {
            input: input.to_string(),
            reason,
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("endpoint must not be empty"));
        }
        if let Some(addr) = trimmed.strip_prefix("tcp://") {
            return parse_tcp(addr).ok_or_else(|| invalid("expected host:port after tcp://"));
        }
        if let Some(path) = trimmed.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(invalid("expected a socket path after unix:"));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }
        if trimmed.contains('/') {
            return Ok(Endpoint::Unix(PathBuf::from(trimmed)));
        }
        parse_tcp(trimmed).ok_or_else(|| invalid("expected host:port, tcp://host:port or a path"))
    }
}

fn parse_tcp(addr: &str) -> Option<Endpoint> {
    let (host, port) = addr.rsplit_once(':')?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return None;
    }
    Some(Endpoint::Tcp(addr.to_string()))
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

/// A bound listener for either transport.
pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixDomainSocket),
}

impl Listener {
    /// Bind to `endpoint`. Must be called from within a tokio runtime.
    pub async fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp(addr) => {
                let listener =
                    TcpListener::bind(addr)
                        .await
                        .map_err(|source| TransportError::Bind {
                            addr: addr.clone(),
                            source,
                        })?;
                info!(%addr, "listening on tcp");
                Ok(Listener::Tcp(listener))
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => Ok(Listener::Unix(UnixDomainSocket::bind(path)?)),
            #[cfg(not(unix))]
            Endpoint::Unix(path) => Err(TransportError::Bind {
                addr: path.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix domain sockets are not available on this platform",
                ),
            }),
        }
    }

    /// Accept the next incoming connection.
    pub async fn accept(&mut self) -> Result<Stream> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, addr) = listener.accept().await.map_err(TransportError::Accept)?;
                debug!(%addr, "accepted connection");
                Ok(Stream::from_tcp(stream))
            }
            #[cfg(unix)]
            Listener::Unix(socket) => socket.accept().await,
        }
    }

    /// The address actually bound, e.g. with the OS-assigned port filled in.
    pub fn local_endpoint(&self) -> Result<Endpoint> {
        match self {
            Listener::Tcp(listener) => Ok(Endpoint::Tcp(listener.local_addr()?.to_string())),
            #[cfg(unix)]
            Listener::Unix(socket) => Ok(Endpoint::Unix(socket.path().to_path_buf())),
        }
    }
}

/// Connect to a listening endpoint.
pub async fn connect(endpoint: &Endpoint) -> Result<Stream> {
    match endpoint {
        Endpoint::Tcp(addr) => {
            let stream = TcpStream::connect(addr)
                .await
                .map_err(|source| TransportError::Connect {
                    addr: addr.clone(),
                    source,
                })?;
            debug!(%addr, "connected over tcp");
            Ok(Stream::from_tcp(stream))
        }
        #[cfg(unix)]
        Endpoint::Unix(path) => UnixDomainSocket::connect(path).await,
        #[cfg(not(unix))]
        Endpoint::Unix(path) => Err(TransportError::Connect {
            addr: path.display().to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "unix domain sockets are not available on this platform",
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[test]
    fn parses_tcp_forms() {
        assert_eq!(
            "tcp://127.0.0.1:4000".parse::<Endpoint>().unwrap(),
            Endpoint::Tcp("127.0.0.1:4000".to_string())
        );
        assert_eq!(
            "localhost:80".parse::<Endpoint>().unwrap(),
            Endpoint::Tcp("localhost:80".to_string())
        );
    }

    #[test]
    fn parses_unix_forms() {
        assert_eq!(
            "unix:/tmp/a.sock".parse::<Endpoint>().unwrap(),
            Endpoint::Unix(PathBuf::from("/tmp/a.sock"))
        );
        assert_eq!(
            "./relative.sock".parse::<Endpoint>().unwrap(),
            Endpoint::Unix(PathBuf::from("./relative.sock"))
        );
    }

    #[test]
    fn rejects_garbage() {
        for input in ["", "tcp://", "tcp://host", "host:notaport", "unix:", "justaname"] {
            let err = input.parse::<Endpoint>().unwrap_err();
            assert!(
                matches!(err, TransportError::InvalidEndpoint { .. }),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn display_roundtrips_through_parse() {
        let tcp = Endpoint::Tcp("127.0.0.1:9".to_string());
        assert_eq!(tcp.to_string().parse::<Endpoint>().unwrap(), tcp);
        let unix = Endpoint::Unix(PathBuf::from("/tmp/x.sock"));
        assert_eq!(unix.to_string().parse::<Endpoint>().unwrap(), unix);
    }

    #[tokio::test]
    async fn tcp_listener_accepts_and_connects() {
        let mut listener = Listener::bind(&Endpoint::Tcp("127.0.0.1:0".to_string()))
            .await
            .unwrap();
        let endpoint = listener.local_endpoint().unwrap();

        let client = tokio::spawn(async move {
            let mut stream = connect(&endpoint).await.unwrap();
            stream.write_all(b"ping\n").await.unwrap();
            stream.transport_name()
        });

        let mut server = listener.accept().await.unwrap();
        assert!(server.peer().starts_with("tcp://127.0.0.1:"));
        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping\n");
        assert_eq!(client.await.unwrap(), "tcp");
    }

    #[tokio::test]
    async fn connect_to_closed_port_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = connect(&Endpoint::Tcp(addr.to_string())).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }
}
