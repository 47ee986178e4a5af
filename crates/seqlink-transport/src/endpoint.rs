use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[cfg(unix)]
use std::os::unix::fs::{FileTypeExt, MetadataExt};

use tokio::net::{TcpListener, TcpStream};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::ByteStream;

/// Maximum socket path length.
/// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
#[cfg(target_os = "linux")]
const MAX_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const MAX_PATH_LEN: usize = 104;

const UNIX_PREFIX: &str = "unix:";

/// Where a device stream lives: `host:port` for TCP or `unix:/path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(String),
    Unix(PathBuf),
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix(UNIX_PREFIX) {
            if path.is_empty() {
                return Err(TransportError::InvalidEndpoint(s.to_string()));
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                Ok(Self::Tcp(s.to_string()))
            }
            _ => Err(TransportError::InvalidEndpoint(s.to_string())),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => f.write_str(addr),
            Self::Unix(path) => write!(f, "{UNIX_PREFIX}{}", path.display()),
        }
    }
}

impl Endpoint {
    /// Open a byte stream to a listening endpoint.
    pub async fn connect(&self) -> Result<ByteStream> {
        match self {
            Self::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str()).await.map_err(|source| {
                    TransportError::Connect {
                        endpoint: self.to_string(),
                        source,
                    }
                })?;
                stream.set_nodelay(true)?;
                debug!(endpoint = %self, "connected over tcp");
                Ok(ByteStream::from_io(stream).with_kind("tcp"))
            }
            #[cfg(unix)]
            Self::Unix(path) => {
                check_path_len(path)?;
                let stream =
                    UnixStream::connect(path)
                        .await
                        .map_err(|source| TransportError::Connect {
                            endpoint: self.to_string(),
                            source,
                        })?;
                debug!(endpoint = %self, "connected over unix domain socket");
                Ok(ByteStream::from_io(stream).with_kind("unix"))
            }
            #[cfg(not(unix))]
            Self::Unix(_) => Err(TransportError::Connect {
                endpoint: self.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix domain sockets are not available on this platform",
                ),
            }),
        }
    }
}

/// Connect to a TCP `host:port`.
pub async fn connect_tcp(addr: impl Into<String>) -> Result<ByteStream> {
    Endpoint::Tcp(addr.into()).connect().await
}

/// Connect to a Unix domain socket.
pub async fn connect_unix(path: impl AsRef<Path>) -> Result<ByteStream> {
    Endpoint::Unix(path.as_ref().to_path_buf()).connect().await
}

/// Accepts device-side connections on an endpoint.
///
/// Used by loopback tooling that plays the peripheral's role.
pub struct Acceptor {
    inner: AcceptorInner,
    endpoint: Endpoint,
}

enum AcceptorInner {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix {
        listener: UnixListener,
        created_inode: (u64, u64),
    },
}

impl Acceptor {
    /// Bind and listen on an endpoint.
    ///
    /// For Unix endpoints an existing socket file at the path is removed
    /// first (stale socket cleanup); any other file type is left alone and
    /// the bind fails.
    pub async fn bind(endpoint: &Endpoint) -> Result<Self> {
        let bind_err = |source: std::io::Error| TransportError::Bind {
            endpoint: endpoint.to_string(),
            source,
        };
        let inner = match endpoint {
            Endpoint::Tcp(addr) => {
                AcceptorInner::Tcp(TcpListener::bind(addr.as_str()).await.map_err(bind_err)?)
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                check_path_len(path)?;
                remove_stale_socket(path).map_err(bind_err)?;
                let listener = UnixListener::bind(path).map_err(bind_err)?;
                let metadata = std::fs::symlink_metadata(path).map_err(bind_err)?;
                AcceptorInner::Unix {
                    listener,
                    created_inode: (metadata.dev(), metadata.ino()),
                }
            }
            #[cfg(not(unix))]
            Endpoint::Unix(_) => {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "unix domain sockets are not available on this platform",
                )))
            }
        };

        info!(%endpoint, "listening");
        Ok(Self {
            inner,
            endpoint: endpoint.clone(),
        })
    }

    /// Accept the next connection.
    pub async fn accept(&self) -> Result<ByteStream> {
        match &self.inner {
            AcceptorInner::Tcp(listener) => {
                let (stream, addr) = listener.accept().await.map_err(TransportError::Accept)?;
                debug!(%addr, "accepted tcp connection");
                Ok(ByteStream::from_io(stream).with_kind("tcp"))
            }
            #[cfg(unix)]
            AcceptorInner::Unix { listener, .. } => {
                let (stream, _addr) = listener.accept().await.map_err(TransportError::Accept)?;
                debug!("accepted unix connection");
                Ok(ByteStream::from_io(stream).with_kind("unix"))
            }
        }
    }

    /// The endpoint this acceptor is bound to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Local TCP address, useful when bound to port 0.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        match &self.inner {
            AcceptorInner::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            AcceptorInner::Unix { .. } => None,
        }
    }
}

#[cfg(unix)]
impl Drop for Acceptor {
    fn drop(&mut self) {
        let (AcceptorInner::Unix { created_inode, .. }, Endpoint::Unix(path)) =
            (&self.inner, &self.endpoint)
        else {
            return;
        };
        if let Ok(metadata) = std::fs::symlink_metadata(path) {
            if metadata.file_type().is_socket()
                && (metadata.dev(), metadata.ino()) == *created_inode
            {
                debug!(?path, "cleaning up socket file");
                let _ = std::fs::remove_file(path);
            } else {
                debug!(?path, "socket path identity changed; skipping cleanup");
            }
        }
    }
}

fn check_path_len(path: &Path) -> Result<()> {
    let len = path.as_os_str().len();
    if len >= MAX_PATH_LEN {
        return Err(TransportError::PathTooLong {
            path: path.to_path_buf(),
            len,
            max: MAX_PATH_LEN,
        });
    }
    Ok(())
}

#[cfg(unix)]
fn remove_stale_socket(path: &Path) -> std::io::Result<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if !metadata.file_type().is_socket() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "existing path is not a unix socket",
        ));
    }
    debug!(?path, "removing stale socket");
    std::fs::remove_file(path)
}
