//! Transport port for the link.
//!
//! [`TcpConnector`] dials real sockets. [`MockConnector`] hands out scripted
//! results so retry behavior can be tested without a network.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use async_trait::async_trait;
use telterm_common::mutex_lock_or_recover;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tracing::debug;

/// Byte stream the link runs over.
pub trait LinkStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> LinkStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

pub type BoxedStream = Box<dyn LinkStream>;

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: &str, port: u16) -> io::Result<BoxedStream>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> io::Result<BoxedStream> {
        let stream = TcpStream::connect((host, port)).await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }
        Ok(Box::new(stream))
    }
}

/// Scripted connector: each call pops the next result. Once the script is
/// empty every call fails with `ConnectionRefused`.
#[derive(Default)]
pub struct MockConnector {
    script: Mutex<VecDeque<io::Result<BoxedStream>>>,
    calls: AtomicU32,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_stream<S>(&self, stream: S)
    where
        S: LinkStream + 'static,
    {
        mutex_lock_or_recover(&self.script).push_back(Ok(Box::new(stream)));
    }

    pub fn push_error(&self, kind: io::ErrorKind) {
        mutex_lock_or_recover(&self.script).push_back(Err(io::Error::from(kind)));
    }

    pub fn push_errors(&self, kind: io::ErrorKind, count: usize) {
        for _ in 0..count {
            self.push_error(kind);
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MockConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockConnector")
            .field("remaining", &mutex_lock_or_recover(&self.script).len())
            .field("calls", &self.calls())
            .finish()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _host: &str, _port: u16) -> io::Result<BoxedStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = mutex_lock_or_recover(&self.script).pop_front();
        next.unwrap_or_else(|| Err(io::Error::from(io::ErrorKind::ConnectionRefused)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_mock_connector_follows_script() {
        let connector = MockConnector::new();
        connector.push_error(io::ErrorKind::TimedOut);
        let (client, _server) = tokio::io::duplex(64);
        connector.push_stream(client);

        let first = connector.connect("h", 23).await;
        assert_eq!(first.err().map(|e| e.kind()), Some(io::ErrorKind::TimedOut));
        assert!(connector.connect("h", 23).await.is_ok());
        let last = connector.connect("h", 23).await;
        assert_eq!(
            last.err().map(|e| e.kind()),
            Some(io::ErrorKind::ConnectionRefused)
        );
        assert_eq!(connector.calls(), 3);
    }

    #[tokio::test]
    async fn test_tcp_connector_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"hi").await.unwrap();
        });

        let mut stream = TcpConnector.connect("127.0.0.1", port).await.unwrap();
        let mut buf = [0u8; 2];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hi");
        server.await.unwrap();
    }
}
