//! Connector is the capability which turns a destination `host:port` into an
//! outbound stream, and releases per-connection resources once the relay ends.

use std::{io, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};

pub trait ProxyStream: AsyncRead + AsyncWrite + Unpin + Send + Sync {}

impl<S: AsyncRead + AsyncWrite + Unpin + Send + Sync> ProxyStream for S {}

#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, dest: &str) -> io::Result<Box<dyn ProxyStream>>;

    /// Called once after the relay of a connection which was connected by
    /// this connector ends. Must be harmless when there is nothing to release.
    fn clean(&self) {}
}

/// Runs `Connector::clean` when dropped, so it happens exactly once however
/// the connection handler exits after a successful connect.
pub struct CleanGuard<'a> {
    connector: &'a dyn Connector,
}

impl<'a> CleanGuard<'a> {
    pub fn new(connector: &'a dyn Connector) -> Self {
        Self { connector }
    }
}

impl Drop for CleanGuard<'_> {
    fn drop(&mut self) {
        self.connector.clean();
    }
}

/// Plain TCP dial with a timeout.
#[derive(Debug, Clone)]
pub struct DirectConnector {
    timeout: Duration,
}

impl DirectConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for DirectConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait::async_trait]
impl Connector for DirectConnector {
    async fn connect(&self, dest: &str) -> io::Result<Box<dyn ProxyStream>> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(dest))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, format!("dial {dest} timeout after {:?}", self.timeout)))??;
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("[DirectConnector] set nodelay for {dest} error {e}");
        }
        Ok(Box::new(stream))
    }
}
