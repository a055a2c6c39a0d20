//! Forward proxy which accepts SOCKS5 and HTTP/HTTP-CONNECT clients on one
//! listening socket, sniffing the protocol from the first bytes.

use std::{net::SocketAddr, sync::Arc};

use ::metrics::{counter, gauge};
use protocol::{stream::ReplayStream, Protocol, SNIFF_BUF_LEN, SNIFF_MIN_LEN};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

mod connector;
mod error;
mod http;
mod metrics;
mod relay;
mod socks5;
mod utils;


pub use connector::{CleanGuard, Connector, DirectConnector, ProxyStream};
pub use error::ProxyError;
pub use crate::metrics::*;
pub use protocol;
pub use relay::{relay, RelayEnd};
use utils::{read_at_least, ErrorExt};

pub struct ProxyServerConfig {
    pub listen: SocketAddr,
    pub socks5: Option<Arc<dyn Connector>>,
    pub http: Option<Arc<dyn Connector>>,
    pub disable_socks5: bool,
    pub disable_http: bool,
}

impl ProxyServerConfig {
    /// Connector serving `protocol`, none when the protocol is disabled.
    pub fn connector(&self, protocol: Protocol) -> Option<&dyn Connector> {
        match protocol {
            Protocol::Socks5 if !self.disable_socks5 => self.socks5.as_deref(),
            Protocol::Http if !self.disable_http => self.http.as_deref(),
            _ => None,
        }
    }
}

pub struct ProxyServer {
    listener: TcpListener,
    cfg: Arc<ProxyServerConfig>,
}

impl ProxyServer {
    pub async fn new(cfg: ProxyServerConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(cfg.listen).await?;
        log::info!(
            "[ProxyServer] listening on {} socks5 {} http {}",
            listener.local_addr()?,
            cfg.connector(Protocol::Socks5).is_some(),
            cfg.connector(Protocol::Http).is_some()
        );
        Ok(Self { listener, cfg: cfg.into() })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts one connection and spawns its handling task.
    pub async fn recv(&mut self) -> anyhow::Result<()> {
        let (stream, remote) = self.listener.accept().await?;
        log::debug!("[ProxyServer] new conn from {remote}");
        let cfg = self.cfg.clone();
        tokio::spawn(run_connection(cfg, stream, remote));
        Ok(())
    }

    /// Accept loop, only per-accept errors can happen and they are logged.
    pub async fn run(mut self) {
        loop {
            if let Err(e) = self.recv().await {
                log::error!("[ProxyServer] accept error {e}");
            }
        }
    }
}

async fn run_connection(cfg: Arc<ProxyServerConfig>, stream: TcpStream, remote: SocketAddr) {
    // failures are logged by the handler with their protocol
    let _ = handle_conn(&cfg, stream, remote).await;
}

/// Sniffs the protocol of a fresh connection and runs the matching handler
/// to the end of the relay. The connection is closed when this returns.
///
/// Failures are logged here, with the sniffed protocol once known, and
/// returned for the caller.
pub async fn handle_conn<S>(cfg: &ProxyServerConfig, mut stream: S, remote: SocketAddr) -> Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut buf = [0u8; SNIFF_BUF_LEN];
    let read = read_at_least(&mut stream, &mut buf, SNIFF_MIN_LEN).await;
    read.print_on_err(&format!("[ProxyServer] sniff conn from {remote}"));
    let read = read?;
    let protocol = Protocol::sniff(&buf[..read]).ok_or(ProxyError::ShortRead { got: read })?;
    counter!(METRICS_PROXY_CONN_COUNT, "protocol" => protocol.to_string()).increment(1);

    let res = match cfg.connector(protocol) {
        None => Err(ProxyError::ProtocolDisabled(protocol)),
        Some(connector) => match protocol {
            Protocol::Socks5 => socks5::handle(&mut stream, &mut buf, read, connector, remote).await,
            Protocol::Http => {
                let mut stream = ReplayStream::new(buf[..read].to_vec(), &mut stream);
                http::handle(&mut stream, connector, remote).await
            }
        },
    };
    if res.is_err() {
        counter!(METRICS_PROXY_CONN_ERROR_COUNT, "protocol" => protocol.to_string()).increment(1);
    }
    res.print_on_err(&format!("[ProxyServer] {protocol} conn from {remote}"));
    res
}

async fn connect_backend(connector: &dyn Connector, protocol: Protocol, dest: &str) -> Result<Box<dyn ProxyStream>, ProxyError> {
    connector.connect(dest).await.map_err(|source| {
        counter!(METRICS_BACKEND_CONNECT_ERROR_COUNT, "protocol" => protocol.to_string()).increment(1);
        ProxyError::BackendConnect { dest: dest.to_string(), source }
    })
}

/// Relays until one direction ends, then shuts both streams down.
async fn relay_and_close<C, B>(client: &mut C, backend: &mut B, dest: &str) -> Result<(), ProxyError>
where
    C: AsyncRead + AsyncWrite + Unpin + ?Sized,
    B: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    gauge!(METRICS_PROXY_RELAY_LIVE).increment(1.0);
    let end = relay(client, backend).await;
    gauge!(METRICS_PROXY_RELAY_LIVE).decrement(1.0);

    if let Err(e) = backend.shutdown().await {
        log::debug!("[Relay] shutdown backend error {e}");
    }
    if let Err(e) = client.shutdown().await {
        log::debug!("[Relay] shutdown client error {e}");
    }
    end.into_result().map_err(|source| ProxyError::Relay { dest: dest.to_string(), source })?;
    Ok(())
}
