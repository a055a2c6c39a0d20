use std::net::SocketAddr;

use protocol::{
    socks5::{self, AUTH_REPLY, CONNECT_REPLY, REQUEST_BUF_LEN, REQUEST_MIN_LEN},
    Protocol, WireError,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{connect_backend, relay_and_close, utils::read_at_least, CleanGuard, Connector, ProxyError};

/// Runs the SOCKS5 handshake on a connection whose first `read` bytes are
/// already in `sniffed`, then connects and relays.
///
/// No SOCKS5 failure reply is ever sent, on any error the connection is
/// simply closed by the caller.
pub async fn handle<S>(conn: &mut S, sniffed: &mut [u8], read: usize, connector: &dyn Connector, remote: SocketAddr) -> Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let msg_len = socks5::negotiation_len(&sniffed[..read]);
    if socks5::missing_len(read, msg_len, WireError::AuthExtraData)? > 0 {
        conn.read_exact(&mut sniffed[read..msg_len]).await?;
    }
    conn.write_all(&AUTH_REPLY).await?;

    let mut buf = [0u8; REQUEST_BUF_LEN];
    let read = read_at_least(conn, &mut buf, REQUEST_MIN_LEN).await?;
    let req_len = socks5::request_len(&buf[..read])?;
    if socks5::missing_len(read, req_len, WireError::RequestExtraData)? > 0 {
        conn.read_exact(&mut buf[read..req_len]).await?;
    }
    let dest = socks5::decode_destination(&buf[..req_len])?;
    log::info!("[Socks5] {remote} {dest}");

    let mut backend = connect_backend(connector, Protocol::Socks5, &dest).await?;
    let _clean = CleanGuard::new(connector);
    conn.write_all(&CONNECT_REPLY).await?;
    log::debug!("[Socks5] {remote} <-> {dest} layer success");

    relay_and_close(conn, &mut backend, &dest).await
}
