use std::net::SocketAddr;

use protocol::{
    http::{RequestHead, BAD_REQUEST, CONNECT_ESTABLISHED},
    Protocol, WireError,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{connect_backend, relay_and_close, CleanGuard, Connector, ProxyError};

const READ_CHUNK: usize = 4096;

/// Serves one HTTP proxy request. `conn` must replay the bytes consumed while
/// sniffing before the live connection.
///
/// CONNECT turns into an opaque tunnel after the `200` reply. Other methods
/// are forwarded with the rewritten head, then the rest of the connection is
/// relayed as is.
pub async fn handle<S>(conn: &mut S, connector: &dyn Connector, remote: SocketAddr) -> Result<(), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (head, buf, head_len) = read_head(conn).await?;
    log::info!("[Http] {} {remote} - {} HTTP/1.{}", head.method, head.host().unwrap_or_default(), head.version);
    log::debug!("[Http] request head from {remote}:\n{head}");

    let dest = head.destination()?;
    let mut backend = connect_backend(connector, Protocol::Http, &dest).await?;
    let _clean = CleanGuard::new(connector);

    if head.is_connect() {
        conn.write_all(CONNECT_ESTABLISHED).await?;
    } else {
        backend.write_all(&head.to_forward_bytes()).await?;
    }
    // body or early tunnel bytes read together with the head
    let leftover = &buf[head_len..];
    if !leftover.is_empty() {
        backend.write_all(leftover).await?;
    }
    log::debug!("[Http] {} {remote} <-> {dest} layer success", head.method);

    relay_and_close(conn, &mut backend, &dest).await
}

/// Reads until a full request head is buffered. Returns the head, the whole
/// buffer and the head length inside it.
async fn read_head<S>(conn: &mut S) -> Result<(RequestHead, Vec<u8>, usize), ProxyError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match RequestHead::parse(&buf) {
            Ok(Some((head, head_len))) => return Ok((head, buf, head_len)),
            Ok(None) => {}
            Err(WireError::UnsupportedHttp2Preface) => {
                conn.write_all(BAD_REQUEST).await?;
                return Err(WireError::UnsupportedHttp2Preface.into());
            }
            Err(e) => return Err(e.into()),
        }
        let n = conn.read(&mut chunk).await?;
        if n == 0 {
            return Err(ProxyError::ShortRead { got: buf.len() });
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
