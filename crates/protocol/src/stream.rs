use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Stream which first replays bytes already consumed from `inner` (while
/// sniffing the protocol), then passes reads through to `inner`. Writes
/// always go straight to `inner`.
pub struct ReplayStream<S> {
    prefix: Vec<u8>,
    pos: usize,
    inner: S,
}

impl<S> ReplayStream<S> {
    pub fn new(prefix: Vec<u8>, inner: S) -> Self {
        Self { prefix, pos: 0, inner }
    }

    /// Bytes of the prefix not yet handed out.
    pub fn pending(&self) -> &[u8] {
        &self.prefix[self.pos..]
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for ReplayStream<S> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.pos < this.prefix.len() {
            let remaining = &this.prefix[this.pos..];
            let len = remaining.len().min(buf.remaining());
            buf.put_slice(&remaining[..len]);
            this.pos += len;
            if this.pos == this.prefix.len() {
                this.prefix = Vec::new();
                this.pos = 0;
            }
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for ReplayStream<S> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<Result<usize, io::Error>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn replay_then_passthrough() {
        let (client, mut server) = tokio::io::duplex(64);
        server.write_all(b" world").await.expect("should write");
        drop(server);

        let mut stream = ReplayStream::new(b"hello".to_vec(), client);
        let mut first = [0u8; 3];
        stream.read_exact(&mut first).await.expect("should read");
        assert_eq!(&first, b"hel");
        assert_eq!(stream.pending(), b"lo");

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.expect("should read to end");
        assert_eq!(rest, b"lo world");
        assert!(stream.pending().is_empty());
    }

    #[tokio::test]
    async fn writes_go_to_inner() {
        let (client, mut server) = tokio::io::duplex(64);
        let mut stream = ReplayStream::new(b"ignored".to_vec(), client);
        stream.write_all(b"ping").await.expect("should write");

        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.expect("should read");
        assert_eq!(&buf, b"ping");
        assert_eq!(stream.pending(), b"ignored");
    }
}
