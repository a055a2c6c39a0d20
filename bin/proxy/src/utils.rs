use std::fmt::Display;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::ProxyError;

pub trait ErrorExt {
    fn print_on_err(&self, prefix: &str);
}

impl<T, E: Display> ErrorExt for Result<T, E> {
    fn print_on_err(&self, prefix: &str) {
        if let Err(e) = self {
            log::warn!("{prefix} got error {e}")
        }
    }
}

/// Reads into `buf` until at least `min` bytes are there. Returns the number
/// of bytes read, which may exceed `min` when the peer sent more.
pub async fn read_at_least<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8], min: usize) -> Result<usize, ProxyError> {
    let mut filled = 0;
    while filled < min {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(ProxyError::ShortRead { got: filled });
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;

    use super::*;

    #[tokio::test]
    async fn read_more_than_min() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[1, 2, 3, 4]).await.expect("should write");
        let mut buf = [0u8; 16];
        let n = read_at_least(&mut server, &mut buf, 2).await.expect("should read");
        assert_eq!(n, 4);
        assert_eq!(&buf[..n], &[1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn short_read() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[0x05]).await.expect("should write");
        drop(client);
        let mut buf = [0u8; 16];
        let res = read_at_least(&mut server, &mut buf, 2).await;
        assert!(matches!(res, Err(ProxyError::ShortRead { got: 1 })));
    }
}
