use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Debug)]
pub enum RelayEnd {
    /// Client to backend direction finished first.
    Client(io::Result<u64>),
    /// Backend to client direction finished first.
    Backend(io::Result<u64>),
}

impl RelayEnd {
    pub fn into_result(self) -> io::Result<u64> {
        match self {
            RelayEnd::Client(res) | RelayEnd::Backend(res) => res,
        }
    }
}

/// Copies bytes in both directions until one direction ends (EOF or error)
/// and returns that outcome. The other direction is dropped unfinished, the
/// caller closes both streams afterwards.
pub async fn relay<C, B>(client: &mut C, backend: &mut B) -> RelayEnd
where
    C: AsyncRead + AsyncWrite + Unpin + ?Sized,
    B: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut backend_read, mut backend_write) = tokio::io::split(backend);

    let client_to_backend = tokio::io::copy(&mut client_read, &mut backend_write);
    let backend_to_client = tokio::io::copy(&mut backend_read, &mut client_write);

    let end = tokio::select! {
        res = client_to_backend => RelayEnd::Client(res),
        res = backend_to_client => RelayEnd::Backend(res),
    };
    log::debug!("[Relay] finished with {end:?}");
    end
}
