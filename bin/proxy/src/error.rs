use std::io;

use protocol::{Protocol, WireError};
use thiserror::Error;

/// Reasons a proxied connection is aborted. None of them are fatal to the
/// server, they only end the connection they happened on.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{0} proxy protocol not supported")]
    ProtocolDisabled(Protocol),
    #[error("connection closed after {got} bytes")]
    ShortRead { got: usize },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("connect backend {dest} failed: {source}")]
    BackendConnect {
        dest: String,
        #[source]
        source: io::Error,
    },
    #[error("relay with {dest} failed: {source}")]
    Relay {
        dest: String,
        #[source]
        source: io::Error,
    },
}
