use thiserror::Error;

/// Protocol violations detected while parsing a client handshake.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("socks authentication got extra data")]
    AuthExtraData,
    #[error("socks version {0:#04x} not supported")]
    UnsupportedVersion(u8),
    #[error("socks command {0:#04x} not supported")]
    UnsupportedCommand(u8),
    #[error("socks address type {0:#04x} not supported")]
    UnsupportedAddressType(u8),
    #[error("socks request got extra data")]
    RequestExtraData,
    #[error("http/2 preface not supported")]
    UnsupportedHttp2Preface,
    #[error("malformed http request: {0}")]
    MalformedHttp(String),
    #[error("http request head too large")]
    HttpHeadTooLarge,
    #[error("http request has no host")]
    MissingHost,
    #[error("invalid destination {0}")]
    InvalidDestination(String),
}

impl From<httparse::Error> for WireError {
    fn from(e: httparse::Error) -> Self {
        WireError::MalformedHttp(e.to_string())
    }
}
