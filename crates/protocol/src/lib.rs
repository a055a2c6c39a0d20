use derive_more::derive::Display;

pub mod error;
pub mod http;
pub mod socks5;
pub mod stream;

pub use error::WireError;

/// Size of the first read on a new connection, enough for the largest
/// SOCKS5 method-negotiation message plus one byte.
pub const SNIFF_BUF_LEN: usize = 258;

/// Minimum number of bytes needed before a connection can be classified.
pub const SNIFF_MIN_LEN: usize = 2;

#[derive(Debug, Display, PartialEq, Eq, Clone, Copy)]
pub enum Protocol {
    #[display("socks5")]
    Socks5,
    #[display("http")]
    Http,
}

impl Protocol {
    /// Classify a connection from its leading bytes. Anything that does not
    /// start with the SOCKS5 version byte is treated as HTTP.
    pub fn sniff(buf: &[u8]) -> Option<Self> {
        match buf.first()? {
            &socks5::VERSION => Some(Protocol::Socks5),
            _ => Some(Protocol::Http),
        }
    }
}
