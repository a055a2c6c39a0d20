//! SOCKS5 wire format: method negotiation and CONNECT request parsing.
//!
//! Only the "no authentication" method and the CONNECT command are
//! supported. Functions here work on already-buffered bytes, the caller is
//! responsible for reading from the network.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::WireError;

pub const VERSION: u8 = 0x05;
pub const AUTH_NONE: u8 = 0x00;

pub const CMD_CONNECT: u8 = 0x01;

pub const ATYP_IPV4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x03;
pub const ATYP_IPV6: u8 = 0x04;

/// 4 bytes header + 1 byte domain length + 255 bytes domain + 2 bytes port + 1 spare.
pub const REQUEST_BUF_LEN: usize = 263;
pub const REQUEST_MIN_LEN: usize = 5;

/// Reply to the method negotiation: version 5, no authentication required.
pub const AUTH_REPLY: [u8; 2] = [VERSION, AUTH_NONE];

/// Reply to a successful CONNECT. The bound address is a fixed sentinel
/// (0.0.0.0:2115), clients do not use it for CONNECT.
pub const CONNECT_REPLY: [u8; 10] = [VERSION, 0x00, 0x00, ATYP_IPV4, 0x00, 0x00, 0x00, 0x00, 0x08, 0x43];

/// Total length of the method negotiation message `[ver][nmethods][methods..]`.
///
/// `buf` must hold at least the two header bytes.
pub fn negotiation_len(buf: &[u8]) -> usize {
    2 + buf[1] as usize
}

/// Compares what was already read against the expected message length and
/// returns how many bytes are still missing. Reading more than the message
/// is a protocol violation reported as `extra`.
pub fn missing_len(read: usize, expected: usize, extra: WireError) -> Result<usize, WireError> {
    if read > expected {
        Err(extra)
    } else {
        Ok(expected - read)
    }
}

/// Validates the request header `[ver][cmd][rsv][atyp][..]` and computes the
/// total request length from the address type.
///
/// `buf` must hold at least [`REQUEST_MIN_LEN`] bytes.
pub fn request_len(buf: &[u8]) -> Result<usize, WireError> {
    if buf[0] != VERSION {
        return Err(WireError::UnsupportedVersion(buf[0]));
    }
    if buf[1] != CMD_CONNECT {
        return Err(WireError::UnsupportedCommand(buf[1]));
    }
    match buf[3] {
        ATYP_IPV4 => Ok(4 + 4 + 2),
        ATYP_IPV6 => Ok(4 + 16 + 2),
        ATYP_DOMAIN => Ok(4 + 1 + buf[4] as usize + 2),
        atyp => Err(WireError::UnsupportedAddressType(atyp)),
    }
}

/// Decodes the destination of a complete request into `host:port`.
///
/// `buf` must be exactly the request, as sized by [`request_len`].
pub fn decode_destination(buf: &[u8]) -> Result<String, WireError> {
    let len = buf.len();
    let host = match buf[3] {
        ATYP_IPV4 => {
            Ipv4Addr::new(buf[4], buf[5], buf[6], buf[7]).to_string()
        }
        ATYP_IPV6 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&buf[4..20]);
            Ipv6Addr::from(octets).to_string()
        }
        ATYP_DOMAIN => {
            let domain = &buf[5..5 + buf[4] as usize];
            String::from_utf8(domain.to_vec()).map_err(|_| WireError::InvalidDestination(String::from_utf8_lossy(domain).to_string()))?
        }
        atyp => return Err(WireError::UnsupportedAddressType(atyp)),
    };
    let port = u16::from_be_bytes([buf[len - 2], buf[len - 1]]);
    Ok(join_host_port(&host, port))
}

/// Joins host and port, bracketing hosts that contain a colon (IPv6).
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
