//! HTTP/1.x proxy request head: parsing, destination derivation and the
//! rewrite applied to forwarded (non CONNECT) requests.

use std::fmt::{Display, Formatter};

use crate::WireError;

pub const HEAD_MAX_LEN: usize = 64 * 1024;
pub const MAX_HEADERS: usize = 64;
pub const DEFAULT_PORT: u16 = 80;

pub const CONNECT_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection established\r\n\r\n";
pub const BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\r\n\r\n";

const METHOD_CONNECT: &str = "CONNECT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub target: String,
    /// Minor version of HTTP/1.x.
    pub version: u8,
    pub headers: Vec<(String, Vec<u8>)>,
}

impl RequestHead {
    /// Parses a request head from the start of `buf`.
    ///
    /// Returns `Ok(None)` while the head is incomplete, otherwise the head and
    /// the number of bytes it occupies. Bytes after that belong to the body or
    /// to the tunnel and must be forwarded untouched.
    pub fn parse(buf: &[u8]) -> Result<Option<(Self, usize)>, WireError> {
        if is_http2_preface(buf) {
            return Err(WireError::UnsupportedHttp2Preface);
        }
        // httparse rejects the HTTP/2 version before the line ends
        if may_become_http2_preface(buf) {
            if buf.len() > HEAD_MAX_LEN {
                return Err(WireError::HttpHeadTooLarge);
            }
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);
        let head_len = match req.parse(buf)? {
            httparse::Status::Complete(len) => len,
            httparse::Status::Partial if buf.len() > HEAD_MAX_LEN => return Err(WireError::HttpHeadTooLarge),
            httparse::Status::Partial => return Ok(None),
        };

        let method = req.method.ok_or_else(|| WireError::MalformedHttp("missing method".to_string()))?;
        let target = req.path.ok_or_else(|| WireError::MalformedHttp("missing request target".to_string()))?;
        let version = req.version.ok_or_else(|| WireError::MalformedHttp("missing version".to_string()))?;
        let head = Self {
            method: method.to_string(),
            target: target.to_string(),
            version,
            headers: req.headers.iter().map(|h| (h.name.to_string(), h.value.to_vec())).collect(),
        };
        Ok(Some((head, head_len)))
    }

    pub fn is_connect(&self) -> bool {
        self.method.eq_ignore_ascii_case(METHOD_CONNECT)
    }

    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_slice())
    }

    /// Host as requested by the client: the CONNECT authority, then the
    /// authority of an absolute-form target, then the `Host` header.
    pub fn host(&self) -> Option<String> {
        if self.is_connect() {
            return Some(self.target.clone()).filter(|t| !t.is_empty());
        }
        if let Some((authority, _)) = split_absolute_form(&self.target) {
            if !authority.is_empty() {
                return Some(authority.to_string());
            }
        }
        let host = self.header("host")?;
        let host = String::from_utf8_lossy(host).trim().to_string();
        Some(host).filter(|h| !h.is_empty())
    }

    /// Destination `host:port`, defaulting the port to 80.
    pub fn destination(&self) -> Result<String, WireError> {
        let host = self.host().ok_or(WireError::MissingHost)?;
        if has_port(&host) {
            Ok(host)
        } else {
            Ok(format!("{host}:{DEFAULT_PORT}"))
        }
    }

    /// Serializes the head for the origin server: origin-form target,
    /// `Proxy-Connection` removed and `Connection: Keep-Alive` forced.
    /// Other headers keep their order and casing.
    pub fn to_forward_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(512);
        let target = match split_absolute_form(&self.target) {
            Some((_, path)) if path.is_empty() => "/".to_string(),
            Some((_, path)) if path.starts_with('?') => format!("/{path}"),
            Some((_, path)) => path.to_string(),
            None => self.target.clone(),
        };
        out.extend_from_slice(format!("{} {} HTTP/1.1\r\n", self.method, target).as_bytes());

        if self.header("host").is_none() {
            if let Some(host) = self.host() {
                push_header(&mut out, "Host", host.as_bytes());
            }
        }

        let mut connection_set = false;
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("proxy-connection") {
                continue;
            }
            if name.eq_ignore_ascii_case("connection") {
                if !connection_set {
                    push_header(&mut out, "Connection", b"Keep-Alive");
                    connection_set = true;
                }
                continue;
            }
            push_header(&mut out, name, value);
        }
        if !connection_set {
            push_header(&mut out, "Connection", b"Keep-Alive");
        }
        out.extend_from_slice(b"\r\n");
        out
    }
}

impl Display for RequestHead {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} {} HTTP/1.{}", self.method, self.target, self.version)?;
        for (name, value) in &self.headers {
            writeln!(f, "{}: {}", name, String::from_utf8_lossy(value))?;
        }
        Ok(())
    }
}

/// True when the request line is the HTTP/2 connection preface
/// (`PRI * HTTP/2.0`), which this proxy does not negotiate.
pub fn is_http2_preface(buf: &[u8]) -> bool {
    let Some(line_end) = buf.windows(2).position(|w| w == b"\r\n") else {
        return false;
    };
    let line = String::from_utf8_lossy(&buf[..line_end]);
    let mut parts = line.split(' ');
    matches!((parts.next(), parts.next(), parts.next()), (Some("PRI"), Some(_), Some(proto)) if proto.starts_with("HTTP/2"))
}

/// True while the request line is incomplete and could still turn out to be
/// the HTTP/2 preface.
fn may_become_http2_preface(buf: &[u8]) -> bool {
    const PRI: &[u8] = b"PRI ";
    let line_done = buf.windows(2).any(|w| w == b"\r\n");
    !line_done && (buf.starts_with(PRI) || PRI.starts_with(buf))
}

/// Splits `scheme://authority/path` into authority and the rest (path, query).
fn split_absolute_form(target: &str) -> Option<(&str, &str)> {
    let (_scheme, rest) = target.split_once("://")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    let authority = authority.rsplit_once('@').map(|(_, host)| host).unwrap_or(authority);
    let path = rest[end..].split('#').next().unwrap_or_default();
    Some((authority, path))
}

fn has_port(host: &str) -> bool {
    if host.starts_with('[') {
        host.contains("]:")
    } else {
        host.contains(':')
    }
}

fn push_header(out: &mut Vec<u8>, name: &str, value: &[u8]) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value);
    out.extend_from_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &[u8]) -> (RequestHead, usize) {
        RequestHead::parse(raw).expect("should parse").expect("should be complete")
    }

    #[test]
    fn partial_head() {
        assert_eq!(RequestHead::parse(b"GET / HTTP/1.1\r\nHost: a"), Ok(None));
        assert_eq!(RequestHead::parse(b"CONN"), Ok(None));
    }

    #[test]
    fn connect_destination() {
        let (head, len) = parse(b"CONNECT example.com:443 HTTP/1.1\r\n\r\nextra");
        assert!(head.is_connect());
        assert_eq!(len, 36);
        assert_eq!(head.destination(), Ok("example.com:443".to_string()));
    }

    #[test]
    fn host_header_without_port() {
        let (head, _) = parse(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n");
        assert!(!head.is_connect());
        assert_eq!(head.destination(), Ok("example.com:80".to_string()));
    }

    #[test]
    fn host_header_with_port() {
        let (head, _) = parse(b"GET / HTTP/1.1\r\nhost: example.com:8080\r\n\r\n");
        assert_eq!(head.destination(), Ok("example.com:8080".to_string()));
    }

    #[test]
    fn absolute_form_wins_over_host_header() {
        let (head, _) = parse(b"GET http://origin.test:81/a?b=1 HTTP/1.1\r\nHost: other.test\r\n\r\n");
        assert_eq!(head.destination(), Ok("origin.test:81".to_string()));

        let (head, _) = parse(b"GET http://user:pw@origin.test/ HTTP/1.1\r\n\r\n");
        assert_eq!(head.destination(), Ok("origin.test:80".to_string()));
    }

    #[test]
    fn ipv6_host() {
        let (head, _) = parse(b"GET http://[::1]/ HTTP/1.1\r\n\r\n");
        assert_eq!(head.destination(), Ok("[::1]:80".to_string()));
        let (head, _) = parse(b"GET http://[::1]:8080/ HTTP/1.1\r\n\r\n");
        assert_eq!(head.destination(), Ok("[::1]:8080".to_string()));
    }

    #[test]
    fn missing_host() {
        let (head, _) = parse(b"GET / HTTP/1.1\r\nAccept: */*\r\n\r\n");
        assert_eq!(head.destination(), Err(WireError::MissingHost));
    }

    #[test]
    fn http2_preface() {
        assert!(is_http2_preface(b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n"));
        assert!(!is_http2_preface(b"PRI * HTTP/2.0"));
        assert!(!is_http2_preface(b"GET / HTTP/1.1\r\n\r\n"));
        assert_eq!(RequestHead::parse(b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n"), Err(WireError::UnsupportedHttp2Preface));
    }

    #[test]
    fn http2_preface_waits_for_line_end() {
        assert_eq!(RequestHead::parse(b"PR"), Ok(None));
        assert_eq!(RequestHead::parse(b"PRI * HTTP/2.0"), Ok(None));
        assert_eq!(RequestHead::parse(b"PRI * HTTP/2.0\r"), Ok(None));
        assert_eq!(RequestHead::parse(b"PRI * HTTP/2.0\r\n"), Err(WireError::UnsupportedHttp2Preface));

        let mut raw = b"PRI * ".to_vec();
        raw.resize(HEAD_MAX_LEN + 1, b'a');
        assert_eq!(RequestHead::parse(&raw), Err(WireError::HttpHeadTooLarge));
    }

    #[test]
    fn malformed() {
        assert!(matches!(RequestHead::parse(b"GET / HTTP/1.1\r\nbad header\r\n\r\n"), Err(WireError::MalformedHttp(_))));

        let mut raw = b"GET / HTTP/1.1\r\n".to_vec();
        for i in 0..=MAX_HEADERS {
            raw.extend_from_slice(format!("X-H{i}: v\r\n").as_bytes());
        }
        raw.extend_from_slice(b"\r\n");
        assert!(matches!(RequestHead::parse(&raw), Err(WireError::MalformedHttp(_))));
    }

    #[test]
    fn head_too_large() {
        let mut raw = b"GET / HTTP/1.1\r\nX-Long: ".to_vec();
        raw.resize(HEAD_MAX_LEN + 1, b'a');
        assert_eq!(RequestHead::parse(&raw), Err(WireError::HttpHeadTooLarge));
    }

    #[test]
    fn forward_rewrite() {
        let (head, _) = parse(b"POST http://example.com/submit?x=1 HTTP/1.1\r\nHost: example.com\r\nProxy-Connection: keep-alive\r\nX-Custom: Value\r\nContent-Length: 4\r\n\r\n");
        let out = head.to_forward_bytes();
        assert_eq!(
            String::from_utf8(out).expect("should be utf8"),
            "POST /submit?x=1 HTTP/1.1\r\nHost: example.com\r\nX-Custom: Value\r\nContent-Length: 4\r\nConnection: Keep-Alive\r\n\r\n"
        );
    }

    #[test]
    fn forward_rewrite_replaces_connection_in_place() {
        let (head, _) = parse(b"GET / HTTP/1.0\r\nHost: a.test\r\nConnection: close\r\nAccept: */*\r\nconnection: upgrade\r\n\r\n");
        let out = head.to_forward_bytes();
        assert_eq!(
            String::from_utf8(out).expect("should be utf8"),
            "GET / HTTP/1.1\r\nHost: a.test\r\nConnection: Keep-Alive\r\nAccept: */*\r\n\r\n"
        );
    }

    #[test]
    fn forward_rewrite_adds_host() {
        let (head, _) = parse(b"GET http://a.test HTTP/1.1\r\n\r\n");
        let out = head.to_forward_bytes();
        assert_eq!(String::from_utf8(out).expect("should be utf8"), "GET / HTTP/1.1\r\nHost: a.test\r\nConnection: Keep-Alive\r\n\r\n");
    }

    #[test]
    fn dump() {
        let (head, _) = parse(b"GET / HTTP/1.1\r\nHost: a.test\r\n\r\n");
        assert_eq!(head.to_string(), "GET / HTTP/1.1\nHost: a.test\n");
    }
}
