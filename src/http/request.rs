use crate::{
    errors::RequestError,
    http::types::{self, Method},
    limits::{ReqLimits, MAX_HEADERS},
};
use memchr::{memchr, memchr2};
use std::str;
use tokio::{io::AsyncReadExt, net::TcpStream};

/// Parsed view of one HTTP request.
///
/// All fields borrow from the connection's receive buffer: nothing is copied
/// out of it, and the view cannot outlive the buffer it was parsed from.
///
/// # Input data requirements
///
/// The request head (request line and headers) must be `UTF-8`; the parser
/// rejects anything else so header names and values can be handled as `&str`.
/// The payload is raw bytes and carries no such requirement. The decoded path
/// is also exposed as raw bytes, because percent-decoding may produce
/// arbitrary byte values.
///
/// # Wire format consumed
///
/// ```text
/// METHOD SP URI SP VERSION CRLF
/// (NAME ":" SP VALUE CRLF)*
/// CRLF
/// [body]
/// ```
///
/// Tokens of the request line are split on spaces, tabs and CRLF. The query
/// string is everything after the first raw `?` in the URI and is kept as
/// received; the path portion is percent/plus-decoded in place.
///
/// # Documented limitations
///
/// - At most [`MAX_HEADERS`] headers are parsed; further header lines are
///   silently left unparsed and become the payload candidate.
/// - A request that does not fit the receive buffer, or spans TCP segments
///   beyond the first receive call, is truncated. Truncation is not an
///   error: the router receives a best-effort partial view and must apply
///   any stronger validation it needs itself.
#[derive(Debug)]
pub struct Request<'b> {
    method: Method,
    path: &'b [u8],
    query: &'b str,
    protocol: &'b str,

    headers: [(&'b str, &'b str); MAX_HEADERS],
    header_count: usize,

    payload: &'b [u8],
}

// Public API
impl<'b> Request<'b> {
    /// Returns the request method code.
    #[inline(always)]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Returns the percent/plus-decoded request path, without the query
    /// string.
    ///
    /// Decoding happens in place inside the receive buffer and may produce
    /// arbitrary bytes, so the path is exposed as a byte slice.
    #[inline(always)]
    pub const fn path(&self) -> &[u8] {
        self.path
    }

    /// Returns the decoded path as a string, or `None` when decoding
    /// produced bytes that are not valid UTF-8.
    #[inline(always)]
    pub fn path_str(&self) -> Option<&str> {
        str::from_utf8(self.path).ok()
    }

    /// Returns the raw query string: everything after the first `?` of the
    /// request URI, or the empty string when there was none. Never absent,
    /// so callers can always treat it as a string.
    #[inline(always)]
    pub const fn query(&self) -> &str {
        self.query
    }

    /// Returns the protocol token of the request line (e.g. `HTTP/1.1`).
    #[inline(always)]
    pub const fn protocol(&self) -> &str {
        self.protocol
    }

    /// Returns the first header value whose name matches `name` exactly.
    ///
    /// The match is case-sensitive and insertion order is preserved; an
    /// absent header is `None`, not an error.
    #[inline(always)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers[..self.header_count]
            .iter()
            .find(|(header_name, _)| *header_name == name)
            .map(|&(_, value)| value)
    }

    /// Returns all parsed headers in arrival order.
    #[inline(always)]
    pub fn headers(&self) -> &[(&'b str, &'b str)] {
        &self.headers[..self.header_count]
    }

    /// Returns the request payload.
    ///
    /// Its length is the lenient `Content-Length` value when that header is
    /// present, otherwise the bytes remaining after the header block; always
    /// clamped to what was actually received.
    #[inline(always)]
    pub const fn payload(&self) -> &[u8] {
        self.payload
    }

    /// Returns the payload length in bytes.
    #[inline(always)]
    pub const fn payload_size(&self) -> usize {
        self.payload.len()
    }
}

type Span = (usize, usize);

impl<'b> Request<'b> {
    /// Parses one request in place. The buffer is only mutated inside the
    /// path region (percent-decoding compacts it); every returned slice
    /// borrows from `data`.
    pub(crate) fn parse(data: &'b mut [u8]) -> Result<Self, RequestError> {
        let (method_span, uri_span, protocol_span) = request_line(data)?;
        let method = Method::from_token(&data[method_span.0..method_span.1]);

        // The query separator is the raw '?', found before any decoding, so
        // an encoded `%3F` in the path never splits the URI.
        let (path_span, query_span) = match memchr(b'?', &data[uri_span.0..uri_span.1]) {
            Some(pos) => {
                let split = uri_span.0 + pos;
                ((uri_span.0, split), (split + 1, uri_span.1))
            }
            None => (uri_span, (uri_span.1, uri_span.1)),
        };

        let (header_spans, header_count, payload_start) = scan_headers(data, protocol_span.1);
        let payload_start = payload_start.min(data.len());

        simdutf8::basic::from_utf8(&data[..payload_start])
            .map_err(|_| RequestError::InvalidEncoding)?;

        let path_len = unescape_in_place(&mut data[path_span.0..path_span.1]);

        let data = &*data;
        // SAFETY: everything before `payload_start` was validated as UTF-8
        // above, these spans lie inside that region, and every span boundary
        // sits on an ASCII delimiter, so each slice is valid UTF-8 on its
        // own. The decoded path is exposed as bytes instead and is not
        // covered by this guarantee.
        let str_at = |(start, end): Span| unsafe { str::from_utf8_unchecked(&data[start..end]) };

        let mut headers = [("", ""); MAX_HEADERS];
        for (header, &(name, value)) in headers.iter_mut().zip(&header_spans[..header_count]) {
            *header = (str_at(name), str_at(value));
        }

        let content_length = headers[..header_count]
            .iter()
            .find(|(name, _)| *name == "Content-Length")
            .and_then(|&(_, value)| types::lenient_length(value));

        let remaining = data.len() - payload_start;
        let payload_len = content_length.unwrap_or(remaining).min(remaining);

        Ok(Request {
            method,
            path: &data[path_span.0..path_span.0 + path_len],
            query: str_at(query_span),
            protocol: str_at(protocol_span),
            headers,
            header_count,
            payload: &data[payload_start..payload_start + payload_len],
        })
    }
}

/// The three request-line tokens; any of them missing fails the parse before
/// header parsing is attempted.
fn request_line(data: &[u8]) -> Result<(Span, Span, Span), RequestError> {
    let method = token_after(data, 0).ok_or(RequestError::MalformedRequestLine)?;
    let uri = token_after(data, method.1).ok_or(RequestError::MalformedRequestLine)?;
    let protocol = token_after(data, uri.1).ok_or(RequestError::MalformedRequestLine)?;

    Ok((method, uri, protocol))
}

fn token_after(data: &[u8], from: usize) -> Option<Span> {
    let start = from + data.get(from..)?.iter().position(|b| !is_delimiter(*b))?;
    let end = match data[start..].iter().position(|b| is_delimiter(*b)) {
        Some(pos) => start + pos,
        None => data.len(),
    };

    Some((start, end))
}

const fn is_delimiter(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n')
}

/// Scans header lines after the request line. Returns the recorded
/// (name, value) spans, their count and the payload start offset.
///
/// Parsing stops at the blank line, at the [`MAX_HEADERS`] limit, or at the
/// first line that has no `:` or no terminator. None of these stops is
/// fatal: whatever remains unparsed is the payload candidate.
fn scan_headers(data: &[u8], after_protocol: usize) -> ([(Span, Span); MAX_HEADERS], usize, usize) {
    let mut spans = [((0, 0), (0, 0)); MAX_HEADERS];
    let mut count = 0;

    let mut cursor = match memchr(b'\n', &data[after_protocol.min(data.len())..]) {
        Some(pos) => after_protocol + pos + 1,
        None => return (spans, 0, data.len()),
    };

    let payload_start = loop {
        let rest = &data[cursor..];
        if rest.is_empty() {
            break data.len();
        }
        // Blank line ends the header block; the payload follows it. Checked
        // before the limit so a full header list still consumes its blank
        // line.
        if rest[0] == b'\n' {
            break cursor + 1;
        }
        if rest.starts_with(b"\r\n") {
            break cursor + 2;
        }
        if count == MAX_HEADERS {
            break cursor;
        }

        let Some(newline) = memchr(b'\n', rest) else {
            // Unterminated line: the head was truncated, stop here.
            break cursor;
        };
        let line_end = if rest[newline - 1] == b'\r' { newline - 1 } else { newline };
        let line = &rest[..line_end];

        let Some(colon) = memchr(b':', line) else {
            break cursor;
        };

        let mut name_end = colon;
        while name_end > 0 && matches!(line[name_end - 1], b' ' | b'\t') {
            name_end -= 1;
        }
        if name_end == 0 {
            break cursor;
        }

        // A single run of leading spaces is trimmed from the value.
        let mut value_start = colon + 1;
        while value_start < line_end && line[value_start] == b' ' {
            value_start += 1;
        }

        spans[count] = (
            (cursor, cursor + name_end),
            (cursor + value_start, cursor + line_end),
        );
        count += 1;
        cursor += newline + 1;
    };

    (spans, count, payload_start)
}

/// Decodes `%XX` and `+` escapes in place and returns the decoded length.
///
/// Bytes before the first escape pass through untouched. `+` becomes a
/// space; a valid `%XX` (two hex digits, `%00` included) becomes the
/// corresponding byte and consumes three source bytes. An invalid escape
/// (non-hex digits, or fewer than two remaining bytes) keeps a literal `%`
/// and consumes nothing after it.
fn unescape_in_place(path: &mut [u8]) -> usize {
    let Some(first) = memchr2(b'%', b'+', path) else {
        return path.len();
    };

    let mut src = first;
    let mut dst = first;
    while src < path.len() {
        let byte = path[src];
        if byte == b'%' {
            match hex_pair(path.get(src + 1..src + 3)) {
                Some(decoded) => {
                    path[dst] = decoded;
                    src += 3;
                }
                None => {
                    path[dst] = b'%';
                    src += 1;
                }
            }
        } else if byte == b'+' {
            path[dst] = b' ';
            src += 1;
        } else {
            path[dst] = byte;
            src += 1;
        }
        dst += 1;
    }

    dst
}

fn hex_pair(pair: Option<&[u8]>) -> Option<u8> {
    match pair {
        Some(&[hi, lo]) => Some((hex_value(hi)? << 4) | hex_value(lo)?),
        _ => None,
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

//

/// Fixed-capacity receive buffer, one per connection.
///
/// Filled by exactly one receive call; owned exclusively by the connection's
/// handler task and never shared. The parsed [`Request`] borrows from it.
#[derive(Debug)]
pub(crate) struct RecvBuffer {
    len: usize,
    truncated: bool,
    buffer: Box<[u8]>,
}

impl RecvBuffer {
    #[inline(always)]
    pub(crate) fn new(limits: &ReqLimits) -> Self {
        Self {
            len: 0,
            truncated: false,
            buffer: vec![0; limits.buffer_size].into_boxed_slice(),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_bytes<V: AsRef<[u8]>>(limits: &ReqLimits, value: V) -> Self {
        let mut buffer = vec![0; limits.buffer_size];
        let value = value.as_ref();
        buffer[..value.len()].copy_from_slice(value);

        Self {
            len: value.len(),
            truncated: false,
            buffer: buffer.into_boxed_slice(),
        }
    }

    /// One receive call, no retry loop and no deadline: absent data this
    /// blocks until the peer sends or closes.
    ///
    /// A read that fills the whole buffer is treated as truncated and capped
    /// one byte short of capacity, so scanning can never run past the
    /// received bytes.
    pub(crate) async fn recv(&mut self, stream: &mut TcpStream) -> Result<usize, RequestError> {
        let n = stream
            .read(&mut self.buffer)
            .await
            .map_err(RequestError::Receive)?;

        if n == 0 {
            return Err(RequestError::ConnectionClosed);
        }

        self.truncated = n == self.buffer.len();
        self.len = if self.truncated { n - 1 } else { n };
        Ok(self.len)
    }

    #[inline(always)]
    pub(crate) const fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub(crate) fn parse(&mut self) -> Result<Request<'_>, RequestError> {
        Request::parse(&mut self.buffer[..self.len])
    }
}

#[cfg(test)]
mod parse_tests {
    use super::*;

    fn buffer<V: AsRef<[u8]>>(value: V) -> RecvBuffer {
        RecvBuffer::from_bytes(&ReqLimits::default(), value)
    }

    #[test]
    fn request_line_tokens() {
        let mut b = buffer("GET /a?x=1 HTTP/1.1\r\nHost: h\r\n\r\n");
        let req = b.parse().unwrap();

        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.path(), b"/a");
        assert_eq!(req.query(), "x=1");
        assert_eq!(req.protocol(), "HTTP/1.1");
        assert_eq!(req.headers(), &[("Host", "h")]);
        assert_eq!(req.payload_size(), 0);
    }

    #[test]
    fn missing_tokens_are_malformed() {
        let cases = ["", "\r\n\r\n", "GET", "GET ", "GET /x", "   \t  \r\n"];

        for input in cases {
            let mut b = buffer(input);
            assert!(
                matches!(b.parse(), Err(RequestError::MalformedRequestLine)),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn unknown_method_is_not_an_error() {
        let mut b = buffer("QWERTY / HTTP/1.1\r\n\r\n");
        let req = b.parse().unwrap();

        assert_eq!(req.method(), Method::None);
        assert_eq!(req.path(), b"/");
    }

    #[test]
    fn path_decoding() {
        #[rustfmt::skip]
        let cases: [(&str, &[u8]); 8] = [
            ("/a+b%20c",   b"/a b c"),
            ("/plain",     b"/plain"),
            ("/%41%42",    b"/AB"),
            ("/a%2Fb",     b"/a/b"),
            // Invalid escapes keep a literal '%' and consume nothing.
            ("/a%zzb",     b"/a%zzb"),
            ("/a%4",       b"/a%4"),
            ("/a%",        b"/a%"),
            // A decoded NUL is just a byte; offsets are explicit.
            ("/a%00b",     b"/a\0b"),
        ];

        for (path, expected) in cases {
            let mut b = buffer(format!("GET {path} HTTP/1.1\r\n\r\n"));
            let req = b.parse().unwrap();
            assert_eq!(req.path(), expected, "path {path:?}");
        }
    }

    #[test]
    fn query_splits_on_raw_question_mark() {
        // The split happens before decoding: an encoded '?' stays in the
        // path and never starts the query string.
        let mut b = buffer("GET /a%3Fb HTTP/1.1\r\n\r\n");
        let req = b.parse().unwrap();
        assert_eq!(req.path(), b"/a?b");
        assert_eq!(req.query(), "");

        let mut b = buffer("GET /a?x=1&y=2 HTTP/1.1\r\n\r\n");
        let req = b.parse().unwrap();
        assert_eq!(req.path(), b"/a");
        assert_eq!(req.query(), "x=1&y=2");

        // The query is kept raw, not decoded.
        let mut b = buffer("GET /a?x=%20+ HTTP/1.1\r\n\r\n");
        let req = b.parse().unwrap();
        assert_eq!(req.query(), "x=%20+");

        let mut b = buffer("GET /a? HTTP/1.1\r\n\r\n");
        let req = b.parse().unwrap();
        assert_eq!(req.path(), b"/a");
        assert_eq!(req.query(), "");
    }

    #[test]
    fn headers_in_order_case_sensitive() {
        let mut b = buffer(
            "GET / HTTP/1.1\r\nHost: h\r\nAccept: */*\r\nhost: other\r\nX-Empty: \r\n\r\n",
        );
        let req = b.parse().unwrap();

        assert_eq!(
            req.headers(),
            &[
                ("Host", "h"),
                ("Accept", "*/*"),
                ("host", "other"),
                ("X-Empty", ""),
            ]
        );

        // Exact-match lookup, first match wins.
        assert_eq!(req.header("Host"), Some("h"));
        assert_eq!(req.header("host"), Some("other"));
        assert_eq!(req.header("HOST"), None);
        assert_eq!(req.header("Missing"), None);
    }

    #[test]
    fn header_value_leading_spaces_trimmed() {
        let mut b = buffer("GET / HTTP/1.1\r\nName:   padded  \r\n\r\n");
        let req = b.parse().unwrap();

        // One leading run of spaces goes, trailing spaces stay.
        assert_eq!(req.header("Name"), Some("padded  "));
    }

    #[test]
    fn header_limit_stops_silently() {
        let mut head = String::from("GET / HTTP/1.1\r\n");
        for i in 0..20 {
            head.push_str(&format!("X-Header-{i}: {i}\r\n"));
        }
        head.push_str("\r\n");

        let mut b = buffer(&head);
        let req = b.parse().unwrap();

        assert_eq!(req.headers().len(), MAX_HEADERS);
        assert_eq!(req.header("X-Header-15"), Some("15"));
        assert_eq!(req.header("X-Header-16"), None);
    }

    #[test]
    fn exactly_full_header_list_keeps_payload() {
        let mut head = String::from("POST / HTTP/1.1\r\nContent-Length: 4\r\n");
        for i in 0..MAX_HEADERS - 1 {
            head.push_str(&format!("X-H-{i}: {i}\r\n"));
        }
        head.push_str("\r\nbody");

        let mut b = buffer(&head);
        let req = b.parse().unwrap();

        assert_eq!(req.headers().len(), MAX_HEADERS);
        assert_eq!(req.payload(), b"body");
    }

    #[test]
    fn payload_with_content_length() {
        let mut b = buffer("POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");
        let req = b.parse().unwrap();

        assert_eq!(req.method(), Method::Post);
        assert_eq!(req.payload(), b"hello");
        assert_eq!(req.payload_size(), 5);
    }

    #[test]
    fn payload_length_rules() {
        // No Content-Length: whatever was received after the blank line.
        let mut b = buffer("POST / HTTP/1.1\r\n\r\nimplicit");
        assert_eq!(b.parse().unwrap().payload(), b"implicit");

        // Declared shorter than received: the declaration wins.
        let mut b = buffer("POST / HTTP/1.1\r\nContent-Length: 3\r\n\r\nhello");
        assert_eq!(b.parse().unwrap().payload(), b"hel");

        // Declared longer than received: clamped to the buffer, a truncated
        // request rather than an out-of-bounds view.
        let mut b = buffer("POST / HTTP/1.1\r\nContent-Length: 9999\r\n\r\nhi");
        assert_eq!(b.parse().unwrap().payload(), b"hi");

        // Non-numeric Content-Length is treated as absent.
        let mut b = buffer("POST / HTTP/1.1\r\nContent-Length: abc\r\n\r\nrest");
        assert_eq!(b.parse().unwrap().payload(), b"rest");

        // The lookup is case-sensitive: a lowercase header is "absent".
        let mut b = buffer("POST / HTTP/1.1\r\ncontent-length: 2\r\n\r\nrest");
        assert_eq!(b.parse().unwrap().payload(), b"rest");
    }

    #[test]
    fn truncated_head_is_best_effort() {
        // Header line without terminator: parsing stops, no crash, and the
        // unparsed tail becomes the payload candidate.
        let mut b = buffer("GET / HTTP/1.1\r\nHost: h\r\nBroken: no-terminator");
        let req = b.parse().unwrap();

        assert_eq!(req.headers(), &[("Host", "h")]);
        assert_eq!(req.payload(), b"Broken: no-terminator");

        // Line without ':' stops header parsing the same way.
        let mut b = buffer("GET / HTTP/1.1\r\nHost: h\r\njunk line\r\n\r\n");
        let req = b.parse().unwrap();
        assert_eq!(req.headers(), &[("Host", "h")]);
    }

    #[test]
    fn invalid_utf8_head_is_rejected() {
        let mut b = buffer(b"GET /\xff HTTP/1.1\r\n\r\n".to_vec());
        assert!(matches!(b.parse(), Err(RequestError::InvalidEncoding)));

        // A payload is raw bytes and may be anything.
        let mut b = buffer(b"POST / HTTP/1.1\r\nContent-Length: 2\r\n\r\n\xff\xfe".to_vec());
        assert_eq!(b.parse().unwrap().payload(), b"\xff\xfe");
    }
}

#[cfg(test)]
mod recv_tests {
    use super::*;
    use std::time::Duration;
    use tokio::{
        io::AsyncWriteExt,
        net::{TcpListener, TcpStream},
        time::timeout,
    };

    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn recv_reads_once() {
        let (mut client, mut server) = socket_pair().await;
        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();

        let mut buffer = RecvBuffer::new(&ReqLimits::default());
        let n = buffer.recv(&mut server).await.unwrap();

        assert_eq!(n, 18);
        assert!(!buffer.is_truncated());
        assert_eq!(buffer.parse().unwrap().method(), Method::Get);
    }

    #[tokio::test]
    async fn peer_close_is_connection_closed() {
        let (client, mut server) = socket_pair().await;
        drop(client);

        let mut buffer = RecvBuffer::new(&ReqLimits::default());
        assert!(matches!(
            buffer.recv(&mut server).await,
            Err(RequestError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn recv_has_no_default_deadline() {
        let (_client, mut server) = socket_pair().await;

        let mut buffer = RecvBuffer::new(&ReqLimits::default());
        // No data and no deadline: the receive must still be pending when
        // the test timeout fires.
        let waited = timeout(Duration::from_millis(100), buffer.recv(&mut server)).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn full_buffer_is_truncated() {
        let limits = ReqLimits {
            buffer_size: 32,
            ..ReqLimits::default()
        };

        let (mut client, mut server) = socket_pair().await;
        client.write_all(&[b'a'; 64]).await.unwrap();

        let mut buffer = RecvBuffer::new(&limits);
        let n = buffer.recv(&mut server).await.unwrap();

        assert_eq!(n, 31);
        assert!(buffer.is_truncated());
    }
}
