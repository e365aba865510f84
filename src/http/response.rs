//! Raw HTTP response sink handed to the router.

use std::{fmt, io};

/// Byte sink for one response.
///
/// The router writes a complete raw HTTP response into it (status line,
/// headers, blank line, body); once the router returns, the buffered bytes
/// are sent to the client verbatim, the write side is half-closed and the
/// connection is torn down. There is no state machine and no validation:
/// what you write is what goes on the wire.
///
/// The writer implements [`io::Write`] and [`fmt::Write`], so `write!` works
/// directly; the `status`/`header`/`end_headers`/`body` methods are thin
/// conveniences over the same buffer.
///
/// # Examples
/// ```
/// # lean_web::run_test(|resp| {
/// use lean_web::StatusCode;
///
/// resp.status(StatusCode::Ok)
///     .header("Content-Type", "text/plain")
///     .body("Hello");
/// # });
/// ```
/// Raw writing:
/// ```
/// # lean_web::run_test(|resp| {
/// use std::fmt::Write;
///
/// let name = "world";
/// let _ = write!(resp, "HTTP/1.1 200 OK\r\n\r\nhello {name}");
/// # });
/// ```
#[derive(Debug)]
pub struct ResponseWriter {
    buffer: Vec<u8>,
}

impl ResponseWriter {
    #[inline(always)]
    pub(crate) fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(1024),
        }
    }

    #[inline(always)]
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Appends raw bytes to the response.
    #[inline(always)]
    pub fn write_bytes(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.buffer.extend_from_slice(bytes.as_ref());
        self
    }

    /// Writes the status line for `status`.
    #[inline]
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.buffer.extend_from_slice(status.status_line());
        self
    }

    /// Writes one `name: value` header line.
    #[inline]
    pub fn header(&mut self, name: &str, value: impl fmt::Display) -> &mut Self {
        use io::Write as _;

        let _ = write!(self.buffer, "{name}: {value}\r\n");
        self
    }

    /// Ends the header block with a blank line.
    #[inline]
    pub fn end_headers(&mut self) -> &mut Self {
        self.buffer.extend_from_slice(b"\r\n");
        self
    }

    /// Writes a `Content-Length` header, the blank line and `body`.
    ///
    /// The connection closes after every response, so `Content-Length` is a
    /// courtesy to clients rather than a framing requirement; handlers that
    /// write the body by hand may omit it.
    #[inline]
    pub fn body(&mut self, body: impl AsRef<[u8]>) {
        let body = body.as_ref();
        self.header("Content-Length", body.len());
        self.end_headers();
        self.buffer.extend_from_slice(body);
    }
}

impl io::Write for ResponseWriter {
    #[inline(always)]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    #[inline(always)]
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Write for ResponseWriter {
    #[inline(always)]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buffer.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

// STATUS_CODE

/// Status codes with canned status lines.
///
/// Covers the responses the server itself may need plus the handful small
/// services typically return; anything else can be written raw through
/// [`ResponseWriter::write_bytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 400 Bad Request
    BadRequest,
    /// 404 Not Found
    NotFound,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    #[inline]
    pub(crate) const fn status_line(self) -> &'static [u8] {
        match self {
            Self::Ok => b"HTTP/1.1 200 OK\r\n",
            Self::Created => b"HTTP/1.1 201 Created\r\n",
            Self::BadRequest => b"HTTP/1.1 400 Bad Request\r\n",
            Self::NotFound => b"HTTP/1.1 404 Not Found\r\n",
            Self::InternalServerError => b"HTTP/1.1 500 Internal Server Error\r\n",
        }
    }
}

#[cfg(test)]
mod writer_tests {
    use super::*;

    #[test]
    fn builder_shape() {
        let mut resp = ResponseWriter::new();
        resp.status(StatusCode::Ok)
            .header("Content-Type", "text/plain")
            .body("hi");

        assert_eq!(
            resp.as_bytes(),
            b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nhi"
        );
    }

    #[test]
    fn raw_bytes_verbatim() {
        let mut resp = ResponseWriter::new();
        resp.write_bytes(b"HTTP/1.1 404 Not Found\r\n")
            .write_bytes("\r\nmissing");

        assert_eq!(resp.as_bytes(), b"HTTP/1.1 404 Not Found\r\n\r\nmissing");
    }

    #[test]
    fn display_header_values() {
        let mut resp = ResponseWriter::new();
        resp.header("X-Count", 42).header("X-Flag", true);

        assert_eq!(resp.as_bytes(), b"X-Count: 42\r\nX-Flag: true\r\n");
    }
}
