use std::io;
use thiserror::Error;

/// Fatal, server-wide failures.
///
/// Both variants terminate the whole server: there is no partial-failure
/// recovery at the accept layer. Embedding binaries conventionally map an
/// `Err` from [`launch`](crate::Server::launch) to process exit code 1.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or listening on the configured port failed.
    #[error("failed to set up the listening socket: {0}")]
    Setup(#[source] io::Error),

    /// `accept` itself failed. Deliberately not retried.
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),
}

/// Failures local to a single connection's handler.
///
/// None of these can affect the accept loop, the slot table or other
/// in-flight connections; the handler abandons the request, closes the
/// connection and releases its slot.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The peer closed the connection before sending any data. Not treated
    /// as an error condition: the request is abandoned silently.
    #[error("peer closed the connection before sending data")]
    ConnectionClosed,

    /// The receive call itself failed at the OS level.
    #[error("socket receive failed: {0}")]
    Receive(#[source] io::Error),

    /// The request line is missing its method, URI or protocol token.
    /// Parsing stops before headers and the router is never invoked.
    #[error("request line is missing its method, uri or protocol token")]
    MalformedRequestLine,

    /// The request head (request line and headers) is not valid UTF-8.
    #[error("request head is not valid utf-8")]
    InvalidEncoding,
}

impl RequestError {
    /// Minimal wire response for the kinds that warrant one. Receive-level
    /// failures are abandoned without writing anything back.
    pub(crate) const fn as_http(&self) -> &'static [u8] {
        match self {
            Self::MalformedRequestLine | Self::InvalidEncoding => {
                b"HTTP/1.1 400 Bad Request\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
            }
            Self::ConnectionClosed | Self::Receive(_) => b"",
        }
    }
}
