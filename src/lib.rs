//! lean_web - single-shot, zero-copy HTTP/1.x server for small services
//!
//! A deliberately minimal HTTP server: every connection carries exactly one
//! request, read with a single receive call into a fixed buffer and parsed
//! in place with zero copying. The parsed request view is handed to a
//! user-supplied router, which writes a raw response straight back to the
//! connection.
//!
//! # Characteristics
//!
//! - **One request per connection** - no keep-alive, no pipelining; the
//!   connection closes after the response
//! - **Zero-copy parsing** - the request view borrows from the receive
//!   buffer; the path is percent-decoded in place
//! - **Fixed admission bound** - a fixed slot table caps concurrent
//!   connections; a full table briefly backpressures the accept loop
//!   instead of rejecting
//! - **Failure isolation** - each connection is handled by its own detached
//!   task; a crashing handler cannot take down the listener or its siblings
//! - **No default deadlines** - a receive blocks until the peer sends or
//!   closes; add timeouts in front of the server if you need them
//!
//! # Examples
//!
//! Quick start:
//! ```no_run
//! use lean_web::{RouteTable, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let routes = RouteTable::new()
//!         .get("/", |_req, resp| {
//!             resp.status(StatusCode::Ok).body("Hello, world!");
//!         })
//!         .default_route(|_req, resp| {
//!             resp.status(StatusCode::NotFound).body("nothing here");
//!         });
//!
//!     if let Err(e) = Server::builder().port(8080).router(routes).build().launch().await {
//!         eprintln!("fatal: {e}");
//!         std::process::exit(1);
//!     }
//! }
//! ```
//! A bare closure is a router too:
//! ```no_run
//! use lean_web::{Request, ResponseWriter, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let echo = |req: &Request<'_>, resp: &mut ResponseWriter| {
//!         resp.status(StatusCode::Ok).body(req.payload());
//!     };
//!
//!     let _ = Server::builder().port(8080).router(echo).build().launch().await;
//! }
//! ```
//!
//! # Use Cases
//!
//! - **Internal tools and probes** - health endpoints, debug hooks
//! - **Resource-constrained environments** - one buffer per connection,
//!   fixed concurrency, predictable memory
//! - **Controlled clients** - services where you own both ends and a
//!   single-shot request/response exchange is the protocol

pub(crate) mod http {
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod server_impl;
    pub(crate) mod slots;
}
pub(crate) mod errors;
pub mod limits;
pub(crate) mod router;

pub use crate::{
    errors::{RequestError, ServerError},
    http::{
        request::Request,
        response::{ResponseWriter, StatusCode},
        types::Method,
    },
    router::{RouteTable, Router},
    server::server_impl::{Server, ServerBuilder},
};

#[doc(hidden)]
pub fn run_test<F: FnOnce(&mut ResponseWriter)>(f: F) {
    f(&mut http::response::ResponseWriter::new());
}
