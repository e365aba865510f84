//! Server configuration limits
//!
//! # Fixed-Footprint Defaults
//!
//! Default limits are intentionally conservative and fully pre-allocated:
//! each active connection owns exactly one receive buffer, and the number of
//! concurrently admitted connections is bounded by a fixed slot table shared
//! between the accept loop and every handler task.
//!
//! # Examples
//!
//! ```no_run
//! use lean_web::{limits::{ReqLimits, ServerLimits}, Server, StatusCode};
//! use lean_web::{Request, ResponseWriter};
//!
//! #[tokio::main]
//! async fn main() {
//!     let result = Server::builder()
//!         .port(8080)
//!         .router(|_: &Request<'_>, resp: &mut ResponseWriter| {
//!             resp.status(StatusCode::Ok).body("ok");
//!         })
//!         .server_limits(ServerLimits {
//!             slot_count: 4096, // Higher concurrency
//!             ..ServerLimits::default()
//!         })
//!         .request_limits(ReqLimits {
//!             buffer_size: 16 * 1024, // Smaller per-connection footprint
//!             ..ReqLimits::default()
//!         })
//!         .build()
//!         .launch()
//!         .await;
//!
//!     if let Err(e) = result {
//!         eprintln!("fatal: {e}");
//!         std::process::exit(1);
//!     }
//! }
//! ```

use std::time::Duration;

/// Fixed upper bound on parsed headers per request (the ordered header list
/// is a fixed array, sized once for every connection).
///
/// A request carrying more header lines is not rejected: parsing silently
/// stops at this count and the rest of the head is treated as the payload
/// candidate. Typical browsers send 10-12 headers.
pub const MAX_HEADERS: usize = 16;

/// Controls connection admission and backpressure.
///
/// # Connection management
/// ```text
/// [------------]       [---------------]   free    [-----------------]
/// [ Tcp accept ] ====> | Slot available? | ======> [ Spawn handler    ]
/// [------------]       [---------------]           [ task (detached)  ]
///                             ||  full              [-----------------]
///                             \/
///                       [ Sleep `acquire_retry`, rescan ]
/// ```
///
/// The slot table is the only admission control the server has: when every
/// slot is taken, the accept loop sleeps briefly and rescans until a handler
/// releases its slot. Nothing is rejected, connections just queue in the
/// kernel backlog while the table is full.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Number of connection slots (default: `1024`).
    ///
    /// Rounded up to the next power of two so the claim scan can wrap with a
    /// plain index mask. One slot is held per in-flight connection, from
    /// accept until the handler finishes.
    pub slot_count: usize,

    /// How long the accept loop sleeps before rescanning a full slot table
    /// (default: `250µs`).
    ///
    /// This is deliberate admission backpressure, not an error path, and it
    /// is the only place the server sheds load.
    pub acquire_retry: Duration,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            slot_count: 1024,
            acquire_retry: Duration::from_micros(250),

            _priv: (),
        }
    }
}

/// HTTP request ingestion limits.
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Receive buffer capacity in bytes (default: `64 KiB`).
    ///
    /// The entire request must arrive in one receive call: there is no
    /// partial-read loop, and a request larger than the buffer (or split
    /// across TCP segments beyond the first receive) is truncated. Truncation
    /// is not fatal; the router gets a best-effort partial request.
    pub buffer_size: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024,

            _priv: (),
        }
    }
}
