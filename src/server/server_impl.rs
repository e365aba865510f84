use crate::{
    errors::ServerError,
    limits::{ReqLimits, ServerLimits},
    router::Router,
    server::{
        connection,
        slots::{SlotGuard, SlotTable},
    },
};
use socket2::{Domain, Protocol, Socket, Type};
use std::{io, net::SocketAddr, os::fd::AsRawFd, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

/// A single-shot HTTP server: one request per connection, one handler task
/// per connection, a fixed slot table bounding how many run at once.
///
/// # Examples
///
/// ```no_run
/// use lean_web::{RouteTable, Server, StatusCode};
///
/// #[tokio::main]
/// async fn main() {
///     let routes = RouteTable::new().get("/", |_req, resp| {
///         resp.status(StatusCode::Ok).body("Hello world!");
///     });
///
///     if let Err(e) = Server::builder()
///         .port(8080)
///         .router(routes)
///         .build()
///         .launch()
///         .await
///     {
///         eprintln!("fatal: {e}");
///         std::process::exit(1);
///     }
/// }
/// ```
pub struct Server<R: Router> {
    listener: Option<TcpListener>,
    port: Option<u16>,
    router: Arc<R>,
    server_limits: ServerLimits,
    req_limits: ReqLimits,
}

impl<R: Router> Server<R> {
    /// Creates a new builder for configuring the server instance.
    #[inline]
    pub fn builder() -> ServerBuilder<R> {
        ServerBuilder {
            listener: None,
            port: None,
            router: None,
            server_limits: None,
            req_limits: None,
        }
    }

    /// Runs the accept loop until a fatal error.
    ///
    /// Binds the configured port first when no listener was supplied
    /// (IPv4, all interfaces, `SO_REUSEADDR`, maximum backlog). Bind and
    /// accept failures are fatal: there is no partial-failure recovery at
    /// this layer, and the caller is expected to terminate.
    ///
    /// For each accepted connection the loop claims a slot and spawns a
    /// detached handler task, then immediately returns to accepting: it
    /// never waits on a handler and keeps no join bookkeeping for finished
    /// ones. A handler panic is contained to its own task.
    pub async fn launch(self) -> Result<(), ServerError> {
        let listener = match self.listener {
            Some(listener) => listener,
            // `build()` guarantees a port when no listener was given.
            None => bind(self.port.unwrap_or_default())?,
        };

        let slots = Arc::new(SlotTable::new(
            self.server_limits.slot_count,
            self.server_limits.acquire_retry,
        ));
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, slots = slots.len(), "listening");
        }
        let mut cursor = 0;

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(cause = %e, "accept failed");
                    return Err(ServerError::Accept(e));
                }
            };

            cursor = slots.acquire(cursor, stream.as_raw_fd()).await;
            let guard = SlotGuard::new(slots.clone(), cursor);

            tokio::spawn(connection::handle(
                stream,
                peer,
                self.router.clone(),
                self.req_limits.clone(),
                guard,
            ));
        }
    }
}

fn bind(port: u16) -> Result<TcpListener, ServerError> {
    setup_socket(port).map_err(ServerError::Setup)
}

fn setup_socket(port: u16) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    socket.bind(&addr.into())?;
    // The kernel clamps the backlog to the system maximum.
    socket.listen(i32::MAX)?;
    socket.set_nonblocking(true)?;

    TcpListener::from_std(socket.into())
}

//

/// Builder for configuring and creating [`Server`] instances.
///
/// Either [`port`](Self::port) or [`listener`](Self::listener) must be set
/// (a supplied listener wins when both are), and [`router`](Self::router) is
/// required.
pub struct ServerBuilder<R: Router> {
    listener: Option<TcpListener>,
    port: Option<u16>,
    router: Option<Arc<R>>,
    server_limits: Option<ServerLimits>,
    req_limits: Option<ReqLimits>,
}

impl<R: Router> ServerBuilder<R> {
    /// Sets the port to bind: IPv4, all local interfaces, `SO_REUSEADDR`,
    /// maximum backlog.
    #[inline(always)]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Supplies an already-bound listener instead of a port. Useful for
    /// ephemeral ports in tests and for custom socket setup.
    #[inline(always)]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the router invoked once per successfully parsed request.
    ///
    /// **This is a required component.**
    #[inline(always)]
    pub fn router(mut self, router: R) -> Self {
        self.router = Some(Arc::new(router));
        self
    }

    /// Configures connection admission limits.
    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    /// Configures request ingestion limits.
    #[inline(always)]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.req_limits = Some(limits);
        self
    }

    /// Finalizes the builder and constructs a [`Server`] instance.
    ///
    /// # Panics
    ///
    /// Panics when the `router` method was not called, or when neither
    /// `port` nor `listener` was set.
    #[inline]
    #[track_caller]
    pub fn build(self) -> Server<R> {
        assert!(
            self.listener.is_some() || self.port.is_some(),
            "Either the `port` or the `listener` method must be called to create"
        );

        Server {
            listener: self.listener,
            port: self.port,
            router: self
                .router
                .expect("The `router` method must be called to create"),
            server_limits: self.server_limits.unwrap_or_default(),
            req_limits: self.req_limits.unwrap_or_default(),
        }
    }
}
