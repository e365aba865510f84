//! Route dispatch over the parsed request view.

use crate::http::{request::Request, response::ResponseWriter, types::Method};

/// User-supplied dispatch, invoked exactly once per successfully parsed
/// request.
///
/// The implementation inspects the [`Request`] view and writes a raw HTTP
/// response into the [`ResponseWriter`]; every byte written before it
/// returns reaches the client verbatim, then the connection is closed.
/// Malformed requests never reach the router.
///
/// Any `Fn(&Request, &mut ResponseWriter)` closure is a router; use a
/// [`RouteTable`] when you want ordered method/path dispatch.
pub trait Router: Send + Sync + 'static {
    fn route(&self, request: &Request<'_>, response: &mut ResponseWriter);
}

impl<F> Router for F
where
    F: Fn(&Request<'_>, &mut ResponseWriter) + Send + Sync + 'static,
{
    #[inline(always)]
    fn route(&self, request: &Request<'_>, response: &mut ResponseWriter) {
        self(request, response);
    }
}

type RouteFn = Box<dyn Fn(&Request<'_>, &mut ResponseWriter) + Send + Sync>;

const UNROUTED: &[u8] =
    b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";

/// Ordered `(method, exact path)` dispatch table.
///
/// Entries are evaluated top to bottom against the request's decoded path;
/// the first entry whose method and path both match wins. There are no path
/// parameters and no wildcards. A request nothing matches falls to the
/// [`default_route`](RouteTable::default_route) entry when one is installed,
/// otherwise a canned 500-class response is written.
///
/// # Examples
///
/// ```
/// use lean_web::{Method, RouteTable, StatusCode};
///
/// let routes = RouteTable::new()
///     .get("/health", |_req, resp| {
///         resp.status(StatusCode::Ok).body("ok");
///     })
///     .post("/items", |req, resp| {
///         resp.status(StatusCode::Created).body(req.payload());
///     })
///     .on(Method::Delete, "/items", |_req, resp| {
///         resp.status(StatusCode::Ok).body("gone");
///     })
///     .default_route(|_req, resp| {
///         resp.status(StatusCode::NotFound).body("no such route");
///     });
/// # let _ = routes;
/// ```
pub struct RouteTable {
    routes: Vec<Route>,
    default: Option<RouteFn>,
}

struct Route {
    method: Method,
    path: String,
    handler: RouteFn,
}

impl RouteTable {
    #[inline]
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            default: None,
        }
    }

    /// Appends an entry matching `method` and the exact `path`.
    ///
    /// The pattern is compared against the percent-decoded request path,
    /// byte for byte.
    #[inline]
    pub fn on<H>(mut self, method: Method, path: impl Into<String>, handler: H) -> Self
    where
        H: Fn(&Request<'_>, &mut ResponseWriter) + Send + Sync + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.into(),
            handler: Box::new(handler),
        });
        self
    }

    /// Appends a GET entry.
    #[inline]
    pub fn get<H>(self, path: impl Into<String>, handler: H) -> Self
    where
        H: Fn(&Request<'_>, &mut ResponseWriter) + Send + Sync + 'static,
    {
        self.on(Method::Get, path, handler)
    }

    /// Appends a POST entry.
    #[inline]
    pub fn post<H>(self, path: impl Into<String>, handler: H) -> Self
    where
        H: Fn(&Request<'_>, &mut ResponseWriter) + Send + Sync + 'static,
    {
        self.on(Method::Post, path, handler)
    }

    /// Installs the entry used when nothing above matched.
    #[inline]
    pub fn default_route<H>(mut self, handler: H) -> Self
    where
        H: Fn(&Request<'_>, &mut ResponseWriter) + Send + Sync + 'static,
    {
        self.default = Some(Box::new(handler));
        self
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Router for RouteTable {
    fn route(&self, request: &Request<'_>, response: &mut ResponseWriter) {
        for route in &self.routes {
            if route.method == request.method() && route.path.as_bytes() == request.path() {
                return (route.handler)(request, response);
            }
        }

        match &self.default {
            Some(handler) => handler(request, response),
            None => {
                response.write_bytes(UNROUTED);
            }
        }
    }
}
