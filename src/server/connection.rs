use crate::{
    errors::RequestError,
    http::{request::RecvBuffer, response::ResponseWriter},
    limits::ReqLimits,
    router::Router,
    server::slots::SlotGuard,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::{io::AsyncWriteExt, net::TcpStream};
use tracing::{debug, info, trace, warn};

/// Handles one connection end to end inside its own task.
///
/// Receive once, parse in place, hand the view to the router, send whatever
/// it wrote, half-close the write side. The slot guard is dropped when this
/// function returns (or the task panics), releasing the connection's slot on
/// every path.
pub(crate) async fn handle<R: Router>(
    mut stream: TcpStream,
    peer: SocketAddr,
    router: Arc<R>,
    limits: ReqLimits,
    _guard: SlotGuard,
) {
    let mut buffer = RecvBuffer::new(&limits);

    match buffer.recv(&mut stream).await {
        Ok(_) => {}
        Err(RequestError::ConnectionClosed) => {
            // Not an error: the request is abandoned silently.
            debug!(%peer, "client disconnected before sending data");
            return;
        }
        Err(e) => {
            warn!(%peer, cause = %e, "receive failed");
            return;
        }
    }

    if buffer.is_truncated() {
        debug!(%peer, "request truncated to buffer capacity");
    }

    let mut response = ResponseWriter::new();

    match buffer.parse() {
        Ok(request) => {
            info!(
                method = request.method().as_str(),
                path = %String::from_utf8_lossy(request.path()),
                "request"
            );
            for &(name, value) in request.headers() {
                trace!(name, value, "header");
            }

            router.route(&request, &mut response);
        }
        Err(e) => {
            warn!(%peer, cause = %e, "malformed request");
            response.write_bytes(e.as_http());
        }
    }

    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!(%peer, cause = %e, "response write failed");
        return;
    }
    // Half-close the write side so the client sees a clean end of response;
    // dropping the stream closes the descriptor.
    let _ = stream.shutdown().await;
}
