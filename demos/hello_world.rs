use lean_web::{Request, ResponseWriter, Server, StatusCode};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();

    let result = Server::builder()
        .port(8080)
        .router(|_req: &Request<'_>, resp: &mut ResponseWriter| {
            resp.status(StatusCode::Ok)
                .header("Content-Type", "text/plain")
                .body("Hello, world!");
        })
        .build()
        .launch()
        .await;

    if let Err(e) = result {
        tracing::error!(cause = %e, "server terminated");
        std::process::exit(1);
    }
}
