use lean_web::{Method, RouteTable, Server, StatusCode};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();

    let routes = RouteTable::new()
        .get("/", |_req, resp| {
            resp.status(StatusCode::Ok)
                .header("Content-Type", "text/plain")
                .body("try /greet?name=you or POST /echo");
        })
        .get("/greet", |req, resp| {
            // The query string is raw: "name=you" style, no decoding applied.
            let name = req
                .query()
                .split('&')
                .find_map(|pair| pair.strip_prefix("name="))
                .unwrap_or("stranger");

            resp.status(StatusCode::Ok)
                .header("Content-Type", "text/plain")
                .body(format!("hello, {name}!"));
        })
        .post("/echo", |req, resp| {
            resp.status(StatusCode::Ok)
                .header("Content-Type", "application/octet-stream")
                .body(req.payload());
        })
        .on(Method::Head, "/health", |_req, resp| {
            resp.status(StatusCode::Ok).end_headers();
        })
        .default_route(|req, resp| {
            resp.status(StatusCode::NotFound).body(format!(
                "no route for {} {}",
                req.method(),
                req.path_str().unwrap_or("<non-utf8 path>")
            ));
        });

    let result = Server::builder()
        .port(8080)
        .router(routes)
        .build()
        .launch()
        .await;

    if let Err(e) = result {
        tracing::error!(cause = %e, "server terminated");
        std::process::exit(1);
    }
}
