//! Serves `./public` statically, `/api/*` from application code and `/upstream/*`
//! through a proxy to `UPSTREAM_ADDR` (default `127.0.0.1:9090`).

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use micro_conn::config::ConnectionConfig;
use micro_conn::handler::make_handler;
use micro_conn::protocol::RequestHeader;
use micro_conn::reply::{BoxError, DynamicReply, ProxyReply, ReplyKind, ReplySlots, ReqBody, StaticReply};
use micro_conn::server::Server;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let upstream: SocketAddr = std::env::var("UPSTREAM_ADDR")
        .ok()
        .and_then(|addr| addr.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 9090)));

    let handler = make_handler(move |request: &RequestHeader, slots: &mut ReplySlots| {
        let path = request.uri().path();
        if path.starts_with("/api/") {
            slots.get_or_insert_with(ReplyKind::Dynamic, || DynamicReply::from_fn(api));
            ReplyKind::Dynamic
        } else if path.starts_with("/upstream/") {
            slots.get_or_insert_with(ReplyKind::Proxy, || ProxyReply::tcp(upstream));
            ReplyKind::Proxy
        } else {
            slots.get_or_insert_with(ReplyKind::Static, || StaticReply::from_dir("./public"));
            ReplyKind::Static
        }
    });

    let config = ConnectionConfig::new().read_timeout(Duration::from_secs(30)).keep_alive_timeout(Duration::from_secs(5));
    let server = match Server::builder().address("127.0.0.1:8080").handler(handler).config(config).build() {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "invalid server settings");
            return;
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(cause = %e, "can't listen for ctrl-c");
        }
        info!("ctrl-c received");
    };
    if let Err(e) = server.run_until(shutdown).await {
        error!(cause = %e, "server stopped with error");
    }
}

async fn api(request: Request<ReqBody>) -> Result<Response<Full<Bytes>>, BoxError> {
    let path = request.uri().path().to_owned();
    info!("request path {}", path);

    let body = request.into_body().collect().await?.to_bytes();
    info!(len = body.len(), "receiving request body");

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, mime::TEXT_PLAIN_UTF_8.as_ref())
        .body(Full::new(Bytes::from(format!("{path}: {} bytes received\r\n", body.len()))))?;
    Ok(response)
}
