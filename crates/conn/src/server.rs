//! Accept loop wiring a [`ConnectionRegistry`] to one [`HttpConnection`] task per socket.
//!
//! ```no_run
//! use micro_conn::handler::make_handler;
//! use micro_conn::reply::{ReplyKind, StaticReply};
//! use micro_conn::server::Server;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let server = Server::builder()
//!     .address("127.0.0.1:8080")
//!     .handler(make_handler(|_request, slots| {
//!         slots.get_or_insert_with(ReplyKind::Static, || StaticReply::from_dir("./public"));
//!         ReplyKind::Static
//!     }))
//!     .build()?;
//!
//! server.run_until(async { tokio::signal::ctrl_c().await.unwrap_or_default() }).await?;
//! # Ok(())
//! # }
//! ```

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::select;
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::ConnectionConfig;
use crate::connection::HttpConnection;
use crate::handler::RequestHandler;
use crate::registry::ConnectionRegistry;

pub struct ServerBuilder {
    address: Option<io::Result<Vec<SocketAddr>>>,
    handler: Option<Arc<dyn RequestHandler>>,
    config: ConnectionConfig,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { address: None, handler: None, config: ConnectionConfig::default() }
    }

    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(Iterator::collect));
        self
    }

    pub fn handler(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let handler = self.handler.ok_or(ServerBuildError::MissingHandler)?;
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?.map_err(|source| ServerBuildError::InvalidAddress { source })?;
        Ok(Server { address, handler, config: self.config, registry: ConnectionRegistry::new() })
    }
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder").field("address", &self.address).field("config", &self.config).finish_non_exhaustive()
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("handler must be set")]
    MissingHandler,
    #[error("address must be set")]
    MissingAddress,
    #[error("invalid address: {source}")]
    InvalidAddress { source: io::Error },
}

pub struct Server {
    address: Vec<SocketAddr>,
    handler: Arc<dyn RequestHandler>,
    config: ConnectionConfig,
    registry: ConnectionRegistry,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server").field("address", &self.address).field("live", &self.registry.len()).finish_non_exhaustive()
    }
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// The registry of this server's connections.
    pub fn registry(&self) -> ConnectionRegistry {
        self.registry.clone()
    }

    /// Serves forever.
    pub async fn start(self) -> io::Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    pub async fn run_until<F: Future<Output = ()>>(self, shutdown: F) -> io::Result<()> {
        info!("start listening at {:?}", self.address);
        let listener = match TcpListener::bind(self.address.as_slice()).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(cause = %e, "bind server error");
                return Err(e);
            }
        };
        self.serve(listener, shutdown).await
    }

    /// Accepts on `listener` until `shutdown` resolves, then stops every live
    /// connection and waits for all of them to close.
    pub async fn serve<F: Future<Output = ()>>(self, listener: TcpListener, shutdown: F) -> io::Result<()> {
        tokio::pin!(shutdown);

        loop {
            select! {
                () = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((tcp_stream, remote_addr)) => self.spawn_connection(tcp_stream, remote_addr),
                    Err(e) => warn!(cause = %e, "failed to accept"),
                },
            }
        }

        info!(live = self.registry.len(), "shutting down, stopping live connections");
        self.registry.stop_all();
        self.registry.wait_idle().await;
        info!(retired = self.registry.retired(), "all connections closed");
        Ok(())
    }

    fn spawn_connection(&self, tcp_stream: TcpStream, remote_addr: SocketAddr) {
        if let Err(e) = tcp_stream.set_nodelay(true) {
            warn!(cause = %e, "can't set TCP_NODELAY");
        }

        let registration = self.registry.register();
        let span = info_span!("connection", id = %registration.id, %remote_addr);

        let (reader, writer) = tcp_stream.into_split();
        let connection =
            HttpConnection::new(reader, writer, Arc::clone(&self.handler), self.config.clone()).with_registration(registration);

        tokio::spawn(
            async move {
                match connection.process().await {
                    Ok(()) => info!("finished process, connection shutdown"),
                    Err(e) => error!(cause = %e, "service has error, connection shutdown"),
                }
            }
            .instrument(span),
        );
    }
}
