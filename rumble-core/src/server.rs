//! WebSocket server.
//!
//! The [`Server`] accepts TCP connections, performs the WebSocket handshake,
//! picks a channel from the request path and then drives one
//! [`Session`](crate::Session) per socket.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  TCP Listener   │
//! └────────┬────────┘
//!          │  one task per connection
//!          ▼
//! ┌─────────────────┐   unknown path → HTTP 404
//! │ WS handshake    │──────────────────────────▶ ✗
//! │ /chat/{name}    │
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐     ┌────────────────────┐
//! │ Session         │────▶│ Router + Registry  │ (one pair per channel)
//! │ connect/receive │     └─────────┬──────────┘
//! │ /close          │               │ Transport::send
//! └─────────────────┘     ┌─────────▼──────────┐
//!                         │ ConnectionManager  │ (shared)
//!                         └─────────┬──────────┘
//!                                   ▼
//!                         per-socket write task
//! ```
//!
//! Inbound frames of one socket are handled one after another on that
//! socket's task, so a peer's messages are routed in the order it sent them.
//!
//! # Identity
//!
//! The identity is the path segment after the channel path
//! (`/chat/alice`), percent-decoded. Without one, the `username` query
//! parameter is used (`/direct?username=alice`). A missing identity is the
//! empty string and gets rejected like any other invalid identity.
//!
//! # Examples
//!
//! ```no_run
//! use rumble_core::{Server, ServerConfig};
//!
//! # async fn example() -> rumble_core::Result<()> {
//! let server = Server::new(ServerConfig::default())?;
//! server.listen().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::ServerConfig;
use crate::connection::{Connection, ConnectionId, ConnectionManager};
use crate::error::{Error, Result};
use crate::lifecycle::Lifecycle;
use crate::registry::Registry;
use crate::router::Router;
use crate::transport::Transport;
use futures_util::{SinkExt, StreamExt};
use http::StatusCode;
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tracing::{debug, error, info, warn};
use tungstenite::Message as WsMessage;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};

struct Channel {
    path: String,
    lifecycle: Lifecycle<ConnectionManager>,
}

/// A multi-channel WebSocket chat server.
pub struct Server {
    config: ServerConfig,
    manager: Arc<ConnectionManager>,
    channels: Vec<Channel>,
}

impl Server {
    /// Builds a server from a validated config.
    ///
    /// Every channel gets its own [`Registry`], so the same identity may be
    /// online once per channel. All channels share one [`ConnectionManager`].
    ///
    /// # Errors
    ///
    /// Returns the first problem found by [`ServerConfig::validate`].
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let manager = Arc::new(ConnectionManager::new());
        let channels = config
            .channels
            .iter()
            .map(|channel| Channel {
                path: channel.path.clone(),
                lifecycle: Lifecycle::new(Router::new(
                    Arc::new(Registry::new()),
                    manager.clone(),
                    channel.router.clone(),
                )),
            })
            .collect();

        Ok(Self {
            config,
            manager,
            channels,
        })
    }

    /// The server's configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The shared set of live connections.
    pub fn connection_manager(&self) -> Arc<ConnectionManager> {
        self.manager.clone()
    }

    /// The lifecycle controller serving `path`, if configured.
    pub fn lifecycle(&self, path: &str) -> Option<&Lifecycle<ConnectionManager>> {
        self.channels
            .iter()
            .find(|channel| channel.path == path)
            .map(|channel| &channel.lifecycle)
    }

    /// Binds the configured address and serves forever.
    ///
    /// # Errors
    ///
    /// Fails if the address is invalid or cannot be bound.
    pub async fn listen(self) -> Result<()> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serves a pre-bound listener forever. Handy for tests binding port 0.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        info!("WebSocket server listening on {}", listener.local_addr()?);

        let server = Arc::new(self);

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!("Accepted TCP connection from {}", peer_addr);
                    let server = server.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream, peer_addr).await {
                            error!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept failed: {}", e);
                }
            }
        }
    }

    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<()> {
        let target: Arc<Mutex<Option<(usize, String)>>> = Arc::new(Mutex::new(None));

        let captured = target.clone();
        let server = self.clone();
        let callback = move |req: &Request, resp: Response| {
            let uri = req.uri();
            match server.route(uri.path(), uri.query()) {
                Some(found) => {
                    *captured.lock() = Some(found);
                    Ok(resp)
                }
                None => {
                    warn!("No channel for {} from {}", uri.path(), peer_addr);
                    let mut response = ErrorResponse::new(Some("Not Found".to_string()));
                    *response.status_mut() = StatusCode::NOT_FOUND;
                    Err(response)
                }
            }
        };

        let ws_stream = tokio::time::timeout(
            self.config.handshake_timeout(),
            accept_hdr_async(stream, callback),
        )
        .await
        .map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::TimedOut, "WebSocket handshake timed out")
        })??;

        let (index, identity) = target
            .lock()
            .take()
            .ok_or_else(|| Error::ConnectionNotFound(peer_addr.to_string()))?;
        let channel = &self.channels[index];

        let conn_id = ConnectionId::next();
        info!(
            "WebSocket connection established: {} from {} on {}",
            conn_id, peer_addr, channel.path
        );

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
        self.manager
            .add(Connection::new(conn_id, peer_addr, channel.path.clone(), tx));

        let write_task = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let closing = frame.is_close();
                if let Err(e) = ws_sender.send(frame).await {
                    debug!("Failed to send message to {}: {}", conn_id, e);
                    break;
                }
                if closing {
                    break;
                }
            }
            debug!("Write task ended for {}", conn_id);
        });

        let mut session = channel.lifecycle.session(conn_id);
        if session.connect(&identity).is_ok() {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(WsMessage::Text(text)) => {
                        session.receive(&text);
                    }
                    Ok(WsMessage::Close(_)) => {
                        info!("Close message received from {}", conn_id);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("WebSocket error for {}: {}", conn_id, e);
                        break;
                    }
                }
            }
            session.close();
            self.manager.close(&conn_id);
        }

        // Dropping the last sender lets the write task drain and stop.
        self.manager.remove(&conn_id);
        if let Err(e) = write_task.await {
            error!("Write task for {} panicked: {}", conn_id, e);
        }
        Ok(())
    }

    /// Maps a request to `(channel index, identity)`.
    fn route(&self, path: &str, query: Option<&str>) -> Option<(usize, String)> {
        self.channels.iter().enumerate().find_map(|(index, channel)| {
            let rest = path.strip_prefix(channel.path.as_str())?;
            if !rest.is_empty() && !rest.starts_with('/') {
                return None;
            }

            let segment = rest.trim_start_matches('/').split('/').next().unwrap_or("");
            let identity = if segment.is_empty() {
                query_param(query, "username").unwrap_or_default()
            } else {
                percent_decode_str(segment).decode_utf8_lossy().into_owned()
            };
            Some((index, identity))
        })
    }
}

fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    query?.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        (k == key).then(|| {
            percent_decode_str(&v.replace('+', " "))
                .decode_utf8_lossy()
                .into_owned()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelConfig;
    use crate::router::RouterConfig;

    fn server() -> Server {
        Server::new(ServerConfig::default()).unwrap()
    }

    #[test]
    fn test_route_identity_from_path() {
        let server = server();
        assert_eq!(
            server.route("/chat/alice", None),
            Some((0, "alice".to_string()))
        );
        assert_eq!(
            server.route("/direct/bob/", None),
            Some((1, "bob".to_string()))
        );
    }

    #[test]
    fn test_route_percent_decodes_identity() {
        let server = server();
        assert_eq!(
            server.route("/chat/J%C3%B6rg%20K", None),
            Some((0, "Jörg K".to_string()))
        );
    }

    #[test]
    fn test_route_identity_from_query() {
        let server = server();
        assert_eq!(
            server.route("/direct", Some("token=x&username=robot+one")),
            Some((1, "robot one".to_string()))
        );
    }

    #[test]
    fn test_route_path_wins_over_query() {
        let server = server();
        assert_eq!(
            server.route("/chat/alice", Some("username=bob")),
            Some((0, "alice".to_string()))
        );
    }

    #[test]
    fn test_route_without_identity_yields_empty() {
        let server = server();
        assert_eq!(server.route("/chat", None), Some((0, String::new())));
        assert_eq!(server.route("/chat/", Some("x=1")), Some((0, String::new())));
    }

    #[test]
    fn test_route_unknown_paths() {
        let server = server();
        assert_eq!(server.route("/", None), None);
        assert_eq!(server.route("/chatroom/alice", None), None);
        assert_eq!(server.route("/other/alice", None), None);
    }

    #[test]
    fn test_channels_have_separate_registries() {
        let server = server();
        let chat = server.lifecycle("/chat").unwrap();
        let direct = server.lifecycle("/direct").unwrap();

        chat.router()
            .registry()
            .register(ConnectionId::next(), "alice")
            .unwrap();

        assert!(direct.router().registry().is_empty());
        assert_eq!(direct.router().config(), &RouterConfig::direct());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ServerConfig {
            channels: vec![ChannelConfig::new("chat", RouterConfig::chat())],
            ..ServerConfig::default()
        };
        assert!(matches!(Server::new(config), Err(Error::Config(_))));
    }
}
