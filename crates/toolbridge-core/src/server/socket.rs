//! Unix Socket Server
//!
//! Listens on `~/.toolbridge/toolbridge.sock` (or a configured path) and
//! serves each connection with [`serve_stream`](super::serve_stream).
//! Only processes running as the same user may connect.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use super::serve_stream;
use crate::common::error::ServerError;
use crate::dispatcher::Dispatcher;

/// Connection counters shared with connection tasks
struct ServerState {
    connection_count: RwLock<u64>,
    active_connections: RwLock<u32>,
    started_at: DateTime<Utc>,
}

/// Point-in-time view of the server counters
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub connection_count: u64,
    pub active_connections: u32,
    pub started_at: DateTime<Utc>,
}

pub struct SocketServer {
    socket_path: PathBuf,
    dispatcher: Arc<Dispatcher>,
    state: Arc<ServerState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl SocketServer {
    pub fn new(socket_path: impl Into<PathBuf>, dispatcher: Arc<Dispatcher>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            socket_path: socket_path.into(),
            dispatcher,
            state: Arc::new(ServerState {
                connection_count: RwLock::new(0),
                active_connections: RwLock::new(0),
                started_at: Utc::now(),
            }),
            shutdown_tx,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Signal the accept loop to stop
    pub fn shutdown(&self) {
        if self.shutdown_tx.send(()).is_err() {
            debug!("Shutdown requested but the server is not serving");
        }
    }

    pub async fn status(&self) -> ServerStatus {
        ServerStatus {
            connection_count: *self.state.connection_count.read().await,
            active_connections: *self.state.active_connections.read().await,
            started_at: self.state.started_at,
        }
    }

    /// Bind the socket: create the parent dir, replace a stale file, restrict to owner
    pub fn bind(&self) -> Result<UnixListener, ServerError> {
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        info!("Socket server listening on {:?}", self.socket_path);
        Ok(listener)
    }

    /// Bind and serve until [`shutdown`](Self::shutdown) is called
    pub async fn start(&self) -> Result<(), ServerError> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener
    pub async fn serve(&self, listener: UnixListener) -> Result<(), ServerError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => self.spawn_connection(stream).await,
                        Err(e) => error!("Accept error: {}", e),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Socket server shutting down");
                    break;
                }
            }
        }

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!("Failed to remove socket {:?}: {}", self.socket_path, e);
            }
        }

        Ok(())
    }

    async fn spawn_connection(&self, stream: UnixStream) {
        *self.state.connection_count.write().await += 1;
        *self.state.active_connections.write().await += 1;

        let dispatcher = Arc::clone(&self.dispatcher);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, dispatcher).await {
                error!("Connection error: {}", e);
            }

            let mut active = state.active_connections.write().await;
            *active = active.saturating_sub(1);
        });
    }
}

async fn handle_connection(stream: UnixStream, dispatcher: Arc<Dispatcher>) -> Result<(), ServerError> {
    let cred = match stream.peer_cred() {
        Ok(cred) => cred,
        Err(e) => {
            warn!("Could not retrieve peer credentials, rejecting connection: {}", e);
            return Ok(());
        }
    };

    debug!("Connection from PID: {:?}, UID: {}", cred.pid(), cred.uid());

    // SAFETY: getuid has no preconditions and cannot fail
    let my_uid = unsafe { libc::getuid() };
    if cred.uid() != my_uid {
        warn!("Rejecting connection from UID {} (expected {})", cred.uid(), my_uid);
        return Ok(());
    }

    let (reader, writer) = stream.into_split();
    serve_stream(reader, writer, dispatcher).await?;

    debug!("Client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use toolbridge_protocol::tool::object_schema;
    use toolbridge_protocol::{ErrorCode, SocketClient, ToolDescriptor, ToolResult};

    use crate::registry::{handler_fn, ToolRegistry};

    fn server_at(path: PathBuf) -> Arc<SocketServer> {
        let mut builder = ToolRegistry::builder();
        builder
            .register(
                ToolDescriptor::new("ping", "Liveness check", object_schema(Vec::<(String, Value)>::new())),
                handler_fn(|_| Ok(ToolResult::text("pong"))),
            )
            .unwrap();
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(builder.build())));
        Arc::new(SocketServer::new(path, dispatcher))
    }

    #[tokio::test]
    async fn test_socket_round_trip_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run").join("toolbridge.sock");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"stale").unwrap();

        let server = server_at(path.clone());
        let listener = server.bind().unwrap();

        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let serving = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.serve(listener).await })
        };

        let mut client = SocketClient::connect_to(&path).await.unwrap();
        let response = client.call_method("ping", None).await.unwrap();
        assert_eq!(response.result().unwrap()["content"][0]["text"], json!("pong"));

        let response = client.call_method("tools/list", None).await.unwrap();
        assert_eq!(response.result().unwrap()["tools"][0]["name"], json!("ping"));

        let response = client.call_raw("{broken").await.unwrap();
        assert_eq!(response.error_object().unwrap().kind(), Some(ErrorCode::ParseError));

        let status = server.status().await;
        assert_eq!(status.connection_count, 1);
        assert_eq!(status.active_connections, 1);

        drop(client);
        server.shutdown();
        serving.await.unwrap().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_status_wire_shape() {
        let status = ServerStatus {
            connection_count: 3,
            active_connections: 1,
            started_at: Utc::now(),
        };
        let wire = serde_json::to_value(status).unwrap();
        assert_eq!(wire["connectionCount"], json!(3));
        assert_eq!(wire["activeConnections"], json!(1));
        assert!(wire["startedAt"].is_string());
    }
}
