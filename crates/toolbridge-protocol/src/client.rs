use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::{JsonRpcRequest, JsonRpcResponse, RequestId};

/// Newline-delimited JSON-RPC client for the toolbridge Unix socket.
///
/// One request is written, one response line is read; calls are not pipelined.
pub struct SocketClient {
    reader: BufReader<tokio::io::ReadHalf<UnixStream>>,
    writer: tokio::io::WriteHalf<UnixStream>,
    next_id: u64,
}

impl SocketClient {
    pub async fn connect_to(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let stream = UnixStream::connect(&path).await.map_err(|err| {
            std::io::Error::new(
                err.kind(),
                format!("could not connect to toolbridge socket at {}: {}", path.display(), err),
            )
        })?;

        let (r, w) = tokio::io::split(stream);
        Ok(Self {
            reader: BufReader::new(r),
            writer: w,
            next_id: 1,
        })
    }

    /// Send a request; a missing id is filled from the client's counter
    pub async fn call(&mut self, mut request: JsonRpcRequest) -> Result<JsonRpcResponse, std::io::Error> {
        if request.id.is_none() {
            request.id = Some(RequestId::String(self.take_id().to_string()));
        }

        let payload = serde_json::to_string(&request)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.send_line(&payload).await?;
        self.read_response().await
    }

    /// Convenience wrapper building the request from a method and params
    pub async fn call_method(
        &mut self,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> Result<JsonRpcResponse, std::io::Error> {
        let id = self.take_id();
        self.call(JsonRpcRequest::new(id.to_string(), method, params)).await
    }

    fn take_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Write a raw frame and read whatever single line comes back
    pub async fn call_raw(&mut self, frame: &str) -> Result<JsonRpcResponse, std::io::Error> {
        self.send_line(frame).await?;
        self.read_response().await
    }

    async fn send_line(&mut self, payload: &str) -> Result<(), std::io::Error> {
        self.writer.write_all(payload.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    async fn read_response(&mut self) -> Result<JsonRpcResponse, std::io::Error> {
        let mut line = String::new();
        let bytes = self.reader.read_line(&mut line).await?;
        if bytes == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "socket closed while waiting for response",
            ));
        }

        serde_json::from_str(line.trim()).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
