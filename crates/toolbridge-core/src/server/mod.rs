//! Transport Adapter
//!
//! Newline-delimited JSON over any async byte stream. Each line is one
//! request; each response is written as one line. Requests on the same
//! stream are dispatched concurrently and answered in completion order.

#[cfg(unix)]
pub mod socket;

use std::sync::Arc;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use toolbridge_protocol::MalformedRequest;

use crate::common::error::ServerError;
use crate::dispatcher::Dispatcher;

#[cfg(unix)]
pub use socket::{ServerStatus, SocketServer};

/// Serve one stream until the reader reaches EOF or fails.
///
/// Responses still in flight when reading stops are written before
/// returning. A read error is reported only after that.
pub async fn serve_stream<R, W>(reader: R, writer: W, dispatcher: Arc<Dispatcher>) -> Result<(), ServerError>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let writer_task = tokio::spawn(write_lines(writer, rx));

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut in_flight = JoinSet::new();
    let mut read_error = None;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                error!("Read error: {}", e);
                read_error = Some(e);
                break;
            }
        }

        let frame = match String::from_utf8(std::mem::take(&mut buf)) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => Frame::Line(line),
            Err(e) => {
                warn!("Rejecting frame that is not valid UTF-8");
                Frame::Invalid(
                    MalformedRequest::new("Parse error: request is not valid UTF-8", None)
                        .with_diagnostics(json!({ "error": e.utf8_error().to_string() })),
                )
            }
        };

        let dispatcher = Arc::clone(&dispatcher);
        let tx = tx.clone();
        in_flight.spawn(async move {
            let response = match frame {
                Frame::Line(line) => dispatcher.handle_raw(&line).await.into_response(),
                Frame::Invalid(malformed) => Some(malformed.into_response()),
            };
            let Some(response) = response else {
                return;
            };

            match serde_json::to_string(&response) {
                Ok(json) => {
                    if tx.send(json).is_err() {
                        debug!("Writer closed before response {} could be sent", response.id);
                    }
                }
                Err(e) => error!("Failed to serialize response: {}", e),
            }
        });

        while let Some(joined) = in_flight.try_join_next() {
            if let Err(e) = joined {
                error!("Request task failed: {}", e);
            }
        }
    }

    debug!("Stopped reading, waiting for {} in-flight requests", in_flight.len());
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!("Request task failed: {}", e);
        }
    }

    drop(tx);
    let written = match writer_task.await {
        Ok(result) => result.map_err(ServerError::from),
        Err(e) => Err(ServerError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))),
    };

    match read_error {
        Some(e) => Err(ServerError::Io(e)),
        None => written,
    }
}

/// One received line, decoded or already rejected
enum Frame {
    Line(String),
    Invalid(MalformedRequest),
}

async fn write_lines<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        if let Err(e) = write_line(&mut writer, &line).await {
            warn!("Failed to write response: {}", e);
            return Err(e);
        }
    }
    Ok(())
}

async fn write_line<W>(writer: &mut W, line: &str) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
