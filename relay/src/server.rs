//! Minimal HTTP/1.1 front for the relay handler.
//!
//! One endpoint: `POST /api/enhance`. Each accepted connection serves one
//! request; error responses are JSON with a `Content-Length`, successful
//! enhancements stream the provider's fragments as chunked
//! `text/event-stream` bytes in arrival order.

use burnish_core::relay::{RelayHandler, RelayOutcome};
use burnish_core::RelayError;
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Path of the enhancement endpoint. The client appends a cache-busting
/// query string, so matching is prefix-based.
pub const ENHANCE_PATH: &str = "/api/enhance";

/// Largest request body we will buffer (1 MiB).
const MAX_BODY_SIZE: usize = 1024 * 1024;

const INITIAL_BUF_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

pub struct RelayServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    handler: Arc<RelayHandler>,
}

impl RelayServer {
    pub async fn bind(addr: impl AsRef<str>, handler: RelayHandler) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_owned(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            handler: Arc::new(handler),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until the process is terminated.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(address = %self.local_addr, "relay listening");
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(err) => {
                    error!(error = %err, "failed to accept connection");
                    continue;
                }
            };
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                if let Err(err) = serve_connection(stream, peer, handler).await {
                    warn!(peer = %peer, error = %err, "connection closed with error");
                }
            });
        }
    }
}

struct ParsedRequest {
    method: String,
    path: String,
    content_length: usize,
    body_offset: usize,
}

/// Read one request, dispatch it, write one response, close.
async fn serve_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<RelayHandler>,
) -> std::io::Result<()> {
    let request_id = Uuid::new_v4();
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    let parsed = loop {
        let read = stream.read_buf(&mut buf).await?;
        if read == 0 {
            debug!(peer = %peer, "connection closed before a full request arrived");
            return Ok(());
        }
        if buf.len() > MAX_BODY_SIZE {
            return write_json_error(
                &mut stream,
                413,
                "Payload Too Large",
                r#"{"error":"Request entity too large"}"#,
            )
            .await;
        }
        match parse_head(&buf) {
            Ok(Some(parsed)) => break parsed,
            Ok(None) => continue,
            Err(()) => {
                return write_json_error(
                    &mut stream,
                    400,
                    "Bad Request",
                    r#"{"error":"Malformed HTTP request"}"#,
                )
                .await;
            }
        }
    };

    // Wait for the full body.
    let total_needed = parsed.body_offset + parsed.content_length;
    if total_needed > MAX_BODY_SIZE {
        return write_json_error(
            &mut stream,
            413,
            "Payload Too Large",
            r#"{"error":"Request entity too large"}"#,
        )
        .await;
    }
    while buf.len() < total_needed {
        if stream.read_buf(&mut buf).await? == 0 {
            debug!(peer = %peer, "connection closed mid-body");
            return Ok(());
        }
    }
    let body = &buf[parsed.body_offset..total_needed];

    let route = parsed.path.split('?').next().unwrap_or_default();
    if route != ENHANCE_PATH {
        return write_json_error(&mut stream, 404, "Not Found", r#"{"error":"Not found"}"#).await;
    }
    if parsed.method != "POST" {
        return write_json_error(
            &mut stream,
            405,
            "Method Not Allowed",
            r#"{"error":"Method not allowed"}"#,
        )
        .await;
    }

    debug!(%request_id, peer = %peer, bytes = body.len(), "dispatching enhancement request");

    match handler.handle(body).await {
        RelayOutcome::Failure(err) => {
            info!(%request_id, status = err.status(), "request failed");
            write_relay_error(&mut stream, &err).await
        }
        RelayOutcome::Stream(mut fragments) => {
            stream
                .write_all(
                    b"HTTP/1.1 200 OK\r\n\
                      Content-Type: text/event-stream\r\n\
                      Cache-Control: no-cache, no-transform\r\n\
                      Connection: keep-alive\r\n\
                      Transfer-Encoding: chunked\r\n\r\n",
                )
                .await?;

            let mut forwarded = 0usize;
            while let Some(result) = fragments.recv().await {
                match result {
                    Ok(chunk) => {
                        if chunk.done {
                            break;
                        }
                        if chunk.delta.is_empty() {
                            continue;
                        }
                        forwarded += chunk.delta.len();
                        write_chunk(&mut stream, chunk.delta.as_bytes()).await?;
                    }
                    Err(err) => {
                        // Headers are already on the wire; all we can do is
                        // cut the stream short.
                        warn!(%request_id, error = %err, "provider stream failed mid-relay");
                        break;
                    }
                }
            }
            stream.write_all(b"0\r\n\r\n").await?;
            stream.flush().await?;
            info!(%request_id, bytes = forwarded, "stream relayed");
            Ok(())
        }
    }
}

/// Parse the request head. `Ok(None)` means more bytes are needed.
fn parse_head(buf: &[u8]) -> Result<Option<ParsedRequest>, ()> {
    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut request = httparse::Request::new(&mut headers);
    match request.parse(buf) {
        Ok(httparse::Status::Complete(body_offset)) => {
            let method = request.method.ok_or(())?.to_owned();
            let path = request.path.ok_or(())?.to_owned();
            let content_length = request
                .headers
                .iter()
                .find(|header| header.name.eq_ignore_ascii_case("content-length"))
                .and_then(|header| std::str::from_utf8(header.value).ok())
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            Ok(Some(ParsedRequest {
                method,
                path,
                content_length,
                body_offset,
            }))
        }
        Ok(httparse::Status::Partial) => Ok(None),
        Err(_) => Err(()),
    }
}

async fn write_relay_error(stream: &mut TcpStream, err: &RelayError) -> std::io::Result<()> {
    let body = serde_json::to_string(&err.body())
        .unwrap_or_else(|_| r#"{"error":"An unexpected error occurred on the server."}"#.into());
    write_json_error(stream, err.status(), reason(err.status()), &body).await
}

async fn write_json_error(
    stream: &mut TcpStream,
    status: u16,
    reason: &str,
    body: &str,
) -> std::io::Result<()> {
    let head = format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: application/json\r\n\
         Connection: close\r\n\
         Content-Length: {}\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body.as_bytes()).await?;
    stream.flush().await
}

async fn write_chunk(stream: &mut TcpStream, data: &[u8]) -> std::io::Result<()> {
    stream
        .write_all(format!("{:x}\r\n", data.len()).as_bytes())
        .await?;
    stream.write_all(data).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await
}

fn reason(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        504 => "Gateway Timeout",
        _ => "OK",
    }
}
