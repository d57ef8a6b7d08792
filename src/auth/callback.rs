/// One-shot HTTP listener that captures the OAuth redirect
use super::{parse_callback, AuthError, CallbackOutcome};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use url::Url;

/// How long one connection may take to deliver its request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const SUCCESS_PAGE: &str = "<!DOCTYPE html>\r\n\
<html>\r\n\
<head><title>Mixtape Player</title></head>\r\n\
<body style=\"font-family: monospace; text-align: center; padding: 50px;\">\r\n\
<h1>Tape loaded</h1>\r\n\
<p>Authentication complete. You can close this window.</p>\r\n\
</body>\r\n\
</html>\r\n";

const CANCELLED_PAGE: &str = "<!DOCTYPE html>\r\n\
<html>\r\n\
<body>\r\n\
<p>Authentication was cancelled. Please try again.</p>\r\n\
</body>\r\n\
</html>\r\n";

/// Listener bound to the host and port of the configured redirect URI
pub struct CallbackListener {
    listener: TcpListener,
    path: String,
}

impl CallbackListener {
    /// Bind to the redirect URI's host and port
    pub async fn bind(redirect_uri: &str) -> Result<Self, AuthError> {
        let url = Url::parse(redirect_uri)?;
        let host = url.host_str().unwrap_or("127.0.0.1");
        let port = url.port_or_known_default().unwrap_or(80);

        let listener = TcpListener::bind((host, port)).await?;
        tracing::info!(
            "OAuth callback listener bound on {}",
            listener.local_addr()?
        );

        Ok(Self {
            listener,
            path: url.path().to_string(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AuthError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve requests until one carries a code or an error.
    ///
    /// Anything else (favicon probes, wrong paths) gets a 404 and is ignored.
    /// Each connection gets its own task so a silent client cannot hold up
    /// the redirect.
    pub async fn wait(self) -> Result<CallbackOutcome, AuthError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        loop {
            tokio::select! {
                Some(outcome) = rx.recv() => return Ok(outcome),
                accepted = self.listener.accept() => {
                    let (socket, peer) = accepted?;
                    tracing::debug!("OAuth callback connection from {}", peer);

                    let path = self.path.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        match tokio::time::timeout(REQUEST_TIMEOUT, handle(socket, &path)).await {
                            Ok(Ok(Some(outcome))) => {
                                let _ = tx.send(outcome);
                            }
                            Ok(Ok(None)) => {}
                            Ok(Err(e)) => {
                                tracing::warn!("Failed to handle OAuth callback request: {}", e)
                            }
                            Err(_) => tracing::debug!("OAuth callback connection from {} timed out", peer),
                        }
                    });
                }
            }
        }
    }
}

async fn handle(socket: TcpStream, path: &str) -> std::io::Result<Option<CallbackOutcome>> {
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    // Drain headers so closing the socket does not reset the connection
    let mut header = String::new();
    loop {
        header.clear();
        let read = reader.read_line(&mut header).await?;
        if read == 0 || header == "\r\n" || header == "\n" {
            break;
        }
    }

    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    let on_path = target
        .split('?')
        .next()
        .map(|p| p == path || path.is_empty())
        .unwrap_or(false);

    let outcome = if on_path {
        parse_callback(target)
    } else {
        CallbackOutcome::Missing
    };

    let (status, body) = match &outcome {
        CallbackOutcome::Code(_) => ("200 OK", SUCCESS_PAGE),
        CallbackOutcome::Cancelled(_) => ("400 Bad Request", CANCELLED_PAGE),
        CallbackOutcome::Missing => ("404 Not Found", ""),
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;

    match outcome {
        CallbackOutcome::Missing => Ok(None),
        outcome => {
            tracing::info!("OAuth callback received");
            Ok(Some(outcome))
        }
    }
}
