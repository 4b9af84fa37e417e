//! Usage: Localhost loopback redirect source for browser-based sign-in.

use crate::handoff::parser::{parse_redirect_url, RedirectOutcome};
use crate::handoff::source::{BoxFuture, RedirectSource, RedirectSubscription, Subscribers};
use crate::shared::error::AppResult;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

const SUCCESS_HTML: &str = "<html><body><h1>Inicio de sesi\u{f3}n completado</h1><p>Puedes cerrar esta ventana y volver a la aplicaci\u{f3}n.</p></body></html>";
const ERROR_HTML: &str = "<html><body><h1>No se pudo completar el inicio de sesi\u{f3}n</h1><p>Puedes cerrar esta ventana e intentarlo de nuevo.</p></body></html>";

const MAX_REQUEST_BYTES: usize = 8192;

#[derive(Debug)]
struct BoundListeners {
    port: u16,
    listener_v4: Option<TcpListener>,
    listener_v6: Option<TcpListener>,
}

/// Redirect source backed by a localhost HTTP listener. The browser lands on
/// `http://127.0.0.1:{port}/...` after the provider redirect; every request target is
/// recorded and fanned out as a redirect URL.
pub struct LoopbackRedirectSource {
    port: u16,
    latest: Arc<Mutex<Option<String>>>,
    subscribers: Arc<Subscribers>,
    accept_task: JoinHandle<()>,
}

impl LoopbackRedirectSource {
    pub async fn bind(preferred_port: u16) -> AppResult<Self> {
        let bound = match try_bind_on_port(preferred_port).await {
            Ok(bound) => bound,
            Err(preferred_err) if preferred_port == 0 => {
                return Err(
                    format!("SYSTEM_ERROR: loopback redirect bind failed: {preferred_err}").into(),
                )
            }
            Err(preferred_err) => match try_bind_on_port(0).await {
                Ok(bound) => bound,
                Err(fallback_err) => {
                    return Err(format!(
                        "SYSTEM_ERROR: loopback redirect bind failed: {preferred_err}; fallback_dynamic_port: {fallback_err}"
                    )
                    .into())
                }
            },
        };

        let port = bound.port;
        let latest = Arc::new(Mutex::new(None));
        let subscribers = Arc::new(Subscribers::default());
        let accept_task = tokio::spawn(accept_loop(bound, latest.clone(), subscribers.clone()));
        tracing::info!(port, "loopback redirect listener started");

        Ok(Self {
            port,
            latest,
            subscribers,
            accept_task,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for LoopbackRedirectSource {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

impl RedirectSource for LoopbackRedirectSource {
    fn initial_url(&self) -> BoxFuture<'_, AppResult<Option<String>>> {
        Box::pin(async move {
            let latest = self
                .latest
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Ok(latest.clone())
        })
    }

    fn subscribe(&self) -> RedirectSubscription {
        self.subscribers.subscribe()
    }
}

async fn try_bind_on_port(port: u16) -> Result<BoundListeners, String> {
    if port == 0 {
        return try_bind_dynamic_port().await;
    }

    let mut bind_errors: Vec<String> = Vec::new();
    let listener_v4 = match TcpListener::bind(("127.0.0.1", port)).await {
        Ok(listener) => Some(listener),
        Err(err) => {
            bind_errors.push(format!("127.0.0.1:{port} ({err})"));
            None
        }
    };
    let listener_v6 = match TcpListener::bind(("::1", port)).await {
        Ok(listener) => Some(listener),
        Err(err) => {
            bind_errors.push(format!("::1:{port} ({err})"));
            None
        }
    };
    if listener_v4.is_none() && listener_v6.is_none() {
        return Err(bind_errors.join("; "));
    }

    Ok(BoundListeners {
        port,
        listener_v4,
        listener_v6,
    })
}

async fn try_bind_dynamic_port() -> Result<BoundListeners, String> {
    let mut bind_errors: Vec<String> = Vec::new();

    match TcpListener::bind(("127.0.0.1", 0)).await {
        Ok(listener_v4) => {
            let port = listener_v4
                .local_addr()
                .map_err(|e| format!("127.0.0.1:0 (local_addr failed: {e})"))?
                .port();
            let listener_v6 = match TcpListener::bind(("::1", port)).await {
                Ok(listener) => Some(listener),
                Err(err) => {
                    bind_errors.push(format!("::1:{port} ({err})"));
                    None
                }
            };
            return Ok(BoundListeners {
                port,
                listener_v4: Some(listener_v4),
                listener_v6,
            });
        }
        Err(err) => bind_errors.push(format!("127.0.0.1:0 ({err})")),
    }

    match TcpListener::bind(("::1", 0)).await {
        Ok(listener_v6) => {
            let port = listener_v6
                .local_addr()
                .map_err(|e| format!("::1:0 (local_addr failed: {e})"))?
                .port();
            let listener_v4 = match TcpListener::bind(("127.0.0.1", port)).await {
                Ok(listener) => Some(listener),
                Err(err) => {
                    bind_errors.push(format!("127.0.0.1:{port} ({err})"));
                    None
                }
            };
            return Ok(BoundListeners {
                port,
                listener_v4,
                listener_v6: Some(listener_v6),
            });
        }
        Err(err) => bind_errors.push(format!("::1:0 ({err})")),
    }

    Err(bind_errors.join("; "))
}

async fn accept_loop(
    mut bound: BoundListeners,
    latest: Arc<Mutex<Option<String>>>,
    subscribers: Arc<Subscribers>,
) {
    loop {
        let accepted = match (bound.listener_v4.as_mut(), bound.listener_v6.as_mut()) {
            (Some(v4), Some(v6)) => {
                tokio::select! {
                    result = v4.accept() => result,
                    result = v6.accept() => result,
                }
            }
            (Some(v4), None) => v4.accept().await,
            (None, Some(v6)) => v6.accept().await,
            (None, None) => return,
        };

        let (socket, _) = match accepted {
            Ok(accepted) => accepted,
            Err(err) => {
                tracing::warn!("loopback redirect accept failed: {err}");
                continue;
            }
        };

        if let Err(err) = handle_connection(socket, bound.port, &latest, &subscribers).await {
            tracing::debug!("loopback redirect request dropped: {}", err.message());
        }
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    port: u16,
    latest: &Mutex<Option<String>>,
    subscribers: &Subscribers,
) -> AppResult<()> {
    let mut buffer = vec![0u8; MAX_REQUEST_BYTES];
    let size = socket
        .read(&mut buffer)
        .await
        .map_err(|e| format!("SYSTEM_ERROR: loopback redirect read failed: {e}"))?;
    if size == 0 {
        return Err("SYSTEM_ERROR: loopback redirect request is empty"
            .to_string()
            .into());
    }

    let request = String::from_utf8_lossy(&buffer[..size]);
    let target = extract_request_target(request.as_ref())?;
    let url = format!("http://127.0.0.1:{port}{target}");

    let is_credential = matches!(parse_redirect_url(&url), RedirectOutcome::Credential(_));
    let body = if is_credential { SUCCESS_HTML } else { ERROR_HTML };
    let status = if is_credential {
        "HTTP/1.1 200 OK"
    } else {
        "HTTP/1.1 400 Bad Request"
    };
    let response = format!(
        "{status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;

    // Provider errors are still published; the orchestrator decides what they mean.
    {
        let mut latest = latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *latest = Some(url.clone());
    }
    subscribers.publish(&url);

    Ok(())
}

fn extract_request_target(request: &str) -> AppResult<&str> {
    let mut lines = request.lines();
    let first = lines
        .next()
        .ok_or_else(|| "SYSTEM_ERROR: loopback redirect malformed request".to_string())?;
    let mut parts = first.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    if method != "GET" || target.is_empty() {
        return Err("SYSTEM_ERROR: loopback redirect must be GET"
            .to_string()
            .into());
    }
    Ok(target)
}
