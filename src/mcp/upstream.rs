//! Client side of a stdio tool server: request/response over a child process.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::protocol::{McpRequest, McpResponse, PROTOCOL_VERSION, RequestId};
use super::session::{PendingResponse, SessionError, SessionManager};

const HANDSHAKE_SESSION: &str = "__handshake";

type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Multiplexes many sessions over one line-delimited JSON-RPC stream.
///
/// Request ids come from a single counter, so responses are matched on id
/// alone and then routed to the waiting session.
pub struct StdioUpstream {
    writer: Mutex<BoxWriter>,
    sessions: SessionManager,
    next_id: AtomicI64,
    alive: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    child: Mutex<Option<Child>>,
}

impl StdioUpstream {
    /// Start `command` and perform the MCP handshake.
    pub async fn spawn(
        command: &str,
        args: &[String],
        sessions: SessionManager,
    ) -> Result<Self, SessionError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| transport(format!("failed to start '{command}': {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| transport("child stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| transport("child stdout unavailable"))?;

        let upstream = Self::from_io(stdout, stdin, sessions);
        *upstream.child.lock().await = Some(child);
        upstream.initialize().await?;
        info!(command, "Upstream tool server ready");
        Ok(upstream)
    }

    /// Wrap an existing stream pair. No handshake is performed.
    pub fn from_io<R, W>(reader: R, writer: W, sessions: SessionManager) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let alive = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_loop(reader, sessions.clone(), Arc::clone(&alive)));
        Self {
            writer: Mutex::new(Box::new(writer)),
            sessions,
            next_id: AtomicI64::new(0),
            alive,
            reader,
            child: Mutex::new(None),
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub async fn initialize(&self) -> Result<Value, SessionError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {"name": env!("CARGO_PKG_NAME"), "version": env!("CARGO_PKG_VERSION")},
        });
        let response = self
            .request(HANDSHAKE_SESSION, "initialize", Some(params))
            .await?;
        self.notify("notifications/initialized", None).await?;
        match response.error_ref() {
            Some(err) => Err(transport(format!("initialize rejected: {err}"))),
            None => Ok(response.result().cloned().unwrap_or(Value::Null)),
        }
    }

    /// Send a request on behalf of `session` and wait for its response.
    ///
    /// The response carries the upstream id; callers restore their own.
    #[instrument(skip(self, params))]
    pub async fn request(
        &self,
        session: &str,
        method: &str,
        params: Option<Value>,
    ) -> Result<McpResponse, SessionError> {
        if !self.is_alive() {
            return Err(transport("upstream is not running"));
        }
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let pending: PendingResponse = self.sessions.register(session, id.clone())?;
        if !self.is_alive() {
            return Err(transport("upstream is not running"));
        }

        let mut request = McpRequest::new(id, method);
        request.params = params;
        self.send(session, &request).await?;

        pending.wait().await
    }

    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), SessionError> {
        let mut request = McpRequest::notification(method);
        request.params = params;
        self.send(HANDSHAKE_SESSION, &request).await
    }

    pub fn close_session(&self, session: &str) -> usize {
        self.sessions.close(session)
    }

    /// Write one frame, bounded by the session timeout.
    ///
    /// The bound covers waiting for the writer lock as well as the write. A
    /// frame that fails or stalls midway leaves the stream unusable, so the
    /// upstream is marked dead and later calls fail immediately.
    async fn send(&self, session: &str, request: &McpRequest) -> Result<(), SessionError> {
        let mut line = serde_json::to_vec(request).map_err(|e| transport(e.to_string()))?;
        line.push(b'\n');

        let after = self.sessions.timeout();
        let write = async {
            let mut writer = self.writer.lock().await;
            writer.write_all(&line).await?;
            writer.flush().await
        };
        match tokio::time::timeout(after, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.alive.store(false, Ordering::Release);
                warn!(error = %e, method = %request.method, "Upstream write failed");
                Err(transport(e.to_string()))
            }
            Err(_) => {
                self.alive.store(false, Ordering::Release);
                warn!(?after, method = %request.method, "Upstream stopped reading its input");
                Err(match &request.id {
                    Some(id) => SessionError::Timeout {
                        session: session.to_string(),
                        request_id: id.clone(),
                        after,
                    },
                    None => transport(format!("write of {} timed out after {after:?}", request.method)),
                })
            }
        }
    }

    pub async fn shutdown(&self) {
        self.reader.abort();
        self.alive.store(false, Ordering::Release);
        self.sessions.close_all();
        if let Some(mut child) = self.child.lock().await.take()
            && let Err(e) = child.kill().await
        {
            warn!(error = %e, "Failed to stop upstream process");
        }
    }
}

impl Drop for StdioUpstream {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop<R>(reader: R, sessions: SessionManager, alive: Arc<AtomicBool>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<McpResponse>(line) {
                    Ok(response) => match response.id.clone() {
                        Some(id) => {
                            sessions.resolve_any(&id, response);
                        }
                        None => debug!("Upstream response without id ignored"),
                    },
                    Err(e) => debug!(error = %e, "Ignoring non-response line from upstream"),
                }
            }
            Ok(None) => {
                info!("Upstream closed its output");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Upstream read failed");
                break;
            }
        }
    }
    alive.store(false, Ordering::Release);
    sessions.close_all();
}

fn transport(message: impl Into<String>) -> SessionError {
    SessionError::Transport {
        message: message.into(),
    }
}
