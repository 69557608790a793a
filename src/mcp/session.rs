//! Correlates asynchronous responses with the callers waiting on them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::protocol::{McpResponse, RequestId};

pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Timed out after {after:?} waiting for response {request_id} in session {session}")]
    #[diagnostic(code(presenter::session::timeout))]
    Timeout {
        session: String,
        request_id: RequestId,
        after: Duration,
    },

    #[error("Session {session} closed")]
    #[diagnostic(code(presenter::session::closed))]
    Closed { session: String },

    #[error("Request {request_id} is already pending in session {session}")]
    #[diagnostic(code(presenter::session::duplicate))]
    Duplicate {
        session: String,
        request_id: RequestId,
    },

    #[error("Upstream transport failed: {message}")]
    #[diagnostic(code(presenter::session::transport))]
    Transport { message: String },
}

type Waiters = HashMap<RequestId, oneshot::Sender<McpResponse>>;

struct Inner {
    sessions: Mutex<HashMap<String, Waiters>>,
    timeout: Duration,
    dropped: AtomicU64,
}

impl Inner {
    fn table(&self) -> MutexGuard<'_, HashMap<String, Waiters>> {
        // Entries are plain senders; a poisoned table is still consistent.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remove(&self, session: &str, id: &RequestId) -> Option<oneshot::Sender<McpResponse>> {
        let mut table = self.table();
        let waiters = table.get_mut(session)?;
        let sender = waiters.remove(id);
        if waiters.is_empty() {
            table.remove(session);
        }
        sender
    }

    fn record_drop(&self, session: Option<&str>, id: &RequestId, reason: &str) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        warn!(session = session.unwrap_or("-"), request_id = %id, reason, "Dropped response");
    }
}

/// Session → request id → waiting caller.
///
/// Cloning shares the same table.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_RESPONSE_TIMEOUT)
    }
}

impl SessionManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: Mutex::new(HashMap::new()),
                timeout,
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Reserve a slot for `request_id`. Register before sending the request.
    pub fn register(
        &self,
        session: &str,
        request_id: RequestId,
    ) -> Result<PendingResponse, SessionError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut table = self.inner.table();
            let waiters = table.entry(session.to_string()).or_default();
            if waiters.contains_key(&request_id) {
                return Err(SessionError::Duplicate {
                    session: session.to_string(),
                    request_id,
                });
            }
            waiters.insert(request_id.clone(), tx);
        }

        Ok(PendingResponse {
            inner: Arc::clone(&self.inner),
            session: session.to_string(),
            request_id,
            rx,
        })
    }

    /// Deliver a response. Returns `false` when nobody is waiting for it.
    pub fn resolve(&self, session: &str, request_id: &RequestId, response: McpResponse) -> bool {
        match self.inner.remove(session, request_id) {
            Some(tx) => self.deliver(Some(session), request_id, tx, response),
            None => {
                self.inner
                    .record_drop(Some(session), request_id, "no waiter");
                false
            }
        }
    }

    /// Deliver a response whose session is unknown, matching on id alone.
    pub fn resolve_any(&self, request_id: &RequestId, response: McpResponse) -> bool {
        let found = {
            let mut table = self.inner.table();
            let session = table
                .iter()
                .find(|(_, waiters)| waiters.contains_key(request_id))
                .map(|(session, _)| session.clone());
            session.and_then(|session| {
                let waiters = table.get_mut(&session)?;
                let tx = waiters.remove(request_id)?;
                if waiters.is_empty() {
                    table.remove(&session);
                }
                Some((session, tx))
            })
        };

        match found {
            Some((session, tx)) => self.deliver(Some(&session), request_id, tx, response),
            None => {
                self.inner.record_drop(None, request_id, "no waiter");
                false
            }
        }
    }

    fn deliver(
        &self,
        session: Option<&str>,
        request_id: &RequestId,
        tx: oneshot::Sender<McpResponse>,
        response: McpResponse,
    ) -> bool {
        if tx.send(response).is_err() {
            self.inner
                .record_drop(session, request_id, "waiter gone");
            return false;
        }
        true
    }

    /// Drop every pending entry of `session`. Waiters fail with `Closed`.
    pub fn close(&self, session: &str) -> usize {
        let removed = self.inner.table().remove(session);
        let count = removed.map(|w| w.len()).unwrap_or(0);
        debug!(session, pending = count, "Session closed");
        count
    }

    pub fn close_all(&self) {
        let drained: Vec<_> = self.inner.table().drain().collect();
        debug!(sessions = drained.len(), "All sessions closed");
    }

    pub fn pending(&self, session: &str) -> usize {
        self.inner
            .table()
            .get(session)
            .map(|w| w.len())
            .unwrap_or(0)
    }

    pub fn session_count(&self) -> usize {
        self.inner.table().len()
    }

    pub fn dropped_responses(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }
}

/// A registered request awaiting its response.
///
/// Dropping it without waiting releases the slot.
pub struct PendingResponse {
    inner: Arc<Inner>,
    session: String,
    request_id: RequestId,
    rx: oneshot::Receiver<McpResponse>,
}

impl PendingResponse {
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub async fn wait(mut self) -> Result<McpResponse, SessionError> {
        match tokio::time::timeout(self.inner.timeout, &mut self.rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(SessionError::Closed {
                session: self.session.clone(),
            }),
            Err(_) => {
                self.inner.remove(&self.session, &self.request_id);
                // A response may have landed between the deadline and removal.
                if let Ok(response) = self.rx.try_recv() {
                    return Ok(response);
                }
                Err(SessionError::Timeout {
                    session: self.session.clone(),
                    request_id: self.request_id.clone(),
                    after: self.inner.timeout,
                })
            }
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.inner.remove(&self.session, &self.request_id);
    }
}
