//! In-flight request table: id allocation, response matching and flush.

use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use {
    botch_protocol::ResponseFrame,
    tokio::sync::oneshot,
    tracing::{debug, trace},
};

use crate::error::{Error, Result};

/// Receives the outcome of one registered request.
pub type ResultReceiver = oneshot::Receiver<Result<serde_json::Value>>;

/// A request waiting for its response.
#[derive(Debug)]
pub struct PendingRequest {
    pub id: String,
    pub method: String,
    pub created_at: Instant,
    sender: oneshot::Sender<Result<serde_json::Value>>,
}

impl PendingRequest {
    fn complete(self, outcome: Result<serde_json::Value>) {
        // The caller may have given up already (timeout, dropped future).
        let _ = self.sender.send(outcome);
    }
}

#[derive(Debug, Default)]
struct Table {
    /// Registrations are only accepted while an authenticated socket exists.
    accepting: bool,
    entries: HashMap<String, PendingRequest>,
}

/// Pending-request table shared by the facade and the connection task.
///
/// Registration, removal and flush all go through one mutex, so a flush is a
/// single sweep: once it starts, no registration can slip in behind it.
#[derive(Debug)]
pub struct PendingRequests {
    next_id: AtomicU64,
    table: Mutex<Table>,
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            table: Mutex::new(Table::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate the next `req-<n>` id. Ids are never reused.
    pub fn next_id(&self) -> String {
        format!("req-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Start accepting registrations (connection authenticated).
    pub fn open(&self) {
        self.lock().accepting = true;
    }

    /// Register a new request for `method`.
    ///
    /// Fails with [`Error::NotConnected`] when no authenticated connection exists.
    pub fn register(&self, method: &str) -> Result<(String, ResultReceiver)> {
        let mut table = self.lock();
        if !table.accepting {
            return Err(Error::NotConnected);
        }

        let id = self.next_id();
        let (sender, receiver) = oneshot::channel();
        let previous = table.entries.insert(id.clone(), PendingRequest {
            id: id.clone(),
            method: method.to_string(),
            created_at: Instant::now(),
            sender,
        });
        debug_assert!(previous.is_none(), "request id reused: {id}");
        trace!(id = %id, method, "registered pending request");
        Ok((id, receiver))
    }

    /// Resolve the request matching `frame.id`.
    ///
    /// Returns `false` when no such request is pending (already timed out or
    /// flushed); the frame is then dropped.
    pub fn resolve(&self, frame: ResponseFrame) -> bool {
        let Some(pending) = self.remove(&frame.id) else {
            debug!(id = %frame.id, "dropping response for unknown request id");
            return false;
        };

        let outcome = if frame.ok {
            Ok(frame.payload.unwrap_or(serde_json::Value::Null))
        } else {
            let error = frame.error.unwrap_or_default();
            Err(Error::ServerRejected {
                message: error.message_or_default().to_string(),
                code: error.code,
                retryable: error.retryable.unwrap_or(false),
            })
        };
        debug!(
            id = %pending.id,
            method = %pending.method,
            ok = outcome.is_ok(),
            elapsed_ms = pending.created_at.elapsed().as_millis() as u64,
            "request completed"
        );
        pending.complete(outcome);
        true
    }

    /// Remove a request without resolving it.
    pub fn remove(&self, id: &str) -> Option<PendingRequest> {
        self.lock().entries.remove(id)
    }

    /// Stop accepting registrations and fail every pending request with
    /// `make_error()`. Returns the number of requests flushed.
    pub fn flush(&self, make_error: impl Fn() -> Error) -> usize {
        let drained = {
            let mut table = self.lock();
            table.accepting = false;
            std::mem::take(&mut table.entries)
        };
        let count = drained.len();
        for (_, pending) in drained {
            pending.complete(Err(make_error()));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().entries.contains_key(id)
    }
}

/// Removes a request from the table when the submitting future ends, however
/// it ends (resolved, timed out or dropped by the caller).
pub(crate) struct PendingGuard<'a> {
    pending: &'a PendingRequests,
    id: String,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(pending: &'a PendingRequests, id: String) -> Self {
        Self { pending, id }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.pending.remove(&self.id).is_some() {
            trace!(id = %self.id, "abandoned pending request removed");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        botch_protocol::{ErrorShape, error_codes},
        serde_json::json,
    };

    fn open_table() -> PendingRequests {
        let pending = PendingRequests::new();
        pending.open();
        pending
    }

    #[test]
    fn register_requires_open_table() {
        let pending = PendingRequests::new();
        assert_eq!(
            pending.register("cron.list").unwrap_err(),
            Error::NotConnected
        );
        assert!(pending.is_empty());
    }

    #[test]
    fn ids_are_monotonic_and_unique() {
        let pending = open_table();
        let (a, _ra) = pending.register("a").unwrap();
        let handshake = pending.next_id();
        let (b, _rb) = pending.register("b").unwrap();
        assert_eq!(a, "req-1");
        assert_eq!(handshake, "req-2");
        assert_eq!(b, "req-3");
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test]
    async fn resolves_success_payload() {
        let pending = open_table();
        let (id, rx) = pending.register("cron.list").unwrap();

        assert!(pending.resolve(ResponseFrame::ok(&id, json!({"jobs": []}))));
        assert_eq!(rx.await.unwrap().unwrap(), json!({"jobs": []}));
        assert!(!pending.contains(&id));
    }

    #[tokio::test]
    async fn ok_without_payload_resolves_null() {
        let pending = open_table();
        let (id, rx) = pending.register("health").unwrap();
        pending.resolve(ResponseFrame {
            id,
            ok: true,
            payload: None,
            error: None,
        });
        assert_eq!(rx.await.unwrap().unwrap(), serde_json::Value::Null);
    }

    #[tokio::test]
    async fn resolves_server_error() {
        let pending = open_table();
        let (id, rx) = pending.register("nope").unwrap();
        pending.resolve(ResponseFrame::err(
            &id,
            ErrorShape::new(error_codes::INVALID_REQUEST, "unknown method: nope"),
        ));
        assert_eq!(rx.await.unwrap().unwrap_err(), Error::ServerRejected {
            message: "unknown method: nope".into(),
            code: Some("INVALID_REQUEST".into()),
            retryable: false,
        });

        let (id, rx) = pending.register("nope").unwrap();
        pending.resolve(ResponseFrame {
            id,
            ok: false,
            payload: None,
            error: None,
        });
        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "request failed");
    }

    #[test]
    fn unknown_id_is_dropped() {
        let pending = open_table();
        let (_id, _rx) = pending.register("a").unwrap();
        assert!(!pending.resolve(ResponseFrame::ok("req-999", json!({}))));
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn flush_fails_all_and_closes() {
        let pending = open_table();
        let receivers: Vec<_> = (0..3)
            .map(|i| pending.register(&format!("m{i}")).unwrap().1)
            .collect();

        assert_eq!(pending.flush(|| Error::Disconnected), 3);
        assert!(pending.is_empty());
        for rx in receivers {
            assert_eq!(rx.await.unwrap().unwrap_err(), Error::Disconnected);
        }

        assert_eq!(pending.register("late").unwrap_err(), Error::NotConnected);
        // A second flush finds nothing.
        assert_eq!(pending.flush(|| Error::Disconnected), 0);
    }

    #[test]
    fn ids_not_recycled_after_flush() {
        let pending = open_table();
        let (first, _rx) = pending.register("a").unwrap();
        pending.flush(|| Error::Disconnected);
        pending.open();
        let (second, _rx) = pending.register("a").unwrap();
        assert_ne!(first, second);
        assert_eq!(second, "req-2");
    }

    #[test]
    fn guard_removes_abandoned_request() {
        let pending = open_table();
        let (id, _rx) = pending.register("slow").unwrap();
        {
            let _guard = PendingGuard::new(&pending, id.clone());
            assert!(pending.contains(&id));
        }
        assert!(!pending.contains(&id));
    }
}
