//! Response routing.
//!
//! One reader task per live connection decodes inbound frames and hands each
//! one either to the caller waiting on its correlation id or to the bounded
//! inbox of unsolicited messages.

use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::time::Instant;

use vibecraft_core::{Error, Result};

use crate::transport::FrameStream;

// =============================================================================
// Pending Requests
// =============================================================================

/// Terminal failure recorded by the reader (or by teardown).
#[derive(Debug, Clone)]
pub(crate) enum Fault {
    Connection(String),
    Protocol(String),
}

impl Fault {
    fn to_error(&self) -> Error {
        match self {
            Fault::Connection(msg) => Error::connection(msg.clone()),
            Fault::Protocol(msg) => Error::protocol(msg.clone()),
        }
    }
}

#[derive(Default)]
struct PendingTable {
    waiting: HashSet<String>,
    ready: HashMap<String, Value>,
    fault: Option<Fault>,
}

/// Correlation state shared between the reader and the callers of one connection.
#[derive(Default)]
pub(crate) struct LinkShared {
    table: Mutex<PendingTable>,
    notify: Notify,
}

impl LinkShared {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, PendingTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark `id` as awaiting a response.
    pub(crate) fn register(&self, id: &str) -> Result<()> {
        let mut table = self.lock();
        if let Some(fault) = &table.fault {
            return Err(fault.to_error());
        }
        if table.waiting.contains(id) || table.ready.contains_key(id) {
            return Err(Error::internal(format!(
                "correlation id {} is already pending",
                id
            )));
        }
        table.waiting.insert(id.to_owned());
        Ok(())
    }

    /// Deliver a message carrying `id`. Returns it back when nobody waits for it.
    pub(crate) fn complete(&self, id: &str, message: Value) -> Option<Value> {
        {
            let mut table = self.lock();
            if !table.waiting.remove(id) {
                return Some(message);
            }
            table.ready.insert(id.to_owned(), message);
        }
        self.notify.notify_waiters();
        None
    }

    /// Record a terminal failure and wake every waiter. The first fault wins.
    pub(crate) fn fault(&self, fault: Fault) {
        {
            let mut table = self.lock();
            if table.fault.is_none() {
                table.fault = Some(fault);
            }
        }
        self.notify.notify_waiters();
    }

    pub(crate) fn is_faulted(&self) -> bool {
        self.lock().fault.is_some()
    }

    /// Drop any trace of `id`.
    pub(crate) fn forget(&self, id: &str) {
        let mut table = self.lock();
        table.waiting.remove(id);
        table.ready.remove(id);
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.lock().waiting.len()
    }

    /// Wait until the response for `id` arrives, a fault is recorded, or the deadline passes.
    pub(crate) async fn wait_for(&self, id: &str, deadline: Instant, message_type: &str) -> Result<Value> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // register interest before inspecting the table so no wakeup is lost
            notified.as_mut().enable();

            {
                let mut table = self.lock();
                if let Some(message) = table.ready.remove(id) {
                    return Ok(message);
                }
                if let Some(fault) = &table.fault {
                    return Err(fault.to_error());
                }
            }

            if Instant::now() >= deadline {
                return Err(Error::timeout(format!(
                    "Client bridge timed out waiting for response to {}",
                    message_type
                )));
            }

            let _ = tokio::time::timeout_at(deadline, notified).await;
        }
    }
}

/// Removes a correlation id from the table when the request finishes or is cancelled.
pub(crate) struct PendingGuard {
    shared: Arc<LinkShared>,
    id: String,
}

impl PendingGuard {
    pub(crate) fn new(shared: Arc<LinkShared>, id: String) -> Self {
        Self { shared, id }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.shared.forget(&self.id);
    }
}

// =============================================================================
// Inbox
// =============================================================================

/// Bounded FIFO of unsolicited messages; the oldest entry is evicted when full.
pub struct Inbox {
    capacity: usize,
    messages: Mutex<VecDeque<Value>>,
}

impl Inbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            messages: Mutex::new(VecDeque::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Value>> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a message. Returns true when an older message was evicted.
    pub fn push(&self, message: Value) -> bool {
        let mut messages = self.lock();
        messages.push_back(message);
        if messages.len() > self.capacity {
            messages.pop_front();
            return true;
        }
        false
    }

    /// Take every stored message, oldest first.
    pub fn drain(&self) -> Vec<Value> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

// =============================================================================
// Reader Loop
// =============================================================================

const MAX_LOGGED_FRAME: usize = 200;

fn preview(frame: &str) -> String {
    if frame.chars().count() <= MAX_LOGGED_FRAME {
        return frame.to_owned();
    }
    let head: String = frame.chars().take(MAX_LOGGED_FRAME).collect();
    format!("{}...", head)
}

/// Consume `stream` until it ends or yields something undecodable.
pub(crate) async fn run_reader(
    mut stream: Box<dyn FrameStream>,
    shared: Arc<LinkShared>,
    inbox: Arc<Inbox>,
) {
    loop {
        let frame = match stream.next_frame().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                let detail = match e {
                    Error::Connection(msg) => msg,
                    other => other.to_string(),
                };
                shared.fault(Fault::Connection(detail));
                return;
            }
            None => {
                shared.fault(Fault::Connection("Client bridge connection closed".into()));
                return;
            }
        };

        let message: Value = match serde_json::from_str(&frame) {
            Ok(message) => message,
            Err(_) => {
                tracing::warn!(frame = %preview(&frame), "Undecodable frame from client bridge");
                shared.fault(Fault::Protocol(format!(
                    "Invalid JSON response: {:?}",
                    preview(&frame)
                )));
                return;
            }
        };

        let id = message
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_owned);

        let unsolicited = match id {
            Some(id) => shared.complete(&id, message),
            None => Some(message),
        };

        if let Some(message) = unsolicited {
            tracing::debug!("Storing unsolicited client bridge message");
            if inbox.push(message) {
                vibecraft_governance::track_inbox_eviction();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_inbox_evicts_oldest() {
        let inbox = Inbox::new(3);
        for i in 0..5 {
            inbox.push(json!({ "n": i }));
        }
        let drained = inbox.drain();
        assert_eq!(drained, vec![json!({"n": 2}), json!({"n": 3}), json!({"n": 4})]);
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_complete_unknown_id_is_returned() {
        let shared = LinkShared::new();
        let msg = json!({"id": "nobody", "ok": true});
        assert_eq!(shared.complete("nobody", msg.clone()), Some(msg));
    }

    #[test]
    fn test_register_rejects_duplicate_id() {
        let shared = LinkShared::new();
        shared.register("a").unwrap();
        assert!(shared.register("a").is_err());
        shared.forget("a");
        assert!(shared.register("a").is_ok());
    }

    #[tokio::test]
    async fn test_wait_receives_completion() {
        let shared = Arc::new(LinkShared::new());
        shared.register("req-1").unwrap();

        let waiter = {
            let shared = shared.clone();
            tokio::spawn(async move {
                shared
                    .wait_for("req-1", Instant::now() + Duration::from_secs(5), "hello")
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert!(shared.complete("req-1", json!({"id": "req-1", "ok": true})).is_none());

        let message = waiter.await.unwrap().unwrap();
        assert_eq!(message["id"], "req-1");
        assert_eq!(shared.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_fault_wakes_waiters() {
        let shared = Arc::new(LinkShared::new());
        shared.register("req-1").unwrap();
        let waiter = {
            let shared = shared.clone();
            tokio::spawn(async move {
                shared
                    .wait_for("req-1", Instant::now() + Duration::from_secs(5), "hello")
                    .await
            })
        };
        tokio::task::yield_now().await;
        shared.fault(Fault::Protocol("Invalid JSON response".into()));

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(shared.register("req-2").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let shared = LinkShared::new();
        shared.register("req-1").unwrap();
        let err = shared
            .wait_for("req-1", Instant::now() + Duration::from_millis(50), "region.scan")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(err.to_string().contains("region.scan"));
    }
}
