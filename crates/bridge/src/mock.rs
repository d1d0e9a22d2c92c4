//! In-memory connector for tests.
//!
//! Every request the bridge sends is recorded and handed to a responder
//! closure, whose replies are delivered in order (with optional delays) on
//! the same connection. Tests can also push unsolicited frames, sever the
//! connection, or make the next connects fail.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

use vibecraft_core::{Error, Result};

use crate::transport::{Connector, Duplex, FrameSink, FrameStream};

/// One frame the mock will deliver in reply to a request.
#[derive(Debug, Clone)]
pub struct MockReply {
    frame: String,
    delay: Duration,
}

impl MockReply {
    pub fn json(message: Value) -> Self {
        Self::raw(message.to_string())
    }

    /// Deliver `frame` verbatim, even when it is not JSON.
    pub fn raw(frame: impl Into<String>) -> Self {
        Self {
            frame: frame.into(),
            delay: Duration::ZERO,
        }
    }

    /// Wait `delay` (after the previous reply) before delivering.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// What the mock observed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Sent { id: String, message_type: String },
    Delivered { id: String },
}

type Responder = Arc<dyn Fn(&Value) -> Vec<MockReply> + Send + Sync>;

enum MockFrame {
    Text(String),
    Close,
}

#[derive(Default)]
struct MockState {
    connects: usize,
    fail_next: usize,
    stall_sends: bool,
    sent: Vec<Value>,
    events: Vec<MockEvent>,
    current: Option<mpsc::UnboundedSender<MockFrame>>,
}

/// Scripted client mod.
pub struct MockConnector {
    responder: Responder,
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&Value) -> Vec<MockReply> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Never answers.
    pub fn silent() -> Self {
        Self::new(|_| Vec::new())
    }

    /// Answers every request with `ok=true` and an empty result.
    pub fn echo() -> Self {
        Self::new(|request| {
            vec![MockReply::json(json!({
                "id": request["id"],
                "ok": true,
                "result": {}
            }))]
        })
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Deliver an unsolicited frame on the current connection.
    pub fn push(&self, message: Value) -> bool {
        let state = self.lock();
        match &state.current {
            Some(tx) => tx.send(MockFrame::Text(message.to_string())).is_ok(),
            None => false,
        }
    }

    /// Close the current connection from the peer side.
    pub fn sever(&self) {
        if let Some(tx) = self.lock().current.take() {
            let _ = tx.send(MockFrame::Close);
        }
    }

    /// Make the next `count` connect attempts fail.
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_next = count;
    }

    /// While set, writes never complete, like a peer that stopped reading.
    pub fn stall_sends(&self, stall: bool) {
        self.lock().stall_sends = stall;
    }

    /// Successful connects so far.
    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    /// Every request received, decoded.
    pub fn sent(&self) -> Vec<Value> {
        self.lock().sent.clone()
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.lock().events.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<Duplex> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut state = self.lock();
            if state.fail_next > 0 {
                state.fail_next -= 1;
                return Err(Error::connection("connection refused"));
            }
            state.connects += 1;
            state.current = Some(tx.clone());
        }
        Ok(Duplex {
            sink: Box::new(MockSink {
                responder: self.responder.clone(),
                state: self.state.clone(),
                tx,
            }),
            stream: Box::new(MockStream { rx }),
        })
    }

    fn endpoint(&self) -> String {
        "mock://client".to_owned()
    }
}

struct MockSink {
    responder: Responder,
    state: Arc<Mutex<MockState>>,
    tx: mpsc::UnboundedSender<MockFrame>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        if self.tx.is_closed() {
            return Err(Error::connection("mock connection closed"));
        }
        let stalled = self
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .stall_sends;
        if stalled {
            std::future::pending::<()>().await;
        }
        let request: Value = serde_json::from_str(&text)?;
        let id = request["id"].as_str().unwrap_or_default().to_owned();
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.events.push(MockEvent::Sent {
                id: id.clone(),
                message_type: request["type"].as_str().unwrap_or_default().to_owned(),
            });
            state.sent.push(request.clone());
        }

        let replies = (self.responder)(&request);
        let tx = self.tx.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            for reply in replies {
                if !reply.delay.is_zero() {
                    tokio::time::sleep(reply.delay).await;
                }
                state
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .events
                    .push(MockEvent::Delivered { id: id.clone() });
                if tx.send(MockFrame::Text(reply.frame)).is_err() {
                    break;
                }
            }
        });
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let _ = self.tx.send(MockFrame::Close);
        Ok(())
    }
}

struct MockStream {
    rx: mpsc::UnboundedReceiver<MockFrame>,
}

#[async_trait]
impl FrameStream for MockStream {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        match self.rx.recv().await? {
            MockFrame::Text(text) => Some(Ok(text)),
            MockFrame::Close => None,
        }
    }
}
