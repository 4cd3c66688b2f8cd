//! Peer-to-peer messaging between agent tasks.
//!
//! While a workflow runs, tasks (and embedding applications holding the run
//! handle) can exchange [`AgentMessage`]s through one [`MessageBus`] per run.
//! Every recipient id owns a mailbox, a bounded FIFO queue created lazily by
//! the first targeted publish or subscribe, and pre-created for every task id
//! when a run starts so that broadcasts reach tasks that have not begun yet.
//! Targeted messages land in one mailbox; broadcasts fan out to every mailbox
//! at delivery time. The bus keeps a publish-ordered history of everything it
//! accepted.
//!
//! A slow reader never blocks a publisher: on overflow the mailbox drops its
//! oldest undelivered message and a `message_dropped` diagnostic (a synthetic
//! bus-origin message) is appended to history.
//!
//! When the run's configuration disables communication the bus still exists
//! but every operation is a no-op and subscriptions finish immediately, so
//! callers need no special casing.
//!
//! # Example
//!
//! ```rust
//! use taskwave::message_bus::{MessageBus, MessageKind};
//!
//! let bus = MessageBus::new(true, 8);
//!
//! // Publishing to a recipient nobody has subscribed yet still queues:
//! bus.publish("scout", Some("analyst"), MessageKind::Data,
//!             serde_json::json!({"finding": "two rival approaches"}));
//! bus.broadcast("scout", serde_json::json!({"status": "done"}));
//!
//! let mut sub = bus.subscribe("analyst");
//! assert_eq!(sub.drain().len(), 2);
//! assert_eq!(bus.history().len(), 2);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// What a message means to its recipient. The orchestrator never interprets
/// `content`; the kind is routing metadata for the agents themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// A one-way payload.
    Data,
    /// Asks the recipient for something.
    Request,
    /// Answers an earlier request.
    Response,
    /// Fan-out to every mailbox.
    Broadcast,
}

/// One bus payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Sender: an agent name or task id. The bus reserves `"bus"` for its
    /// own diagnostics.
    pub from: String,
    /// Recipient; `None` means broadcast.
    pub to: Option<String>,
    /// Routing kind.
    pub kind: MessageKind,
    /// Opaque structured payload.
    pub content: serde_json::Value,
    /// When the bus accepted the message.
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone)]
struct Mailbox {
    queue: Arc<Mutex<VecDeque<AgentMessage>>>,
    notify: Arc<Notify>,
}

impl Mailbox {
    fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
        }
    }
}

struct BusState {
    history: Vec<AgentMessage>,
    mailboxes: HashMap<String, Mailbox>,
}

/// One run's message switchboard. See the module docs for semantics.
pub struct MessageBus {
    enabled: bool,
    capacity: usize,
    open: AtomicBool,
    closed: Arc<AtomicBool>,
    state: Mutex<BusState>,
}

/// Receiving side of [`MessageBus::subscribe`].
///
/// Yields messages directed to the subscriber or broadcast, in publish order.
/// [`recv`](Subscription::recv) returns `None` once the bus has closed and
/// the mailbox is drained, which is the finite end of the sequence. Subscriptions to
/// the same id share one mailbox, so concurrent readers compete rather than
/// duplicate.
pub struct Subscription {
    mailbox: Mailbox,
    closed: Arc<AtomicBool>,
}

impl Subscription {
    /// Next message, waiting if none is queued yet. `None` means the bus
    /// closed and nothing further will arrive.
    pub async fn recv(&mut self) -> Option<AgentMessage> {
        loop {
            if let Some(message) = self.try_recv() {
                return Some(message);
            }
            // Register the waiter before the closed re-check: close() uses
            // notify_waiters(), which reaches only already-registered
            // waiters and stores no permit for late arrivals.
            let notified = self.mailbox.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(message) = self.try_recv() {
                return Some(message);
            }
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            notified.await;
        }
    }

    /// Next message if one is already queued.
    pub fn try_recv(&self) -> Option<AgentMessage> {
        self.mailbox.queue.lock().unwrap().pop_front()
    }

    /// Drain everything currently queued without waiting.
    pub fn drain(&mut self) -> Vec<AgentMessage> {
        let mut queue = self.mailbox.queue.lock().unwrap();
        queue.drain(..).collect()
    }
}

impl MessageBus {
    /// Create a bus. `enabled = false` produces the inert variant used when
    /// a run disables communication; `capacity` bounds each mailbox.
    pub fn new(enabled: bool, capacity: usize) -> Self {
        Self {
            enabled,
            capacity,
            open: AtomicBool::new(true),
            closed: Arc::new(AtomicBool::new(!enabled)),
            state: Mutex::new(BusState {
                history: Vec::new(),
                mailboxes: HashMap::new(),
            }),
        }
    }

    /// True when publishes are currently accepted.
    pub fn is_open(&self) -> bool {
        self.enabled && self.open.load(Ordering::SeqCst)
    }

    /// Ensure a mailbox exists for `who` so that broadcasts published before
    /// `who` subscribes are retained. The scheduler registers every task id
    /// when a run starts. No-op on a disabled or closed bus.
    pub fn register(&self, who: &str) {
        if !self.is_open() {
            return;
        }
        let mut state = self.state.lock().unwrap();
        state
            .mailboxes
            .entry(who.to_string())
            .or_insert_with(Mailbox::new);
    }

    /// Attach to `who`'s mailbox, creating it if needed. Everything already
    /// queued there (since [`register`](MessageBus::register) or the first
    /// targeted publish) is readable immediately.
    ///
    /// On a disabled or closed bus the subscription is born finished.
    pub fn subscribe(&self, who: impl Into<String>) -> Subscription {
        let who = who.into();
        let mailbox = if self.is_open() {
            let mut state = self.state.lock().unwrap();
            state
                .mailboxes
                .entry(who)
                .or_insert_with(Mailbox::new)
                .clone()
        } else {
            Mailbox::new()
        };

        Subscription {
            mailbox,
            closed: self.closed.clone(),
        }
    }

    /// Publish a message. Returns whether the bus accepted it (it refuses
    /// when disabled or closed). Never blocks: overflowing mailboxes drop
    /// their oldest undelivered message.
    pub fn publish(
        &self,
        from: impl Into<String>,
        to: Option<&str>,
        kind: MessageKind,
        content: serde_json::Value,
    ) -> bool {
        if !self.is_open() {
            return false;
        }
        let message = AgentMessage {
            from: from.into(),
            to: to.map(str::to_string),
            kind,
            content,
            timestamp: Utc::now(),
        };

        let mut state = self.state.lock().unwrap();
        state.history.push(message.clone());

        if let Some(recipient) = message.to.clone() {
            let mailbox = state
                .mailboxes
                .entry(recipient.clone())
                .or_insert_with(Mailbox::new)
                .clone();
            if let Some(diagnostic) = deliver(&mailbox, &recipient, &message, self.capacity) {
                state.history.push(diagnostic);
            }
        } else {
            let mailboxes: Vec<(String, Mailbox)> = state
                .mailboxes
                .iter()
                .map(|(who, mailbox)| (who.clone(), mailbox.clone()))
                .collect();
            for (who, mailbox) in mailboxes {
                if let Some(diagnostic) = deliver(&mailbox, &who, &message, self.capacity) {
                    state.history.push(diagnostic);
                }
            }
        }
        true
    }

    /// Shorthand for a broadcast-kind message with no recipient.
    pub fn broadcast(&self, from: impl Into<String>, content: serde_json::Value) -> bool {
        self.publish(from, None, MessageKind::Broadcast, content)
    }

    /// Every message accepted so far, in publish order, including
    /// `message_dropped` diagnostics.
    pub fn history(&self) -> Vec<AgentMessage> {
        if !self.enabled {
            return Vec::new();
        }
        self.state.lock().unwrap().history.clone()
    }

    /// Stop accepting publishes and finish every subscription once its
    /// mailbox drains. Called by the orchestrator when the run reaches a
    /// terminal event; idempotent.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        for mailbox in state.mailboxes.values() {
            // Readers of one id share a mailbox, so several may be parked
            // on the same Notify; all of them must observe the close.
            mailbox.notify.notify_waiters();
        }
    }
}

/// Push into one mailbox, evicting the oldest entry on overflow. Returns the
/// `message_dropped` diagnostic to append to history when eviction happened.
fn deliver(
    mailbox: &Mailbox,
    who: &str,
    message: &AgentMessage,
    capacity: usize,
) -> Option<AgentMessage> {
    let mut queue = mailbox.queue.lock().unwrap();
    let mut diagnostic = None;
    if queue.len() >= capacity {
        if let Some(dropped) = queue.pop_front() {
            log::warn!(
                "message bus: mailbox for '{}' full, dropping message from '{}'",
                who,
                dropped.from
            );
            diagnostic = Some(AgentMessage {
                from: "bus".to_string(),
                to: Some(who.to_string()),
                kind: MessageKind::Data,
                content: serde_json::json!({
                    "message_dropped": {
                        "mailbox": who,
                        "from": dropped.from,
                        "kind": dropped.kind,
                    }
                }),
                timestamp: Utc::now(),
            });
        }
    }
    queue.push_back(message.clone());
    drop(queue);
    mailbox.notify.notify_one();
    diagnostic
}
