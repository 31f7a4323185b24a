// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The per-request async cursor: a bounded-in-spirit queue of chunks for
//! one `request_id`, an end-of-stream sentinel, and a one-shot `done`
//! signal, built on a `tokio::sync::mpsc` channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gremlin_types::{AggregateTo, Message};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::GremlinError;

/// What one chunk delivers to a draining `ResultSet`.
enum Item {
    Chunk(Message),
    Failed(GremlinError),
}

/// The one-shot "this requestId is fully resolved" event, shared between
/// the sender and consumer halves so more than one task can await it —
/// the `Connection` completion handler (releases the inflight permit) and
/// a `Host` release task (rotates `times_acquired`) both need to observe
/// the same signal.
#[derive(Clone)]
pub(crate) struct DoneSignal(Arc<DoneInner>);

struct DoneInner {
    done: AtomicBool,
    notify: tokio::sync::Notify,
}

impl DoneSignal {
    fn new() -> Self {
        Self(Arc::new(DoneInner {
            done: AtomicBool::new(false),
            notify: tokio::sync::Notify::new(),
        }))
    }

    /// Idempotent: only the first call wakes waiters.
    fn mark(&self) {
        if !self.0.done.swap(true, Ordering::AcqRel) {
            self.0.notify.notify_waiters();
        }
    }

    pub(crate) async fn wait(&self) {
        // The `Notified` future must be constructed before the flag check
        // so a `mark()` racing in between is not missed.
        let notified = self.0.notify.notified();
        if self.0.done.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }
}

/// The `Connection`-side handle used to feed a `ResultSet`. Not exported:
/// only the receive loop in `connection.rs` holds one of these.
pub(crate) struct ResultSetSender {
    tx: mpsc::UnboundedSender<Item>,
    aggregate_to: Arc<Mutex<Option<AggregateTo>>>,
    latched: Arc<AtomicBool>,
    done: DoneSignal,
}

impl ResultSetSender {
    /// Enqueues one chunk, latching `aggregate_to` from its meta on the
    /// first call only — it is set at most once per `ResultSet`.
    pub(crate) fn enqueue(&self, message: Message) {
        if !self.latched.swap(true, Ordering::AcqRel) {
            let aggregate_to = message.aggregate_to();
            // Best-effort: if the consumer side is already gone this lock
            // is uncontended and harmless to skip, but we still take it
            // because `try_lock` could spuriously fail under contention.
            if let Ok(mut slot) = self.aggregate_to.try_lock() {
                *slot = Some(aggregate_to);
            }
        }
        let _ = self.tx.send(Item::Chunk(message));
    }

    /// Fails the set with a terminal error (transport close, protocol
    /// error, or non-success status), ends the stream, and marks `done`.
    pub(crate) fn fail(&self, error: GremlinError) {
        let _ = self.tx.send(Item::Failed(error));
        self.done.mark();
    }

    /// Marks the set as fully resolved without failing it — the success
    /// path calls this once the final chunk (status 200/204) has been
    /// enqueued, dropping the sender right after so `one()`/`all()` see
    /// the channel close naturally.
    pub(crate) fn finish(&self) {
        self.done.mark();
    }
}

/// An async cursor over the chunks of one request.
///
/// `one()` drains buffered chunks first, then waits up to `timeout`;
/// `all()` drains everything. Receiving a non-success status or a
/// transport failure ends the set permanently — the next call to `one()`
/// observes the same terminal error until the set is dropped.
pub struct ResultSet {
    request_id: Uuid,
    rx: mpsc::UnboundedReceiver<Item>,
    aggregate_to: Arc<Mutex<Option<AggregateTo>>>,
    timeout: Option<Duration>,
    terminal: Option<GremlinError>,
    done: DoneSignal,
}

/// Builds a connected `(ResultSetSender, ResultSet)` pair for `request_id`.
pub(crate) fn channel(request_id: Uuid, timeout: Option<Duration>) -> (ResultSetSender, ResultSet) {
    let (tx, rx) = mpsc::unbounded_channel();
    let aggregate_to = Arc::new(Mutex::new(None));
    let done = DoneSignal::new();
    let sender = ResultSetSender {
        tx,
        aggregate_to: aggregate_to.clone(),
        latched: Arc::new(AtomicBool::new(false)),
        done: done.clone(),
    };
    let result_set = ResultSet {
        request_id,
        rx,
        aggregate_to,
        timeout,
        terminal: None,
        done,
    };
    (sender, result_set)
}

impl ResultSet {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Read-only after the first chunk arrives; `None` until then.
    pub async fn aggregate_to(&self) -> Option<AggregateTo> {
        self.aggregate_to.lock().await.clone()
    }

    /// Resolves once this request has reached its terminal state. Cloneable
    /// via [`Self::done_signal`] so more than one cleanup task (the
    /// `Connection` completion handler, a `Host` release task) can await
    /// the same signal.
    pub async fn done(&self) {
        self.done.wait().await;
    }

    pub(crate) fn done_signal(&self) -> DoneSignal {
        self.done.clone()
    }

    /// An owned, `'static` future that resolves once this request reaches
    /// its terminal state, independent of this `ResultSet`'s own lifetime.
    /// For cleanup tasks outside this crate (a `Client`'s per-request pool
    /// release task) that must run whether or not the caller ever drains
    /// the set.
    pub fn done_future(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let done = self.done.clone();
        async move { done.wait().await }
    }

    /// Returns the next message, or `None` once the set is exhausted.
    ///
    /// A non-success status or a transport failure is surfaced exactly
    /// once as `Err`, and every subsequent call returns that same error —
    /// Rust cannot raise on drop, so the error is latched instead.
    pub async fn one(&mut self) -> Result<Option<Message>, GremlinError> {
        if let Some(error) = &self.terminal {
            return Err(clone_error(error));
        }

        let item = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.rx.recv()).await {
                Ok(item) => item,
                Err(_) => {
                    self.terminal = Some(GremlinError::ResponseTimeout);
                    self.done.mark();
                    return Err(GremlinError::ResponseTimeout);
                }
            },
            None => self.rx.recv().await,
        };

        match item {
            None => Ok(None),
            Some(Item::Chunk(message)) => Ok(Some(message)),
            Some(Item::Failed(error)) => {
                let reported = clone_error(&error);
                self.terminal = Some(error);
                Err(reported)
            }
        }
    }

    /// Drains every remaining message.
    pub async fn all(&mut self) -> Result<Vec<Message>, GremlinError> {
        let mut messages = Vec::new();
        while let Some(message) = self.one().await? {
            messages.push(message);
        }
        Ok(messages)
    }
}

fn clone_error(error: &GremlinError) -> GremlinError {
    match error {
        GremlinError::Config(e) => GremlinError::Config(e.clone()),
        GremlinError::Client(e) => GremlinError::Client(e.clone()),
        GremlinError::Request(e) => GremlinError::Request(e.clone()),
        GremlinError::GremlinServer(e) => GremlinError::GremlinServer(e.clone()),
        GremlinError::ResponseTimeout => GremlinError::ResponseTimeout,
        GremlinError::PoolExhausted => GremlinError::PoolExhausted,
        GremlinError::Connect(_) => GremlinError::Connect(crate::ConnectError::Closed),
        GremlinError::Protocol(_) => {
            GremlinError::Client(crate::ClientError("protocol error (connection closed)".to_string()))
        }
    }
}
