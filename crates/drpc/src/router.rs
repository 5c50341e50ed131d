// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic-based message routing
//!
//! Maps topics to sets of handlers and fans every inbound message out to the
//! handlers registered for its topic.
//!
//! # Dispatch semantics
//! - The handler set is snapshotted before any handler runs; registrations
//!   made or closed by a handler affect only later dispatches.
//! - Each handler receives the same payload slice.
//! - A failing or panicking handler is logged and counted; the remaining
//!   handlers still run.
//! - Dispatching on a topic without handlers is a no-op.

use crate::error::RpcResult;
use crate::registration::Registration;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Receives messages dispatched on a topic.
///
/// # Thread Safety
/// Handlers run on whatever thread calls [`MessageRouter::dispatch`], which is
/// usually the transport's delivery thread.
pub trait MessageHandler: Send + Sync {
    /// Handle one message. Errors are logged by the router.
    fn on_message(&self, topic: &str, payload: &[u8]) -> RpcResult<()>;
}

impl<F> MessageHandler for F
where
    F: Fn(&str, &[u8]) -> RpcResult<()> + Send + Sync,
{
    fn on_message(&self, topic: &str, payload: &[u8]) -> RpcResult<()> {
        self(topic, payload)
    }
}

/// Counters updated by the router, relaxed ordering (observability only).
#[derive(Debug, Default)]
pub struct RouterMetrics {
    /// Messages delivered to at least one handler
    pub messages_dispatched: AtomicU64,
    /// Messages for topics without handlers
    pub messages_orphaned: AtomicU64,
    /// Handler invocations that returned an error or panicked
    pub handler_errors: AtomicU64,
}

impl RouterMetrics {
    /// (dispatched, orphaned, handler_errors)
    #[must_use]
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.messages_dispatched.load(Ordering::Relaxed),
            self.messages_orphaned.load(Ordering::Relaxed),
            self.handler_errors.load(Ordering::Relaxed),
        )
    }
}

struct Entry {
    id: u64,
    handler: Arc<dyn MessageHandler>,
}

type TopicMap = HashMap<String, Vec<Entry>>;

/// Topic → handlers multiplexer.
pub struct MessageRouter {
    topics: Arc<Mutex<TopicMap>>,
    next_id: AtomicU64,
    metrics: RouterMetrics,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            metrics: RouterMetrics::default(),
        }
    }

    /// Register `handler` for `topic`.
    ///
    /// Closing the returned registration removes exactly this handler; the
    /// topic entry disappears with its last handler.
    pub fn register<H>(&self, topic: impl Into<String>, handler: H) -> Registration
    where
        H: MessageHandler + 'static,
    {
        self.register_arc(topic, Arc::new(handler))
    }

    /// Register a shared handler. The same handler may be registered on
    /// several topics, or several times on one topic.
    pub fn register_arc(
        &self,
        topic: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Registration {
        let topic = topic.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut topics = self.topics.lock();
            let entries = topics.entry(topic.clone()).or_default();
            entries.push(Entry { id, handler });
            log::debug!(
                "[router] register topic='{}' id={} handlers={}",
                topic,
                id,
                entries.len()
            );
        }

        let topics: Weak<Mutex<TopicMap>> = Arc::downgrade(&self.topics);
        Registration::new(move || {
            if let Some(topics) = topics.upgrade() {
                unregister(&topics, &topic, id);
            }
        })
    }

    /// Deliver `payload` to every handler registered for `topic`.
    ///
    /// Returns the number of handlers invoked.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> usize {
        let snapshot: Vec<Arc<dyn MessageHandler>> = {
            let topics = self.topics.lock();
            match topics.get(topic) {
                Some(entries) => entries.iter().map(|e| Arc::clone(&e.handler)).collect(),
                None => Vec::new(),
            }
        };

        if snapshot.is_empty() {
            log::trace!("[router] no handlers for topic='{}'", topic);
            self.metrics.messages_orphaned.fetch_add(1, Ordering::Relaxed);
            return 0;
        }

        for handler in &snapshot {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler.on_message(topic, payload)
            }));

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.metrics.handler_errors.fetch_add(1, Ordering::Relaxed);
                    log::error!("[router] handler failed on topic='{}': {}", topic, e);
                }
                Err(_) => {
                    self.metrics.handler_errors.fetch_add(1, Ordering::Relaxed);
                    log::error!("[router] handler panicked on topic='{}'", topic);
                }
            }
        }

        self.metrics
            .messages_dispatched
            .fetch_add(1, Ordering::Relaxed);
        snapshot.len()
    }

    /// Number of topics with at least one handler.
    pub fn topic_count(&self) -> usize {
        self.topics.lock().len()
    }

    /// Number of handlers registered for `topic`.
    pub fn handler_count(&self, topic: &str) -> usize {
        self.topics.lock().get(topic).map_or(0, Vec::len)
    }

    pub fn metrics(&self) -> &RouterMetrics {
        &self.metrics
    }
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

fn unregister(topics: &Mutex<TopicMap>, topic: &str, id: u64) {
    let mut topics = topics.lock();
    let Some(entries) = topics.get_mut(topic) else {
        return;
    };
    entries.retain(|e| e.id != id);
    if entries.is_empty() {
        topics.remove(topic);
        log::debug!("[router] topic='{}' removed (last handler)", topic);
    } else {
        log::debug!(
            "[router] unregister topic='{}' id={} handlers={}",
            topic,
            id,
            entries.len()
        );
    }
}
