// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process broker transport.
//!
//! [`MemoryBroker`] routes published messages to every connected session
//! holding a matching filter. Each [`MemoryTransport`] owns one session and
//! a delivery thread that hands inbound messages to its listener, so the
//! threading matches a network client: publishes return immediately and
//! handlers run on the transport's own thread.
//!
//! Test hooks:
//! - [`MemoryTransport::fail_next`] makes the next N operations of a kind fail
//! - [`MemoryBroker::set_duplicate_deliveries`] delivers every message twice
//! - [`MemoryBroker::drop_session`] simulates a lost connection

use super::{topic_matches, ConnectOptions, QosLevel, Transport, TransportError, TransportListener};
use crate::runner::TaskKind;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

enum Delivery {
    Message { topic: Arc<str>, payload: Arc<[u8]> },
    Disconnected(TransportError),
}

struct Session {
    client_id: String,
    filters: Vec<String>,
    sender: Sender<Delivery>,
}

#[derive(Default)]
struct BrokerInner {
    sessions: Mutex<HashMap<u64, Session>>,
    next_session: AtomicU64,
    duplicate_deliveries: AtomicBool,
    published: AtomicU64,
    delivered: AtomicU64,
}

/// Shared in-process broker. Clones refer to the same broker.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<BrokerInner>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// New unconnected transport attached to this broker.
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport::new(self.clone())
    }

    /// Deliver every message twice (at-least-once retransmission).
    pub fn set_duplicate_deliveries(&self, enabled: bool) {
        self.inner
            .duplicate_deliveries
            .store(enabled, Ordering::Relaxed);
    }

    /// Publish from outside any session.
    pub fn inject(&self, topic: &str, payload: &[u8]) {
        self.route(topic, payload);
    }

    /// Drop every session of `client_id` as if the network failed.
    ///
    /// Returns the number of sessions dropped.
    pub fn drop_session(&self, client_id: &str) -> usize {
        let dropped: Vec<Session> = {
            let mut sessions = self.inner.sessions.lock();
            let ids: Vec<u64> = sessions
                .iter()
                .filter(|(_, s)| s.client_id == client_id)
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for session in &dropped {
            log::info!("[memory] dropping session client_id='{}'", session.client_id);
            let _ = session
                .sender
                .send(Delivery::Disconnected(TransportError::Io(
                    "connection lost".to_string(),
                )));
        }
        dropped.len()
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    /// Messages published through the broker.
    pub fn published_count(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// Messages handed to sessions (one per matching session per copy).
    pub fn delivered_count(&self) -> u64 {
        self.inner.delivered.load(Ordering::Relaxed)
    }

    fn open_session(&self, client_id: &str) -> (u64, Receiver<Delivery>) {
        let (sender, receiver) = channel::unbounded();
        let id = self.inner.next_session.fetch_add(1, Ordering::Relaxed);
        self.inner.sessions.lock().insert(
            id,
            Session {
                client_id: client_id.to_string(),
                filters: Vec::new(),
                sender,
            },
        );
        (id, receiver)
    }

    fn close_session(&self, session: u64) -> bool {
        self.inner.sessions.lock().remove(&session).is_some()
    }

    fn has_session(&self, session: u64) -> bool {
        self.inner.sessions.lock().contains_key(&session)
    }

    fn subscribe(&self, session: u64, filters: &[String]) -> Result<(), TransportError> {
        let mut sessions = self.inner.sessions.lock();
        let entry = sessions
            .get_mut(&session)
            .ok_or(TransportError::NotConnected)?;
        for filter in filters {
            if !entry.filters.contains(filter) {
                entry.filters.push(filter.clone());
            }
        }
        Ok(())
    }

    fn unsubscribe(&self, session: u64, filters: &[String]) -> Result<(), TransportError> {
        let mut sessions = self.inner.sessions.lock();
        let entry = sessions
            .get_mut(&session)
            .ok_or(TransportError::NotConnected)?;
        entry.filters.retain(|f| !filters.contains(f));
        Ok(())
    }

    fn route(&self, topic: &str, payload: &[u8]) {
        self.inner.published.fetch_add(1, Ordering::Relaxed);
        let copies = if self.inner.duplicate_deliveries.load(Ordering::Relaxed) {
            2
        } else {
            1
        };
        let topic: Arc<str> = Arc::from(topic);
        let payload: Arc<[u8]> = Arc::from(payload);

        let sessions = self.inner.sessions.lock();
        for session in sessions.values() {
            if !session.filters.iter().any(|f| topic_matches(f, &topic)) {
                continue;
            }
            for _ in 0..copies {
                let delivery = Delivery::Message {
                    topic: Arc::clone(&topic),
                    payload: Arc::clone(&payload),
                };
                if session.sender.send(delivery).is_ok() {
                    self.inner.delivered.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}

struct Connection {
    session: u64,
    thread: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct TransportInner {
    connection: Mutex<Option<Connection>>,
    listener: RwLock<Option<Arc<dyn TransportListener>>>,
    faults: Mutex<HashMap<TaskKind, (u32, TransportError)>>,
}

impl TransportInner {
    fn check_fault(&self, kind: TaskKind) -> Result<(), TransportError> {
        let mut faults = self.faults.lock();
        if let Some((remaining, error)) = faults.get_mut(&kind) {
            if *remaining > 0 {
                *remaining -= 1;
                log::debug!("[memory] injected {} failure: {}", kind, error);
                return Err(error.clone());
            }
        }
        Ok(())
    }
}

/// Client session on a [`MemoryBroker`].
pub struct MemoryTransport {
    broker: MemoryBroker,
    inner: Arc<TransportInner>,
}

impl MemoryTransport {
    pub fn new(broker: MemoryBroker) -> Self {
        Self {
            broker,
            inner: Arc::new(TransportInner::default()),
        }
    }

    pub fn broker(&self) -> &MemoryBroker {
        &self.broker
    }

    /// Make the next `count` operations of `kind` fail with `error`.
    pub fn fail_next(&self, kind: TaskKind, count: u32, error: TransportError) {
        self.inner.faults.lock().insert(kind, (count, error));
    }

    fn session(&self) -> Result<u64, TransportError> {
        self.inner
            .connection
            .lock()
            .as_ref()
            .map(|c| c.session)
            .filter(|s| self.broker.has_session(*s))
            .ok_or(TransportError::NotConnected)
    }
}

impl Transport for MemoryTransport {
    fn connect(&self, options: &ConnectOptions) -> Result<(), TransportError> {
        self.inner.check_fault(TaskKind::Connect)?;

        let mut connection = self.inner.connection.lock();
        if let Some(existing) = connection.as_ref() {
            if self.broker.has_session(existing.session) {
                return Ok(());
            }
            // Dropped by the broker. The old delivery thread may still be in
            // on_disconnect waiting on this connect, so it is detached.
            log::debug!(
                "[memory] replacing dropped session={}",
                existing.session
            );
        }

        let (session, receiver) = self.broker.open_session(&options.client_id);
        let inner = Arc::clone(&self.inner);
        let thread = thread::Builder::new()
            .name(format!("drpc-memory-{}", session))
            .spawn(move || delivery_loop(&inner, &receiver))?;

        log::debug!(
            "[memory] connected client_id='{}' session={} keep_alive={:?}",
            options.client_id,
            session,
            options.keep_alive
        );
        *connection = Some(Connection {
            session,
            thread: Some(thread),
        });
        Ok(())
    }

    fn publish(&self, topic: &str, payload: &[u8], qos: QosLevel) -> Result<(), TransportError> {
        self.inner.check_fault(TaskKind::Publish)?;
        self.session()?;
        log::trace!(
            "[memory] publish topic='{}' len={} qos={}",
            topic,
            payload.len(),
            qos.level()
        );
        self.broker.route(topic, payload);
        Ok(())
    }

    fn subscribe(&self, filters: &[String]) -> Result<(), TransportError> {
        self.inner.check_fault(TaskKind::Subscribe)?;
        self.broker.subscribe(self.session()?, filters)
    }

    fn unsubscribe(&self, filters: &[String]) -> Result<(), TransportError> {
        self.inner.check_fault(TaskKind::Unsubscribe)?;
        self.broker.unsubscribe(self.session()?, filters)
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        self.inner.check_fault(TaskKind::Disconnect)?;

        let Some(mut connection) = self.inner.connection.lock().take() else {
            return Ok(());
        };
        let was_open = self.broker.close_session(connection.session);

        // Closing the session dropped its sender, so the thread drains and exits.
        // A session dropped by the broker leaves its thread in on_disconnect,
        // which may be waiting on this call; that thread is detached.
        if let Some(thread) = connection.thread.take() {
            if was_open && thread.thread().id() != thread::current().id() {
                let _ = thread.join();
            }
        }
        log::debug!("[memory] disconnected session={}", connection.session);
        Ok(())
    }

    fn set_listener(&self, listener: Arc<dyn TransportListener>) {
        *self.inner.listener.write() = Some(listener);
    }

    fn is_connected(&self) -> bool {
        self.session().is_ok()
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

fn delivery_loop(inner: &TransportInner, receiver: &Receiver<Delivery>) {
    while let Ok(delivery) = receiver.recv() {
        let listener = inner.listener.read().clone();
        match delivery {
            Delivery::Message { topic, payload } => {
                if let Some(listener) = listener {
                    listener.on_message(&topic, &payload);
                }
            }
            Delivery::Disconnected(cause) => {
                if let Some(listener) = listener {
                    listener.on_disconnect(&cause);
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Collect {
        messages: Sender<(String, Vec<u8>)>,
        disconnects: Sender<TransportError>,
    }

    impl TransportListener for Collect {
        fn on_message(&self, topic: &str, payload: &[u8]) {
            let _ = self.messages.send((topic.to_string(), payload.to_vec()));
        }

        fn on_disconnect(&self, cause: &TransportError) {
            let _ = self.disconnects.send(cause.clone());
        }
    }

    fn connected(
        broker: &MemoryBroker,
        client_id: &str,
    ) -> (
        MemoryTransport,
        Receiver<(String, Vec<u8>)>,
        Receiver<TransportError>,
    ) {
        let transport = broker.transport();
        let (messages, message_rx) = channel::unbounded();
        let (disconnects, disconnect_rx) = channel::unbounded();
        transport.set_listener(Arc::new(Collect {
            messages,
            disconnects,
        }));
        transport.connect(&ConnectOptions::new(client_id)).unwrap();
        (transport, message_rx, disconnect_rx)
    }

    const WAIT: Duration = Duration::from_secs(2);

    #[test]
    fn publish_reaches_matching_subscriber() {
        let broker = MemoryBroker::new();
        let (sub, rx, _) = connected(&broker, "sub");
        let (publisher, _, _) = connected(&broker, "pub");

        sub.subscribe(&["s/Calc/#".to_string()]).unwrap();
        publisher
            .publish("s/Calc/add/42", b"hello", QosLevel::AtLeastOnce)
            .unwrap();
        publisher
            .publish("c/other", b"ignored", QosLevel::AtLeastOnce)
            .unwrap();

        let (topic, payload) = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(topic, "s/Calc/add/42");
        assert_eq!(payload, b"hello");
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn overlapping_filters_deliver_once() {
        let broker = MemoryBroker::new();
        let (sub, rx, _) = connected(&broker, "sub");
        sub.subscribe(&["s/Calc/add".to_string(), "s/Calc/#".to_string()])
            .unwrap();

        broker.inject("s/Calc/add", b"x");
        rx.recv_timeout(WAIT).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn duplicate_deliveries() {
        let broker = MemoryBroker::new();
        broker.set_duplicate_deliveries(true);
        let (sub, rx, _) = connected(&broker, "sub");
        sub.subscribe(&["c/1".to_string()]).unwrap();

        broker.inject("c/1", b"x");
        rx.recv_timeout(WAIT).unwrap();
        rx.recv_timeout(WAIT).unwrap();
        assert_eq!(broker.delivered_count(), 2);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let broker = MemoryBroker::new();
        let (sub, rx, _) = connected(&broker, "sub");
        let filters = vec!["c/1".to_string()];
        sub.subscribe(&filters).unwrap();
        sub.unsubscribe(&filters).unwrap();

        broker.inject("c/1", b"x");
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn operations_require_connection() {
        let broker = MemoryBroker::new();
        let transport = broker.transport();
        assert_eq!(
            transport.publish("c/1", b"x", QosLevel::AtMostOnce),
            Err(TransportError::NotConnected)
        );
        assert_eq!(
            transport.subscribe(&["c/1".to_string()]),
            Err(TransportError::NotConnected)
        );
        assert!(!transport.is_connected());
    }

    #[test]
    fn injected_failures_are_consumed() {
        let broker = MemoryBroker::new();
        let (transport, _, _) = connected(&broker, "c");
        transport.fail_next(TaskKind::Publish, 2, TransportError::Busy);

        assert_eq!(
            transport.publish("t", b"", QosLevel::ExactlyOnce),
            Err(TransportError::Busy)
        );
        assert_eq!(
            transport.publish("t", b"", QosLevel::ExactlyOnce),
            Err(TransportError::Busy)
        );
        assert!(transport.publish("t", b"", QosLevel::ExactlyOnce).is_ok());
    }

    #[test]
    fn dropped_session_notifies_listener() {
        let broker = MemoryBroker::new();
        let (transport, _, disconnects) = connected(&broker, "victim");

        assert_eq!(broker.drop_session("victim"), 1);
        let cause = disconnects.recv_timeout(WAIT).unwrap();
        assert!(matches!(cause, TransportError::Io(_)));
        assert!(!transport.is_connected());

        // Reconnect opens a fresh session.
        transport.connect(&ConnectOptions::new("victim")).unwrap();
        assert!(transport.is_connected());
        assert_eq!(broker.session_count(), 1);
    }

    #[test]
    fn disconnect_closes_session() {
        let broker = MemoryBroker::new();
        let (transport, _, _) = connected(&broker, "c");
        assert_eq!(broker.session_count(), 1);

        transport.disconnect().unwrap();
        transport.disconnect().unwrap();
        assert_eq!(broker.session_count(), 0);
    }
}
