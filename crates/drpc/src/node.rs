// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RPC client: the entry point tying transport, router and runner together.
//!
//! A [`Client`] owns one transport session. Inbound messages are routed by
//! topic to service handlers and pending calls; every outbound transport
//! operation goes through the task runner.
//!
//! # Example
//!
//! ```ignore
//! let broker = MemoryBroker::new();
//! let server = Client::builder().build(broker.transport())?;
//! let _service = server.publish::<CalculatorContract, _>("42", CalculatorService(Adder))?;
//!
//! let client = Client::builder().build(broker.transport())?;
//! let calc = client.connector::<CalculatorContract>().connect(Some("42"));
//! assert_eq!(calc.add(3, 4)?, 7);
//! ```

use crate::client::Connector;
use crate::codec::ValueCodec;
use crate::config::RpcConfig;
use crate::contract::{ServiceContract, ServiceHandler};
use crate::error::RpcResult;
use crate::packet::PacketCodec;
use crate::registration::Registration;
use crate::router::MessageRouter;
use crate::runner::{FailurePolicy, RetryLimit, TaskHandle, TaskKind, TaskRunner};
use crate::server;
use crate::topic::{Topic, TopicBuilder};
use crate::transport::{Transport, TransportError, TransportListener};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// State shared by the client, its connectors and its handlers.
pub(crate) struct ClientInner {
    pub(crate) client_id: String,
    pub(crate) config: RpcConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) router: MessageRouter,
    pub(crate) runner: TaskRunner,
    pub(crate) packets: PacketCodec,
    pub(crate) topics: TopicBuilder,
    sequence: AtomicU64,
}

impl ClientInner {
    /// Fresh correlation id, never reused by this client.
    pub(crate) fn next_correlation_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.client_id, seq)
    }

    pub(crate) fn call_timeout(&self) -> Duration {
        self.config.call_timeout()
    }

    /// Queue a publish without waiting for it. Failures are logged by the runner.
    pub(crate) fn submit_publish(&self, topic: Topic, payload: Vec<u8>) -> TaskHandle {
        let transport = Arc::clone(&self.transport);
        let qos = self.config.qos;
        self.runner.submit(TaskKind::Publish, move || {
            transport.publish(topic.as_str(), &payload, qos)
        })
    }

    pub(crate) fn publish(&self, topic: Topic, payload: Vec<u8>) -> RpcResult<()> {
        self.submit_publish(topic, payload).wait()
    }

    pub(crate) fn subscribe(&self, filters: Vec<String>) -> RpcResult<()> {
        let transport = Arc::clone(&self.transport);
        self.runner
            .run(TaskKind::Subscribe, move || transport.subscribe(&filters))
    }

    pub(crate) fn unsubscribe(&self, filters: Vec<String>) -> RpcResult<()> {
        let transport = Arc::clone(&self.transport);
        self.runner
            .run(TaskKind::Unsubscribe, move || transport.unsubscribe(&filters))
    }
}

/// Forwards transport callbacks to the router and the failure policy.
struct ListenerBridge {
    inner: Weak<ClientInner>,
}

impl TransportListener for ListenerBridge {
    fn on_message(&self, topic: &str, payload: &[u8]) {
        if let Some(inner) = self.inner.upgrade() {
            inner.router.dispatch(topic, payload);
        }
    }

    fn on_disconnect(&self, cause: &TransportError) {
        if let Some(inner) = self.inner.upgrade() {
            log::warn!(
                "[client] client_id='{}' lost connection: {}",
                inner.client_id,
                cause
            );
            inner.runner.policy().on_disconnect(cause);
        }
    }
}

/// Builder for [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    config: RpcConfig,
    client_id: Option<String>,
    policy: Option<Arc<dyn FailurePolicy>>,
    codec: Option<Arc<dyn ValueCodec>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: RpcConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the client id (otherwise from config, else a random UUID).
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Failure policy for transport tasks (default: [`RetryLimit`] with
    /// the configured `max_retries`).
    pub fn policy(mut self, policy: Arc<dyn FailurePolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Value codec (default: the configured codec kind).
    pub fn codec(mut self, codec: Arc<dyn ValueCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Build the client and connect `transport`.
    pub fn build<T: Transport + 'static>(self, transport: T) -> RpcResult<Client> {
        self.build_shared(Arc::new(transport))
    }

    /// Build over a transport shared with the caller.
    pub fn build_shared(self, transport: Arc<dyn Transport>) -> RpcResult<Client> {
        let mut config = self.config;
        if let Some(id) = self.client_id {
            config.client_id = Some(id);
        }
        config.validate()?;

        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let policy = self
            .policy
            .unwrap_or_else(|| Arc::new(RetryLimit::new(config.max_retries)));
        let codec = self.codec.unwrap_or_else(|| config.codec.build());

        log::info!(
            "[client] client_id='{}' workers={} codec={} qos={}",
            client_id,
            config.worker_threads,
            codec.name(),
            config.qos.level()
        );

        let inner = Arc::new(ClientInner {
            runner: TaskRunner::new(config.worker_threads, policy),
            router: MessageRouter::new(),
            packets: PacketCodec::new(codec),
            topics: TopicBuilder::new(),
            sequence: AtomicU64::new(0),
            transport,
            client_id,
            config,
        });
        inner.transport.set_listener(Arc::new(ListenerBridge {
            inner: Arc::downgrade(&inner),
        }));

        let client = Client { inner };
        client.connect()?;
        Ok(client)
    }
}

/// Handle to an RPC client. Clones share the same session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// (Re)connect the transport session through the runner.
    pub fn connect(&self) -> RpcResult<()> {
        let transport = Arc::clone(&self.inner.transport);
        let options = self.inner.config.connect_options(&self.inner.client_id);
        self.inner
            .runner
            .run(TaskKind::Connect, move || transport.connect(&options))
    }

    /// Publish `handler` as an instance of contract `C` under `identifier`.
    ///
    /// The instance answers on both the broadcast and the identifier topics
    /// of every operation until the returned registration is closed.
    pub fn publish<C, H>(&self, identifier: &str, handler: H) -> RpcResult<Registration>
    where
        C: ServiceContract,
        H: ServiceHandler,
    {
        server::publish::<C>(&self.inner, identifier, Arc::new(handler))
    }

    /// Connector for calling remote instances of contract `C`.
    pub fn connector<C: ServiceContract>(&self) -> Connector<C> {
        Connector::new(Arc::clone(&self.inner))
    }

    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    pub fn config(&self) -> &RpcConfig {
        &self.inner.config
    }

    pub fn router(&self) -> &MessageRouter {
        &self.inner.router
    }

    pub fn is_connected(&self) -> bool {
        self.inner.transport.is_connected()
    }

    /// Disconnect the transport session.
    ///
    /// Router registrations are kept. With a clean session the broker drops
    /// all subscriptions, so services must be published again after
    /// [`Client::connect`].
    pub fn disconnect(&self) -> RpcResult<()> {
        let transport = Arc::clone(&self.inner.transport);
        self.inner
            .runner
            .run(TaskKind::Disconnect, move || transport.disconnect())
    }

    /// Disconnect and stop the worker pool. Later calls fail with `TaskFailed`.
    pub fn close(&self) -> RpcResult<()> {
        let result = if self.is_connected() {
            self.disconnect()
        } else {
            Ok(())
        };
        self.inner.runner.shutdown();
        log::info!("[client] client_id='{}' closed", self.inner.client_id);
        result
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("client_id", &self.inner.client_id)
            .field("codec", &self.inner.packets.codec_name())
            .field("topics", &self.inner.router.topic_count())
            .finish()
    }
}
