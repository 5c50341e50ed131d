// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Calling remote services.
//!
//! A [`Connector`] offers two modes over one mechanism:
//!
//! - **single call** ([`Connector::connect`]): a typed client whose every
//!   method blocks until one response arrives or the call timeout elapses
//! - **streaming** ([`Connector::drpc`]): one request whose responses are all
//!   forwarded to a consumer until the returned registration is closed
//!
//! Each call gets a fresh correlation id and listens on its callback topic
//! `c/<correlation_id>`. Requests go to the broadcast topic of the operation,
//! or to the instance topic when an identifier is given.

use crate::codec::{CodecError, Value};
use crate::contract::{Invoker, Operation, RpcValue, ServiceContract};
use crate::error::{RpcError, RpcResult};
use crate::node::ClientInner;
use crate::packet::{response_body_types, RequestPacket, RESPONSE_HEADER};
use crate::registration::Registration;
use crate::runner::TaskKind;
use crossbeam::channel;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

/// Send one request and route every response for it to `on_response`.
///
/// Closing the returned registration stops routing and unsubscribes the
/// callback topic.
fn call<F>(
    inner: &Arc<ClientInner>,
    service: &'static str,
    identifier: Option<&str>,
    operation: &'static Operation,
    args: Vec<Value>,
    on_response: F,
) -> RpcResult<Registration>
where
    F: Fn(Value) + Send + Sync + 'static,
{
    let correlation_id = inner.next_correlation_id();
    let callback = inner.topics.callback(&correlation_id)?;
    let target = inner.topics.target(service, operation.name, identifier)?;
    let request = RequestPacket::new(inner.client_id.as_str(), correlation_id.as_str(), args);
    let payload = inner.packets.encode_request(&request)?;

    let body_types = response_body_types(operation.returns);
    let expected = correlation_id.clone();
    let weak = Arc::downgrade(inner);
    let route = inner.router.register(
        callback.as_str(),
        move |_topic: &str, bytes: &[u8]| -> RpcResult<()> {
            let inner = weak.upgrade().ok_or(RpcError::Shutdown)?;
            let response = inner.packets.decode_response(bytes, body_types)?;
            if response.correlation_id != expected {
                log::debug!(
                    "[client] ignoring response for '{}' on callback of '{}'",
                    response.correlation_id,
                    expected
                );
                return Ok(());
            }
            on_response(response.into_result());
            Ok(())
        },
    );

    let filters = vec![callback.into_string()];
    if let Err(e) = inner.subscribe(filters.clone()) {
        route.close();
        return Err(e);
    }

    let weak = Arc::downgrade(inner);
    let registration = Registration::new(move || {
        route.close();
        if let Some(inner) = weak.upgrade() {
            // Not awaited: close may run on the delivery thread.
            let transport = Arc::clone(&inner.transport);
            inner
                .runner
                .submit(TaskKind::Unsubscribe, move || transport.unsubscribe(&filters));
        }
    });

    log::debug!(
        "[client] {}.{} -> '{}' correlation_id='{}'",
        service,
        operation.name,
        target,
        correlation_id
    );
    if let Err(e) = inner.publish(target, payload) {
        registration.close();
        return Err(e);
    }
    Ok(registration)
}

/// Single-call invoker behind the typed client returned by
/// [`Connector::connect`].
pub struct Stub {
    inner: Arc<ClientInner>,
    service: &'static str,
    identifier: Option<String>,
}

impl Invoker for Stub {
    fn invoke(&self, operation: &'static Operation, args: Vec<Value>) -> RpcResult<Value> {
        let (tx, rx) = channel::bounded(1);
        let client_id = self.inner.client_id.clone();
        let registration = call(
            &self.inner,
            self.service,
            self.identifier.as_deref(),
            operation,
            args,
            move |value| {
                if tx.try_send(value).is_err() {
                    log::debug!(
                        "[client] client_id='{}' dropped duplicate response",
                        client_id
                    );
                }
            },
        )?;

        let outcome = rx.recv_timeout(self.inner.call_timeout());
        registration.close();

        outcome.map_err(|_| {
            log::warn!(
                "[client] {}.{} timed out after {:?}",
                self.service,
                operation.name,
                self.inner.call_timeout()
            );
            RpcError::Timeout
        })
    }
}

impl std::fmt::Debug for Stub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stub")
            .field("service", &self.service)
            .field("identifier", &self.identifier)
            .finish()
    }
}

/// One captured operation call.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub operation: &'static Operation,
    pub args: Vec<Value>,
}

/// Invoker that records calls instead of sending them.
///
/// Every call returns the default value of the operation's return type.
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Rc<RefCell<Vec<Invocation>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.borrow().is_empty()
    }

    /// Take the recorded calls, leaving the recorder empty.
    pub fn take(&self) -> Vec<Invocation> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }

    /// Run `invoker` against a recording client of `C` and return the single
    /// call it made.
    pub fn capture_one<C, F, R>(invoker: F) -> RpcResult<Invocation>
    where
        C: ServiceContract,
        F: FnOnce(C::Client<Recorder>) -> R,
    {
        let recorder = Recorder::new();
        let _ = invoker(C::client(recorder.clone()));

        let mut calls = recorder.take();
        if calls.len() != 1 {
            return Err(RpcError::InvalidCapture { count: calls.len() });
        }
        calls.pop().ok_or(RpcError::InvalidCapture { count: 0 })
    }
}

impl Invoker for Recorder {
    fn invoke(&self, operation: &'static Operation, args: Vec<Value>) -> RpcResult<Value> {
        self.calls.borrow_mut().push(Invocation { operation, args });
        Ok(operation.returns.default_value())
    }
}

/// Calls operations of contract `C` on remote instances.
pub struct Connector<C> {
    inner: Arc<ClientInner>,
    _contract: PhantomData<fn() -> C>,
}

impl<C: ServiceContract> Connector<C> {
    pub(crate) fn new(inner: Arc<ClientInner>) -> Self {
        Self {
            inner,
            _contract: PhantomData,
        }
    }

    /// Typed client making blocking single calls.
    ///
    /// With `identifier` the calls reach the instance published under it,
    /// otherwise every published instance receives them (the first response
    /// wins). Calls without a response fail with [`RpcError::Timeout`].
    pub fn connect(&self, identifier: Option<&str>) -> C::Client<Stub> {
        C::client(Stub {
            inner: Arc::clone(&self.inner),
            service: C::descriptor().name,
            identifier: identifier.map(str::to_string),
        })
    }

    /// Distributed call to every published instance.
    ///
    /// `invoker` must make exactly one call on the client it receives; that
    /// call is captured, not executed. Every response to the resulting
    /// request, duplicates included, is passed to `consumer` in delivery
    /// order until the returned registration is closed.
    pub fn drpc<F, R, T, K>(&self, invoker: F, consumer: K) -> RpcResult<Registration>
    where
        F: FnOnce(C::Client<Recorder>) -> R,
        T: RpcValue + 'static,
        K: Fn(T) + Send + Sync + 'static,
    {
        self.drpc_to(None, invoker, consumer)
    }

    /// [`drpc`](Self::drpc) addressed to one instance when `identifier` is given.
    pub fn drpc_to<F, R, T, K>(
        &self,
        identifier: Option<&str>,
        invoker: F,
        consumer: K,
    ) -> RpcResult<Registration>
    where
        F: FnOnce(C::Client<Recorder>) -> R,
        T: RpcValue + 'static,
        K: Fn(T) + Send + Sync + 'static,
    {
        let invocation = Recorder::capture_one::<C, F, R>(invoker)?;
        let operation = invocation.operation;
        if T::TYPE != operation.returns {
            return Err(CodecError::TypeMismatch {
                position: RESPONSE_HEADER.len(),
                expected: operation.returns,
                found: T::TYPE.name().to_string(),
            }
            .into());
        }

        call(
            &self.inner,
            C::descriptor().name,
            identifier,
            operation,
            invocation.args,
            move |value| match T::from_value(value) {
                Ok(result) => consumer(result),
                Err(e) => log::warn!("[client] dropping unconvertible response: {}", e),
            },
        )
    }
}

impl<C> Clone for Connector<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _contract: PhantomData,
        }
    }
}
