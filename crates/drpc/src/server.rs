// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service publishing.
//!
//! Every operation of a published contract is served on two topics, the
//! broadcast topic `s/<service>/<op>` and the instance topic
//! `s/<service>/<op>/<identifier>`. Requests are decoded against the
//! operation's parameter types, invoked, and answered on the callback topic
//! of their correlation id.
//!
//! Requests that fail to decode or whose invocation fails are logged by the
//! router and left unanswered; the caller sees a timeout.

use crate::contract::{ContractDescriptor, Operation, ServiceContract, ServiceHandler};
use crate::error::{RpcError, RpcResult};
use crate::node::ClientInner;
use crate::packet::ResponsePacket;
use crate::registration::Registration;
use crate::router::MessageHandler;
use std::sync::{Arc, Weak};

/// Answers requests for one operation of a published instance.
struct RequestHandler {
    service: &'static str,
    operation: &'static Operation,
    handler: Arc<dyn ServiceHandler>,
    inner: Weak<ClientInner>,
}

impl MessageHandler for RequestHandler {
    fn on_message(&self, _topic: &str, payload: &[u8]) -> RpcResult<()> {
        let inner = self.inner.upgrade().ok_or(RpcError::Shutdown)?;

        let request = inner
            .packets
            .decode_request(payload, self.operation.params)?;
        log::debug!(
            "[server] {}.{} from client_id='{}' correlation_id='{}'",
            self.service,
            self.operation.name,
            request.client_id,
            request.correlation_id
        );

        let result = self.handler.invoke(self.operation, request.body)?;
        let response = if self.operation.is_void() {
            ResponsePacket::empty(request.correlation_id)
        } else {
            ResponsePacket::with_result(request.correlation_id, result)
        };

        let callback = inner.topics.callback(&response.correlation_id)?;
        let payload = inner.packets.encode_response(&response)?;
        inner.submit_publish(callback, payload);
        Ok(())
    }
}

/// Register `handler` as an instance of `C` and subscribe to its topics.
pub(crate) fn publish<C: ServiceContract>(
    inner: &Arc<ClientInner>,
    identifier: &str,
    handler: Arc<dyn ServiceHandler>,
) -> RpcResult<Registration> {
    let descriptor: &'static ContractDescriptor = C::descriptor();

    let mut routes = Vec::with_capacity(descriptor.operations.len());
    for operation in descriptor.operations {
        let broadcast = inner.topics.operation(descriptor.name, operation.name)?;
        let instance = inner
            .topics
            .operation_with_id(descriptor.name, operation.name, identifier)?;
        routes.push((operation, broadcast, instance));
    }

    let mut registrations = Vec::with_capacity(routes.len() * 2);
    let mut topics = Vec::with_capacity(routes.len() * 2);
    for (operation, broadcast, instance) in routes {
        let request_handler: Arc<dyn MessageHandler> = Arc::new(RequestHandler {
            service: descriptor.name,
            operation,
            handler: Arc::clone(&handler),
            inner: Arc::downgrade(inner),
        });
        for topic in [instance, broadcast] {
            registrations.push(
                inner
                    .router
                    .register_arc(topic.as_str(), Arc::clone(&request_handler)),
            );
            topics.push(topic.into_string());
        }
    }
    let routes = Registration::all(registrations);

    if let Err(e) = inner.subscribe(topics.clone()) {
        routes.close();
        return Err(e);
    }
    log::info!(
        "[server] published {} as '{}' ({} topics)",
        descriptor.name,
        identifier,
        topics.len()
    );

    let weak = Arc::downgrade(inner);
    let service = descriptor.name;
    let identifier = identifier.to_string();
    Ok(Registration::new(move || {
        routes.close();
        let Some(inner) = weak.upgrade() else {
            return;
        };
        match inner.unsubscribe(topics) {
            Ok(()) => log::info!("[server] unpublished {} '{}'", service, identifier),
            Err(e) => log::warn!(
                "[server] unsubscribe for {} '{}' failed: {}",
                service,
                identifier,
                e
            ),
        }
    }))
}
