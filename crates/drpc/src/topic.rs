// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic naming for service operations and response callbacks.
//!
//! For a service named "Calculator" with an operation "add":
//! - Broadcast topic: `s/Calculator/add`
//! - Instance topic: `s/Calculator/add/42`
//! - Callback topic: `c/<correlation id>`
//!
//! An instance topic always extends its broadcast topic, so a wildcard
//! subscription such as `s/Calculator/#` observes both.

use crate::error::{RpcError, RpcResult};
use std::fmt;

/// Namespace prefix for service operation topics
pub const SERVICE_PREFIX: &str = "s";
/// Namespace prefix for response callback topics
pub const CALLBACK_PREFIX: &str = "c";

/// Characters with a meaning in topic filters, never allowed inside a segment.
const RESERVED: [char; 3] = ['/', '+', '#'];

/// An immutable, routable topic string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for topics in the callback namespace.
    #[must_use]
    pub fn is_callback(&self) -> bool {
        self.0.starts_with(CALLBACK_PREFIX) && self.0[CALLBACK_PREFIX.len()..].starts_with('/')
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Topic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

/// Builds canonical topics. Stateless; every method is deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicBuilder;

impl TopicBuilder {
    pub const fn new() -> Self {
        Self
    }

    /// Broadcast topic reaching every published instance of `service`.
    pub fn operation(&self, service: &str, operation: &str) -> RpcResult<Topic> {
        check_segment(service)?;
        check_segment(operation)?;
        Ok(Topic(format!("{}/{}/{}", SERVICE_PREFIX, service, operation)))
    }

    /// Topic reaching the single instance published under `identifier`.
    pub fn operation_with_id(
        &self,
        service: &str,
        operation: &str,
        identifier: &str,
    ) -> RpcResult<Topic> {
        check_segment(identifier)?;
        let broadcast = self.operation(service, operation)?;
        Ok(Topic(format!("{}/{}", broadcast.0, identifier)))
    }

    /// Broadcast or instance topic depending on whether an identifier is given.
    pub fn target(
        &self,
        service: &str,
        operation: &str,
        identifier: Option<&str>,
    ) -> RpcResult<Topic> {
        match identifier {
            Some(id) => self.operation_with_id(service, operation, id),
            None => self.operation(service, operation),
        }
    }

    /// Topic on which responses to `correlation_id` are delivered.
    pub fn callback(&self, correlation_id: &str) -> RpcResult<Topic> {
        check_segment(correlation_id)?;
        Ok(Topic(format!("{}/{}", CALLBACK_PREFIX, correlation_id)))
    }

    /// Wildcard filter matching every operation topic of `service`.
    pub fn operation_filter(&self, service: &str) -> RpcResult<String> {
        check_segment(service)?;
        Ok(format!("{}/{}/#", SERVICE_PREFIX, service))
    }
}

fn check_segment(segment: &str) -> RpcResult<()> {
    if segment.is_empty() || segment.contains(RESERVED) {
        return Err(RpcError::InvalidTopic(segment.to_string()));
    }
    Ok(())
}
