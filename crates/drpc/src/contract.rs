// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service contracts.
//!
//! A contract is a named list of operation descriptors (name, parameter
//! types, return type). Both sides work against the descriptors only:
//!
//! - callers go through an [`Invoker`], which receives the descriptor and
//!   the encoded arguments of every call
//! - services implement [`ServiceHandler`], which dispatches a decoded call
//!   to the implementation
//!
//! Typed wrappers over both are generated by [`service!`](crate::service):
//!
//! ```ignore
//! drpc::service! {
//!     pub trait Calculator {
//!         contract = CalculatorContract;
//!         client = CalculatorClient;
//!         service = CalculatorService;
//!
//!         fn add(a: i32, b: i32) -> i32;
//!     }
//! }
//! ```

use crate::codec::{CodecError, Value, ValueType};
use crate::error::{RpcError, RpcResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// One operation of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub name: &'static str,
    pub params: &'static [ValueType],
    /// `ValueType::Unit` for operations without a result
    pub returns: ValueType,
}

impl Operation {
    pub const fn new(name: &'static str, params: &'static [ValueType], returns: ValueType) -> Self {
        Self {
            name,
            params,
            returns,
        }
    }

    pub fn is_void(&self) -> bool {
        self.returns == ValueType::Unit
    }
}

/// Name and operations of a contract.
#[derive(Debug, PartialEq, Eq)]
pub struct ContractDescriptor {
    /// Service name used in topics
    pub name: &'static str,
    pub operations: &'static [Operation],
}

impl ContractDescriptor {
    pub fn find(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.name == name)
    }

    /// Look up an operation, failing with [`RpcError::UnknownOperation`].
    pub fn operation(&'static self, name: &str) -> RpcResult<&'static Operation> {
        self.operations
            .iter()
            .find(|op| op.name == name)
            .ok_or_else(|| RpcError::UnknownOperation(format!("{}.{}", self.name, name)))
    }
}

/// A service contract type.
pub trait ServiceContract: 'static {
    /// Typed client making calls through an invoker.
    type Client<I: Invoker>;

    fn descriptor() -> &'static ContractDescriptor;

    fn client<I: Invoker>(invoker: I) -> Self::Client<I>;
}

/// Generic call entry point behind every typed client.
pub trait Invoker {
    fn invoke(&self, operation: &'static Operation, args: Vec<Value>) -> RpcResult<Value>;
}

impl<I: Invoker + ?Sized> Invoker for &I {
    fn invoke(&self, operation: &'static Operation, args: Vec<Value>) -> RpcResult<Value> {
        (**self).invoke(operation, args)
    }
}

impl<I: Invoker + ?Sized> Invoker for Arc<I> {
    fn invoke(&self, operation: &'static Operation, args: Vec<Value>) -> RpcResult<Value> {
        (**self).invoke(operation, args)
    }
}

/// Server-side implementation of a contract.
///
/// Called on the transport delivery thread with arguments already decoded
/// against `operation.params`.
pub trait ServiceHandler: Send + Sync + 'static {
    fn invoke(&self, operation: &Operation, args: Vec<Value>) -> Result<Value, InvocationError>;
}

/// Failure raised by a service implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvocationError {
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("bad argument at position {position}: {reason}")]
    BadArgument { position: usize, reason: String },

    /// Result could not be converted to a value
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Implementation reported an error
    #[error("{0}")]
    Failed(String),
}

impl InvocationError {
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self::Failed(reason.to_string())
    }
}

/// Conversion between Rust types and [`Value`]s.
pub trait RpcValue: Sized {
    const TYPE: ValueType;

    fn into_value(self) -> Result<Value, CodecError>;

    fn from_value(value: Value) -> Result<Self, CodecError>;
}

fn mismatch(expected: ValueType, value: &Value) -> CodecError {
    CodecError::TypeMismatch {
        position: 0,
        expected,
        found: value.value_type().name().to_string(),
    }
}

macro_rules! impl_rpc_value {
    ($type:ty, $tag:ident) => {
        impl RpcValue for $type {
            const TYPE: ValueType = ValueType::$tag;

            fn into_value(self) -> Result<Value, CodecError> {
                Ok(Value::$tag(self))
            }

            fn from_value(value: Value) -> Result<Self, CodecError> {
                match value {
                    Value::$tag(v) => Ok(v),
                    other => Err(mismatch(Self::TYPE, &other)),
                }
            }
        }
    };
}

impl_rpc_value!(bool, Bool);
impl_rpc_value!(i32, I32);
impl_rpc_value!(i64, I64);
impl_rpc_value!(f64, F64);
impl_rpc_value!(String, String);
impl_rpc_value!(Vec<u8>, Bytes);

impl RpcValue for () {
    const TYPE: ValueType = ValueType::Unit;

    fn into_value(self) -> Result<Value, CodecError> {
        Ok(Value::Unit)
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Unit => Ok(()),
            other => Err(mismatch(Self::TYPE, &other)),
        }
    }
}

/// Structured record carried as a serde document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record<T>(pub T);

impl<T> Record<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Serialize + DeserializeOwned> RpcValue for Record<T> {
    const TYPE: ValueType = ValueType::Record;

    fn into_value(self) -> Result<Value, CodecError> {
        serde_json::to_value(&self.0)
            .map(Value::Record)
            .map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Record(doc) => serde_json::from_value(doc).map(Record).map_err(|e| {
                CodecError::TypeMismatch {
                    position: 0,
                    expected: ValueType::Record,
                    found: format!("incompatible record ({})", e),
                }
            }),
            other => Err(mismatch(Self::TYPE, &other)),
        }
    }
}

/// Sequential typed reader over decoded arguments.
#[derive(Debug)]
pub struct Args {
    values: std::vec::IntoIter<Value>,
    position: usize,
}

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values: values.into_iter(),
            position: 0,
        }
    }

    /// Take the next argument as `T`.
    #[allow(clippy::should_implement_trait)]
    pub fn next<T: RpcValue>(&mut self) -> Result<T, InvocationError> {
        let position = self.position;
        self.position += 1;
        let value = self.values.next().ok_or_else(|| InvocationError::BadArgument {
            position,
            reason: "missing".to_string(),
        })?;
        T::from_value(value).map_err(|e| InvocationError::BadArgument {
            position,
            reason: e.to_string(),
        })
    }
}

/// Invoke `operation` and convert its result to `R`.
pub fn call<I, R>(invoker: &I, operation: &'static Operation, args: Vec<Value>) -> RpcResult<R>
where
    I: Invoker + ?Sized,
    R: RpcValue,
{
    let value = invoker.invoke(operation, args)?;
    R::from_value(value).map_err(RpcError::from)
}

/// Declare a service contract with its typed client and service adapter.
///
/// Generates:
/// - the implementation trait (`trait Name`), whose methods return
///   `Result<T, InvocationError>`
/// - the contract type implementing [`ServiceContract`]
/// - the client type, whose methods return [`RpcResult`]
/// - the service adapter wrapping an implementation into a [`ServiceHandler`]
///
/// The trait name is the service name used in topics.
#[macro_export]
macro_rules! service {
    (
        $(#[$meta:meta])*
        $vis:vis trait $name:ident {
            contract = $contract:ident;
            client = $client:ident;
            service = $service:ident;

            $(
                $(#[$op_meta:meta])*
                fn $op:ident($($arg:ident: $ty:ty),* $(,)?) -> $ret:ty;
            )*
        }
    ) => {
        $(#[$meta])*
        $vis trait $name: Send + Sync + 'static {
            $(
                $(#[$op_meta])*
                fn $op(&self, $($arg: $ty),*)
                    -> ::std::result::Result<$ret, $crate::contract::InvocationError>;
            )*
        }

        #[doc = concat!("Contract type of [`", stringify!($name), "`].")]
        #[derive(Debug, Clone, Copy, Default)]
        $vis struct $contract;

        impl $crate::contract::ServiceContract for $contract {
            type Client<I: $crate::contract::Invoker> = $client<I>;

            fn descriptor() -> &'static $crate::contract::ContractDescriptor {
                static DESCRIPTOR: $crate::contract::ContractDescriptor =
                    $crate::contract::ContractDescriptor {
                        name: stringify!($name),
                        operations: &[$(
                            $crate::contract::Operation {
                                name: stringify!($op),
                                params: &[$(<$ty as $crate::contract::RpcValue>::TYPE),*],
                                returns: <$ret as $crate::contract::RpcValue>::TYPE,
                            }
                        ),*],
                    };
                &DESCRIPTOR
            }

            fn client<I: $crate::contract::Invoker>(invoker: I) -> $client<I> {
                $client { invoker }
            }
        }

        #[doc = concat!("Typed client of [`", stringify!($name), "`].")]
        $vis struct $client<I> {
            invoker: I,
        }

        impl<I: $crate::contract::Invoker> $client<I> {
            $(
                $(#[$op_meta])*
                pub fn $op(&self, $($arg: $ty),*) -> $crate::RpcResult<$ret> {
                    let operation = <$contract as $crate::contract::ServiceContract>::descriptor()
                        .operation(stringify!($op))?;
                    $crate::contract::call(
                        &self.invoker,
                        operation,
                        vec![$($crate::contract::RpcValue::into_value($arg)?),*],
                    )
                }
            )*
        }

        #[doc = concat!("Serves an implementation of [`", stringify!($name), "`].")]
        $vis struct $service<T>(pub T);

        impl<T: $name> $crate::contract::ServiceHandler for $service<T> {
            #[allow(unused_mut, unused_variables)]
            fn invoke(
                &self,
                operation: &$crate::contract::Operation,
                args: ::std::vec::Vec<$crate::codec::Value>,
            ) -> ::std::result::Result<$crate::codec::Value, $crate::contract::InvocationError> {
                let mut __args = $crate::contract::Args::new(args);
                $(
                    if operation.name == stringify!($op) {
                        $(let $arg: $ty = __args.next()?;)*
                        let result = self.0.$op($($arg),*)?;
                        return $crate::contract::RpcValue::into_value(result)
                            .map_err($crate::contract::InvocationError::from);
                    }
                )*
                Err($crate::contract::InvocationError::UnknownOperation(
                    operation.name.to_string(),
                ))
            }
        }
    };
}
