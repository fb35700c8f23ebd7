//! Veneer SDK - Lightweight SDK for writing invocation handlers
//!
//! This crate provides the minimal types and traits needed to write handlers
//! for intercepted method calls without depending on the full veneer-engine.
//!
//! # Example
//!
//! ```ignore
//! use veneer_sdk::{handler, InvocationContext, Value};
//!
//! let doubling = handler(|ctx: &dyn InvocationContext| {
//!     let original = ctx.proceed_unchanged()?;
//!     Ok(Value::Int(original.as_int().unwrap_or(0) * 2))
//! });
//! ```

#![warn(missing_docs)]

pub mod descriptor;
pub mod error;
pub mod handler;
pub mod value;

pub use descriptor::{Marker, MethodDescriptor, MethodSignature, Modifiers, TypeId};
pub use error::{InvokeError, InvokeResult};
pub use handler::{
    handler, nothing, passthrough, raising, returning, HandlerRef, InvocationContext,
    InvocationHandler,
};
pub use value::{Value, ValueCategory};
