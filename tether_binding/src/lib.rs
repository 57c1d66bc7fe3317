// Copyright 2025 the Tether Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tether Binding: two-way property binding over a dynamic object graph.
//!
//! A binding makes one object's property track another object's property
//! (or a computed expression over it), and can optionally push edits back
//! the other way. This crate provides the binding engine itself: directive
//! parsing, source resolution, change propagation in both directions, loop
//! prevention, and lifetime hygiene. Object storage and subscriptions come
//! from [`tether_object`]; expression evaluation and diagnostics are
//! injected behind traits.
//!
//! ## Core Concepts
//!
//! ### The binder
//!
//! [`Binder`] owns the object graph and the registry of active bindings (at
//! most one per target property). Property writes that should drive
//! bindings go through [`Binder::set`], which stores the value, notifies
//! subscribed bindings, propagates binding-context changes, and arbitrates
//! two-way push-back.
//!
//! ### Sources and the binding context
//!
//! A binding attaches either to an explicit source or to its target's
//! *binding context*, the inheritable [`CONTEXT`] property. Context-driven
//! bindings are rebound automatically when the effective context changes;
//! explicitly-sourced ones are left alone.
//!
//! ### Two-way arbitration
//!
//! Source changes flow to the target; target edits flow back to the source
//! when the binding is two-way. A per-binding `updating` flag marks every
//! push for its whole duration, so echo notifications are recognized and
//! dropped instead of oscillating. One-way bindings tear themselves down
//! the first time their target is edited by anyone else.
//!
//! ## Quick Start
//!
//! ```rust
//! use tether_binding::{Binder, BindingOptions};
//! use tether_object::{ObjectKind, Value};
//!
//! let mut binder = Binder::new();
//! let model = binder.graph_mut().insert(ObjectKind::Notifying);
//! let view = binder.graph_mut().insert(ObjectKind::Notifying);
//! binder.set(model, "age", Value::from(41)).unwrap();
//!
//! // Bind the view's `age` two-way to the model's `age`.
//! binder
//!     .bind(view, BindingOptions::parse("age", "age"), Some(Value::from(model)))
//!     .unwrap();
//! assert_eq!(binder.get(view, "age"), Some(&Value::from(41)));
//!
//! // Model → view.
//! binder.set(model, "age", Value::from(42)).unwrap();
//! assert_eq!(binder.get(view, "age"), Some(&Value::from(42)));
//!
//! // View → model.
//! binder.set(view, "age", Value::from(43)).unwrap();
//! assert_eq!(binder.get(model, "age"), Some(&Value::from(43)));
//! ```
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. It does not depend on `std`.

#![no_std]

extern crate alloc;

mod binder;
mod binding;
mod expr;
mod options;
pub mod path;
mod trace;

pub use binder::{Binder, CONTEXT, InvalidSource, PROPERTY_CHANGED};
pub use binding::{Binding, BindingKey};
pub use expr::{ChangeModel, CompiledExpression, EvalError, EvalScope, ExpressionEngine, Location};
pub use options::BindingOptions;
pub use trace::{BufferTrace, NoopTrace, Severity, TraceEvent, TraceSink};
