// Copyright 2025 the Tether Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tether Object: dynamic object graph with non-owning handles.
//!
//! This crate provides the storage substrate for the Tether binding engine:
//! a heap of structurally-typed objects addressed by generational handles,
//! plus a weak subscription table for observing them.
//!
//! ## Core Concepts
//!
//! ### Values and Objects
//!
//! [`Value`] is the dynamic value model: null, booleans, numbers, strings,
//! and [`ObjectId`] handles into an [`ObjectGraph`]. Objects are field maps
//! with an [`ObjectKind`] that records whether property writes are expected
//! to announce themselves ([`ObjectKind::Notifying`]) or are plain records
//! written in place ([`ObjectKind::Plain`]).
//!
//! ### Non-owning handles
//!
//! An [`ObjectId`] never keeps an object alive. Once the object is removed
//! from its graph, every outstanding handle simply stops resolving: lookups
//! return `None` and callers are expected to treat that as "do nothing".
//!
//! ### Store, don't dispatch
//!
//! [`ObjectGraph::assign`] only stores. Deciding whether a write should be
//! announced, and delivering the [`PropertyChange`] to the subscribers found
//! in a [`SubscriptionSet`], belongs to the layer that owns both; see the
//! `tether_binding` crate.
//!
//! ## Quick Start
//!
//! ```rust
//! use tether_object::{ObjectGraph, ObjectKind, Value};
//!
//! let mut graph = ObjectGraph::new();
//! let person = graph.insert(ObjectKind::Notifying);
//!
//! graph.assign(person, "name", Value::from("Ada")).unwrap();
//! assert_eq!(graph.value(person, "name"), Some(&Value::from("Ada")));
//!
//! graph.remove(person);
//! assert_eq!(graph.value(person, "name"), None);
//! ```
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. It does not depend on `std`.

#![no_std]

extern crate alloc;

mod graph;
mod subscribe;
mod value;

pub use graph::{ObjectGraph, ObjectId, ObjectKind, ParentCycle, PropertyError};
pub use subscribe::{Event, PropertyChange, SubscriptionId, SubscriptionSet};
pub use value::Value;
