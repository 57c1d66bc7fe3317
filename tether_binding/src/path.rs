// Copyright 2025 the Tether Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dotted property path resolution.
//!
//! A path like `"address.city"` is resolved against a root object by walking
//! every segment but the last through the graph and binding the final
//! segment against the object the walk ends on. Intermediate segments are
//! read once, at resolution time; the result is a [`Slot`] that callers
//! cache and reuse for every later read or write of the leaf.

use alloc::string::String;
use core::fmt;

use tether_object::{ObjectGraph, ObjectId};

/// A resolved `(object, leaf property)` pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Slot {
    /// The object the leaf property lives on.
    pub object: ObjectId,
    /// The leaf property name.
    pub property: String,
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("object", &self.object)
            .field("property", &self.property)
            .finish()
    }
}

/// Resolves a property path against a root object.
///
/// A path without dots binds directly against the root, whether or not the
/// field exists yet. A dotted path reads each intermediate segment in turn;
/// the walk stops with `None` if the root is stale, an intermediate field is
/// missing, or an intermediate value is not an object handle.
///
/// # Example
///
/// ```rust
/// use tether_binding::path::resolve;
/// use tether_object::{ObjectGraph, ObjectKind, Value};
///
/// let mut graph = ObjectGraph::new();
/// let person = graph.insert(ObjectKind::Plain);
/// let address = graph.insert(ObjectKind::Plain);
/// graph.assign(person, "address", Value::from(address)).unwrap();
///
/// let slot = resolve(&graph, person, "address.city").unwrap();
/// assert_eq!(slot.object, address);
/// assert_eq!(slot.property, "city");
/// ```
#[must_use]
pub fn resolve(graph: &ObjectGraph, root: ObjectId, path: &str) -> Option<Slot> {
    if !graph.contains(root) {
        return None;
    }
    let Some((head, rest)) = path.split_once('.') else {
        return Some(Slot {
            object: root,
            property: String::from(path),
        });
    };

    let mut object = graph.value(root, head)?.as_object()?;
    let mut remainder = rest;
    while let Some((segment, rest)) = remainder.split_once('.') {
        object = graph.value(object, segment)?.as_object()?;
        remainder = rest;
    }
    if !graph.contains(object) {
        return None;
    }
    Some(Slot {
        object,
        property: String::from(remainder),
    })
}
