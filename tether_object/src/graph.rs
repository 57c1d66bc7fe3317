// Copyright 2025 the Tether Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Object storage and non-owning handles.
//!
//! This module provides [`ObjectGraph`], an arena of structurally-typed
//! objects, and [`ObjectId`], the generational handle used to refer to them
//! without owning them.
//!
//! # Handles are weak
//!
//! Removing an object invalidates its handle's generation; every later
//! lookup through a stale handle returns `None`. This is the crate-wide
//! liveness model: holders of an [`ObjectId`] never extend an object's
//! lifetime, and they treat a failed lookup as "do nothing" rather than an
//! error.
//!
//! # Storage only
//!
//! [`ObjectGraph::assign`] stores a field value and nothing else. Whether the
//! write should be announced to subscribers is decided by the caller, which
//! is the only party that owns both the graph and the subscription table.

use alloc::string::String;
use core::fmt;

use generational_arena::{Arena, Index};
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::value::Value;

/// A non-owning, generation-checked handle to an object in an
/// [`ObjectGraph`].
///
/// Handles from one graph must not be used with another; doing so yields
/// arbitrary (but memory-safe) lookup results.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId(Index);

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectId").field(&self.0).finish()
    }
}

/// How an object participates in change notification.
///
/// The two variants correspond to the two ways a property can be written:
/// through a notifying set that announces the change, or as a plain record
/// field assignment that nobody observes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    /// Property writes are expected to be announced to subscribers.
    Notifying,
    /// A plain record; writes are silent.
    Plain,
}

/// Error returned when a field write is rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyError {
    /// The handle no longer resolves to an object.
    NoSuchObject,
    /// The object is sealed and does not have this field yet.
    SealedProperty {
        /// The field that was rejected.
        property: String,
    },
}

impl fmt::Display for PropertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchObject => write!(f, "object handle no longer resolves"),
            Self::SealedProperty { property } => {
                write!(f, "sealed object rejects new field {property:?}")
            }
        }
    }
}

impl core::error::Error for PropertyError {}

/// Error returned when reparenting would create a cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParentCycle {
    /// The object being reparented.
    pub child: ObjectId,
    /// The requested parent.
    pub parent: ObjectId,
}

impl fmt::Display for ParentCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "making {:?} a child of {:?} would create a cycle",
            self.child, self.parent
        )
    }
}

impl core::error::Error for ParentCycle {}

#[derive(Debug)]
struct Object {
    kind: ObjectKind,
    fields: HashMap<String, Value>,
    parent: Option<ObjectId>,
    children: SmallVec<[ObjectId; 4]>,
    /// Payload carried by objects created via [`ObjectGraph::box_value`].
    primitive: Option<Value>,
    sealed: bool,
}

impl Object {
    fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            fields: HashMap::new(),
            parent: None,
            children: SmallVec::new(),
            primitive: None,
            sealed: false,
        }
    }
}

/// An arena of dynamic objects addressed by [`ObjectId`] handles.
///
/// # Example
///
/// ```rust
/// use tether_object::{ObjectGraph, ObjectKind, Value};
///
/// let mut graph = ObjectGraph::new();
/// let parent = graph.insert(ObjectKind::Notifying);
/// let child = graph.insert(ObjectKind::Notifying);
/// graph.set_parent(child, Some(parent)).unwrap();
///
/// // A field set on an ancestor is visible through inherited resolution.
/// graph.assign(parent, "theme", Value::from("dark")).unwrap();
/// assert_eq!(
///     graph.resolve_inherited(child, "theme"),
///     Some(&Value::from("dark"))
/// );
/// ```
#[derive(Debug, Default)]
pub struct ObjectGraph {
    objects: Arena<Object>,
}

impl ObjectGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if the graph holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Inserts a fresh object of the given kind and returns its handle.
    pub fn insert(&mut self, kind: ObjectKind) -> ObjectId {
        ObjectId(self.objects.insert(Object::new(kind)))
    }

    /// Coerces a value to an object handle.
    ///
    /// Object values pass through unchanged. Anything else is boxed: a plain
    /// object is allocated to stand in for the primitive, carrying it as a
    /// payload readable via [`boxed_value`](Self::boxed_value). The box has
    /// no fields of its own, so field reads against it yield nothing.
    pub fn box_value(&mut self, value: Value) -> ObjectId {
        if let Value::Object(id) = value {
            return id;
        }
        let index = self.objects.insert(Object {
            primitive: Some(value),
            ..Object::new(ObjectKind::Plain)
        });
        ObjectId(index)
    }

    /// Returns the primitive payload of a boxed object, if any.
    #[must_use]
    pub fn boxed_value(&self, id: ObjectId) -> Option<&Value> {
        self.objects.get(id.0)?.primitive.as_ref()
    }

    /// Removes an object.
    ///
    /// Children are orphaned (their parent link is cleared) and the object
    /// is detached from its own parent. Returns `false` if the handle was
    /// already stale.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        let Some(object) = self.objects.remove(id.0) else {
            return false;
        };
        for child in &object.children {
            if let Some(c) = self.objects.get_mut(child.0) {
                c.parent = None;
            }
        }
        if let Some(parent) = object.parent
            && let Some(p) = self.objects.get_mut(parent.0)
        {
            p.children.retain(|c| *c != id);
        }
        true
    }

    /// Returns `true` if the handle still resolves.
    #[must_use]
    #[inline]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains(id.0)
    }

    /// Returns the object's kind, or `None` for a stale handle.
    #[must_use]
    pub fn kind(&self, id: ObjectId) -> Option<ObjectKind> {
        self.objects.get(id.0).map(|o| o.kind)
    }

    /// Returns `true` if the handle resolves to a change-notifying object.
    #[must_use]
    pub fn is_notifying(&self, id: ObjectId) -> bool {
        self.kind(id) == Some(ObjectKind::Notifying)
    }

    /// Reads a field.
    ///
    /// Returns `None` for a stale handle or an absent field; the two are
    /// deliberately indistinguishable here.
    #[must_use]
    pub fn value(&self, id: ObjectId, property: &str) -> Option<&Value> {
        self.objects.get(id.0)?.fields.get(property)
    }

    /// Returns `true` if the object has an explicit field of this name.
    #[must_use]
    pub fn has_field(&self, id: ObjectId, property: &str) -> bool {
        self.objects
            .get(id.0)
            .is_some_and(|o| o.fields.contains_key(property))
    }

    /// Stores a field value.
    ///
    /// This is storage only; no notification is dispatched. Fails with
    /// [`PropertyError::NoSuchObject`] for a stale handle and
    /// [`PropertyError::SealedProperty`] when a sealed object would gain a
    /// new field (updates to existing fields of sealed objects succeed).
    pub fn assign(
        &mut self,
        id: ObjectId,
        property: &str,
        value: Value,
    ) -> Result<(), PropertyError> {
        let Some(object) = self.objects.get_mut(id.0) else {
            return Err(PropertyError::NoSuchObject);
        };
        if object.sealed && !object.fields.contains_key(property) {
            return Err(PropertyError::SealedProperty {
                property: String::from(property),
            });
        }
        object.fields.insert(String::from(property), value);
        Ok(())
    }

    /// Seals an object: existing fields stay writable, new fields are
    /// rejected. Returns `false` for a stale handle.
    pub fn seal(&mut self, id: ObjectId) -> bool {
        match self.objects.get_mut(id.0) {
            Some(object) => {
                object.sealed = true;
                true
            }
            None => false,
        }
    }

    /// Returns the object's parent, if it has one.
    #[must_use]
    pub fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.objects.get(id.0)?.parent
    }

    /// Returns the object's children. Stale handles have no children.
    #[must_use]
    pub fn children(&self, id: ObjectId) -> &[ObjectId] {
        self.objects
            .get(id.0)
            .map(|o| o.children.as_slice())
            .unwrap_or(&[])
    }

    /// Reparents an object.
    ///
    /// `None` detaches. Stale child or parent handles are silent no-ops, per
    /// the crate's liveness model. Fails only when the new parent is the
    /// child itself or one of its descendants.
    pub fn set_parent(
        &mut self,
        child: ObjectId,
        parent: Option<ObjectId>,
    ) -> Result<(), ParentCycle> {
        if !self.contains(child) {
            return Ok(());
        }
        if let Some(new_parent) = parent {
            if !self.contains(new_parent) {
                return Ok(());
            }
            // Walk up from the requested parent; reaching the child means
            // the child is an ancestor of its would-be parent.
            let mut current = Some(new_parent);
            while let Some(node) = current {
                if node == child {
                    return Err(ParentCycle {
                        child,
                        parent: new_parent,
                    });
                }
                current = self.parent(node);
            }
        }

        let old_parent = self.objects[child.0].parent;
        if let Some(old) = old_parent
            && let Some(o) = self.objects.get_mut(old.0)
        {
            o.children.retain(|c| *c != child);
        }
        self.objects[child.0].parent = parent;
        if let Some(new_parent) = parent {
            self.objects[new_parent.0].children.push(child);
        }
        Ok(())
    }

    /// Resolves a field with inheritance.
    ///
    /// Walks from the object up its parent chain and returns the first
    /// *explicit* field found, whatever its value. An explicitly stored null
    /// therefore shadows an ancestor's value. Returns `None` when no object
    /// on the chain has the field.
    #[must_use]
    pub fn resolve_inherited(&self, id: ObjectId, property: &str) -> Option<&Value> {
        let mut current = Some(id);
        while let Some(node) = current {
            let object = self.objects.get(node.0)?;
            if let Some(value) = object.fields.get(property) {
                return Some(value);
            }
            current = object.parent;
        }
        None
    }
}
