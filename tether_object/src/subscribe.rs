// Copyright 2025 the Tether Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Weak change subscriptions.
//!
//! [`SubscriptionSet`] records who wants to hear about events on which
//! object. It is weak on both ends: the source is held as a non-owning
//! [`ObjectId`] and the subscriber as an opaque `Copy` token, so a
//! subscription never keeps either party alive. Delivering events is the
//! caller's job; the set only answers "who is subscribed to this source for
//! this event?".
//!
//! [`Event`] identifies an event kind. Embedders define their own kinds as
//! constants:
//!
//! ```rust
//! use tether_object::Event;
//!
//! const PROPERTY_CHANGED: Event = Event::new(0);
//! const DISPOSED: Event = Event::new(1);
//! ```

use alloc::string::String;
use core::fmt;

use generational_arena::{Arena, Index};

use crate::graph::ObjectId;
use crate::value::Value;

/// Identifies an event kind.
///
/// A lightweight handle; the set of kinds and their meaning belong to the
/// embedder.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Event(u16);

impl Event {
    /// Creates a new event kind with the given index.
    #[must_use]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Returns the index of this event kind.
    #[must_use]
    pub const fn index(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Event").field(&self.0).finish()
    }
}

/// The payload of a property-change event.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyChange {
    /// The property that changed.
    pub property: String,
    /// Its new value.
    pub value: Value,
}

/// A handle to one subscription, used to remove it later.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Index);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SubscriptionId").field(&self.0).finish()
    }
}

#[derive(Debug)]
struct Entry<S> {
    source: ObjectId,
    event: Event,
    subscriber: S,
}

/// A table of weak subscriptions, generic over the subscriber token `S`.
///
/// Tokens are plain `Copy` data (typically a handle into the embedder's own
/// storage), not callbacks: the embedder looks tokens up at dispatch time
/// and skips the ones that no longer resolve, which is what makes the table
/// weak on the subscriber side too.
pub struct SubscriptionSet<S> {
    entries: Arena<Entry<S>>,
}

impl<S> Default for SubscriptionSet<S> {
    fn default() -> Self {
        Self {
            entries: Arena::new(),
        }
    }
}

impl<S: Copy> SubscriptionSet<S> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no subscriptions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers `subscriber` for `event` on `source`.
    pub fn subscribe(&mut self, source: ObjectId, event: Event, subscriber: S) -> SubscriptionId {
        SubscriptionId(self.entries.insert(Entry {
            source,
            event,
            subscriber,
        }))
    }

    /// Removes a subscription.
    ///
    /// Idempotent: removing an already-removed subscription returns `false`
    /// and is otherwise a no-op.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.entries.remove(id.0).is_some()
    }

    /// Iterates the subscribers registered for `event` on `source`.
    pub fn subscribers(
        &self,
        source: ObjectId,
        event: Event,
    ) -> impl Iterator<Item = (SubscriptionId, S)> + '_ {
        self.entries
            .iter()
            .filter(move |(_, e)| e.source == source && e.event == event)
            .map(|(index, e)| (SubscriptionId(index), e.subscriber))
    }

    /// Returns the number of subscriptions whose source is `source`.
    #[must_use]
    pub fn source_count(&self, source: ObjectId) -> usize {
        self.entries.iter().filter(|(_, e)| e.source == source).count()
    }
}

impl<S> fmt::Debug for SubscriptionSet<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionSet")
            .field("len", &self.entries.len())
            .finish_non_exhaustive()
    }
}
