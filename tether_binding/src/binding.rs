// Copyright 2025 the Tether Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-property binding state.
//!
//! A [`Binding`] is the state machine behind one bound target property. It
//! is unbound until a source is attached, bound while a source is attached,
//! and returns to unbound when the source is detached (explicitly, or
//! because the effective context it was following changed).
//!
//! The binding never owns the objects it connects: target and source are
//! non-owning handles, and every operation that finds a stale handle does
//! nothing. The `updating` flag marks the whole duration of any value push
//! the binding initiates, so the notifications caused by that push can be
//! recognized and ignored instead of ping-ponging forever. A plain `bool`
//! is sufficient only because the engine is single-threaded and
//! synchronous; a concurrent port would need a per-binding lock or
//! generation counter here.

use alloc::boxed::Box;
use core::fmt;

use generational_arena::Index;
use tether_object::{ObjectId, SubscriptionId};

use crate::expr::CompiledExpression;
use crate::options::BindingOptions;
use crate::path::Slot;

/// A non-owning handle to a [`Binding`] registered with a
/// [`Binder`](crate::Binder).
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct BindingKey(pub(crate) Index);

impl fmt::Debug for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BindingKey").field(&self.0).finish()
    }
}

/// The state machine coordinating one bound target property.
///
/// Created and driven by a [`Binder`](crate::Binder); read access is
/// available through [`Binder::binding`](crate::Binder::binding) for
/// inspection.
#[derive(Debug)]
pub struct Binding {
    pub(crate) options: BindingOptions,
    pub(crate) target: ObjectId,
    pub(crate) source: Option<ObjectId>,
    pub(crate) subscription: Option<SubscriptionId>,
    /// Resolved source leaf, cached after the first successful resolution.
    pub(crate) source_slot: Option<Slot>,
    /// Resolved target leaf, cached after the first successful resolution.
    pub(crate) target_slot: Option<Slot>,
    pub(crate) compiled: Option<Box<dyn CompiledExpression>>,
    /// Set for the whole duration of a push this binding initiates.
    pub(crate) updating: bool,
}

impl Binding {
    pub(crate) fn new(options: BindingOptions, target: ObjectId) -> Self {
        Self {
            options,
            target,
            source: None,
            subscription: None,
            source_slot: None,
            target_slot: None,
            compiled: None,
            updating: false,
        }
    }

    /// The binding's parsed options.
    #[must_use]
    pub fn options(&self) -> &BindingOptions {
        &self.options
    }

    /// The target object this binding writes to. Non-owning.
    #[must_use]
    pub fn target(&self) -> ObjectId {
        self.target
    }

    /// The currently attached source, if any. Non-owning.
    #[must_use]
    pub fn source(&self) -> Option<ObjectId> {
        self.source
    }

    /// Returns `true` while a source is attached.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.source.is_some()
    }

    /// Returns `true` while the binding is mid-push.
    #[must_use]
    pub fn is_updating(&self) -> bool {
        self.updating
    }
}
