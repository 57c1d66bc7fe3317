// Copyright 2025 the Tether Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The binding registry and change-interception pipeline.
//!
//! [`Binder`] owns the whole single-threaded binding world: the object
//! graph, the weak subscription table, the bindings themselves, and the
//! per-object registry mapping target property names to their one active
//! binding. It exposes the blessed write path, [`Binder::set`], which runs
//! the full interception pipeline:
//!
//! 1. store the value; if the object is change-notifying, synchronously
//!    deliver the property-change event to every subscribed binding;
//! 2. if the property is the binding [`CONTEXT`], re-evaluate which
//!    bindings were following the old context and rebind them to the new
//!    one, on this object and on every descendant that inherits it;
//! 3. if the property has an active binding and the change did not come
//!    from that binding's own push, either push the value back to the
//!    source (two-way) or tear the binding down (one-way).
//!
//! Raw storage without interception remains available through
//! [`Binder::graph_mut`], the way a store can be written without
//! notification when no observer must run.
//!
//! All dispatch is synchronous and recursive on the calling thread; the
//! per-binding `updating` flag is the only thing that stops a push from
//! reacting to its own echo.

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use generational_arena::Arena;
use hashbrown::HashMap;
use smallvec::SmallVec;
use tether_object::{
    Event, ObjectGraph, ObjectId, PropertyChange, PropertyError, SubscriptionSet, Value,
};

use crate::binding::{Binding, BindingKey};
use crate::expr::{ChangeModel, EvalScope, ExpressionEngine};
use crate::options::BindingOptions;
use crate::path;
use crate::trace::{NoopTrace, Severity, TraceSink};

/// The well-known name of the binding context property.
///
/// The context is an ordinary property with inheritable resolution: an
/// object with no explicit `context` field observes its nearest ancestor's
/// value, and an explicit field (even an explicit null) overrides
/// inheritance for the object and its descendants.
pub const CONTEXT: &str = "context";

/// The property-change event kind dispatched by [`Binder::set`].
pub const PROPERTY_CHANGED: Event = Event::new(0);

const TRACE_CATEGORY: &str = "binding";

/// Error returned when a binding is given a null source.
///
/// Binding without a source object is meaningless, so this is the one
/// failure [`Binder::bind`] surfaces to its caller. Everything that can go
/// wrong later on the value path is recovered locally and reported through
/// the trace sink instead.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InvalidSource;

impl fmt::Display for InvalidSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot bind to a null source")
    }
}

impl core::error::Error for InvalidSource {}

type BindingTable = SmallVec<[(String, BindingKey); 2]>;

/// The property owner, binding registry, and dispatch engine.
///
/// # Example
///
/// ```rust
/// use tether_binding::{Binder, BindingOptions};
/// use tether_object::{ObjectKind, Value};
///
/// let mut binder = Binder::new();
/// let model = binder.graph_mut().insert(ObjectKind::Notifying);
/// let view = binder.graph_mut().insert(ObjectKind::Notifying);
/// binder.set(model, "age", Value::from(41)).unwrap();
///
/// binder
///     .bind(view, BindingOptions::parse("label", "age"), Some(Value::from(model)))
///     .unwrap();
/// assert_eq!(binder.get(view, "label"), Some(&Value::from(41)));
///
/// binder.set(model, "age", Value::from(42)).unwrap();
/// assert_eq!(binder.get(view, "label"), Some(&Value::from(42)));
/// ```
pub struct Binder {
    graph: ObjectGraph,
    subscriptions: SubscriptionSet<BindingKey>,
    bindings: Arena<Binding>,
    registry: HashMap<ObjectId, BindingTable>,
    engine: Option<Box<dyn ExpressionEngine>>,
    trace: Box<dyn TraceSink>,
    global_context: Option<ObjectId>,
}

impl Default for Binder {
    fn default() -> Self {
        Self::new()
    }
}

impl Binder {
    /// Creates an empty binder with no expression engine and a discarding
    /// trace sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: ObjectGraph::new(),
            subscriptions: SubscriptionSet::new(),
            bindings: Arena::new(),
            registry: HashMap::new(),
            engine: None,
            trace: Box::new(NoopTrace),
            global_context: None,
        }
    }

    /// Installs the expression engine used by expression bindings.
    ///
    /// Without one, expression bindings report a compile failure through the
    /// trace sink and never update.
    pub fn set_expression_engine(&mut self, engine: Box<dyn ExpressionEngine>) {
        self.engine = Some(engine);
    }

    /// Replaces the trace sink. Sinks observe diagnostics only; swapping
    /// them never changes engine behavior.
    pub fn set_trace(&mut self, trace: Box<dyn TraceSink>) {
        self.trace = trace;
    }

    /// Sets the fallback evaluation context used when an expression binding
    /// has no source attached.
    pub fn set_global_context(&mut self, context: Option<ObjectId>) {
        self.global_context = context;
    }

    /// Read access to the object graph.
    #[must_use]
    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    /// Raw write access to the object graph.
    ///
    /// Writes made here are storage only: no notification, no context
    /// propagation, no two-way push-back. Use [`set`](Self::set) for the
    /// intercepted path.
    pub fn graph_mut(&mut self) -> &mut ObjectGraph {
        &mut self.graph
    }

    /// Read access to the subscription table.
    #[must_use]
    pub fn subscriptions(&self) -> &SubscriptionSet<BindingKey> {
        &self.subscriptions
    }

    /// Returns the number of registered bindings.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Returns the active binding for a target property, if any.
    #[must_use]
    pub fn binding(&self, target: ObjectId, property: &str) -> Option<&Binding> {
        let key = lookup(&self.registry, target, property)?;
        self.bindings.get(key.0)
    }

    /// Returns `true` if a binding is registered for the target property.
    #[must_use]
    pub fn has_binding(&self, target: ObjectId, property: &str) -> bool {
        lookup(&self.registry, target, property).is_some()
    }

    /// Resolves the effective binding context of an object: its own
    /// explicit `context` field if present (null meaning "explicitly
    /// none"), otherwise the nearest ancestor's.
    #[must_use]
    pub fn context(&self, object: ObjectId) -> Option<Value> {
        effective_context(&self.graph, object)
    }

    /// Reads a property. Stale handles and absent fields both read as
    /// `None`.
    #[must_use]
    pub fn get(&self, object: ObjectId, property: &str) -> Option<&Value> {
        self.graph.value(object, property)
    }

    /// Creates (or replaces) the binding for `options.target_property` on
    /// `target`.
    ///
    /// Any existing binding for that property is fully removed first,
    /// releasing its subscription. The new binding is then attached to the
    /// explicit `source` if one is given, otherwise to the target's current
    /// effective context; with neither, it stays dormant until a context
    /// arrives.
    ///
    /// An explicit null source is an error. The failure happens after
    /// registration, so the dormant binding stays registered, matching the
    /// register-then-attach order of the pipeline.
    pub fn bind(
        &mut self,
        target: ObjectId,
        options: BindingOptions,
        source: Option<Value>,
    ) -> Result<(), InvalidSource> {
        let property = options.target_property.clone();
        if let Some(existing) = lookup(&self.registry, target, &property) {
            remove_binding(&mut self.parts(), existing);
        }

        let key = BindingKey(self.bindings.insert(Binding::new(options, target)));
        self.registry.entry(target).or_default().push((property, key));

        let mut cx = self.parts();
        match source {
            Some(value) => {
                if value.is_null() {
                    return Err(InvalidSource);
                }
                attach_source(&mut cx, key, value);
            }
            None => {
                if let Some(context) = effective_context(cx.graph, target) {
                    attach_source(&mut cx, key, context);
                }
            }
        }
        Ok(())
    }

    /// Removes the binding for a target property, releasing its
    /// subscription. No-op when none is registered.
    pub fn unbind(&mut self, target: ObjectId, property: &str) {
        if let Some(key) = lookup(&self.registry, target, property) {
            remove_binding(&mut self.parts(), key);
        }
    }

    /// Removes every binding registered on `target`.
    pub fn release(&mut self, target: ObjectId) {
        let keys: SmallVec<[BindingKey; 4]> = self
            .registry
            .get(&target)
            .map(|table| table.iter().map(|(_, key)| *key).collect())
            .unwrap_or_default();
        let mut cx = self.parts();
        for key in keys {
            remove_binding(&mut cx, key);
        }
    }

    /// Writes a property through the full interception pipeline: store,
    /// notify, context propagation, two-way push-back or one-way teardown.
    ///
    /// Errors come from the store itself (stale handle, sealed object);
    /// binding-initiated pushes recover from these internally, but a direct
    /// caller gets them back.
    pub fn set(
        &mut self,
        object: ObjectId,
        property: &str,
        value: Value,
    ) -> Result<(), PropertyError> {
        write_property(&mut self.parts(), object, property, value)
    }

    fn parts(&mut self) -> EngineCx<'_> {
        EngineCx {
            graph: &mut self.graph,
            subscriptions: &mut self.subscriptions,
            bindings: &mut self.bindings,
            registry: &mut self.registry,
            engine: self.engine.as_deref(),
            trace: self.trace.as_mut(),
            global_context: self.global_context,
        }
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("objects", &self.graph.len())
            .field("bindings", &self.bindings.len())
            .field("subscriptions", &self.subscriptions.len())
            .field("has_engine", &self.engine.is_some())
            .finish_non_exhaustive()
    }
}

/// Split borrows of everything the dispatch functions touch. Built fresh
/// from [`Binder::parts`] at each public entry point.
struct EngineCx<'a> {
    graph: &'a mut ObjectGraph,
    subscriptions: &'a mut SubscriptionSet<BindingKey>,
    bindings: &'a mut Arena<Binding>,
    registry: &'a mut HashMap<ObjectId, BindingTable>,
    engine: Option<&'a dyn ExpressionEngine>,
    trace: &'a mut dyn TraceSink,
    global_context: Option<ObjectId>,
}

fn lookup(
    registry: &HashMap<ObjectId, BindingTable>,
    object: ObjectId,
    property: &str,
) -> Option<BindingKey> {
    registry
        .get(&object)?
        .iter()
        .find(|(name, _)| name == property)
        .map(|(_, key)| *key)
}

fn effective_context(graph: &ObjectGraph, object: ObjectId) -> Option<Value> {
    graph
        .resolve_inherited(object, CONTEXT)
        .cloned()
        .filter(|value| !value.is_null())
}

/// Attaches a non-null source value to a binding: boxes primitives,
/// resolves the source leaf, performs the initial target update, and
/// installs the weak subscription when the resolved source object notifies.
fn attach_source(cx: &mut EngineCx<'_>, key: BindingKey, value: Value) {
    let source = cx.graph.box_value(value);

    let (source_property, is_expression) = {
        let Some(binding) = cx.bindings.get_mut(key.0) else {
            return;
        };
        binding.source = Some(source);
        (
            binding.options.source_property.clone(),
            binding.options.is_expression(),
        )
    };

    let slot = path::resolve(cx.graph, source, &source_property);
    if let Some(binding) = cx.bindings.get_mut(key.0) {
        binding.source_slot = slot.clone();
    }

    if is_expression {
        evaluate_into_target(cx, key);
    } else if let Some(slot) = &slot {
        let value = cx
            .graph
            .value(slot.object, &slot.property)
            .cloned()
            .unwrap_or_default();
        push_to_target(cx, key, value);
    }

    if let Some(slot) = slot
        && cx.graph.is_notifying(slot.object)
    {
        let subscription = cx.subscriptions.subscribe(slot.object, PROPERTY_CHANGED, key);
        if let Some(binding) = cx.bindings.get_mut(key.0) {
            binding.subscription = Some(subscription);
        }
    }
}

/// Detaches a binding's source: releases the subscription and clears the
/// cached resolution state so a later attach starts clean. Idempotent.
fn detach_source(cx: &mut EngineCx<'_>, key: BindingKey) {
    if let Some(binding) = cx.bindings.get_mut(key.0) {
        if let Some(subscription) = binding.subscription.take() {
            cx.subscriptions.unsubscribe(subscription);
        }
        binding.source = None;
        binding.source_slot = None;
        binding.target_slot = None;
    }
}

/// Fully removes a binding: detaches its source and drops its registry
/// entry.
fn remove_binding(cx: &mut EngineCx<'_>, key: BindingKey) {
    detach_source(cx, key);
    if let Some(binding) = cx.bindings.remove(key.0) {
        if let Some(table) = cx.registry.get_mut(&binding.target) {
            table.retain(|(_, k)| *k != key);
            if table.is_empty() {
                cx.registry.remove(&binding.target);
            }
        }
    }
}

/// Evaluates a binding's expression, reporting failures through the trace
/// sink. Returns `None` when no value was produced.
fn evaluate_expression(
    cx: &mut EngineCx<'_>,
    key: BindingKey,
    back_convert: bool,
    change: Option<ChangeModel<'_>>,
) -> Option<Value> {
    let Some(binding) = cx.bindings.get_mut(key.0) else {
        return None;
    };
    let text = binding.options.expression.clone()?;

    if binding.compiled.is_none() {
        let Some(engine) = cx.engine else {
            cx.trace.record(
                Severity::Error,
                TRACE_CATEGORY,
                &format!("no expression engine to compile {text:?}"),
            );
            return None;
        };
        match engine.compile(&text) {
            Some(compiled) => binding.compiled = Some(compiled),
            None => {
                cx.trace.record(
                    Severity::Error,
                    TRACE_CATEGORY,
                    &format!("failed to compile expression {text:?}"),
                );
                return None;
            }
        }
    }
    let compiled = binding.compiled.as_ref()?;

    // A collected source falls back to the configured global context.
    let context = binding
        .source
        .filter(|source| cx.graph.contains(*source))
        .or(cx.global_context);
    let scope = EvalScope {
        graph: &*cx.graph,
        context,
        back_convert,
        change,
    };
    match compiled.evaluate(&scope) {
        Ok(value) => Some(value),
        Err(error) => {
            cx.trace.record(
                Severity::Error,
                TRACE_CATEGORY,
                &format!("evaluation of {text:?} failed: {error}"),
            );
            None
        }
    }
}

fn evaluate_into_target(cx: &mut EngineCx<'_>, key: BindingKey) {
    if let Some(value) = evaluate_expression(cx, key, false, None) {
        push_to_target(cx, key, value);
    }
}

/// Pushes a value into the binding's target leaf. No-op while the binding
/// is already updating or when the target cannot be resolved.
fn push_to_target(cx: &mut EngineCx<'_>, key: BindingKey, value: Value) {
    let slot = {
        let Some(binding) = cx.bindings.get_mut(key.0) else {
            return;
        };
        if binding.updating {
            return;
        }
        if binding.target_slot.is_none() {
            binding.target_slot =
                path::resolve(&*cx.graph, binding.target, &binding.options.target_property);
        }
        match &binding.target_slot {
            Some(slot) => slot.clone(),
            None => return,
        }
    };
    if !cx.graph.contains(slot.object) {
        return;
    }

    set_updating(cx, key, true);
    if let Err(error) = write_property(cx, slot.object, &slot.property, value) {
        cx.trace.record(
            Severity::Error,
            TRACE_CATEGORY,
            &format!("target update of {:?} failed: {error}", slot.property),
        );
    }
    set_updating(cx, key, false);
}

/// Pushes a value into the binding's source leaf. No-op while the binding
/// is already updating or when no live source is attached.
fn push_to_source(cx: &mut EngineCx<'_>, key: BindingKey, value: Value) {
    let slot = {
        let Some(binding) = cx.bindings.get_mut(key.0) else {
            return;
        };
        if binding.updating {
            return;
        }
        let Some(source) = binding.source else {
            return;
        };
        if binding.source_slot.is_none() {
            binding.source_slot =
                path::resolve(&*cx.graph, source, &binding.options.source_property);
        }
        match &binding.source_slot {
            Some(slot) => slot.clone(),
            None => return,
        }
    };
    if !cx.graph.contains(slot.object) {
        return;
    }

    set_updating(cx, key, true);
    if let Err(error) = write_property(cx, slot.object, &slot.property, value) {
        cx.trace.record(
            Severity::Error,
            TRACE_CATEGORY,
            &format!("source update of {:?} failed: {error}", slot.property),
        );
    }
    set_updating(cx, key, false);
}

fn set_updating(cx: &mut EngineCx<'_>, key: BindingKey, updating: bool) {
    if let Some(binding) = cx.bindings.get_mut(key.0) {
        binding.updating = updating;
    }
}

/// A target-side edit arriving at a two-way binding.
fn update_source(cx: &mut EngineCx<'_>, key: BindingKey, value: Value) {
    let (computed, source_property) = {
        let Some(binding) = cx.bindings.get(key.0) else {
            return;
        };
        if binding.updating || !binding.options.two_way {
            return;
        }
        (
            binding.options.is_computed_expression(),
            binding.options.source_property.clone(),
        )
    };

    if computed {
        let change = ChangeModel {
            property: &source_property,
            value: &value,
        };
        if let Some(result) = evaluate_expression(cx, key, true, Some(change)) {
            push_to_source(cx, key, result);
        }
    } else {
        push_to_source(cx, key, value);
    }
}

/// A property-change notification arriving at a binding from its source
/// subscription.
fn react_to_change(cx: &mut EngineCx<'_>, key: BindingKey, change: &PropertyChange) {
    let (is_expression, leaf_matches) = {
        let Some(binding) = cx.bindings.get(key.0) else {
            return;
        };
        if binding.updating {
            return;
        }
        (
            binding.options.is_expression(),
            binding
                .source_slot
                .as_ref()
                .is_some_and(|slot| slot.property == change.property),
        )
    };

    if is_expression {
        evaluate_into_target(cx, key);
    } else if leaf_matches {
        push_to_target(cx, key, change.value.clone());
    }
}

/// The blessed write path: store, dispatch, context propagation, two-way
/// push-back / one-way teardown, in that order.
fn write_property(
    cx: &mut EngineCx<'_>,
    object: ObjectId,
    property: &str,
    value: Value,
) -> Result<(), PropertyError> {
    let old_context =
        (property == CONTEXT).then(|| effective_context(cx.graph, object));

    cx.graph.assign(object, property, value.clone())?;

    if cx.graph.is_notifying(object) {
        let keys: SmallVec<[BindingKey; 4]> = cx
            .subscriptions
            .subscribers(object, PROPERTY_CHANGED)
            .map(|(_, key)| key)
            .collect();
        if !keys.is_empty() {
            let change = PropertyChange {
                property: String::from(property),
                value: value.clone(),
            };
            for key in keys {
                react_to_change(cx, key, &change);
            }
        }
    }

    if let Some(old) = old_context {
        propagate_context(cx, object, old);
    }

    if let Some(key) = lookup(cx.registry, object, property) {
        let decision = cx.bindings.get(key.0).and_then(|binding| {
            if binding.updating {
                None
            } else if binding.options.two_way {
                Some(Reaction::PushBack)
            } else {
                Some(Reaction::Remove)
            }
        });
        match decision {
            Some(Reaction::PushBack) => update_source(cx, key, value),
            Some(Reaction::Remove) => remove_binding(cx, key),
            None => {}
        }
    }

    Ok(())
}

enum Reaction {
    PushBack,
    Remove,
}

/// Re-evaluates every binding that was following the old context, on the
/// changed object and on every descendant inheriting from it.
fn propagate_context(cx: &mut EngineCx<'_>, object: ObjectId, old: Option<Value>) {
    // The changed object plus all descendants without an explicit context
    // field of their own; those all observed `old` before this change.
    let mut affected: Vec<ObjectId> = Vec::new();
    let mut stack: Vec<ObjectId> = Vec::new();
    stack.push(object);
    while let Some(node) = stack.pop() {
        affected.push(node);
        for child in cx.graph.children(node) {
            if !cx.graph.has_field(*child, CONTEXT) {
                stack.push(*child);
            }
        }
    }

    let new_context = effective_context(cx.graph, object);

    for node in affected {
        let keys: SmallVec<[BindingKey; 4]> = cx
            .registry
            .get(&node)
            .map(|table| table.iter().map(|(_, key)| *key).collect())
            .unwrap_or_default();
        for key in keys {
            let skip = {
                let Some(binding) = cx.bindings.get(key.0) else {
                    continue;
                };
                // The binding that targets the context itself must not be
                // rebound by the very change it is pushing.
                (binding.options.target_property == CONTEXT && binding.updating)
                    || !source_matches(binding.source, &old)
            };
            if skip {
                continue;
            }
            detach_source(cx, key);
            if let Some(context) = new_context.clone() {
                attach_source(cx, key, context);
            }
        }
    }
}

/// Whether a binding's current source is identical to the old context.
///
/// This identity check is how context-driven bindings are told apart from
/// explicitly-sourced ones; there is no flag. A dormant binding matches an
/// absent old context, which is what wakes it when a context first arrives.
/// Known misfires are preserved: a primitive context was boxed at attach
/// time and never compares identical, and a context object that was also
/// passed as an explicit source elsewhere is indistinguishable from a
/// context-driven binding.
fn source_matches(source: Option<ObjectId>, old: &Option<Value>) -> bool {
    match (source, old) {
        (None, None) => true,
        (Some(id), Some(Value::Object(old))) => id == *old,
        _ => false,
    }
}
