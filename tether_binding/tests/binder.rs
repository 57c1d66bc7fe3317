// Copyright 2025 the Tether Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for the `tether_binding` engine.
//!
//! These exercise the observable contract end to end: binding lifecycle and
//! teardown, two-way arbitration without oscillation, one-way
//! self-destruction, context inheritance and rebinding, dotted paths, and
//! the recovery paths for expression and property-set failures.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tether_binding::{
    Binder, BindingOptions, BufferTrace, CompiledExpression, EvalError, EvalScope,
    ExpressionEngine, Severity, TraceSink, CONTEXT,
};
use tether_object::{ObjectId, ObjectKind, Value};

// ---------------------------------------------------------------------------
// Test collaborators
// ---------------------------------------------------------------------------

/// An expression engine that understands exactly `"<property> + <number>"`
/// (and its spaceless form). Forward evaluation reads the property from the
/// context object and adds the constant; back-conversion subtracts it from
/// the change-model value. Every evaluation bumps a shared counter, which
/// makes notification dispatch countable from the outside.
struct Arithmetic {
    evals: Rc<Cell<u32>>,
}

impl Arithmetic {
    fn install(binder: &mut Binder) -> Rc<Cell<u32>> {
        let evals = Rc::new(Cell::new(0));
        binder.set_expression_engine(Box::new(Self {
            evals: Rc::clone(&evals),
        }));
        evals
    }
}

impl ExpressionEngine for Arithmetic {
    fn compile(&self, text: &str) -> Option<Box<dyn CompiledExpression>> {
        let (property, addend) = text.split_once('+')?;
        let addend: f64 = addend.trim().parse().ok()?;
        Some(Box::new(AddConstant {
            property: property.trim().to_string(),
            addend,
            evals: Rc::clone(&self.evals),
        }))
    }
}

struct AddConstant {
    property: String,
    addend: f64,
    evals: Rc<Cell<u32>>,
}

impl CompiledExpression for AddConstant {
    fn evaluate(&self, scope: &EvalScope<'_>) -> Result<Value, EvalError> {
        self.evals.set(self.evals.get() + 1);
        if scope.back_convert {
            let change = scope
                .change
                .ok_or_else(|| EvalError::new("missing change model"))?;
            let edited = change
                .value
                .as_number()
                .ok_or_else(|| EvalError::new("edited value is not a number"))?;
            return Ok(Value::from(edited - self.addend));
        }

        let context = scope
            .context
            .ok_or_else(|| EvalError::new("no evaluation context"))?;
        let current = scope
            .graph
            .value(context, &self.property)
            .and_then(Value::as_number)
            .ok_or_else(|| EvalError::new("context has no such numeric field"))?;
        Ok(Value::from(current + self.addend))
    }
}

/// A trace sink handle that can still be inspected after being handed to
/// the binder.
#[derive(Clone, Default)]
struct SharedTrace(Rc<RefCell<BufferTrace>>);

impl SharedTrace {
    fn install(binder: &mut Binder) -> Self {
        let trace = Self::default();
        binder.set_trace(Box::new(trace.clone()));
        trace
    }

    fn error_count(&self) -> usize {
        self.0
            .borrow()
            .events()
            .iter()
            .filter(|event| event.severity == Severity::Error)
            .count()
    }
}

impl TraceSink for SharedTrace {
    fn record(&mut self, severity: Severity, category: &str, message: &str) {
        self.0.borrow_mut().record(severity, category, message);
    }
}

fn notifying(binder: &mut Binder) -> ObjectId {
    binder.graph_mut().insert(ObjectKind::Notifying)
}

fn named_model(binder: &mut Binder, name: &str) -> ObjectId {
    let model = notifying(binder);
    binder
        .graph_mut()
        .assign(model, "name", Value::from(name))
        .unwrap();
    model
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn bind_then_unbind_is_a_clean_teardown() {
    let mut binder = Binder::new();
    let model = notifying(&mut binder);
    let view = notifying(&mut binder);
    binder.set(model, "age", Value::from(1)).unwrap();

    binder
        .bind(
            view,
            BindingOptions::parse("label", "age"),
            Some(Value::from(model)),
        )
        .unwrap();
    assert_eq!(binder.subscriptions().len(), 1);

    binder.unbind(view, "label");
    assert!(!binder.has_binding(view, "label"));
    assert_eq!(binder.binding_count(), 0);
    assert!(binder.subscriptions().is_empty());

    // Calling unbind again is safe, and the old source is disconnected.
    binder.unbind(view, "label");
    binder.set(model, "age", Value::from(2)).unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from(1)));
}

#[test]
fn one_way_binding_removes_itself_on_a_foreign_edit() {
    let mut binder = Binder::new();
    let model = notifying(&mut binder);
    let view = notifying(&mut binder);
    binder.set(model, "age", Value::from(1)).unwrap();

    let options = BindingOptions {
        target_property: String::from("label"),
        source_property: String::from("age"),
        expression: None,
        two_way: false,
    };
    binder.bind(view, options, Some(Value::from(model))).unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from(1)));

    // The binding's own pushes do not count as foreign edits.
    binder.set(model, "age", Value::from(2)).unwrap();
    assert!(binder.has_binding(view, "label"));
    assert_eq!(binder.get(view, "label"), Some(&Value::from(2)));

    // Anyone else touching the target tears the binding down.
    binder.set(view, "label", Value::from(3)).unwrap();
    assert!(!binder.has_binding(view, "label"));
    assert!(binder.subscriptions().is_empty());

    // The source no longer reaches the target, and nothing was pushed back.
    binder.set(model, "age", Value::from(4)).unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from(3)));
    assert_eq!(binder.get(model, "age"), Some(&Value::from(4)));
}

// ---------------------------------------------------------------------------
// Two-way arbitration
// ---------------------------------------------------------------------------

#[test]
fn two_way_round_trip_settles_without_oscillation() {
    let mut binder = Binder::new();
    let evals = Arithmetic::install(&mut binder);
    let model = notifying(&mut binder);
    let view = notifying(&mut binder);
    binder.set(model, "age", Value::from(0)).unwrap();
    binder.set(view, "age", Value::from(0)).unwrap();

    binder
        .bind(
            view,
            BindingOptions::parse("age", "age"),
            Some(Value::from(model)),
        )
        .unwrap();

    // Expression probes subscribed to each side: one evaluation per
    // notification dispatched by that object.
    let model_probe = notifying(&mut binder);
    let view_probe = notifying(&mut binder);
    binder
        .bind(
            model_probe,
            BindingOptions::parse("count", "age + 0"),
            Some(Value::from(model)),
        )
        .unwrap();
    binder
        .bind(
            view_probe,
            BindingOptions::parse("count", "age + 0"),
            Some(Value::from(view)),
        )
        .unwrap();
    let baseline = evals.get();

    // Source edit: one notification on the model, one push to the view.
    binder.set(model, "age", Value::from(5)).unwrap();
    assert_eq!(binder.get(view, "age"), Some(&Value::from(5)));
    assert_eq!(evals.get() - baseline, 2);

    // Target edit: one notification on the view, one push back to the
    // model, and no echo in either direction.
    binder.set(view, "age", Value::from(9)).unwrap();
    assert_eq!(binder.get(model, "age"), Some(&Value::from(9)));
    assert_eq!(binder.get(view, "age"), Some(&Value::from(9)));
    assert_eq!(evals.get() - baseline, 4);
}

#[test]
fn two_way_bindings_between_two_properties_of_one_object() {
    let mut binder = Binder::new();
    let object = notifying(&mut binder);
    binder.set(object, "a", Value::from(1)).unwrap();

    binder
        .bind(
            object,
            BindingOptions::parse("b", "a"),
            Some(Value::from(object)),
        )
        .unwrap();
    assert_eq!(binder.get(object, "b"), Some(&Value::from(1)));

    binder.set(object, "a", Value::from(2)).unwrap();
    assert_eq!(binder.get(object, "b"), Some(&Value::from(2)));

    binder.set(object, "b", Value::from(3)).unwrap();
    assert_eq!(binder.get(object, "a"), Some(&Value::from(3)));
}

// ---------------------------------------------------------------------------
// Binding context
// ---------------------------------------------------------------------------

#[test]
fn context_change_rebinds_context_driven_bindings() {
    let mut binder = Binder::new();
    let view = notifying(&mut binder);
    let first = named_model(&mut binder, "first");
    let second = named_model(&mut binder, "second");

    binder.set(view, CONTEXT, Value::from(first)).unwrap();
    binder
        .bind(view, BindingOptions::parse("label", "name"), None)
        .unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from("first")));

    binder.set(view, CONTEXT, Value::from(second)).unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from("second")));
    assert_eq!(binder.binding(view, "label").unwrap().source(), Some(second));

    // The old context is disconnected.
    binder.set(first, "name", Value::from("changed")).unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from("second")));
}

#[test]
fn explicitly_sourced_bindings_ignore_context_changes() {
    let mut binder = Binder::new();
    let view = notifying(&mut binder);
    let context = named_model(&mut binder, "ctx");
    let explicit = named_model(&mut binder, "explicit");

    binder.set(view, CONTEXT, Value::from(context)).unwrap();
    binder
        .bind(
            view,
            BindingOptions::parse("label", "name"),
            Some(Value::from(explicit)),
        )
        .unwrap();

    let other = named_model(&mut binder, "other");
    binder.set(view, CONTEXT, Value::from(other)).unwrap();

    let binding = binder.binding(view, "label").unwrap();
    assert_eq!(binding.source(), Some(explicit));
    assert_eq!(binder.get(view, "label"), Some(&Value::from("explicit")));
}

#[test]
fn dormant_binding_wakes_when_an_ancestor_context_arrives() {
    let mut binder = Binder::new();
    let parent = notifying(&mut binder);
    let view = notifying(&mut binder);
    binder.graph_mut().set_parent(view, Some(parent)).unwrap();

    // No context anywhere: the binding stays dormant.
    binder
        .bind(view, BindingOptions::parse("label", "name"), None)
        .unwrap();
    assert!(!binder.binding(view, "label").unwrap().is_bound());
    assert_eq!(binder.get(view, "label"), None);

    // A context arriving on the ancestor reaches the inheriting child.
    let model = named_model(&mut binder, "woken");
    binder.set(parent, CONTEXT, Value::from(model)).unwrap();
    assert!(binder.binding(view, "label").unwrap().is_bound());
    assert_eq!(binder.get(view, "label"), Some(&Value::from("woken")));
}

#[test]
fn explicit_null_context_overrides_inheritance() {
    let mut binder = Binder::new();
    let parent = notifying(&mut binder);
    let view = notifying(&mut binder);
    binder.graph_mut().set_parent(view, Some(parent)).unwrap();

    let inherited = named_model(&mut binder, "inherited");
    binder.set(parent, CONTEXT, Value::from(inherited)).unwrap();
    binder
        .bind(view, BindingOptions::parse("label", "name"), None)
        .unwrap();
    assert!(binder.binding(view, "label").unwrap().is_bound());

    // An explicit null on the child detaches it from the inherited context.
    binder.set(view, CONTEXT, Value::Null).unwrap();
    assert!(!binder.binding(view, "label").unwrap().is_bound());
    assert_eq!(binder.context(view), None);

    // A later explicit context takes over again.
    let own = named_model(&mut binder, "own");
    binder.set(view, CONTEXT, Value::from(own)).unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from("own")));
}

#[test]
fn context_binding_drives_sibling_rebinds_but_not_itself() {
    let mut binder = Binder::new();
    let view = notifying(&mut binder);
    let host = notifying(&mut binder);
    let first = named_model(&mut binder, "first");
    let second = named_model(&mut binder, "second");
    binder.set(host, "detail", Value::from(first)).unwrap();

    // The context itself is bound to `host.detail`; the label follows the
    // context.
    binder
        .bind(
            view,
            BindingOptions::parse(CONTEXT, "detail"),
            Some(Value::from(host)),
        )
        .unwrap();
    binder
        .bind(view, BindingOptions::parse("label", "name"), None)
        .unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from("first")));

    // Pushing a new detail rebinds the label, while the context binding
    // stays attached to the host it was given.
    binder.set(host, "detail", Value::from(second)).unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from("second")));
    assert_eq!(binder.binding(view, CONTEXT).unwrap().source(), Some(host));
}

#[test]
fn primitive_contexts_never_match_the_rebind_heuristic() {
    // A primitive context is boxed at attach time, so the identity check
    // against the old context value can never succeed and the binding is
    // left alone. This fragility is part of the contract.
    let mut binder = Binder::new();
    let view = notifying(&mut binder);

    binder.set(view, CONTEXT, Value::from(5)).unwrap();
    binder
        .bind(view, BindingOptions::parse("label", "name"), None)
        .unwrap();
    let boxed = binder.binding(view, "label").unwrap().source().unwrap();

    binder.set(view, CONTEXT, Value::from(6)).unwrap();
    assert_eq!(binder.binding(view, "label").unwrap().source(), Some(boxed));
}

// ---------------------------------------------------------------------------
// Dotted paths
// ---------------------------------------------------------------------------

#[test]
fn dotted_target_paths_write_to_the_inner_object() {
    let mut binder = Binder::new();
    let model = notifying(&mut binder);
    let view = notifying(&mut binder);
    let address = notifying(&mut binder);
    binder
        .graph_mut()
        .assign(view, "address", Value::from(address))
        .unwrap();
    binder.set(model, "city", Value::from("Paris")).unwrap();

    binder
        .bind(
            view,
            BindingOptions::parse("address.city", "city"),
            Some(Value::from(model)),
        )
        .unwrap();

    assert_eq!(binder.get(address, "city"), Some(&Value::from("Paris")));
    assert_eq!(binder.get(view, "address.city"), None);

    binder.set(model, "city", Value::from("Lyon")).unwrap();
    assert_eq!(binder.get(address, "city"), Some(&Value::from("Lyon")));
}

#[test]
fn dotted_source_paths_track_the_resolved_instance() {
    let mut binder = Binder::new();
    let model = notifying(&mut binder);
    let view = notifying(&mut binder);
    let address = notifying(&mut binder);
    binder
        .graph_mut()
        .assign(model, "address", Value::from(address))
        .unwrap();
    binder.set(address, "city", Value::from("Paris")).unwrap();

    binder
        .bind(
            view,
            BindingOptions::parse("label", "address.city"),
            Some(Value::from(model)),
        )
        .unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from("Paris")));

    // Changes on the resolved inner instance flow through.
    binder.set(address, "city", Value::from("Lyon")).unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from("Lyon")));

    // Intermediates were read once at resolution time: replacing the
    // `address` object is not observed, the original instance still is.
    let moved = notifying(&mut binder);
    binder.set(moved, "city", Value::from("Nice")).unwrap();
    binder.set(model, "address", Value::from(moved)).unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from("Lyon")));

    binder.set(address, "city", Value::from("Arles")).unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from("Arles")));
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[test]
fn expression_bindings_evaluate_forward() {
    let mut binder = Binder::new();
    Arithmetic::install(&mut binder);
    let model = notifying(&mut binder);
    let view = notifying(&mut binder);
    binder.set(model, "age", Value::from(40)).unwrap();

    binder
        .bind(
            view,
            BindingOptions::parse("label", "age, age + 2"),
            Some(Value::from(model)),
        )
        .unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from(42)));

    binder.set(model, "age", Value::from(50)).unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from(52)));
}

#[test]
fn computed_expressions_back_convert_on_target_edits() {
    let mut binder = Binder::new();
    Arithmetic::install(&mut binder);
    let model = notifying(&mut binder);
    let view = notifying(&mut binder);
    binder.set(model, "age", Value::from(1)).unwrap();

    binder
        .bind(
            view,
            BindingOptions::parse("label", "age, age + 10"),
            Some(Value::from(model)),
        )
        .unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from(11)));

    // Editing the target runs the expression in reverse and pushes the
    // result to the source, without an echo back into the target.
    binder.set(view, "label", Value::from(25)).unwrap();
    assert_eq!(binder.get(model, "age"), Some(&Value::from(15)));
    assert_eq!(binder.get(view, "label"), Some(&Value::from(25)));
}

#[test]
fn spaceless_expressions_push_the_raw_value_back() {
    let mut binder = Binder::new();
    Arithmetic::install(&mut binder);
    let model = notifying(&mut binder);
    let view = notifying(&mut binder);
    binder.set(model, "age", Value::from(1)).unwrap();

    // `age+1` is an expression, but without a space it does not count as
    // computed: target edits push the raw value, not a back-conversion.
    binder
        .bind(
            view,
            BindingOptions::parse("label", "age+1"),
            Some(Value::from(model)),
        )
        .unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from(2)));

    binder.set(view, "label", Value::from(9)).unwrap();
    assert_eq!(binder.get(model, "age"), Some(&Value::from(9)));
}

#[test]
fn expression_failures_are_logged_and_skipped() {
    let mut binder = Binder::new();
    Arithmetic::install(&mut binder);
    let trace = SharedTrace::install(&mut binder);
    let model = notifying(&mut binder);
    let view = notifying(&mut binder);
    binder.set(view, "label", Value::from("kept")).unwrap();

    // The engine cannot compile this directive: the failure is reported and
    // the target keeps its value.
    binder
        .bind(
            view,
            BindingOptions::parse("label", "age, age * 2"),
            Some(Value::from(model)),
        )
        .unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from("kept")));
    assert_eq!(trace.error_count(), 1);

    // Evaluation failures (here: no numeric `age` on the source) are also
    // recovered per push.
    binder
        .bind(
            view,
            BindingOptions::parse("label", "age, age + 2"),
            Some(Value::from(model)),
        )
        .unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from("kept")));
    assert_eq!(trace.error_count(), 2);

    // Once the source gains the field, the same binding starts working.
    binder.set(model, "age", Value::from(3)).unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from(5)));
}

#[test]
fn collected_sources_fall_back_to_the_global_context() {
    let mut binder = Binder::new();
    Arithmetic::install(&mut binder);
    let model = notifying(&mut binder);
    let view = notifying(&mut binder);
    let address = notifying(&mut binder);
    binder
        .graph_mut()
        .assign(model, "address", Value::from(address))
        .unwrap();
    binder.set(model, "city", Value::from(10)).unwrap();
    binder.set(address, "city", Value::from(0)).unwrap();

    // The subscription follows the resolved inner instance, while the
    // expression evaluates against the source root.
    binder
        .bind(
            view,
            BindingOptions::parse("label", "address.city, city + 1"),
            Some(Value::from(model)),
        )
        .unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from(11)));

    // Collect the root and configure a fallback context. The next
    // notification from the still-live inner instance evaluates against
    // the fallback instead of the dead source.
    let fallback = notifying(&mut binder);
    binder.set(fallback, "city", Value::from(100)).unwrap();
    binder.graph_mut().remove(model);
    binder.set_global_context(Some(fallback));

    binder.set(address, "city", Value::from(1)).unwrap();
    assert_eq!(binder.get(view, "label"), Some(&Value::from(101)));
}

#[test]
fn missing_engine_is_a_logged_compile_failure() {
    let mut binder = Binder::new();
    let trace = SharedTrace::install(&mut binder);
    let model = notifying(&mut binder);
    let view = notifying(&mut binder);

    binder
        .bind(
            view,
            BindingOptions::parse("label", "age, age + 1"),
            Some(Value::from(model)),
        )
        .unwrap();

    assert_eq!(binder.get(view, "label"), None);
    assert_eq!(trace.error_count(), 1);
}

// ---------------------------------------------------------------------------
// Property-set failures
// ---------------------------------------------------------------------------

#[test]
fn rejected_target_writes_are_logged_and_leave_the_binding_usable() {
    let mut binder = Binder::new();
    let trace = SharedTrace::install(&mut binder);
    let model = notifying(&mut binder);
    let view = notifying(&mut binder);
    binder.set(model, "age", Value::from(1)).unwrap();
    binder.graph_mut().seal(view);

    // Every push is rejected by the sealed target, logged, and recovered.
    binder
        .bind(
            view,
            BindingOptions::parse("label", "age"),
            Some(Value::from(model)),
        )
        .unwrap();
    assert_eq!(trace.error_count(), 1);
    assert_eq!(binder.get(view, "label"), None);

    binder.set(model, "age", Value::from(2)).unwrap();
    assert_eq!(trace.error_count(), 2);

    // The binding is not wedged: the guard was reset both times.
    assert!(!binder.binding(view, "label").unwrap().is_updating());
    assert!(binder.has_binding(view, "label"));
}
