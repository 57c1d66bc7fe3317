// Copyright 2025 the Tether Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Expression evaluator contract.
//!
//! The binding engine does not evaluate expressions itself; it consumes an
//! [`ExpressionEngine`] supplied by the embedder. The contract is small:
//! compile a directive's expression text once, then evaluate the compiled
//! form against an [`EvalScope`] whenever the binding needs a value.
//!
//! Forward evaluation (`back_convert == false`) produces the value pushed to
//! the binding's target. Back-conversion runs the expression in reverse for
//! two-way pushes: the scope then carries a one-key [`ChangeModel`] with the
//! edited value, and the result is pushed to the source.
//!
//! Failures are values, not panics: both compile and evaluate report
//! [`EvalError`], which the engine's caller logs and swallows: a failed
//! evaluation means "no update", never a torn-down binding.

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

use tether_object::{ObjectGraph, ObjectId, Value};

/// A position in expression source text.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Location {
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

/// A compile- or evaluation-time expression failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvalError {
    /// What went wrong.
    pub message: String,
    /// Where, when the evaluator can tell.
    pub location: Option<Location>,
}

impl EvalError {
    /// Creates an error with a message and no location.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(at) => write!(
                f,
                "expression error at {}:{}: {}",
                at.line, at.column, self.message
            ),
            None => write!(f, "expression error: {}", self.message),
        }
    }
}

impl core::error::Error for EvalError {}

/// The one-key update model handed to a back-converting evaluation.
#[derive(Copy, Clone, Debug)]
pub struct ChangeModel<'a> {
    /// The source property being written.
    pub property: &'a str,
    /// The value the target was edited to.
    pub value: &'a Value,
}

/// Everything a compiled expression may consult during one evaluation.
#[derive(Debug)]
pub struct EvalScope<'a> {
    /// Read-only view of the object graph.
    pub graph: &'a ObjectGraph,
    /// The context object: the binding's source, or the binder's configured
    /// global context when no source is bound.
    pub context: Option<ObjectId>,
    /// `true` when evaluating in reverse for a two-way push.
    pub back_convert: bool,
    /// Present only during back-conversion.
    pub change: Option<ChangeModel<'a>>,
}

/// Compiles expression text.
pub trait ExpressionEngine {
    /// Compiles `text`, or returns `None` if it is not a valid expression.
    fn compile(&self, text: &str) -> Option<Box<dyn CompiledExpression>>;
}

/// A compiled expression, evaluated once per binding update.
pub trait CompiledExpression {
    /// Evaluates against the given scope.
    fn evaluate(&self, scope: &EvalScope<'_>) -> Result<Value, EvalError>;
}

impl fmt::Debug for dyn CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpression").finish_non_exhaustive()
    }
}
