// Copyright 2025 the Tether Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding directives and their compact grammar.
//!
//! A binding is declared with a target property name and a directive string:
//!
//! - `"age"`: bind to the source property `age`, two-way.
//! - `"age + 1"`: a single token containing expression symbols is itself a
//!   computed expression; the property used for change matching is the token
//!   up to the first symbol character.
//! - `"age, age + 1"`: source property and expression, comma-separated.
//! - `"age, age + 1, false"`: with an explicit two-way flag.
//!
//! Two-way defaults to `true` in every form.

use alloc::string::String;
use core::fmt;

/// Returns `true` for characters that mark a directive token as an
/// expression rather than a bare property reference.
///
/// The same predicate truncates a token to its leading property name, so the
/// two uses cannot drift apart. Whitespace counts as a symbol; `.` does not,
/// so dotted property paths stay plain references.
fn is_expression_char(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '+' | '-' | '*' | '%' | '?' | ':' | '<' | '>' | '=' | '!' | '|' | '&' | '(' | ')'
                | '[' | ']'
        )
}

/// Returns the leading property name of a token: everything before the
/// first expression symbol.
fn property_prefix(token: &str) -> &str {
    match token.find(is_expression_char) {
        Some(end) => &token[..end],
        None => token,
    }
}

/// A parsed binding directive.
///
/// Plain data; see [`BindingOptions::parse`] for the grammar.
#[derive(Clone, PartialEq, Eq)]
pub struct BindingOptions {
    /// The property on the binding's target that receives values.
    pub target_property: String,
    /// The property on the source whose changes feed the binding. For
    /// expression directives this is the leading property name of the token.
    pub source_property: String,
    /// The expression to evaluate instead of reading `source_property`
    /// directly, if the directive carried one.
    pub expression: Option<String>,
    /// Whether target edits are pushed back to the source.
    pub two_way: bool,
}

impl fmt::Debug for BindingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingOptions")
            .field("target_property", &self.target_property)
            .field("source_property", &self.source_property)
            .field("expression", &self.expression)
            .field("two_way", &self.two_way)
            .finish()
    }
}

impl BindingOptions {
    /// Parses a directive string for the given target property.
    ///
    /// A comma-free directive is a source property, or a computed expression
    /// if it contains any expression symbol. Two or three comma-separated
    /// tokens are `source, expression[, two_way]`; the two-way token is
    /// compared case-insensitively against `"true"`. Tokens beyond the third
    /// are ignored. Two-way defaults to `true` whenever the flag is absent.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tether_binding::BindingOptions;
    ///
    /// let options = BindingOptions::parse("label", "age, age + 1, false");
    /// assert_eq!(options.source_property, "age");
    /// assert_eq!(options.expression.as_deref(), Some("age + 1"));
    /// assert!(!options.two_way);
    /// ```
    #[must_use]
    pub fn parse(target_property: &str, directive: &str) -> Self {
        let mut tokens = directive.split(',');
        let first = tokens.next().unwrap_or("").trim();

        let (source_property, expression, two_way) = match tokens.next() {
            None => {
                if first.contains(is_expression_char) {
                    (property_prefix(first), Some(String::from(first)), true)
                } else {
                    (first, None, true)
                }
            }
            Some(second) => {
                let two_way = match tokens.next() {
                    Some(flag) => flag.trim().eq_ignore_ascii_case("true"),
                    None => true,
                };
                (
                    property_prefix(first),
                    Some(String::from(second.trim())),
                    two_way,
                )
            }
        };

        Self {
            target_property: String::from(target_property),
            source_property: String::from(source_property),
            expression,
            two_way,
        }
    }

    /// Returns `true` if this binding evaluates an expression instead of
    /// reading the source property directly.
    #[must_use]
    pub fn is_expression(&self) -> bool {
        self.expression.is_some()
    }

    /// Returns `true` if the expression is computed rather than a literal
    /// property reference.
    ///
    /// The discriminator is the presence of a space. This is a heuristic
    /// with known false negatives (`"age+1"` is computed but spaceless) that
    /// reverse pushes depend on; it is preserved as-is.
    #[must_use]
    pub fn is_computed_expression(&self) -> bool {
        self.expression.as_deref().is_some_and(|e| e.contains(' '))
    }
}
