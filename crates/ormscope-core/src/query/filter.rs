//! Filter evaluation against bound rows.
//!
//! Plan filters are qualified, so evaluating one needs to know which row
//! each table alias refers to. [`Bindings`] tracks that as a stack of
//! `(alias, fields)` frames, pushed as the executor descends into joins.

use ormscope_proto::{Clause, ColumnRef, Condition, Filter, QualifiedFilter, Value};

use crate::error::StoreError;

static NULL: Value = Value::Null;

/// Rows bound to table aliases at one point of plan execution.
#[derive(Debug, Clone, Default)]
pub struct Bindings<'r> {
    frames: Vec<(&'r str, &'r [(String, Value)])>,
}

impl<'r> Bindings<'r> {
    /// Create empty bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return these bindings extended with `alias` bound to `fields`.
    pub fn with(&self, alias: &'r str, fields: &'r [(String, Value)]) -> Self {
        let mut frames = self.frames.clone();
        frames.push((alias, fields));
        Self { frames }
    }

    /// Resolve a qualified column to its value.
    ///
    /// A missing field reads as null. Bare columns and aliases that are not
    /// bound fail with [`StoreError::UnboundColumn`].
    pub fn resolve(&self, column: &ColumnRef) -> Result<&'r Value, StoreError> {
        let fields = column
            .table
            .as_deref()
            .and_then(|table| {
                self.frames
                    .iter()
                    .rev()
                    .find(|(alias, _)| *alias == table)
                    .map(|(_, fields)| *fields)
            })
            .ok_or_else(|| StoreError::UnboundColumn {
                column: column.to_string(),
            })?;

        Ok(fields
            .iter()
            .find(|(name, _)| *name == column.name)
            .map(|(_, value)| value)
            .unwrap_or(&NULL))
    }
}

/// Evaluates qualified filters against bound rows.
pub struct FilterEvaluator;

impl FilterEvaluator {
    /// Evaluate a plan filter.
    pub fn evaluate(filter: &QualifiedFilter, bindings: &Bindings<'_>) -> Result<bool, StoreError> {
        Self::matches(filter.as_filter(), bindings)
    }

    fn matches(filter: &Filter, bindings: &Bindings<'_>) -> Result<bool, StoreError> {
        for clause in filter.clauses() {
            let matched = match clause {
                Clause::Attr { column, condition } => {
                    Self::check(bindings.resolve(column)?, condition)
                }
                Clause::Any(filters) => {
                    let mut any = false;
                    for filter in filters {
                        if Self::matches(filter, bindings)? {
                            any = true;
                            break;
                        }
                    }
                    any
                }
                Clause::Not(filter) => !Self::matches(filter, bindings)?,
            };
            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Check one value against a condition with SQL null semantics: null
    /// only satisfies `IS NULL` and equality with a null literal.
    pub fn check(value: &Value, condition: &Condition) -> bool {
        let compare = |literal: &Value, accept: fn(std::cmp::Ordering) -> bool| {
            value.compare(literal).map(accept).unwrap_or(false)
        };

        match condition {
            Condition::Eq(Value::Null) | Condition::IsNull => value.is_null(),
            Condition::Ne(Value::Null) | Condition::IsNotNull => !value.is_null(),
            _ if value.is_null() => false,
            Condition::Eq(literal) => value.loose_eq(literal),
            Condition::Ne(literal) => !value.loose_eq(literal),
            Condition::Lt(literal) => compare(literal, std::cmp::Ordering::is_lt),
            Condition::Le(literal) => compare(literal, std::cmp::Ordering::is_le),
            Condition::Gt(literal) => compare(literal, std::cmp::Ordering::is_gt),
            Condition::Ge(literal) => compare(literal, std::cmp::Ordering::is_ge),
            Condition::In(values) => values.iter().any(|v| value.loose_eq(v)),
            Condition::NotIn(values) => !values.iter().any(|v| value.loose_eq(v)),
            Condition::Like(pattern) => value
                .as_str()
                .map(|s| Self::like_match(s, pattern))
                .unwrap_or(false),
            Condition::NotLike(pattern) => value
                .as_str()
                .map(|s| !Self::like_match(s, pattern))
                .unwrap_or(false),
            Condition::All(conditions) => conditions.iter().all(|c| Self::check(value, c)),
        }
    }

    /// Match a string against a SQL LIKE pattern.
    ///
    /// `%` matches any run of characters, `_` exactly one, and a backslash
    /// escapes the next pattern character.
    pub fn like_match(value: &str, pattern: &str) -> bool {
        let mut chars = value.chars().peekable();
        let mut pattern_chars = pattern.chars().peekable();

        Self::like_match_recursive(&mut chars, &mut pattern_chars)
    }

    fn like_match_recursive(
        chars: &mut std::iter::Peekable<std::str::Chars>,
        pattern: &mut std::iter::Peekable<std::str::Chars>,
    ) -> bool {
        loop {
            match (pattern.peek().copied(), chars.peek().copied()) {
                (None, None) => return true,
                (None, Some(_)) => return false,
                (Some('%'), _) => {
                    pattern.next();
                    if pattern.peek().is_none() {
                        return true;
                    }

                    // Backtrack over every split point.
                    loop {
                        let mut pattern_clone = pattern.clone();
                        let mut chars_clone = chars.clone();
                        if Self::like_match_recursive(&mut chars_clone, &mut pattern_clone) {
                            return true;
                        }
                        if chars.next().is_none() {
                            return false;
                        }
                    }
                }
                (Some('_'), Some(_)) => {
                    pattern.next();
                    chars.next();
                }
                (Some('_'), None) => return false,
                (Some('\\'), _) => {
                    pattern.next();
                    match (pattern.peek().copied(), chars.peek().copied()) {
                        (Some(p), Some(c)) if p == c => {
                            pattern.next();
                            chars.next();
                        }
                        _ => return false,
                    }
                }
                (Some(p), Some(c)) if p == c => {
                    pattern.next();
                    chars.next();
                }
                (Some(_), _) => return false,
            }
        }
    }
}
