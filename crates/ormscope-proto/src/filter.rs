//! Filter expression tree.
//!
//! A [`Filter`] is a conjunction of clauses. Attribute clauses are keyed by
//! the column they constrain, so merging two filters replaces a clause of
//! the earlier filter when the later one constrains the same column, and
//! accumulates everything else. Grouped clauses (`Any`, `Not`) carry no key
//! and always accumulate.
//!
//! Plans never hold a bare [`Filter`]: they hold a [`QualifiedFilter`],
//! which can only be produced by qualifying every column reference to a
//! table alias.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A reference to a column, optionally qualified by a table alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Table alias, `None` for a bare reference.
    pub table: Option<String>,
    /// Column name.
    pub name: String,
}

impl ColumnRef {
    /// Create a bare (unqualified) column reference.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            table: None,
            name: name.into(),
        }
    }

    /// Create a column reference qualified by a table alias.
    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    /// Parse `"column"` or `"alias.column"`.
    pub fn parse(reference: &str) -> Self {
        match reference.rsplit_once('.') {
            Some((table, name)) if !table.is_empty() && !name.is_empty() => {
                Self::qualified(table, name)
            }
            _ => Self::bare(reference),
        }
    }

    /// Check whether the reference carries a table alias.
    pub fn is_qualified(&self) -> bool {
        self.table.is_some()
    }

    /// Qualify a bare reference; qualified references are returned unchanged.
    pub fn qualify(&self, alias: &str) -> Self {
        match self.table {
            Some(_) => self.clone(),
            None => Self::qualified(alias, self.name.clone()),
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(reference: &str) -> Self {
        Self::parse(reference)
    }
}

impl From<String> for ColumnRef {
    fn from(reference: String) -> Self {
        Self::parse(&reference)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "\"{}\".\"{}\"", table, self.name),
            None => write!(f, "\"{}\"", self.name),
        }
    }
}

/// A comparison applied to a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// Column equals value (`IS NULL` when the value is null).
    Eq(Value),
    /// Column does not equal value.
    Ne(Value),
    /// Column less than value.
    Lt(Value),
    /// Column less than or equal to value.
    Le(Value),
    /// Column greater than value.
    Gt(Value),
    /// Column greater than or equal to value.
    Ge(Value),
    /// Column is one of the values.
    In(Vec<Value>),
    /// Column is none of the values.
    NotIn(Vec<Value>),
    /// Column is null.
    IsNull,
    /// Column is not null.
    IsNotNull,
    /// Column matches a LIKE pattern.
    Like(String),
    /// Column does not match a LIKE pattern.
    NotLike(String),
    /// Every condition must hold (several operators on one column).
    All(Vec<Condition>),
}

impl Condition {
    fn write_sql(&self, f: &mut fmt::Formatter<'_>, column: &ColumnRef) -> fmt::Result {
        match self {
            Condition::Eq(Value::Null) => write!(f, "{} IS NULL", column),
            Condition::Eq(v) => write!(f, "{} = {}", column, v),
            Condition::Ne(Value::Null) => write!(f, "{} IS NOT NULL", column),
            Condition::Ne(v) => write!(f, "{} != {}", column, v),
            Condition::Lt(v) => write!(f, "{} < {}", column, v),
            Condition::Le(v) => write!(f, "{} <= {}", column, v),
            Condition::Gt(v) => write!(f, "{} > {}", column, v),
            Condition::Ge(v) => write!(f, "{} >= {}", column, v),
            Condition::In(values) => write!(f, "{} IN ({})", column, join_values(values)),
            Condition::NotIn(values) => {
                write!(f, "{} NOT IN ({})", column, join_values(values))
            }
            Condition::IsNull => write!(f, "{} IS NULL", column),
            Condition::IsNotNull => write!(f, "{} IS NOT NULL", column),
            Condition::Like(p) => write!(f, "{} LIKE {}", column, Value::from(p.as_str())),
            Condition::NotLike(p) => {
                write!(f, "{} NOT LIKE {}", column, Value::from(p.as_str()))
            }
            Condition::All(conditions) => {
                for (i, condition) in conditions.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" AND ")?;
                    }
                    condition.write_sql(f, column)?;
                }
                Ok(())
            }
        }
    }
}

fn join_values(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One conjunct of a [`Filter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Clause {
    /// A condition on one column. Keyed by the column.
    Attr {
        column: ColumnRef,
        condition: Condition,
    },
    /// At least one of the filters must match.
    Any(Vec<Filter>),
    /// The filter must not match.
    Not(Filter),
}

impl Clause {
    /// The merge key of this clause, if it has one.
    pub fn key(&self) -> Option<&ColumnRef> {
        match self {
            Clause::Attr { column, .. } => Some(column),
            Clause::Any(_) | Clause::Not(_) => None,
        }
    }

    fn qualify(&self, alias: &str) -> Clause {
        match self {
            Clause::Attr { column, condition } => Clause::Attr {
                column: column.qualify(alias),
                condition: condition.clone(),
            },
            Clause::Any(filters) => Clause::Any(filters.iter().map(|f| f.qualify(alias)).collect()),
            Clause::Not(filter) => Clause::Not(filter.qualify(alias)),
        }
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            Clause::Attr { column, .. } => out.push(column),
            Clause::Any(filters) => {
                for filter in filters {
                    filter.collect_columns(out);
                }
            }
            Clause::Not(filter) => filter.collect_columns(out),
        }
    }
}

/// A conjunction of clauses with last-applied-wins merging per column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    /// Create an empty filter (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition on a column, replacing any existing condition on
    /// the same column.
    pub fn attr(mut self, column: impl Into<ColumnRef>, condition: Condition) -> Self {
        self.push(Clause::Attr {
            column: column.into(),
            condition,
        });
        self
    }

    /// Column equals value.
    pub fn eq(self, column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        self.attr(column, Condition::Eq(value.into()))
    }

    /// Column does not equal value.
    pub fn ne(self, column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        self.attr(column, Condition::Ne(value.into()))
    }

    /// Column less than value.
    pub fn lt(self, column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        self.attr(column, Condition::Lt(value.into()))
    }

    /// Column less than or equal to value.
    pub fn le(self, column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        self.attr(column, Condition::Le(value.into()))
    }

    /// Column greater than value.
    pub fn gt(self, column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        self.attr(column, Condition::Gt(value.into()))
    }

    /// Column greater than or equal to value.
    pub fn ge(self, column: impl Into<ColumnRef>, value: impl Into<Value>) -> Self {
        self.attr(column, Condition::Ge(value.into()))
    }

    /// Column is one of the values.
    pub fn in_values(self, column: impl Into<ColumnRef>, values: Vec<Value>) -> Self {
        self.attr(column, Condition::In(values))
    }

    /// Column is null.
    pub fn is_null(self, column: impl Into<ColumnRef>) -> Self {
        self.attr(column, Condition::IsNull)
    }

    /// Column matches a LIKE pattern.
    pub fn like(self, column: impl Into<ColumnRef>, pattern: impl Into<String>) -> Self {
        self.attr(column, Condition::Like(pattern.into()))
    }

    /// Add an OR group. Groups are never replaced by a merge.
    pub fn any(mut self, filters: Vec<Filter>) -> Self {
        self.push(Clause::Any(filters));
        self
    }

    /// Add a negated group.
    pub fn not(mut self, filter: Filter) -> Self {
        self.push(Clause::Not(filter));
        self
    }

    /// The clauses of this filter, in order.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Check if the filter has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Merge `later` on top of this filter.
    ///
    /// Keyed clauses of `later` replace same-keyed clauses in place; all
    /// other clauses are appended.
    pub fn merge(&self, later: &Filter) -> Filter {
        let mut merged = self.clone();
        for clause in &later.clauses {
            merged.push(clause.clone());
        }
        merged
    }

    /// Rewrite every bare column reference to be qualified by `alias`.
    pub fn qualify(&self, alias: &str) -> Filter {
        Filter {
            clauses: self.clauses.iter().map(|c| c.qualify(alias)).collect(),
        }
    }

    /// Check whether every column reference carries a table alias.
    pub fn is_qualified(&self) -> bool {
        self.columns().iter().all(|c| c.is_qualified())
    }

    /// All column references, including those inside groups.
    pub fn columns(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        for clause in &self.clauses {
            clause.collect_columns(out);
        }
    }

    fn push(&mut self, clause: Clause) {
        if let Some(key) = clause.key() {
            if let Some(slot) = self.clauses.iter_mut().find(|c| c.key() == Some(key)) {
                *slot = clause;
                return;
            }
        }
        self.clauses.push(clause);
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return f.write_str("TRUE");
        }
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            match clause {
                Clause::Attr { column, condition } => condition.write_sql(f, column)?,
                Clause::Any(filters) => {
                    f.write_str("(")?;
                    for (j, filter) in filters.iter().enumerate() {
                        if j > 0 {
                            f.write_str(" OR ")?;
                        }
                        write!(f, "({})", filter)?;
                    }
                    f.write_str(")")?;
                }
                Clause::Not(filter) => write!(f, "NOT ({})", filter)?,
            }
        }
        Ok(())
    }
}

/// A filter whose every column reference is qualified to a table alias.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QualifiedFilter(Filter);

impl QualifiedFilter {
    /// Qualify `filter` to `alias`.
    pub fn new(filter: &Filter, alias: &str) -> Self {
        Self(filter.qualify(alias))
    }

    /// Merge another qualified filter on top of this one.
    pub fn merge(&self, later: &QualifiedFilter) -> QualifiedFilter {
        Self(self.0.merge(&later.0))
    }

    /// Borrow the underlying filter.
    pub fn as_filter(&self) -> &Filter {
        &self.0
    }

    /// Check if the filter has no clauses.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for QualifiedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_replaces_same_key() {
        let default = Filter::new().ge("access_level", 5);
        let low = Filter::new().le("access_level", 5);

        let merged = default.merge(&low);
        assert_eq!(merged.clauses().len(), 1);
        assert_eq!(
            merged.clauses()[0],
            Clause::Attr {
                column: ColumnRef::bare("access_level"),
                condition: Condition::Le(Value::Int32(5)),
            }
        );
    }

    #[test]
    fn test_merge_accumulates_independent_keys() {
        let a = Filter::new().ge("other_value", 10);
        let b = Filter::new().eq("username", "tony");

        let merged = a.merge(&b);
        assert_eq!(merged.clauses().len(), 2);
        assert_eq!(merged.clauses()[0].key(), Some(&ColumnRef::bare("other_value")));
        assert_eq!(merged.clauses()[1].key(), Some(&ColumnRef::bare("username")));
    }

    #[test]
    fn test_merge_keeps_position_of_replaced_clause() {
        let a = Filter::new().eq("a", 1).eq("b", 2);
        let merged = a.merge(&Filter::new().eq("a", 3));

        assert_eq!(merged.clauses()[0].key(), Some(&ColumnRef::bare("a")));
        assert_eq!(merged.to_string(), "\"a\" = 3 AND \"b\" = 2");
    }

    #[test]
    fn test_groups_always_accumulate() {
        let group = Filter::new().any(vec![Filter::new().eq("a", 1), Filter::new().eq("b", 2)]);
        let merged = group.merge(&group);
        assert_eq!(merged.clauses().len(), 2);
    }

    #[test]
    fn test_differently_qualified_columns_are_distinct_keys() {
        let a = Filter::new().eq("companies.id", 1);
        let merged = a.merge(&Filter::new().eq("id", 2));
        assert_eq!(merged.clauses().len(), 2);
    }

    #[test]
    fn test_qualify_rewrites_nested_references() {
        let filter = Filter::new()
            .eq("id", 1)
            .eq("users.username", "tony")
            .not(Filter::new().eq("active", false));

        let qualified = filter.qualify("companies");
        assert!(qualified.is_qualified());
        assert!(!filter.is_qualified());

        let columns: Vec<String> = qualified.columns().iter().map(|c| c.to_string()).collect();
        assert_eq!(
            columns,
            vec![
                "\"companies\".\"id\"",
                "\"users\".\"username\"",
                "\"companies\".\"active\"",
            ]
        );
    }

    #[test]
    fn test_column_ref_parse() {
        assert_eq!(ColumnRef::parse("id"), ColumnRef::bare("id"));
        assert_eq!(ColumnRef::parse("users.id"), ColumnRef::qualified("users", "id"));
        assert_eq!(ColumnRef::parse(".id"), ColumnRef::bare(".id"));
    }

    #[test]
    fn test_display() {
        let filter = Filter::new()
            .attr(
                "access_level",
                Condition::All(vec![Condition::Ge(5.into()), Condition::Le(10.into())]),
            )
            .eq("parent_id", Value::Null);
        assert_eq!(
            filter.qualify("ScopeMe").to_string(),
            "\"ScopeMe\".\"access_level\" >= 5 AND \"ScopeMe\".\"access_level\" <= 10 \
             AND \"ScopeMe\".\"parent_id\" IS NULL"
        );
        assert_eq!(Filter::new().to_string(), "TRUE");
    }

    #[test]
    fn test_qualified_filter_serializes_transparently() {
        let qualified = QualifiedFilter::new(&Filter::new().eq("active", true), "company");
        let json = serde_json::to_value(&qualified).unwrap();
        assert!(json.get("clauses").is_some());
    }
}
