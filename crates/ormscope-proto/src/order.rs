//! Ordering clauses.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::filter::ColumnRef;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// Order specification for sorting results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Column to order by.
    pub column: ColumnRef,
    /// Sort direction.
    pub direction: OrderDirection,
}

impl OrderSpec {
    /// Create an ascending order spec.
    pub fn asc(column: impl Into<ColumnRef>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order spec.
    pub fn desc(column: impl Into<ColumnRef>) -> Self {
        Self {
            column: column.into(),
            direction: OrderDirection::Desc,
        }
    }
}

/// An order spec whose column is qualified to a table alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QualifiedOrder(OrderSpec);

impl QualifiedOrder {
    /// Qualify `order` to `alias`.
    pub fn new(order: &OrderSpec, alias: &str) -> Self {
        Self(OrderSpec {
            column: order.column.qualify(alias),
            direction: order.direction,
        })
    }

    /// The qualified column.
    pub fn column(&self) -> &ColumnRef {
        &self.0.column
    }

    /// The sort direction.
    pub fn direction(&self) -> OrderDirection {
        self.0.direction
    }
}

impl fmt::Display for QualifiedOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.0.direction {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        };
        write!(f, "{} {}", self.0.column, direction)
    }
}
