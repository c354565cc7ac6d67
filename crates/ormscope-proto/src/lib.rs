//! ormscope protocol types.
//!
//! Plain data shared by every layer of the query composer:
//!
//! - [`value`] - Runtime values used in filter literals and rows
//! - [`filter`] - The filter expression tree and its merge/qualify rules
//! - [`order`] - Ordering clauses

pub mod filter;
pub mod order;
pub mod value;

pub use filter::{Clause, ColumnRef, Condition, Filter, QualifiedFilter};
pub use order::{OrderDirection, OrderSpec, QualifiedOrder};
pub use value::Value;
