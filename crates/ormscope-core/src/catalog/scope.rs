//! Scope definitions and the per-entity scope registry.
//!
//! A scope is a reusable `{filter, includes, order, limit}` specification.
//! Each entity type owns at most one default scope, applied whenever no
//! scope is requested, and any number of named scopes. Named scopes are
//! either static or parameterized by call-time arguments.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ormscope_proto::{Filter, OrderSpec, Value};
use tracing::trace;

use crate::error::{Error, ScopeArgsError};
use crate::query::{IncludeSet, IncludeSpec};

/// Reserved scope name referring to an entity's default scope.
pub const DEFAULT_SCOPE: &str = "defaultScope";

/// Signature of a parameterized scope.
pub type ScopeFn = dyn Fn(&[Value]) -> Result<ScopeSpec, ScopeArgsError> + Send + Sync;

/// A resolved scope: what a query against the entity should filter on,
/// join and sort by.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeSpec {
    /// Filter on the scoped entity.
    pub filter: Filter,
    /// Associations to include, keyed by alias.
    pub includes: IncludeSet,
    /// Ordering clauses.
    pub order: Vec<OrderSpec>,
    /// Maximum number of rows.
    pub limit: Option<u32>,
}

impl ScopeSpec {
    /// Create an empty spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Add an include, overwriting an include with the same key.
    pub fn include(mut self, include: IncludeSpec) -> Self {
        self.includes.insert(include);
        self
    }

    /// Add an ordering clause.
    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order.push(order);
        self
    }

    /// Set the row limit.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check whether the spec contributes nothing.
    pub fn is_empty(&self) -> bool {
        self.filter.is_empty()
            && self.includes.is_empty()
            && self.order.is_empty()
            && self.limit.is_none()
    }

    /// Merge `later` on top of this spec.
    ///
    /// Filters merge per column, includes overwrite per key, and a later
    /// non-empty order or a later limit replaces the earlier one.
    pub fn merge(&self, later: &ScopeSpec) -> ScopeSpec {
        let mut includes = self.includes.clone();
        includes.extend(later.includes.iter().cloned());

        ScopeSpec {
            filter: self.filter.merge(&later.filter),
            includes,
            order: if later.order.is_empty() {
                self.order.clone()
            } else {
                later.order.clone()
            },
            limit: later.limit.or(self.limit),
        }
    }
}

impl From<Filter> for ScopeSpec {
    fn from(filter: Filter) -> Self {
        Self::new().with_filter(filter)
    }
}

/// A named scope: static, or computed from call-time arguments.
#[derive(Clone)]
pub enum ScopeDefinition {
    /// Fixed specification.
    Static(ScopeSpec),
    /// Specification computed from arguments.
    Parameterized(Arc<ScopeFn>),
}

impl ScopeDefinition {
    /// Wrap a closure as a parameterized scope.
    pub fn parameterized<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<ScopeSpec, ScopeArgsError> + Send + Sync + 'static,
    {
        ScopeDefinition::Parameterized(Arc::new(f))
    }

    fn invoke(&self, entity: &str, name: &str, args: &[Value]) -> Result<ScopeSpec, Error> {
        match self {
            ScopeDefinition::Static(spec) if args.is_empty() => Ok(spec.clone()),
            ScopeDefinition::Static(_) => Err(Error::InvalidScopeArgs {
                entity: entity.to_string(),
                scope: name.to_string(),
                source: ScopeArgsError::arity(0, args.len()),
            }),
            ScopeDefinition::Parameterized(f) => f(args).map_err(|source| Error::InvalidScopeArgs {
                entity: entity.to_string(),
                scope: name.to_string(),
                source,
            }),
        }
    }
}

impl fmt::Debug for ScopeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeDefinition::Static(spec) => f.debug_tuple("Static").field(spec).finish(),
            ScopeDefinition::Parameterized(_) => f.write_str("Parameterized(..)"),
        }
    }
}

impl From<ScopeSpec> for ScopeDefinition {
    fn from(spec: ScopeSpec) -> Self {
        ScopeDefinition::Static(spec)
    }
}

impl From<Filter> for ScopeDefinition {
    fn from(filter: Filter) -> Self {
        ScopeDefinition::Static(filter.into())
    }
}

/// Which scope a query, include or fetch asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeSelector {
    /// The entity's default scope, if any.
    Default,
    /// No scope at all, not even the default.
    Unscoped,
    /// A named scope, with arguments for parameterized scopes.
    Named { name: String, args: Vec<Value> },
    /// An explicit specification, used verbatim instead of the default.
    Explicit(ScopeSpec),
}

impl ScopeSelector {
    /// Select a named scope.
    pub fn named(name: impl Into<String>) -> Self {
        ScopeSelector::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Select a parameterized scope with arguments.
    pub fn with_args(name: impl Into<String>, args: Vec<Value>) -> Self {
        ScopeSelector::Named {
            name: name.into(),
            args,
        }
    }
}

impl From<&str> for ScopeSelector {
    fn from(name: &str) -> Self {
        ScopeSelector::named(name)
    }
}

impl From<String> for ScopeSelector {
    fn from(name: String) -> Self {
        ScopeSelector::named(name)
    }
}

/// `false` bypasses every scope; `true` keeps the default.
impl From<bool> for ScopeSelector {
    fn from(scoped: bool) -> Self {
        if scoped {
            ScopeSelector::Default
        } else {
            ScopeSelector::Unscoped
        }
    }
}

impl From<Filter> for ScopeSelector {
    fn from(filter: Filter) -> Self {
        ScopeSelector::Explicit(filter.into())
    }
}

impl From<ScopeSpec> for ScopeSelector {
    fn from(spec: ScopeSpec) -> Self {
        ScopeSelector::Explicit(spec)
    }
}

/// Default and named scopes of one entity type.
#[derive(Debug, Clone, Default)]
pub struct ScopeRegistry {
    default: Option<ScopeSpec>,
    named: HashMap<String, ScopeDefinition>,
}

impl ScopeRegistry {
    pub(crate) fn set_default(&mut self, spec: ScopeSpec) {
        self.default = Some(spec);
    }

    pub(crate) fn define(&mut self, name: String, definition: ScopeDefinition) -> Result<(), String> {
        if name == DEFAULT_SCOPE {
            return Err(format!("scope name '{}' is reserved", DEFAULT_SCOPE));
        }
        if self.named.contains_key(&name) {
            return Err(format!("scope '{}' is defined twice", name));
        }
        self.named.insert(name, definition);
        Ok(())
    }

    /// The default scope, if one is defined.
    pub fn default_scope(&self) -> Option<&ScopeSpec> {
        self.default.as_ref()
    }

    /// Check whether `name` can be selected (including the reserved name).
    pub fn contains(&self, name: &str) -> bool {
        name == DEFAULT_SCOPE || self.named.contains_key(name)
    }

    /// Named scopes, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.named.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve one selector against this registry.
    pub fn resolve(&self, entity: &str, selector: &ScopeSelector) -> Result<ScopeSpec, Error> {
        let spec = match selector {
            ScopeSelector::Default => self.default.clone().unwrap_or_default(),
            ScopeSelector::Unscoped => ScopeSpec::new(),
            ScopeSelector::Explicit(spec) => spec.clone(),
            ScopeSelector::Named { name, args } if name == DEFAULT_SCOPE => {
                if !args.is_empty() {
                    return Err(Error::InvalidScopeArgs {
                        entity: entity.to_string(),
                        scope: name.clone(),
                        source: ScopeArgsError::arity(0, args.len()),
                    });
                }
                self.default.clone().unwrap_or_default()
            }
            ScopeSelector::Named { name, args } => self
                .named
                .get(name)
                .ok_or_else(|| Error::UnknownScope {
                    entity: entity.to_string(),
                    scope: name.clone(),
                })?
                .invoke(entity, name, args)?,
        };

        trace!(entity, ?selector, "resolved scope");
        Ok(spec)
    }

    /// Resolve a sequence of selectors, merging left to right.
    ///
    /// An empty sequence selects the default scope.
    pub fn resolve_all(&self, entity: &str, selectors: &[ScopeSelector]) -> Result<ScopeSpec, Error> {
        if selectors.is_empty() {
            return self.resolve(entity, &ScopeSelector::Default);
        }
        selectors.iter().try_fold(ScopeSpec::new(), |acc, selector| {
            Ok(acc.merge(&self.resolve(entity, selector)?))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ScopeRegistry {
        let mut registry = ScopeRegistry::default();
        registry.set_default(Filter::new().ge("access_level", 5).into());
        registry
            .define(
                "isTony".into(),
                Filter::new().eq("username", "tony").into(),
            )
            .unwrap();
        registry
            .define(
                "lowAccess".into(),
                Filter::new().le("access_level", 5).into(),
            )
            .unwrap();
        registry
            .define(
                "actualValue".into(),
                ScopeDefinition::parameterized(|args| match args {
                    [value] => Ok(Filter::new().eq("other_value", value.clone()).into()),
                    _ => Err(ScopeArgsError::arity(1, args.len())),
                }),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_default_selector_applies_default_scope() {
        let spec = registry().resolve("user", &ScopeSelector::Default).unwrap();
        assert_eq!(spec.filter, Filter::new().ge("access_level", 5));
    }

    #[test]
    fn test_unscoped_bypasses_default() {
        let spec = registry().resolve("user", &false.into()).unwrap();
        assert!(spec.is_empty());
    }

    #[test]
    fn test_explicit_filter_replaces_default() {
        let spec = registry()
            .resolve("user", &Filter::new().eq("username", "dan").into())
            .unwrap();
        assert_eq!(spec.filter, Filter::new().eq("username", "dan"));
    }

    #[test]
    fn test_named_scope_does_not_include_default() {
        let spec = registry().resolve("user", &"isTony".into()).unwrap();
        assert_eq!(spec.filter, Filter::new().eq("username", "tony"));
    }

    #[test]
    fn test_unknown_scope() {
        let err = registry().resolve("user", &"nope".into()).unwrap_err();
        assert!(matches!(err, Error::UnknownScope { ref scope, .. } if scope == "nope"));
    }

    #[test]
    fn test_parameterized_scope() {
        let spec = registry()
            .resolve("user", &ScopeSelector::with_args("actualValue", vec![11.into()]))
            .unwrap();
        assert_eq!(spec.filter, Filter::new().eq("other_value", 11));

        let err = registry()
            .resolve("user", &ScopeSelector::named("actualValue"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidScopeArgs { .. }));
    }

    #[test]
    fn test_static_scope_rejects_args() {
        let err = registry()
            .resolve("user", &ScopeSelector::with_args("isTony", vec![1.into()]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidScopeArgs { .. }));
    }

    #[test]
    fn test_resolve_all_merges_left_to_right() {
        let selectors = vec![
            ScopeSelector::named(DEFAULT_SCOPE),
            ScopeSelector::named("isTony"),
            ScopeSelector::named("lowAccess"),
        ];
        let spec = registry().resolve_all("user", &selectors).unwrap();
        assert_eq!(
            spec.filter,
            Filter::new().le("access_level", 5).eq("username", "tony")
        );
    }

    #[test]
    fn test_resolve_all_empty_is_default() {
        let spec = registry().resolve_all("user", &[]).unwrap();
        assert_eq!(spec.filter, Filter::new().ge("access_level", 5));
    }

    #[test]
    fn test_reserved_and_duplicate_names() {
        let mut registry = registry();
        assert!(registry.define(DEFAULT_SCOPE.into(), ScopeSpec::new().into()).is_err());
        assert!(registry.define("isTony".into(), ScopeSpec::new().into()).is_err());
        assert_eq!(registry.names(), vec!["actualValue", "isTony", "lowAccess"]);
        assert!(registry.contains(DEFAULT_SCOPE));
    }

    #[test]
    fn test_merge_order_and_limit() {
        let a = ScopeSpec::new().with_order(OrderSpec::asc("id")).with_limit(5);
        let b = ScopeSpec::new().with_order(OrderSpec::desc("id"));
        let merged = a.merge(&b);
        assert_eq!(merged.order, vec![OrderSpec::desc("id")]);
        assert_eq!(merged.limit, Some(5));

        let kept = b.merge(&ScopeSpec::new());
        assert_eq!(kept.order, vec![OrderSpec::desc("id")]);
    }
}
