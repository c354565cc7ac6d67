//! Include requests and the call-site options of finds and fetches.

use ormscope_proto::{Filter, OrderSpec};

use crate::catalog::ScopeSelector;

/// A request to join and eagerly load an association.
///
/// An include names the association by alias, by target model, or both.
/// A model-only include resolves to the single association of the source
/// entity that targets that model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncludeSpec {
    /// Association alias (`as`).
    pub association: Option<String>,
    /// Target entity name.
    pub model: Option<String>,
    /// Scope override for the target. Empty inherits the association's
    /// captured scope, else the target's default scope.
    pub scopes: Vec<ScopeSelector>,
    /// Call-site filter on the target.
    pub filter: Option<Filter>,
    /// Ordering of the included rows.
    pub order: Vec<OrderSpec>,
    /// Drop parents without a matching row. Defaults to whether a call-site
    /// filter is present.
    pub required: Option<bool>,
    /// Nested includes on the target.
    pub children: Vec<IncludeSpec>,
}

impl IncludeSpec {
    /// Include an association by alias.
    pub fn association(alias: impl Into<String>) -> Self {
        Self {
            association: Some(alias.into()),
            ..Self::default()
        }
    }

    /// Include by target model.
    pub fn model(entity: impl Into<String>) -> Self {
        Self {
            model: Some(entity.into()),
            ..Self::default()
        }
    }

    /// Name the association alias (`{ model, as }`).
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.association = Some(alias.into());
        self
    }

    /// Apply a scope to the included target. Repeated calls chain scopes
    /// left to right.
    pub fn scope(mut self, selector: impl Into<ScopeSelector>) -> Self {
        self.scopes.push(selector.into());
        self
    }

    /// Include the target without any scope.
    pub fn unscoped(mut self) -> Self {
        self.scopes = vec![ScopeSelector::Unscoped];
        self
    }

    /// Filter the included rows at the call site.
    pub fn with_where(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Order the included rows.
    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order.push(order);
        self
    }

    /// Set whether parents without a match are dropped.
    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    /// Add a nested include.
    pub fn include(mut self, child: IncludeSpec) -> Self {
        self.children.push(child);
        self
    }

    /// Key used to overwrite includes before associations are resolved.
    pub fn key(&self) -> &str {
        self.association
            .as_deref()
            .or(self.model.as_deref())
            .unwrap_or_default()
    }

    /// Whether the include joins as required.
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(self.filter.is_some())
    }
}

/// Includes keyed by alias; a later insert with the same key overwrites the
/// earlier include in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncludeSet {
    entries: Vec<IncludeSpec>,
}

impl IncludeSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an include, overwriting any include with the same key.
    pub fn insert(&mut self, include: IncludeSpec) {
        match self.entries.iter_mut().find(|e| e.key() == include.key()) {
            Some(slot) => *slot = include,
            None => self.entries.push(include),
        }
    }

    /// Get an include by key.
    pub fn get(&self, key: &str) -> Option<&IncludeSpec> {
        self.entries.iter().find(|e| e.key() == key)
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, IncludeSpec> {
        self.entries.iter()
    }

    /// Number of includes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no includes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Extend<IncludeSpec> for IncludeSet {
    fn extend<T: IntoIterator<Item = IncludeSpec>>(&mut self, iter: T) {
        for include in iter {
            self.insert(include);
        }
    }
}

impl FromIterator<IncludeSpec> for IncludeSet {
    fn from_iter<T: IntoIterator<Item = IncludeSpec>>(iter: T) -> Self {
        let mut set = IncludeSet::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a IncludeSet {
    type Item = &'a IncludeSpec;
    type IntoIter = std::slice::Iter<'a, IncludeSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Call-site options of a find.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Filter merged onto the active scope's filter.
    pub filter: Option<Filter>,
    /// Includes applied after the active scope's includes.
    pub includes: Vec<IncludeSpec>,
    /// Ordering; replaces the active scope's order when non-empty.
    pub order: Vec<OrderSpec>,
    /// Row limit.
    pub limit: Option<u32>,
    /// Rows to skip.
    pub offset: Option<u32>,
}

impl FindOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the call-site filter.
    pub fn with_where(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Add an include.
    pub fn include(mut self, include: IncludeSpec) -> Self {
        self.includes.push(include);
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

    /// Set the number of rows to skip.
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Options of a lazy association fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOptions {
    /// Scope for the target. `None` uses the association's captured scope,
    /// else the target's default scope.
    pub scope: Option<ScopeSelector>,
    /// Filter merged onto the resolved scope.
    pub filter: Option<Filter>,
    /// Ordering; replaces the scope's order when non-empty.
    pub order: Vec<OrderSpec>,
    /// Row limit for collection associations.
    pub limit: Option<u32>,
}

impl FetchOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch without any scope (`{ scope: false }`).
    pub fn unscoped() -> Self {
        Self {
            scope: Some(ScopeSelector::Unscoped),
            ..Self::default()
        }
    }

    /// Fetch with a specific scope.
    pub fn scope(mut self, selector: impl Into<ScopeSelector>) -> Self {
        self.scope = Some(selector.into());
        self
    }

    /// Filter the fetched rows.
    pub fn with_where(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Order the fetched rows.
    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order.push(order);
        self
    }

    /// Limit the fetched rows.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}
