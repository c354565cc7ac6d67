//! Association descriptors between entity types.

use serde::Serialize;

use super::scope::ScopeSelector;

/// Kind of an association, seen from its source entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssociationKind {
    /// One-to-one, foreign key on the target.
    HasOne,
    /// One-to-one (or many-to-one), foreign key on the source.
    BelongsTo,
    /// One-to-many, foreign key on the target.
    HasMany,
    /// Many-to-many through a junction entity.
    BelongsToMany,
}

impl AssociationKind {
    /// Whether the association yields at most one row.
    pub fn is_singleton(self) -> bool {
        matches!(self, AssociationKind::HasOne | AssociationKind::BelongsTo)
    }
}

/// Junction metadata of a many-to-many association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JunctionDef {
    /// Junction entity name.
    pub entity: String,
    /// Junction column holding the source key.
    pub source_key: String,
    /// Junction column holding the target key.
    pub target_key: String,
}

impl JunctionDef {
    /// Create junction metadata.
    pub fn new(
        entity: impl Into<String>,
        source_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            source_key: source_key.into(),
            target_key: target_key.into(),
        }
    }
}

/// A declared association from a source entity to a target entity.
///
/// `source_key` and `target_key` are the columns joined on each side: for
/// `HasOne`/`HasMany` the target column is the foreign key, for
/// `BelongsTo` the source column is. Many-to-many associations join both
/// keys through the junction.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationDef {
    /// Alias, unique among the source entity's associations.
    pub alias: String,
    /// Source entity name.
    pub source: String,
    /// Target entity name.
    pub target: String,
    /// Association kind.
    pub kind: AssociationKind,
    /// Join column on the source.
    pub source_key: String,
    /// Join column on the target.
    pub target_key: String,
    /// Junction for many-to-many associations.
    pub through: Option<JunctionDef>,
    /// Scope the target was bound to when the association was declared.
    pub target_scope: Vec<ScopeSelector>,
}

impl AssociationDef {
    fn new(
        alias: impl Into<String>,
        kind: AssociationKind,
        source: impl Into<String>,
        source_key: impl Into<String>,
        target: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            source: source.into(),
            target: target.into(),
            kind,
            source_key: source_key.into(),
            target_key: target_key.into(),
            through: None,
            target_scope: Vec::new(),
        }
    }

    /// `source` has one `target`, whose `foreign_key` references
    /// `source.source_key`.
    pub fn has_one(
        alias: impl Into<String>,
        source: impl Into<String>,
        source_key: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(alias, AssociationKind::HasOne, source, source_key, target, foreign_key)
    }

    /// `source` has many `target`s, whose `foreign_key` references
    /// `source.source_key`.
    pub fn has_many(
        alias: impl Into<String>,
        source: impl Into<String>,
        source_key: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(alias, AssociationKind::HasMany, source, source_key, target, foreign_key)
    }

    /// `source.foreign_key` references `target.target_key`.
    pub fn belongs_to(
        alias: impl Into<String>,
        source: impl Into<String>,
        foreign_key: impl Into<String>,
        target: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Self::new(alias, AssociationKind::BelongsTo, source, foreign_key, target, target_key)
    }

    /// `source` and `target` are linked by rows of a junction entity.
    pub fn belongs_to_many(
        alias: impl Into<String>,
        source: impl Into<String>,
        source_key: impl Into<String>,
        target: impl Into<String>,
        target_key: impl Into<String>,
        through: JunctionDef,
    ) -> Self {
        let mut association = Self::new(
            alias,
            AssociationKind::BelongsToMany,
            source,
            source_key,
            target,
            target_key,
        );
        association.through = Some(through);
        association
    }

    /// Bind the target to a scope at declaration time. Repeated calls chain.
    pub fn with_target_scope(mut self, selector: impl Into<ScopeSelector>) -> Self {
        self.target_scope.push(selector.into());
        self
    }

    /// Whether the association yields at most one row.
    pub fn is_singleton(&self) -> bool {
        self.kind.is_singleton()
    }
}
