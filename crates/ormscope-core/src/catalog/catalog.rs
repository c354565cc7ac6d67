//! The catalog of entity types, scopes and associations.
//!
//! A [`Catalog`] is assembled once with a [`CatalogBuilder`] and is
//! read-only afterwards, so it can be shared across threads behind an
//! `Arc` without locking.

use std::collections::HashMap;

use tracing::debug;

use super::association::AssociationDef;
use super::entity::EntityDef;
use super::scope::{ScopeDefinition, ScopeRegistry, ScopeSelector, ScopeSpec};
use crate::error::Error;

/// An entity definition together with its scopes.
#[derive(Debug, Clone)]
pub struct EntityType {
    def: EntityDef,
    scopes: ScopeRegistry,
}

impl EntityType {
    /// Entity name.
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// The entity definition.
    pub fn def(&self) -> &EntityDef {
        &self.def
    }

    /// The entity's scopes.
    pub fn scopes(&self) -> &ScopeRegistry {
        &self.scopes
    }
}

/// Immutable registry of entity types and their associations.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entities: HashMap<String, EntityType>,
    /// Associations by source entity, in declaration order.
    associations: HashMap<String, Vec<AssociationDef>>,
}

impl Catalog {
    /// Start defining a catalog.
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Get an entity type by name.
    pub fn entity(&self, name: &str) -> Result<&EntityType, Error> {
        self.entities
            .get(name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    /// List entity names, sorted.
    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Get an association of `source` by alias.
    pub fn association(&self, source: &str, alias: &str) -> Result<&AssociationDef, Error> {
        self.associations_from(source)
            .iter()
            .find(|a| a.alias == alias)
            .ok_or_else(|| Error::UnknownAssociation {
                entity: source.to_string(),
                association: alias.to_string(),
            })
    }

    /// All associations declared on `source`.
    pub fn associations_from(&self, source: &str) -> &[AssociationDef] {
        self.associations
            .get(source)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All associations pointing at `target`.
    pub fn associations_to(&self, target: &str) -> Vec<&AssociationDef> {
        self.associations
            .values()
            .flatten()
            .filter(|a| a.target == target)
            .collect()
    }

    /// Resolve one scope selector on an entity.
    pub fn resolve_scope(&self, entity: &str, selector: &ScopeSelector) -> Result<ScopeSpec, Error> {
        self.entity(entity)?.scopes.resolve(entity, selector)
    }

    /// Resolve a scope sequence on an entity (empty selects the default).
    pub fn resolve_scopes(
        &self,
        entity: &str,
        selectors: &[ScopeSelector],
    ) -> Result<ScopeSpec, Error> {
        self.entity(entity)?.scopes.resolve_all(entity, selectors)
    }
}

/// Builder for a [`Catalog`]. Definition errors surface from [`build`].
///
/// [`build`]: CatalogBuilder::build
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    entities: Vec<EntityDef>,
    default_scopes: Vec<(String, ScopeSpec)>,
    scopes: Vec<(String, String, ScopeDefinition)>,
    associations: Vec<AssociationDef>,
}

impl CatalogBuilder {
    /// Define an entity type.
    pub fn define_entity(mut self, entity: EntityDef) -> Self {
        self.entities.push(entity);
        self
    }

    /// Define the default scope of an entity.
    pub fn define_default_scope(mut self, entity: impl Into<String>, spec: impl Into<ScopeSpec>) -> Self {
        self.default_scopes.push((entity.into(), spec.into()));
        self
    }

    /// Define a named scope on an entity.
    pub fn define_scope(
        mut self,
        entity: impl Into<String>,
        name: impl Into<String>,
        definition: impl Into<ScopeDefinition>,
    ) -> Self {
        self.scopes.push((entity.into(), name.into(), definition.into()));
        self
    }

    /// Declare an association.
    pub fn associate(mut self, association: AssociationDef) -> Self {
        self.associations.push(association);
        self
    }

    /// Validate the definitions and freeze them into a catalog.
    pub fn build(self) -> Result<Catalog, Error> {
        let mut entities: HashMap<String, EntityType> = HashMap::new();
        for def in self.entities {
            if !def.has_field(&def.identity_field) {
                return Err(Error::InvalidSchema(format!(
                    "entity '{}' does not declare its identity field '{}'",
                    def.name, def.identity_field
                )));
            }
            let name = def.name.clone();
            let entity = EntityType {
                def,
                scopes: ScopeRegistry::default(),
            };
            if entities.insert(name.clone(), entity).is_some() {
                return Err(Error::InvalidSchema(format!("entity '{}' is defined twice", name)));
            }
        }

        for (entity, spec) in self.default_scopes {
            entities
                .get_mut(&entity)
                .ok_or_else(|| Error::UnknownEntity(entity.clone()))?
                .scopes
                .set_default(spec);
        }

        for (entity, name, definition) in self.scopes {
            entities
                .get_mut(&entity)
                .ok_or_else(|| Error::UnknownEntity(entity.clone()))?
                .scopes
                .define(name, definition)
                .map_err(|reason| Error::InvalidSchema(format!("entity '{}': {}", entity, reason)))?;
        }

        let mut associations: HashMap<String, Vec<AssociationDef>> = HashMap::new();
        for association in self.associations {
            validate_association(&entities, &association)?;
            let declared = associations.entry(association.source.clone()).or_default();
            if declared.iter().any(|a| a.alias == association.alias) {
                return Err(Error::InvalidSchema(format!(
                    "entity '{}' declares association '{}' twice",
                    association.source, association.alias
                )));
            }
            declared.push(association);
        }

        debug!(
            entities = entities.len(),
            associations = associations.values().map(Vec::len).sum::<usize>(),
            "catalog built"
        );

        Ok(Catalog {
            entities,
            associations,
        })
    }
}

fn validate_association(
    entities: &HashMap<String, EntityType>,
    association: &AssociationDef,
) -> Result<(), Error> {
    let lookup = |name: &str| {
        entities
            .get(name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    };
    let require_field = |entity: &EntityType, column: &str| {
        if entity.def.has_field(column) {
            Ok(())
        } else {
            Err(Error::InvalidSchema(format!(
                "association '{}.{}' joins on '{}.{}', which is not declared",
                association.source, association.alias, entity.def.name, column
            )))
        }
    };

    let source = lookup(&association.source)?;
    let target = lookup(&association.target)?;
    require_field(source, &association.source_key)?;
    require_field(target, &association.target_key)?;

    if let Some(junction) = &association.through {
        let junction_entity = lookup(&junction.entity)?;
        require_field(junction_entity, &junction.source_key)?;
        require_field(junction_entity, &junction.target_key)?;
    }

    for selector in &association.target_scope {
        if let ScopeSelector::Named { name, .. } = selector {
            if !target.scopes.contains(name) {
                return Err(Error::UnknownScope {
                    entity: association.target.clone(),
                    scope: name.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AssociationKind, FieldDef, JunctionDef, ScalarType};
    use ormscope_proto::Filter;

    fn sample() -> CatalogBuilder {
        Catalog::builder()
            .define_entity(
                EntityDef::new("company").with_field(FieldDef::new("active", ScalarType::Bool)),
            )
            .define_entity(
                EntityDef::new("user")
                    .with_field(FieldDef::new("username", ScalarType::String))
                    .with_field(FieldDef::optional("companyId", ScalarType::Int64)),
            )
            .define_entity(EntityDef::new("project"))
            .define_entity(
                EntityDef::new("CompanyProjects")
                    .with_field(FieldDef::new("projectId", ScalarType::Int64))
                    .with_field(FieldDef::new("companyId", ScalarType::Int64)),
            )
            .define_default_scope("company", Filter::new().eq("active", true))
            .define_scope("user", "isTony", Filter::new().eq("username", "tony"))
            .associate(AssociationDef::has_many("users", "company", "id", "user", "companyId"))
            .associate(AssociationDef::belongs_to("company", "user", "companyId", "company", "id"))
            .associate(AssociationDef::belongs_to_many(
                "companies",
                "project",
                "id",
                "company",
                "id",
                JunctionDef::new("CompanyProjects", "projectId", "companyId"),
            ))
    }

    #[test]
    fn test_build_and_lookup() {
        let catalog = sample().build().unwrap();

        assert_eq!(
            catalog.entity_names(),
            vec!["CompanyProjects", "company", "project", "user"]
        );
        assert_eq!(catalog.association("company", "users").unwrap().target, "user");
        assert_eq!(catalog.associations_from("project").len(), 1);
        assert!(catalog.associations_from("CompanyProjects").is_empty());
        assert_eq!(catalog.associations_to("company").len(), 2);
        assert_eq!(
            catalog.association("user", "company").unwrap().kind,
            AssociationKind::BelongsTo
        );
    }

    #[test]
    fn test_unknown_lookups() {
        let catalog = sample().build().unwrap();

        assert!(matches!(catalog.entity("nope"), Err(Error::UnknownEntity(_))));
        assert!(matches!(
            catalog.association("company", "nope"),
            Err(Error::UnknownAssociation { .. })
        ));
    }

    #[test]
    fn test_resolve_scope_through_catalog() {
        let catalog = sample().build().unwrap();

        let spec = catalog.resolve_scopes("company", &[]).unwrap();
        assert_eq!(spec.filter, Filter::new().eq("active", true));

        let spec = catalog.resolve_scope("user", &"isTony".into()).unwrap();
        assert_eq!(spec.filter, Filter::new().eq("username", "tony"));
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let result = sample()
            .associate(AssociationDef::has_many("users", "company", "id", "user", "companyId"))
            .build();
        assert!(matches!(result, Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_undeclared_join_column_rejected() {
        let result = sample()
            .associate(AssociationDef::has_one("profile", "user", "id", "company", "userId"))
            .build();
        assert!(matches!(result, Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_captured_scope_must_exist() {
        let result = sample()
            .associate(
                AssociationDef::has_many("tonies", "company", "id", "user", "companyId")
                    .with_target_scope("nope"),
            )
            .build();
        assert!(matches!(result, Err(Error::UnknownScope { .. })));
    }

    #[test]
    fn test_reserved_scope_name_rejected() {
        let result = sample()
            .define_scope("user", "defaultScope", Filter::new())
            .build();
        assert!(matches!(result, Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_scope_on_unknown_entity() {
        let result = sample().define_scope("ghost", "x", Filter::new()).build();
        assert!(matches!(result, Err(Error::UnknownEntity(_))));
    }
}
