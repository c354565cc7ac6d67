//! Shared schema for unit tests: users, companies, profiles and projects.

use ormscope_proto::{Filter, OrderSpec, Value};

use crate::catalog::{
    AssociationDef, Catalog, CatalogBuilder, EntityDef, FieldDef, JunctionDef, ScalarType,
    ScopeDefinition, ScopeSpec,
};
use crate::error::ScopeArgsError;
use crate::query::IncludeSpec;
use crate::storage::SledStore;

pub(crate) fn user_entity() -> EntityDef {
    EntityDef::new("user").with_fields(vec![
        FieldDef::new("username", ScalarType::String),
        FieldDef::new("email", ScalarType::String),
        FieldDef::new("access_level", ScalarType::Int32),
        FieldDef::new("other_value", ScalarType::Int32),
        FieldDef::optional("parent_id", ScalarType::Int64),
        FieldDef::optional("companyId", ScalarType::Int64),
    ])
}

pub(crate) fn catalog_builder() -> CatalogBuilder {
    Catalog::builder()
        .define_entity(user_entity())
        .define_entity(EntityDef::new("project"))
        .define_entity(EntityDef::new("company").with_field(FieldDef::new("active", ScalarType::Bool)))
        .define_entity(
            EntityDef::new("profile")
                .with_field(FieldDef::new("active", ScalarType::Bool))
                .with_field(FieldDef::optional("userId", ScalarType::Int64)),
        )
        .define_entity(
            EntityDef::new("CompanyProjects")
                .with_field(FieldDef::new("companyId", ScalarType::Int64))
                .with_field(FieldDef::new("projectId", ScalarType::Int64)),
        )
        .define_default_scope("user", Filter::new().ge("access_level", 5))
        .define_scope("user", "highValue", Filter::new().ge("other_value", 10))
        .define_scope("user", "isTony", Filter::new().eq("username", "tony"))
        .define_scope("user", "lowAccess", Filter::new().le("access_level", 5))
        .define_scope("user", "escape", Filter::new().eq("username", "escape'd"))
        .define_scope(
            "user",
            "actualValue",
            ScopeDefinition::parameterized(|args| match args {
                [value] => Ok(Filter::new().eq("other_value", value.clone()).into()),
                _ => Err(ScopeArgsError::arity(1, args.len())),
            }),
        )
        .define_default_scope("company", Filter::new().eq("active", true))
        .define_scope("company", "notActive", Filter::new().eq("active", false))
        .define_scope(
            "company",
            "users",
            ScopeSpec::new().include(IncludeSpec::model("user").alias("users").unscoped()),
        )
        .define_scope(
            "company",
            "defaultUsers",
            ScopeSpec::new().include(IncludeSpec::model("user").alias("users")),
        )
        .define_scope("company", "projects", ScopeSpec::new().include(IncludeSpec::model("project")))
        .define_scope("company", "reversed", ScopeSpec::new().with_order(OrderSpec::desc("id")))
        .define_default_scope("profile", Filter::new().eq("active", true))
        .define_scope("profile", "notActive", Filter::new().eq("active", false))
        .associate(AssociationDef::belongs_to_many(
            "companies",
            "project",
            "id",
            "company",
            "id",
            JunctionDef::new("CompanyProjects", "projectId", "companyId"),
        ))
        .associate(AssociationDef::belongs_to_many(
            "projects",
            "company",
            "id",
            "project",
            "id",
            JunctionDef::new("CompanyProjects", "companyId", "projectId"),
        ))
        .associate(AssociationDef::has_one("profile", "user", "id", "profile", "userId"))
        .associate(AssociationDef::belongs_to("company", "user", "companyId", "company", "id"))
        .associate(AssociationDef::has_many("users", "company", "id", "user", "companyId"))
}

pub(crate) fn catalog() -> Catalog {
    catalog_builder().build().expect("test catalog is valid")
}

pub(crate) fn def<'c>(catalog: &'c Catalog, entity: &str) -> &'c EntityDef {
    catalog.entity(entity).expect("entity is defined").def()
}

/// Two companies (the second inactive), five users, one project linked to
/// both companies.
pub(crate) fn seed(catalog: &Catalog, store: &SledStore) {
    let company = def(catalog, "company");
    store.insert(company, [("active", Value::Bool(true))]).unwrap();
    store.insert(company, [("active", Value::Bool(false))]).unwrap();

    let users = def(catalog, "user");
    for (name, level, other, company_id) in [
        ("dan", 5, 10, 1i64),
        ("tobi", 10, 11, 1),
        ("tony", 3, 7, 1),
        ("fred", 3, 7, 1),
        ("bob", 1, 9, 2),
    ] {
        store
            .insert(
                users,
                [
                    ("username", Value::from(name)),
                    ("email", Value::from(format!("{}@example.com", name))),
                    ("access_level", Value::Int32(level)),
                    ("other_value", Value::Int32(other)),
                    ("companyId", Value::Int64(company_id)),
                ],
            )
            .unwrap();
    }

    store.insert(def(catalog, "project"), Vec::<(&str, Value)>::new()).unwrap();
    for company_id in [1i64, 2] {
        store
            .insert(
                def(catalog, "CompanyProjects"),
                [("companyId", Value::Int64(company_id)), ("projectId", Value::Int64(1))],
            )
            .unwrap();
    }
}
