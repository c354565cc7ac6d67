//! Integration tests for the ormscope database API.

use std::sync::Mutex;

use ormscope::proto::{Filter, OrderSpec, Value};
use ormscope::{
    AssociationDef, Catalog, Database, EntityDef, EntityRow, Error, FetchOptions, FieldDef,
    FindOptions, IncludeSpec, QueryPlan, ScalarType, ScopeSpec, StoreConfig, StoreError,
    StoreExecutor,
};

fn catalog() -> Catalog {
    Catalog::builder()
        .define_entity(
            EntityDef::new("company").with_field(FieldDef::optional("active", ScalarType::Bool)),
        )
        .define_entity(
            EntityDef::new("user")
                .with_field(FieldDef::new("username", ScalarType::String))
                .with_field(FieldDef::new("access_level", ScalarType::Int32))
                .with_field(FieldDef::optional("companyId", ScalarType::Int64)),
        )
        .define_default_scope("company", Filter::new().eq("active", true))
        .define_scope(
            "company",
            "users",
            ScopeSpec::new().include(IncludeSpec::model("user").alias("users").unscoped()),
        )
        .define_default_scope("user", Filter::new().ge("access_level", 5))
        .define_scope("user", "byName", ScopeSpec::new().with_order(OrderSpec::asc("username")))
        .associate(AssociationDef::has_many("users", "company", "id", "user", "companyId"))
        .associate(AssociationDef::belongs_to("company", "user", "companyId", "company", "id"))
        .build()
        .unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct TestContext {
    db: Database,
    _dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(catalog(), StoreConfig::new(dir.path())).unwrap();

        db.insert("company", [("active", Value::Bool(true))]).unwrap();
        db.insert("company", [("active", Value::Bool(false))]).unwrap();
        for (name, level, company) in [("tobi", 10, 1i64), ("tony", 3, 1), ("dan", 5, 1), ("bob", 1, 2)] {
            db.insert(
                "user",
                [
                    ("username", Value::from(name)),
                    ("access_level", Value::Int32(level)),
                    ("companyId", Value::Int64(company)),
                ],
            )
            .unwrap();
        }

        Self { db, _dir: dir }
    }
}

fn names(rows: &[EntityRow]) -> Vec<&str> {
    rows.iter()
        .filter_map(|r| r.get("username").and_then(Value::as_str))
        .collect()
}

#[test]
fn test_scoped_include_and_lazy_fetch_agree() {
    let ctx = TestContext::new();
    let company = ctx
        .db
        .model("company")
        .unwrap()
        .scope("users")
        .find_one(FindOptions::new())
        .unwrap()
        .unwrap();

    assert_eq!(company.related("users").map(<[EntityRow]>::len), Some(3));

    let fetched = ctx
        .db
        .fetch_related(&company, "users", FetchOptions::unscoped())
        .unwrap();
    assert_eq!(fetched.len(), 3);
}

#[test]
fn test_named_scope_order() {
    let ctx = TestContext::new();
    let users = ctx
        .db
        .model("user")
        .unwrap()
        .scope("byName")
        .find_all(FindOptions::new())
        .unwrap();

    assert_eq!(names(&users), vec!["bob", "dan", "tobi", "tony"]);
}

#[test]
fn test_belongs_to_scoped_out_target() {
    let ctx = TestContext::new();
    let bob = ctx
        .db
        .model("user")
        .unwrap()
        .unscoped()
        .find_one(FindOptions::new().with_where(Filter::new().eq("username", "bob")))
        .unwrap()
        .unwrap();

    let company = ctx.db.fetch_related(&bob, "company", FetchOptions::new()).unwrap();
    assert!(company.one().is_none());
}

#[test]
fn test_unknown_scope_surfaces_core_error() {
    let ctx = TestContext::new();
    let err = ctx
        .db
        .model("company")
        .unwrap()
        .scope("missing")
        .find_all(FindOptions::new())
        .unwrap_err();

    assert!(matches!(err, Error::Core(ormscope_core::Error::UnknownScope { .. })));
}

#[test]
fn test_reopen_keeps_rows() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = Database::open(catalog(), StoreConfig::new(dir.path())).unwrap();
        db.insert("company", [("active", Value::Bool(true))]).unwrap();
        db.flush().unwrap();
    }

    let db = Database::open(catalog(), StoreConfig::new(dir.path())).unwrap();
    let companies = db.model("company").unwrap().find_all(FindOptions::new()).unwrap();
    assert_eq!(companies.len(), 1);
}

// ============== Custom store ==============

/// Store that records the plans it receives and returns no rows.
#[derive(Default)]
struct RecordingStore {
    plans: Mutex<Vec<QueryPlan>>,
}

impl StoreExecutor for RecordingStore {
    fn execute(&self, plan: &QueryPlan) -> Result<Vec<EntityRow>, StoreError> {
        self.plans.lock().unwrap().push(plan.clone());
        Ok(Vec::new())
    }
}

#[test]
fn test_custom_store_receives_qualified_plan() {
    let db = Database::with_store(catalog(), RecordingStore::default());
    let options = FindOptions::new()
        .with_where(Filter::new().eq("id", 1))
        .include(IncludeSpec::association("users"));

    let rows = db.model("company").unwrap().find_all(options).unwrap();
    assert!(rows.is_empty());

    let plans = db.store().plans.lock().unwrap();
    assert_eq!(plans.len(), 1);
    let plan = &plans[0];
    assert_eq!(plan.alias, "company");
    assert_eq!(
        plan.filter.as_ref().map(ToString::to_string).as_deref(),
        Some(r#""company"."active" = true AND "company"."id" = 1"#)
    );
    assert_eq!(plan.joins[0].alias, "users");
    assert_eq!(
        plan.joins[0].filter.as_ref().map(ToString::to_string).as_deref(),
        Some(r#""users"."access_level" >= 5"#)
    );
}

#[test]
fn test_null_foreign_key_skips_store() {
    let db = Database::with_store(catalog(), RecordingStore::default());
    let orphan = EntityRow::new(
        "user",
        vec![
            ("id".to_string(), Value::Int64(9)),
            ("companyId".to_string(), Value::Null),
        ],
    );

    let company = db.fetch_related(&orphan, "company", FetchOptions::new()).unwrap();
    assert!(company.one().is_none());
    assert!(db.store().plans.lock().unwrap().is_empty());
}
