//! Plan composition and reference store benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ormscope_core::{
    AssociationDef, AssociationResolver, Catalog, EntityDef, FetchOptions, FieldDef, FindOptions,
    IncludeSpec, QueryPlanner, ScalarType, ScopeSpec, SledStore, StoreExecutor,
};
use ormscope_proto::{Filter, OrderSpec, Value};

/// Chain of `levels` entities, each with a `child` association to the next.
fn chain_catalog(levels: usize) -> Catalog {
    let mut builder = Catalog::builder();
    for level in 0..levels {
        let name = format!("node{}", level);
        builder = builder
            .define_entity(
                EntityDef::new(name.clone())
                    .with_field(FieldDef::new("active", ScalarType::Bool))
                    .with_field(FieldDef::new("rank", ScalarType::Int32))
                    .with_field(FieldDef::optional("parent_id", ScalarType::Int64)),
            )
            .define_default_scope(
                name.clone(),
                ScopeSpec::new()
                    .with_filter(Filter::new().eq("active", true))
                    .with_order(OrderSpec::desc("rank")),
            );
        if level > 0 {
            builder = builder.associate(AssociationDef::has_many(
                "child",
                format!("node{}", level - 1),
                "id",
                name,
                "parent_id",
            ));
        }
    }
    builder.build().unwrap()
}

fn nested_include(depth: usize) -> IncludeSpec {
    let mut include = IncludeSpec::association("child");
    for _ in 1..depth {
        include = IncludeSpec::association("child").include(include);
    }
    include
}

fn bench_plan_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("planner/depth");
    let catalog = chain_catalog(8);
    let planner = QueryPlanner::new(&catalog);

    for depth in [1, 3, 7] {
        group.bench_with_input(BenchmarkId::new("includes", depth), &depth, |b, &depth| {
            let options = FindOptions::new()
                .with_where(Filter::new().ge("rank", 3))
                .include(nested_include(depth));

            b.iter(|| {
                black_box(planner.plan("node0", &[], &options).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("store/execute");
    let catalog = chain_catalog(2);
    let store = SledStore::temporary().unwrap();
    let parent = catalog.entity("node0").unwrap().def();
    let child = catalog.entity("node1").unwrap().def();

    for i in 0..100i64 {
        store
            .insert(parent, [("active", Value::Bool(i % 2 == 0)), ("rank", Value::Int32(i as i32))])
            .unwrap();
        for j in 0..10i32 {
            store
                .insert(
                    child,
                    [
                        ("active", Value::Bool(j % 3 != 0)),
                        ("rank", Value::Int32(j)),
                        ("parent_id", Value::Int64(i + 1)),
                    ],
                )
                .unwrap();
        }
    }

    let planner = QueryPlanner::new(&catalog);
    let plan = planner
        .plan("node0", &[], &FindOptions::new().include(IncludeSpec::association("child")))
        .unwrap();
    group.bench_function("include_children", |b| {
        b.iter(|| {
            black_box(store.execute(&plan).unwrap());
        });
    });

    let root = store.execute(&planner.plan("node0", &[], &FindOptions::new()).unwrap()).unwrap();
    let resolver = AssociationResolver::new(&catalog);
    group.bench_function("fetch_related", |b| {
        b.iter(|| {
            black_box(
                resolver
                    .fetch_related(&store, &root[0], "child", &FetchOptions::new())
                    .unwrap(),
            );
        });
    });

    group.finish();
}

criterion_group!(benches, bench_plan_depth, bench_execute);
criterion_main!(benches);
