//! Query planner composing scopes, includes and call-site options.
//!
//! The planner resolves the active scope of the root entity, resolves every
//! include against the catalog, applies the target scope precedence and
//! produces a [`QueryPlan`] whose filters and orderings are all qualified
//! to a unique table alias.

use std::collections::HashSet;

use ormscope_proto::{ColumnRef, Filter, OrderSpec, QualifiedFilter, QualifiedOrder, Value};
use serde::Serialize;
use tracing::{debug, instrument, trace};

use super::config::{IncludeWhere, PlannerConfig};
use super::include::{FindOptions, IncludeSet, IncludeSpec};
use crate::catalog::{AssociationDef, AssociationKind, Catalog, JunctionDef, ScopeSelector, ScopeSpec};
use crate::error::Error;

/// Separator between association aliases in a join path.
pub const PATH_SEPARATOR: &str = "->";

/// An execution plan for a scoped find.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPlan {
    /// Root entity name.
    pub entity: String,
    /// Root table.
    pub table: String,
    /// Alias of the root table.
    pub alias: String,
    /// Filter on root rows.
    pub filter: Option<QualifiedFilter>,
    /// Ordering of root rows.
    pub order_by: Vec<QualifiedOrder>,
    /// Joined associations.
    pub joins: Vec<JoinPlan>,
    /// Junction constraint on root rows, for many-to-many fetches.
    pub through: Option<ThroughPlan>,
    /// Maximum number of root rows.
    pub limit: Option<u32>,
    /// Root rows to skip.
    pub offset: Option<u32>,
    /// Whether the query bypassed the root's scopes.
    pub unscoped: bool,
}

/// Plan for joining one association.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinPlan {
    /// Association path from the root (e.g. `users->profile`).
    pub path: String,
    /// Association alias.
    pub association: String,
    /// Association kind.
    pub kind: AssociationKind,
    /// Target entity name.
    pub entity: String,
    /// Target table.
    pub table: String,
    /// Alias of the target table.
    pub alias: String,
    /// Join column on the parent side.
    pub parent_column: ColumnRef,
    /// Join column on the target side.
    pub child_column: ColumnRef,
    /// Junction hop for many-to-many associations.
    pub junction: Option<JunctionJoin>,
    /// Filter on target rows.
    pub filter: Option<QualifiedFilter>,
    /// Ordering of target rows per parent.
    pub order_by: Vec<QualifiedOrder>,
    /// Maximum target rows per parent.
    pub limit: Option<u32>,
    /// Drop parents without a matching target row.
    pub required: bool,
    /// Nested joins on the target.
    pub joins: Vec<JoinPlan>,
}

impl JoinPlan {
    /// Nesting depth (1 for top-level joins).
    pub fn depth(&self) -> usize {
        self.path.matches(PATH_SEPARATOR).count() + 1
    }

    /// Whether at most one target row is attached per parent.
    pub fn is_singleton(&self) -> bool {
        self.kind.is_singleton()
    }
}

/// Junction hop of a many-to-many join.
///
/// Junction rows with `source_column = parent_column` link the parent to
/// target rows with `child_column = target_column`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JunctionJoin {
    /// Junction entity name.
    pub entity: String,
    /// Junction table.
    pub table: String,
    /// Alias of the junction table.
    pub alias: String,
    /// Junction column referencing the parent.
    pub source_column: ColumnRef,
    /// Junction column referencing the target.
    pub target_column: ColumnRef,
}

/// Junction constraint on root rows: keep rows whose `root_column` appears
/// in `target_column` of junction rows with `source_column = value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughPlan {
    /// Junction entity name.
    pub entity: String,
    /// Junction table.
    pub table: String,
    /// Alias of the junction table.
    pub alias: String,
    /// Junction column referencing the source instance.
    pub source_column: ColumnRef,
    /// Key of the source instance.
    pub value: Value,
    /// Junction column referencing root rows.
    pub target_column: ColumnRef,
    /// Root column matched against the junction.
    pub root_column: ColumnRef,
}

impl QueryPlan {
    /// Every table alias bound by the plan.
    pub fn aliases(&self) -> Vec<&str> {
        fn collect<'p>(joins: &'p [JoinPlan], out: &mut Vec<&'p str>) {
            for join in joins {
                out.push(&join.alias);
                if let Some(junction) = &join.junction {
                    out.push(&junction.alias);
                }
                collect(&join.joins, out);
            }
        }

        let mut out = vec![self.alias.as_str()];
        if let Some(through) = &self.through {
            out.push(&through.alias);
        }
        collect(&self.joins, &mut out);
        out
    }

    /// Find a join by path.
    pub fn find_join(&self, path: &str) -> Option<&JoinPlan> {
        fn find<'p>(joins: &'p [JoinPlan], path: &str) -> Option<&'p JoinPlan> {
            joins.iter().find_map(|join| {
                if join.path == path {
                    Some(join)
                } else {
                    find(&join.joins, path)
                }
            })
        }
        find(&self.joins, path)
    }

    /// Serialize the plan as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(Error::PlanSerialization)
    }
}

/// Junction constraint requested by an association fetch.
#[derive(Debug, Clone)]
pub(crate) struct ThroughRequest<'r> {
    pub junction: &'r JunctionDef,
    pub root_key: &'r str,
    pub value: Value,
}

/// Hands out unique table aliases within one plan.
#[derive(Debug, Default)]
struct AliasAllocator {
    taken: HashSet<String>,
}

impl AliasAllocator {
    fn allocate(&mut self, base: &str) -> String {
        if self.taken.insert(base.to_string()) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}_{}", base, n);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Query planner that composes scopes into executable plans.
#[derive(Debug, Clone)]
pub struct QueryPlanner<'a> {
    catalog: &'a Catalog,
    config: PlannerConfig,
}

impl<'a> QueryPlanner<'a> {
    /// Create a planner with the default configuration.
    pub fn new(catalog: &'a Catalog) -> Self {
        Self::with_config(catalog, PlannerConfig::default())
    }

    /// Create a planner with a custom configuration.
    pub fn with_config(catalog: &'a Catalog, config: PlannerConfig) -> Self {
        Self { catalog, config }
    }

    /// The planner's configuration.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan a find on `entity` under the given scope selectors.
    ///
    /// An empty selector list applies the default scope.
    #[instrument(skip(self, selectors, options))]
    pub fn plan(
        &self,
        entity: &str,
        selectors: &[ScopeSelector],
        options: &FindOptions,
    ) -> Result<QueryPlan, Error> {
        let active = self.catalog.resolve_scopes(entity, selectors)?;
        let mut plan = self.build(entity, &active, options)?;
        plan.unscoped = selectors.contains(&ScopeSelector::Unscoped);
        Ok(plan)
    }

    /// Build a plan from an already resolved active scope.
    pub fn build(
        &self,
        entity: &str,
        active: &ScopeSpec,
        options: &FindOptions,
    ) -> Result<QueryPlan, Error> {
        self.compose(entity, active, options, None)
    }

    pub(crate) fn compose(
        &self,
        entity: &str,
        active: &ScopeSpec,
        options: &FindOptions,
        through: Option<ThroughRequest<'_>>,
    ) -> Result<QueryPlan, Error> {
        let def = self.catalog.entity(entity)?.def();
        let mut aliases = AliasAllocator::default();
        let alias = aliases.allocate(&def.table);

        let filter = match &options.filter {
            Some(call_site) => merge_at(&active.filter, call_site, &alias),
            None => active.filter.clone(),
        };

        let through = through
            .map(|request| self.plan_through(&alias, request, &mut aliases))
            .transpose()?;

        let mut includes = active.includes.clone();
        includes.extend(options.includes.iter().cloned());
        let joins = self.plan_joins(entity, &alias, "", 1, &includes, &mut aliases)?;

        let order = if options.order.is_empty() {
            &active.order
        } else {
            &options.order
        };

        let plan = QueryPlan {
            entity: def.name.clone(),
            table: def.table.clone(),
            filter: qualify_filter(&filter, &alias),
            order_by: qualify_order(order, &alias),
            joins,
            through,
            limit: options.limit.or(active.limit),
            offset: options.offset,
            unscoped: false,
            alias,
        };
        check_references(&plan)?;

        debug!(
            entity,
            joins = plan.joins.len(),
            filtered = plan.filter.is_some(),
            "query planned"
        );
        Ok(plan)
    }

    fn plan_through(
        &self,
        root_alias: &str,
        request: ThroughRequest<'_>,
        aliases: &mut AliasAllocator,
    ) -> Result<ThroughPlan, Error> {
        let def = self.catalog.entity(&request.junction.entity)?.def();
        let alias = aliases.allocate(&format!("{}{}{}", root_alias, PATH_SEPARATOR, def.name));

        Ok(ThroughPlan {
            entity: def.name.clone(),
            table: def.table.clone(),
            source_column: ColumnRef::qualified(alias.clone(), request.junction.source_key.clone()),
            value: request.value,
            target_column: ColumnRef::qualified(alias.clone(), request.junction.target_key.clone()),
            root_column: ColumnRef::qualified(root_alias, request.root_key),
            alias,
        })
    }

    fn plan_joins(
        &self,
        source: &str,
        parent_alias: &str,
        parent_path: &str,
        depth: usize,
        includes: &IncludeSet,
        aliases: &mut AliasAllocator,
    ) -> Result<Vec<JoinPlan>, Error> {
        // Different include keys can name the same association; the later
        // include wins at the position of the first.
        let mut resolved: Vec<(&AssociationDef, &IncludeSpec)> = Vec::new();
        for include in includes {
            let association = self.resolve_association(source, include)?;
            match resolved.iter_mut().find(|(a, _)| a.alias == association.alias) {
                Some(slot) => *slot = (association, include),
                None => resolved.push((association, include)),
            }
        }

        resolved
            .into_iter()
            .map(|(association, include)| {
                self.plan_join(association, include, parent_alias, parent_path, depth, aliases)
            })
            .collect()
    }

    fn plan_join(
        &self,
        association: &AssociationDef,
        include: &IncludeSpec,
        parent_alias: &str,
        parent_path: &str,
        depth: usize,
        aliases: &mut AliasAllocator,
    ) -> Result<JoinPlan, Error> {
        let path = if parent_path.is_empty() {
            association.alias.clone()
        } else {
            format!("{}{}{}", parent_path, PATH_SEPARATOR, association.alias)
        };
        if depth > self.config.max_include_depth {
            return Err(Error::IncludeTooDeep {
                path,
                max_depth: self.config.max_include_depth,
            });
        }

        let target = self.catalog.entity(&association.target)?.def();
        let alias = aliases.allocate(&path);
        let scope = self.include_scope(association, include, &alias)?;

        let junction = match &association.through {
            Some(junction) => Some(self.plan_junction(&alias, junction, aliases)?),
            None => None,
        };

        let mut children = scope.includes.clone();
        children.extend(include.children.iter().cloned());
        let joins = self.plan_joins(&association.target, &alias, &path, depth + 1, &children, aliases)?;

        let order = if include.order.is_empty() {
            &scope.order
        } else {
            &include.order
        };

        trace!(path = %path, alias = %alias, required = include.is_required(), "include planned");

        Ok(JoinPlan {
            association: association.alias.clone(),
            kind: association.kind,
            entity: target.name.clone(),
            table: target.table.clone(),
            parent_column: ColumnRef::qualified(parent_alias, association.source_key.clone()),
            child_column: ColumnRef::qualified(alias.clone(), association.target_key.clone()),
            junction,
            filter: qualify_filter(&scope.filter, &alias),
            order_by: qualify_order(order, &alias),
            limit: scope.limit,
            required: include.is_required(),
            joins,
            path,
            alias,
        })
    }

    fn plan_junction(
        &self,
        alias: &str,
        junction: &JunctionDef,
        aliases: &mut AliasAllocator,
    ) -> Result<JunctionJoin, Error> {
        let def = self.catalog.entity(&junction.entity)?.def();
        let junction_alias = aliases.allocate(&format!("{}{}{}", alias, PATH_SEPARATOR, def.name));

        Ok(JunctionJoin {
            entity: def.name.clone(),
            table: def.table.clone(),
            source_column: ColumnRef::qualified(junction_alias.clone(), junction.source_key.clone()),
            target_column: ColumnRef::qualified(junction_alias.clone(), junction.target_key.clone()),
            alias: junction_alias,
        })
    }

    /// Resolve the target scope of an include.
    ///
    /// Precedence: call-site `where`, then scopes named on the include, then
    /// the scope captured by the association, then the target's default.
    fn include_scope(
        &self,
        association: &AssociationDef,
        include: &IncludeSpec,
        alias: &str,
    ) -> Result<ScopeSpec, Error> {
        let explicit = !include.scopes.is_empty();
        let base = if explicit {
            self.catalog.resolve_scopes(&association.target, &include.scopes)?
        } else {
            self.catalog
                .resolve_scopes(&association.target, &association.target_scope)?
        };

        let Some(call_site) = &include.filter else {
            return Ok(base);
        };
        let filter = match self.config.include_where {
            IncludeWhere::Replace if !explicit => call_site.clone(),
            IncludeWhere::Replace | IncludeWhere::Merge => merge_at(&base.filter, call_site, alias),
        };
        Ok(ScopeSpec { filter, ..base })
    }

    fn resolve_association(
        &self,
        source: &str,
        include: &IncludeSpec,
    ) -> Result<&'a AssociationDef, Error> {
        let catalog = self.catalog;

        if let Some(alias) = &include.association {
            let association = catalog.association(source, alias)?;
            if let Some(model) = &include.model {
                if *model != association.target {
                    return Err(Error::IncludeTargetMismatch {
                        association: alias.clone(),
                        expected: association.target.clone(),
                        found: model.clone(),
                    });
                }
            }
            return Ok(association);
        }

        let model = include.model.as_deref().unwrap_or_default();
        let candidates: Vec<&'a AssociationDef> = catalog
            .associations_from(source)
            .iter()
            .filter(|a| a.target == model)
            .collect();

        match candidates.as_slice() {
            [association] => Ok(*association),
            [] => Err(Error::UnknownAssociation {
                entity: source.to_string(),
                association: model.to_string(),
            }),
            _ => Err(Error::AmbiguousAssociation {
                entity: source.to_string(),
                target: model.to_string(),
                candidates: candidates.iter().map(|a| a.alias.clone()).collect(),
            }),
        }
    }
}

/// Merge `later` onto `base` with both qualified to `alias`, so `id` and
/// `alias.id` share a merge key.
pub(crate) fn merge_at(base: &Filter, later: &Filter, alias: &str) -> Filter {
    base.qualify(alias).merge(&later.qualify(alias))
}

/// Every filter and order column must name an alias bound where it is
/// evaluated: the root alias for the root, the join alias and its
/// ancestors for a join.
fn check_references(plan: &QueryPlan) -> Result<(), Error> {
    let mut bound = vec![plan.alias.as_str()];
    check_bound(plan.filter.as_ref(), &plan.order_by, &bound)?;
    check_joins(&plan.joins, &mut bound)
}

fn check_joins<'p>(joins: &'p [JoinPlan], bound: &mut Vec<&'p str>) -> Result<(), Error> {
    for join in joins {
        bound.push(&join.alias);
        check_bound(join.filter.as_ref(), &join.order_by, bound)?;
        check_joins(&join.joins, bound)?;
        bound.pop();
    }
    Ok(())
}

fn check_bound(
    filter: Option<&QualifiedFilter>,
    order: &[QualifiedOrder],
    bound: &[&str],
) -> Result<(), Error> {
    let filter_columns = filter.map(|f| f.as_filter().columns()).unwrap_or_default();
    let columns = filter_columns
        .into_iter()
        .chain(order.iter().map(QualifiedOrder::column));

    for column in columns {
        if let Some(table) = &column.table {
            if !bound.contains(&table.as_str()) {
                return Err(Error::UnknownAlias {
                    column: column.to_string(),
                    alias: table.clone(),
                    bound: bound.iter().map(|a| a.to_string()).collect(),
                });
            }
        }
    }
    Ok(())
}

fn qualify_filter(filter: &Filter, alias: &str) -> Option<QualifiedFilter> {
    if filter.is_empty() {
        None
    } else {
        Some(QualifiedFilter::new(filter, alias))
    }
}

fn qualify_order(order: &[OrderSpec], alias: &str) -> Vec<QualifiedOrder> {
    order.iter().map(|o| QualifiedOrder::new(o, alias)).collect()
}
