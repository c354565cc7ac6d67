//! Sled-backed reference store.
//!
//! Each table lives in its own tree (`table:{name}`) keyed by the row's
//! integer identity, with rows archived by rkyv. Plans are executed with
//! nested loops over prefetched tables, which keeps the executor obviously
//! faithful to plan semantics rather than fast.

use std::cmp::Ordering;
use std::collections::HashMap;

use ormscope_proto::{OrderDirection, QualifiedFilter, QualifiedOrder, Value};
use sled::{Db, Tree};
use tracing::{debug, instrument, trace};

use super::config::StoreConfig;
use super::executor::{EntityRow, StoreExecutor};
use super::record::StoredRow;
use crate::catalog::EntityDef;
use crate::error::StoreError;
use crate::query::{Bindings, FilterEvaluator, JoinPlan, JunctionJoin, QueryPlan, ThroughPlan};

/// Tree name prefix for table data.
const TABLE_PREFIX: &str = "table:";

/// Tree name for per-table identity sequences.
const SEQUENCE_TREE: &str = "meta:sequences";

type Fields = Vec<(String, Value)>;

/// Reference [`StoreExecutor`] over a sled database.
pub struct SledStore {
    db: Db,
    sequences: Tree,
}

impl SledStore {
    /// Open or create a store.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let db = config.to_sled_config().open()?;
        let sequences = db.open_tree(SEQUENCE_TREE)?;
        debug!(path = %config.path.display(), temporary = config.temporary, "store opened");
        Ok(Self { db, sequences })
    }

    /// Open a temporary store, deleted on drop.
    pub fn temporary() -> Result<Self, StoreError> {
        Self::open(StoreConfig::temporary())
    }

    /// Insert a row.
    ///
    /// Columns must be declared on the entity. Omitted columns are null,
    /// which non-nullable columns reject. An omitted or null identity is
    /// assigned from the table's sequence, starting at 1.
    pub fn insert<K: Into<String>>(
        &self,
        entity: &EntityDef,
        values: impl IntoIterator<Item = (K, Value)>,
    ) -> Result<EntityRow, StoreError> {
        let mut given: Fields = values.into_iter().map(|(k, v)| (k.into(), v)).collect();
        if let Some((name, _)) = given.iter().find(|(name, _)| !entity.has_field(name)) {
            return Err(invalid_row(entity, format!("unknown column '{}'", name)));
        }

        let explicit = given
            .iter()
            .position(|(name, _)| *name == entity.identity_field)
            .map(|i| given.swap_remove(i).1)
            .filter(|value| !value.is_null());
        let id = match explicit {
            Some(value) => {
                let id = value.as_i64().ok_or_else(|| {
                    invalid_row(entity, format!("identity {} is not an integer", value))
                })?;
                self.advance_sequence(&entity.table, Some(id))?;
                id
            }
            None => self.advance_sequence(&entity.table, None)?,
        };

        let mut fields = Vec::with_capacity(entity.fields.len());
        for field in &entity.fields {
            let value = if field.name == entity.identity_field {
                Value::Int64(id)
            } else {
                given
                    .iter()
                    .position(|(name, _)| *name == field.name)
                    .map(|i| given.swap_remove(i).1)
                    .unwrap_or(Value::Null)
            };
            if value.is_null() && !field.nullable {
                return Err(invalid_row(entity, format!("column '{}' is not nullable", field.name)));
            }
            fields.push((field.name.clone(), value));
        }

        let bytes = StoredRow::from_fields(&fields).to_bytes()?;
        let tree = self.table(&entity.table)?;
        if tree
            .compare_and_swap(encode_key(id), None::<&[u8]>, Some(bytes))?
            .is_err()
        {
            return Err(invalid_row(entity, format!("duplicate identity {}", id)));
        }

        trace!(table = %entity.table, id, "row inserted");
        Ok(EntityRow::new(entity.name.clone(), fields))
    }

    /// Read every row of an entity's table in identity order.
    pub fn scan(&self, entity: &EntityDef) -> Result<Vec<EntityRow>, StoreError> {
        Ok(self
            .scan_table(&entity.table)?
            .into_iter()
            .map(|fields| EntityRow::new(entity.name.clone(), fields))
            .collect())
    }

    /// Count the rows of an entity's table.
    pub fn count(&self, entity: &EntityDef) -> Result<usize, StoreError> {
        Ok(self.table(&entity.table)?.len())
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<usize, StoreError> {
        Ok(self.db.flush()?)
    }

    fn table(&self, table: &str) -> Result<Tree, StoreError> {
        Ok(self.db.open_tree(format!("{}{}", TABLE_PREFIX, table))?)
    }

    fn scan_table(&self, table: &str) -> Result<Vec<Fields>, StoreError> {
        self.table(table)?
            .iter()
            .map(|entry| {
                let (_, bytes) = entry?;
                Ok(StoredRow::from_bytes(&bytes)?.into_fields())
            })
            .collect()
    }

    /// Advance a table's sequence and return the new value. With an
    /// explicit identity the sequence only moves forward to it.
    fn advance_sequence(&self, table: &str, explicit: Option<i64>) -> Result<i64, StoreError> {
        let next = self.sequences.update_and_fetch(table.as_bytes(), |old| {
            let current = old.and_then(decode_i64).unwrap_or(0);
            let next = match explicit {
                Some(id) => current.max(id),
                None => current + 1,
            };
            Some(next.to_be_bytes().to_vec())
        })?;

        next.as_deref()
            .and_then(decode_i64)
            .ok_or_else(|| StoreError::InvalidRow {
                table: table.to_string(),
                reason: "identity sequence is corrupt".to_string(),
            })
    }
}

impl StoreExecutor for SledStore {
    #[instrument(skip(self, plan), fields(entity = %plan.entity))]
    fn execute(&self, plan: &QueryPlan) -> Result<Vec<EntityRow>, StoreError> {
        let tables = Tables::load(self, plan)?;
        let through = match &plan.through {
            Some(through) => Some((through, through_keys(through, &tables)?)),
            None => None,
        };

        let mut matched = Vec::new();
        for fields in tables.rows(&plan.table) {
            let bindings = Bindings::new().with(&plan.alias, fields);
            if let Some((through, keys)) = &through {
                if !contains(keys, bindings.resolve(&through.root_column)?) {
                    continue;
                }
            }
            if !passes(plan.filter.as_ref(), &bindings)? {
                continue;
            }
            let Some(related) = attach(&plan.joins, &bindings, &tables)? else {
                continue;
            };
            let key = order_key(&plan.order_by, &bindings)?;
            matched.push((
                key,
                EntityRow {
                    entity: plan.entity.clone(),
                    fields: fields.clone(),
                    related,
                },
            ));
        }

        let total = matched.len();
        let rows: Vec<EntityRow> = sort_rows(matched, &plan.order_by)
            .into_iter()
            .skip(plan.offset.unwrap_or(0) as usize)
            .take(plan.limit.map_or(usize::MAX, |l| l as usize))
            .collect();

        debug!(matched = total, returned = rows.len(), "plan executed");
        Ok(rows)
    }
}

/// Tables a plan touches, read once per execution.
struct Tables<'p> {
    rows: HashMap<&'p str, Vec<Fields>>,
}

impl<'p> Tables<'p> {
    fn load(store: &SledStore, plan: &'p QueryPlan) -> Result<Self, StoreError> {
        fn collect<'p>(joins: &'p [JoinPlan], out: &mut Vec<&'p str>) {
            for join in joins {
                out.push(&join.table);
                if let Some(junction) = &join.junction {
                    out.push(&junction.table);
                }
                collect(&join.joins, out);
            }
        }

        let mut names = vec![plan.table.as_str()];
        if let Some(through) = &plan.through {
            names.push(&through.table);
        }
        collect(&plan.joins, &mut names);

        let mut rows = HashMap::new();
        for name in names {
            if !rows.contains_key(name) {
                rows.insert(name, store.scan_table(name)?);
            }
        }
        Ok(Self { rows })
    }

    fn rows(&self, table: &str) -> &[Fields] {
        self.rows.get(table).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Attach joined rows under the bound parent. `None` when a required join
/// has no match, so the parent must be dropped.
fn attach<'r>(
    joins: &'r [JoinPlan],
    bindings: &Bindings<'r>,
    tables: &'r Tables<'_>,
) -> Result<Option<Vec<(String, Vec<EntityRow>)>>, StoreError> {
    let mut related = Vec::with_capacity(joins.len());

    for join in joins {
        let parent_key = bindings.resolve(&join.parent_column)?;
        let mut matched = Vec::new();

        if !parent_key.is_null() {
            let linked = match &join.junction {
                Some(junction) => Some(junction_keys(junction, parent_key, bindings, tables)?),
                None => None,
            };

            for fields in tables.rows(&join.table) {
                let child = bindings.with(&join.alias, fields);
                let key = child.resolve(&join.child_column)?;
                let joined = match &linked {
                    Some(keys) => contains(keys, key),
                    None => !key.is_null() && key.loose_eq(parent_key),
                };
                if !joined || !passes(join.filter.as_ref(), &child)? {
                    continue;
                }
                let Some(nested) = attach(&join.joins, &child, tables)? else {
                    continue;
                };
                let order = order_key(&join.order_by, &child)?;
                matched.push((
                    order,
                    EntityRow {
                        entity: join.entity.clone(),
                        fields: fields.clone(),
                        related: nested,
                    },
                ));
            }
        }

        let mut rows = sort_rows(matched, &join.order_by);
        let cap = match (join.is_singleton(), join.limit) {
            (true, limit) => Some(limit.map_or(1, |l| l.min(1) as usize)),
            (false, limit) => limit.map(|l| l as usize),
        };
        if let Some(cap) = cap {
            rows.truncate(cap);
        }

        if join.required && rows.is_empty() {
            trace!(path = %join.path, "required join unmatched");
            return Ok(None);
        }
        related.push((join.association.clone(), rows));
    }

    Ok(Some(related))
}

fn junction_keys<'r>(
    junction: &'r JunctionJoin,
    parent_key: &Value,
    bindings: &Bindings<'r>,
    tables: &'r Tables<'_>,
) -> Result<Vec<Value>, StoreError> {
    let mut keys = Vec::new();
    for fields in tables.rows(&junction.table) {
        let row = bindings.with(&junction.alias, fields);
        if row.resolve(&junction.source_column)?.loose_eq(parent_key) {
            keys.push(row.resolve(&junction.target_column)?.clone());
        }
    }
    Ok(keys)
}

fn through_keys(through: &ThroughPlan, tables: &Tables<'_>) -> Result<Vec<Value>, StoreError> {
    let mut keys = Vec::new();
    for fields in tables.rows(&through.table) {
        let row = Bindings::new().with(&through.alias, fields);
        let source = row.resolve(&through.source_column)?;
        if !source.is_null() && source.loose_eq(&through.value) {
            keys.push(row.resolve(&through.target_column)?.clone());
        }
    }
    Ok(keys)
}

fn contains(keys: &[Value], key: &Value) -> bool {
    !key.is_null() && keys.iter().any(|k| k.loose_eq(key))
}

fn passes(filter: Option<&QualifiedFilter>, bindings: &Bindings<'_>) -> Result<bool, StoreError> {
    match filter {
        Some(filter) => FilterEvaluator::evaluate(filter, bindings),
        None => Ok(true),
    }
}

fn order_key(order: &[QualifiedOrder], bindings: &Bindings<'_>) -> Result<Vec<Value>, StoreError> {
    order
        .iter()
        .map(|o| bindings.resolve(o.column()).cloned())
        .collect()
}

/// Stable sort by precomputed keys; nulls sort first.
fn sort_rows(mut rows: Vec<(Vec<Value>, EntityRow)>, order: &[QualifiedOrder]) -> Vec<EntityRow> {
    if !order.is_empty() {
        rows.sort_by(|(a, _), (b, _)| {
            for ((x, y), o) in a.iter().zip(b).zip(order) {
                let ordering = match (x.is_null(), y.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    (false, false) => x.compare(y).unwrap_or(Ordering::Equal),
                };
                let ordering = match o.direction() {
                    OrderDirection::Asc => ordering,
                    OrderDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }
    rows.into_iter().map(|(_, row)| row).collect()
}

/// Sign-flipped big-endian, so keys sort in numeric order.
fn encode_key(id: i64) -> [u8; 8] {
    ((id as u64) ^ (1 << 63)).to_be_bytes()
}

fn decode_i64(bytes: &[u8]) -> Option<i64> {
    <[u8; 8]>::try_from(bytes).ok().map(i64::from_be_bytes)
}

fn invalid_row(entity: &EntityDef, reason: String) -> StoreError {
    StoreError::InvalidRow {
        table: entity.table.clone(),
        reason,
    }
}
