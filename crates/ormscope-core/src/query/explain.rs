//! Human-readable rendering of query plans.

use super::planner::{JoinPlan, QueryPlan};
use ormscope_proto::QualifiedOrder;

impl QueryPlan {
    /// Render the plan as an indented tree.
    ///
    /// ```text
    /// Query company AS "company"
    ///   Filter: "company"."active" = true
    ///   Join users -> user AS "users" (HasMany, LEFT)
    ///     On: "users"."companyId" = "company"."id"
    ///     Filter: "users"."access_level" >= 5
    /// ```
    pub fn explain(&self) -> String {
        let mut lines = Vec::new();

        let scope = if self.unscoped { " UNSCOPED" } else { "" };
        lines.push(format!("Query {} AS \"{}\"{}", self.entity, self.alias, scope));

        if let Some(through) = &self.through {
            lines.push(format!(
                "  Through {} AS \"{}\": {} IN ({} WHERE {} = {})",
                through.entity,
                through.alias,
                through.root_column,
                through.target_column,
                through.source_column,
                through.value
            ));
        }
        if let Some(filter) = &self.filter {
            lines.push(format!("  Filter: {}", filter));
        }
        if !self.order_by.is_empty() {
            lines.push(format!("  Order By: {}", render_order(&self.order_by)));
        }

        let mut page = Vec::new();
        if let Some(limit) = self.limit {
            page.push(format!("LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            page.push(format!("OFFSET {}", offset));
        }
        if !page.is_empty() {
            lines.push(format!("  {}", page.join(" ")));
        }

        for join in &self.joins {
            explain_join(join, 1, &mut lines);
        }

        lines.join("\n")
    }
}

fn explain_join(join: &JoinPlan, depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    let mode = if join.required { "INNER" } else { "LEFT" };
    lines.push(format!(
        "{}Join {} -> {} AS \"{}\" ({:?}, {})",
        indent, join.association, join.entity, join.alias, join.kind, mode
    ));

    match &join.junction {
        Some(junction) => {
            lines.push(format!(
                "{}  Via {} AS \"{}\": {} = {}",
                indent, junction.entity, junction.alias, junction.source_column, join.parent_column
            ));
            lines.push(format!(
                "{}  On: {} = {}",
                indent, join.child_column, junction.target_column
            ));
        }
        None => lines.push(format!(
            "{}  On: {} = {}",
            indent, join.child_column, join.parent_column
        )),
    }

    if let Some(filter) = &join.filter {
        lines.push(format!("{}  Filter: {}", indent, filter));
    }
    if !join.order_by.is_empty() {
        lines.push(format!("{}  Order By: {}", indent, render_order(&join.order_by)));
    }
    if let Some(limit) = join.limit {
        lines.push(format!("{}  LIMIT {} per parent", indent, limit));
    }

    for child in &join.joins {
        explain_join(child, depth + 1, lines);
    }
}

fn render_order(order: &[QualifiedOrder]) -> String {
    order
        .iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
