//! Join plan shared by the SELECT builder and the row hydrator
//!
//! One node per joined table instance. The root table and every relationship
//! followed while `depth > 0` get their own node, so a table joined twice
//! (two relationship columns to the same table, or a self-reference) gets
//! two independent aliases. Table aliases are `t<n>` in pre-order; a selected
//! column is aliased `t<n>__<column>`.
//!
//! The tree grows with the fan-out of every joined table, so a plan may be
//! built within a table budget. Levels that do not fit are left unjoined and
//! the nodes at the cut are marked truncated for the batch loader.

use std::sync::Arc;

use crate::error::ModelResult;
use crate::query::{ColumnRef, QueryBuilder};
use crate::schema::{Registry, TableDescriptor};

/// One joined table instance
#[derive(Debug, Clone)]
pub struct JoinNode {
    /// SQL alias of this table instance
    pub alias: String,
    /// Relationship path from the root, `coffee/flavor/...`
    pub path: String,
    pub table: Arc<TableDescriptor>,
    /// Relationship levels still owed below this node
    pub remaining: usize,
    /// Joined relationship columns and the node they expand into
    pub children: Vec<(String, JoinNode)>,
}

impl JoinNode {
    /// Result alias of `column` selected from this node
    pub fn column_alias(&self, column: &str) -> String {
        format!("{}__{}", self.alias, column)
    }

    pub fn child(&self, column: &str) -> Option<&JoinNode> {
        self.children
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, node)| node)
    }

    /// Whether this node owes expansions that were not joined
    pub fn is_truncated(&self) -> bool {
        self.remaining > 0 && self.children.is_empty()
    }
}

/// Tree of joins for one root table at one depth
#[derive(Debug, Clone)]
pub struct JoinPlan {
    root: JoinNode,
    depth: usize,
    joined_depth: usize,
    node_count: usize,
}

impl JoinPlan {
    /// Build the plan, joining relationships `depth` levels deep
    pub fn build(
        registry: &Registry,
        table: &Arc<TableDescriptor>,
        depth: usize,
    ) -> ModelResult<Self> {
        Self::build_within(registry, table, depth, usize::MAX)
    }

    /// Build the plan, joining only as many levels as fit in `max_tables`
    /// table instances
    pub fn build_within(
        registry: &Registry,
        table: &Arc<TableDescriptor>,
        depth: usize,
        max_tables: usize,
    ) -> ModelResult<Self> {
        let mut levels = depth;
        while levels > 0 && count_nodes(registry, table, levels, max_tables)? > max_tables {
            levels -= 1;
        }
        if levels < depth {
            tracing::debug!(
                "Joining {} of {} levels from '{}' within {} tables",
                levels,
                depth,
                table.table_name,
                max_tables
            );
        }

        let mut counter = 0;
        let root = build_node(
            registry,
            table,
            table.table_name.clone(),
            depth,
            levels,
            &mut counter,
        )?;
        Ok(Self {
            root,
            depth,
            joined_depth: levels,
            node_count: counter,
        })
    }

    pub fn root(&self) -> &JoinNode {
        &self.root
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Levels expanded by the SELECT itself
    pub fn joined_depth(&self) -> usize {
        self.joined_depth
    }

    /// Number of table instances in the FROM clause
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Add the select list, FROM and LEFT JOINs to `builder`
    pub fn apply(&self, builder: QueryBuilder) -> QueryBuilder {
        let builder = builder.from(&self.root.table.table_name, Some(&self.root.alias));
        apply_node(&self.root, builder)
    }
}

/// Table instances joined for `levels` levels, counting stops past `cap`
fn count_nodes(
    registry: &Registry,
    table: &TableDescriptor,
    levels: usize,
    cap: usize,
) -> ModelResult<usize> {
    let mut count = 1;
    if levels > 0 {
        for column in table.relation_columns() {
            if let Some(relation) = &column.relation {
                let target = registry.require(&relation.target_table)?;
                count += count_nodes(registry, target, levels - 1, cap)?;
                if count > cap {
                    break;
                }
            }
        }
    }
    Ok(count)
}

fn build_node(
    registry: &Registry,
    table: &Arc<TableDescriptor>,
    path: String,
    remaining: usize,
    levels: usize,
    counter: &mut usize,
) -> ModelResult<JoinNode> {
    let alias = format!("t{}", *counter);
    *counter += 1;

    let mut children = Vec::new();
    if levels > 0 {
        for column in table.relation_columns() {
            if let Some(relation) = &column.relation {
                let target = registry.require(&relation.target_table)?;
                let child_path = format!("{}/{}", path, column.name);
                let child =
                    build_node(registry, target, child_path, remaining - 1, levels - 1, counter)?;
                children.push((column.name.clone(), child));
            }
        }
    }

    Ok(JoinNode {
        alias,
        path,
        table: Arc::clone(table),
        remaining,
        children,
    })
}

fn apply_node(node: &JoinNode, mut builder: QueryBuilder) -> QueryBuilder {
    for column in &node.table.columns {
        builder = builder.select_as(
            ColumnRef::qualified(&node.alias, &column.name),
            &node.column_alias(&column.name),
        );
    }

    for (column_name, child) in &node.children {
        let target_column = &child.table.primary_key;
        builder = builder.left_join(
            &child.table.table_name,
            &child.alias,
            ColumnRef::qualified(&child.alias, target_column),
            ColumnRef::qualified(&node.alias, column_name),
        );
        builder = apply_node(child, builder);
    }

    builder
}
