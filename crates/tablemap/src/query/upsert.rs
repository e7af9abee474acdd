//! Query Builder UPSERT operations

use super::builder::QueryBuilder;
use crate::backends::{DatabaseValue, SqlDialect};

/// Builder for UPSERT operations (INSERT ... ON CONFLICT UPDATE)
#[derive(Debug, Clone)]
pub struct UpsertBuilder {
    pub(crate) query_builder: QueryBuilder,
    pub(crate) conflict_column: String,
    pub(crate) update_columns: Vec<String>,
}

impl UpsertBuilder {
    /// Overwrite `column` with the proposed row's value on conflict
    pub fn update_column(mut self, column: &str) -> Self {
        self.update_columns.push(column.to_string());
        self
    }

    /// Generate SQL for the upsert operation
    pub fn to_sql_with_params(&self) -> (String, Vec<DatabaseValue>) {
        let (mut sql, params) = self.query_builder.to_sql_with_params();
        let dialect = self.query_builder.dialect;
        let conflict = dialect.quote(&self.conflict_column);

        match dialect {
            SqlDialect::PostgreSQL | SqlDialect::SQLite => {
                if self.update_columns.is_empty() {
                    sql.push_str(&format!(" ON CONFLICT ({}) DO NOTHING", conflict));
                } else {
                    sql.push_str(&format!(" ON CONFLICT ({}) DO UPDATE SET ", conflict));
                    let updates: Vec<String> = self
                        .update_columns
                        .iter()
                        .map(|c| {
                            let quoted = dialect.quote(c);
                            format!("{} = excluded.{}", quoted, quoted)
                        })
                        .collect();
                    sql.push_str(&updates.join(", "));
                }
            }
            SqlDialect::MySQL => {
                sql.push_str(" ON DUPLICATE KEY UPDATE ");
                if self.update_columns.is_empty() {
                    sql.push_str(&format!("{} = {}", conflict, conflict));
                } else {
                    let updates: Vec<String> = self
                        .update_columns
                        .iter()
                        .map(|c| {
                            let quoted = dialect.quote(c);
                            format!("{} = VALUES({})", quoted, quoted)
                        })
                        .collect();
                    sql.push_str(&updates.join(", "));
                }
            }
        }

        (sql, params)
    }
}
