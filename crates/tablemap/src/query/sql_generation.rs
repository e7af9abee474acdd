//! Query Builder SQL generation

use super::builder::QueryBuilder;
use super::types::*;
use crate::backends::DatabaseValue;

impl QueryBuilder {
    /// Generate SQL with dialect placeholders and return the bind values
    ///
    /// NULL values are written inline rather than bound.
    pub fn to_sql_with_params(&self) -> (String, Vec<DatabaseValue>) {
        match self.query_type {
            QueryType::Select => self.build_select_sql(),
            QueryType::Insert => self.build_insert_sql(),
            QueryType::Update => self.build_update_sql(),
            QueryType::Delete => self.build_delete_sql(),
        }
    }

    fn quoted_table(&self) -> String {
        self.table
            .as_deref()
            .map(|t| self.dialect.quote(t))
            .unwrap_or_default()
    }

    fn push_value(&self, sql: &mut String, params: &mut Vec<DatabaseValue>, value: &DatabaseValue) {
        if value.is_null() {
            sql.push_str("NULL");
        } else {
            sql.push_str(&self.dialect.parameter_placeholder(params.len()));
            params.push(value.clone());
        }
    }

    /// Build SELECT SQL with parameters
    fn build_select_sql(&self) -> (String, Vec<DatabaseValue>) {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        if self.select_fields.is_empty() {
            sql.push('*');
        } else {
            let fields: Vec<String> = self
                .select_fields
                .iter()
                .map(|field| match &field.alias {
                    Some(alias) => format!(
                        "{} AS {}",
                        field.column.to_sql(self.dialect),
                        self.dialect.quote(alias)
                    ),
                    None => field.column.to_sql(self.dialect),
                })
                .collect();
            sql.push_str(&fields.join(", "));
        }

        // FROM clause
        if self.table.is_some() {
            sql.push_str(" FROM ");
            sql.push_str(&self.quoted_table());
            if let Some(alias) = &self.table_alias {
                sql.push_str(" AS ");
                sql.push_str(&self.dialect.quote(alias));
            }
        }

        // JOIN clauses
        for join in &self.joins {
            sql.push_str(&format!(
                " LEFT JOIN {} AS {} ON {} = {}",
                self.dialect.quote(&join.table),
                self.dialect.quote(&join.alias),
                join.on.0.to_sql(self.dialect),
                join.on.1.to_sql(self.dialect)
            ));
        }

        self.build_where_clause(&mut sql, &mut params);
        self.build_order_limit_clause(&mut sql);

        (sql, params)
    }

    /// Build INSERT SQL with parameters
    fn build_insert_sql(&self) -> (String, Vec<DatabaseValue>) {
        let mut sql = format!("INSERT INTO {}", self.quoted_table());
        let mut params = Vec::new();

        let columns: Vec<String> = self
            .set_clauses
            .iter()
            .map(|clause| self.dialect.quote(&clause.column))
            .collect();
        sql.push_str(" (");
        sql.push_str(&columns.join(", "));
        sql.push_str(") VALUES (");

        for (i, clause) in self.set_clauses.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            self.push_value(&mut sql, &mut params, &clause.value);
        }
        sql.push(')');

        (sql, params)
    }

    /// Build UPDATE SQL with parameters
    fn build_update_sql(&self) -> (String, Vec<DatabaseValue>) {
        let mut sql = format!("UPDATE {}", self.quoted_table());
        let mut params = Vec::new();

        if !self.set_clauses.is_empty() {
            sql.push_str(" SET ");
            for (i, clause) in self.set_clauses.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(&format!("{} = ", self.dialect.quote(&clause.column)));
                self.push_value(&mut sql, &mut params, &clause.value);
            }
        }

        self.build_where_clause(&mut sql, &mut params);

        (sql, params)
    }

    /// Build DELETE SQL with parameters
    fn build_delete_sql(&self) -> (String, Vec<DatabaseValue>) {
        let mut sql = format!("DELETE FROM {}", self.quoted_table());
        let mut params = Vec::new();

        self.build_where_clause(&mut sql, &mut params);

        (sql, params)
    }

    fn build_where_clause(&self, sql: &mut String, params: &mut Vec<DatabaseValue>) {
        if self.where_conditions.is_empty() {
            return;
        }

        sql.push_str(" WHERE ");
        for (i, condition) in self.where_conditions.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            sql.push_str(&condition.column.to_sql(self.dialect));
            match (&condition.operator, &condition.value) {
                (QueryOperator::Equal, Some(value)) => {
                    sql.push_str(" = ");
                    self.push_value(sql, params, value);
                }
                // An empty IN list matches nothing
                (QueryOperator::In, _) if condition.values.is_empty() => {
                    sql.push_str(" IN (NULL)");
                }
                (QueryOperator::In, _) => {
                    sql.push_str(" IN (");
                    for (j, value) in condition.values.iter().enumerate() {
                        if j > 0 {
                            sql.push_str(", ");
                        }
                        self.push_value(sql, params, value);
                    }
                    sql.push(')');
                }
                _ => sql.push_str(" IS NULL"),
            }
        }
    }

    fn build_order_limit_clause(&self, sql: &mut String) {
        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{} {}", column.to_sql(self.dialect), direction))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        match (self.limit_count, self.offset_value) {
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(_)) => {
                if let Some(unbounded) = self.dialect.unbounded_limit() {
                    sql.push_str(&format!(" LIMIT {}", unbounded));
                }
            }
            (None, None) => {}
        }

        if let Some(offset) = self.offset_value {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
    }
}
