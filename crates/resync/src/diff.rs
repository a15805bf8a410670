//! Schema diffing - compare a reference schema against a target schema.
//!
//! The diff is additive only: it lists the tables and columns the target is
//! missing, never anything the target has in excess. Tables and columns are
//! matched by exact, case-sensitive name, so a renamed column shows up as a
//! new column and the old one is left alone.
//!
//! ### Example
//!
//! ```text
//! reference: users(id, name), orders(id, user_id -> users)
//! target:    users(id)
//!
//! plan:
//!   + users.name: TEXT
//!   + table orders
//! ```

use crate::solver::order_tables;
use crate::{Column, CycleError, Dialect, RenderError, Schema, Table};
use std::fmt;

/// A single additive schema change.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// The table is missing from the target; carries the full reference
    /// definition.
    CreateTable { table: Table },
    /// The table exists on both sides but this column exists only in the
    /// reference.
    AddColumn { table_name: String, column: Column },
}

impl Change {
    /// Name of the table this change touches.
    pub fn table_name(&self) -> &str {
        match self {
            Change::CreateTable { table } => &table.name,
            Change::AddColumn { table_name, .. } => table_name,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::CreateTable { table } => write!(f, "+ table {}", table.name),
            Change::AddColumn { table_name, column } => {
                let nullable = if column.nullable { " (nullable)" } else { "" };
                write!(
                    f,
                    "+ {}.{}: {}{}",
                    table_name, column.name, column.column_type, nullable
                )
            }
        }
    }
}

/// An ordered list of changes that brings the target up to the reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    /// Changes in execution order.
    pub changes: Vec<Change>,
}

impl Plan {
    /// Returns true if there are no differences.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Iterate over the changes in order.
    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    /// Render every change, in order.
    ///
    /// Fails on the first change that cannot be expressed in `dialect`; a
    /// partial statement list is never returned.
    pub fn render(&self, dialect: Dialect) -> Result<Vec<String>, RenderError> {
        self.changes.iter().map(|c| c.to_sql(dialect)).collect()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for change in &self.changes {
            writeln!(f, "{}", change)?;
        }
        Ok(())
    }
}

/// Diffing for [`Schema`] snapshots.
pub trait SchemaDiff {
    /// Compute the changes needed to make `target` a structural superset of
    /// this (reference) schema.
    ///
    /// Tables are walked in dependency order. A table missing from the target
    /// yields one `CreateTable` and nothing else; a table present on both
    /// sides yields one `AddColumn` per missing column, in native column
    /// order.
    fn diff(&self, target: &Schema) -> Result<Plan, CycleError>;
}

impl SchemaDiff for Schema {
    fn diff(&self, target: &Schema) -> Result<Plan, CycleError> {
        let order = order_tables(self)?;

        let mut changes = Vec::new();
        for table in order.iter().filter_map(|name| self.get_table(name)) {
            let Some(current) = target.get_table(&table.name) else {
                changes.push(Change::CreateTable {
                    table: table.clone(),
                });
                continue;
            };
            for column in &table.columns {
                if !current.has_column(&column.name) {
                    changes.push(Change::AddColumn {
                        table_name: table.name.clone(),
                        column: column.clone(),
                    });
                }
            }
        }

        tracing::debug!(
            reference_tables = self.len(),
            target_tables = target.len(),
            changes = changes.len(),
            "computed schema diff"
        );

        Ok(Plan { changes })
    }
}
