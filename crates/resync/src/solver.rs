//! Dependency ordering - puts referenced tables before referencing ones.
//!
//! Creating tables in schema order fails as soon as a table declares a foreign
//! key to a table that does not exist yet:
//!
//! ```text
//! -- This fails:
//! CREATE TABLE orders (..., FOREIGN KEY (user_id) REFERENCES users (id));  -- "users" doesn't exist!
//! CREATE TABLE users (...);
//!
//! -- This works:
//! CREATE TABLE users (...);
//! CREATE TABLE orders (..., FOREIGN KEY (user_id) REFERENCES users (id));
//! ```
//!
//! [`order_tables`] is a topological sort over the foreign-key graph. Ties are
//! broken by table name so the same schema always yields the same order.

use crate::{CycleError, Schema};
use std::collections::{BTreeMap, BTreeSet};

/// Order the tables of `schema` so that no table comes before a table it
/// references.
///
/// Self-references impose no constraint. References to tables outside the
/// schema are ignored. Returns [`CycleError`] with the unorderable tables when
/// the graph has a cycle.
pub fn order_tables(schema: &Schema) -> Result<Vec<String>, CycleError> {
    // table -> tables it still waits on
    let mut pending: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    // table -> tables waiting on it
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for table in schema.iter_tables() {
        let deps: BTreeSet<&str> = table
            .referenced_tables()
            .into_iter()
            .filter(|dep| *dep != table.name && schema.contains_table(dep))
            .collect();
        for dep in &deps {
            dependents.entry(*dep).or_default().push(&table.name);
        }
        pending.insert(&table.name, deps);
    }

    let mut ready: BTreeSet<&str> = pending
        .iter()
        .filter(|(_, deps)| deps.is_empty())
        .map(|(name, _)| *name)
        .collect();

    let mut ordered = Vec::with_capacity(pending.len());
    while let Some(name) = ready.pop_first() {
        pending.remove(name);
        ordered.push(name.to_string());

        for dependent in dependents.get(name).into_iter().flatten() {
            if let Some(deps) = pending.get_mut(dependent) {
                deps.remove(name);
                if deps.is_empty() {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if !pending.is_empty() {
        return Err(CycleError {
            tables: pending.keys().map(|name| name.to_string()).collect(),
        });
    }

    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Column, ColumnType, ForeignKey, Table};

    fn make_table(name: &str, refs: &[&str]) -> Table {
        let mut table =
            Table::new(name).column(Column::new("id", ColumnType::BigInt).primary_key());
        for r in refs {
            let col = format!("{}_id", r);
            table = table
                .column(Column::new(&col, ColumnType::BigInt))
                .references(ForeignKey::new(col, *r, "id"));
        }
        table
    }

    #[test]
    fn test_empty_schema() {
        assert_eq!(order_tables(&Schema::new()).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_independent_tables_sorted_by_name() {
        let schema = Schema::from_tables([
            make_table("zebra", &[]),
            make_table("apple", &[]),
            make_table("mango", &[]),
        ]);
        assert_eq!(order_tables(&schema).unwrap(), vec!["apple", "mango", "zebra"]);
    }

    #[test]
    fn test_chain_is_reversed() {
        // a -> b -> c
        let schema = Schema::from_tables([
            make_table("a", &["b"]),
            make_table("b", &["c"]),
            make_table("c", &[]),
        ]);
        assert_eq!(order_tables(&schema).unwrap(), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_tie_break_after_dependency_resolves() {
        // "post" unlocks once "author" is emitted, but "comment" still waits on it
        let schema = Schema::from_tables([
            make_table("comment", &["post", "author"]),
            make_table("post", &["author"]),
            make_table("author", &[]),
            make_table("tag", &[]),
        ]);
        assert_eq!(
            order_tables(&schema).unwrap(),
            vec!["author", "post", "comment", "tag"]
        );
    }

    #[test]
    fn test_self_reference_is_not_a_cycle() {
        let schema = Schema::from_tables([
            make_table("category", &["category", "site"]),
            make_table("site", &[]),
        ]);
        assert_eq!(order_tables(&schema).unwrap(), vec!["site", "category"]);
    }

    #[test]
    fn test_external_reference_is_ignored() {
        let schema = Schema::from_tables([make_table("audit", &["accounts"])]);
        assert_eq!(order_tables(&schema).unwrap(), vec!["audit"]);
    }

    #[test]
    fn test_cycle_detected() {
        let schema = Schema::from_tables([
            make_table("a", &["b"]),
            make_table("b", &["a"]),
            make_table("c", &[]),
            make_table("d", &["a"]),
        ]);
        let err = order_tables(&schema).unwrap_err();
        // d is stuck behind the cycle too
        assert_eq!(err.tables, vec!["a", "b", "d"]);
        assert_eq!(err.to_string(), "foreign key cycle between tables: a, b, d");
    }

    #[test]
    fn test_order_independent_of_insertion_order() {
        let tables = vec![
            make_table("orders", &["users", "products"]),
            make_table("users", &[]),
            make_table("products", &["vendors"]),
            make_table("vendors", &[]),
        ];
        let forward = order_tables(&Schema::from_tables(tables.clone())).unwrap();
        let backward = order_tables(&Schema::from_tables(tables.into_iter().rev())).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward, vec!["users", "vendors", "products", "orders"]);
    }
}
