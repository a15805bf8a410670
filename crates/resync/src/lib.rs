//! Additive schema synchronization for Postgres.
//!
//! Brings a target database up to a reference database by creating the
//! tables and adding the columns it is missing. Nothing is ever dropped,
//! renamed, or altered in place.
//!
//! The pipeline:
//!
//! 1. [`Introspector`] reads both databases into [`Schema`] snapshots.
//! 2. [`order_tables`] sorts the reference tables by foreign-key dependency.
//! 3. [`SchemaDiff::diff`] walks that order and produces a [`Plan`] of
//!    [`Change`]s.
//! 4. [`Plan::render`] turns the plan into DDL for a [`Dialect`].
//! 5. [`run_plan`] shows the statements to an [`Operator`], asks, and runs
//!    them in one transaction.
//!
//! ```ignore
//! let plan = resync::plan(&reference_url, &target_url, "public").await?;
//! for statement in plan.render(resync::Dialect::Postgres)? {
//!     println!("{statement}");
//! }
//! ```
//!
//! Steps 2 through 4 are pure and never touch a connection.

mod diff;
mod error;
mod execute;
mod introspect;
mod render;
pub mod solver;
mod traced;

pub use diff::{Change, Plan, SchemaDiff};
pub use error::{CycleError, Error, ExecuteError, IntrospectError, RenderError, Side};
pub use execute::{
    Executor, Operator, Outcome, SyncOptions, TargetDatabase, apply_atomically, plan, run_plan,
    synchronize,
};
pub use introspect::{Introspector, mask_password};
pub use render::{Dialect, Ident, add_column_sql, create_table_sql, search_path_sql};
pub use solver::order_tables;
pub use traced::{Connection, ConnectionExt, TracedConn};

// Re-export the schema model
pub use resync_schema::{Column, ColumnType, ForeignKey, Schema, Table};

/// Result type for resync operations.
pub type Result<T> = std::result::Result<T, Error>;
