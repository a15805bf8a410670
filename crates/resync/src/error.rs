use crate::render::Dialect;
use std::fmt;
use thiserror::Error;

/// Which of the two databases an operation was talking to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The desired-state database.
    Reference,
    /// The database being brought into alignment.
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Reference => write!(f, "reference"),
            Side::Target => write!(f, "target"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Introspect(#[from] IntrospectError),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Execute(#[from] ExecuteError),
}

/// Schema metadata could not be read. There is no partial-schema fallback.
#[derive(Debug, Error)]
pub enum IntrospectError {
    #[error("cannot connect to {side} database at {url}: {source}")]
    Connect {
        side: Side,
        /// Connection URL with the password masked.
        url: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("cannot read {what} from {side} database: {source}")]
    Query {
        side: Side,
        what: &'static str,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("{side} database reported malformed metadata: {reason}")]
    Malformed { side: Side, reason: String },
}

/// The reference schema's foreign-key graph has a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("foreign key cycle between tables: {}", .tables.join(", "))]
pub struct CycleError {
    /// Tables that could not be ordered, sorted by name.
    pub tables: Vec<String>,
}

/// A change cannot be expressed in the requested dialect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot render {} for {dialect}: {reason}", location(.table, .column))]
pub struct RenderError {
    pub dialect: Dialect,
    pub table: String,
    pub column: Option<String>,
    pub reason: String,
}

fn location(table: &str, column: &Option<String>) -> String {
    match column {
        Some(column) => format!("{}.{}", table, column),
        None => table.to_string(),
    }
}

/// A rendered statement failed against the live target.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("cannot connect to target database at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("cannot open transaction: {0}")]
    Begin(#[source] tokio_postgres::Error),

    #[error("cannot switch to namespace {namespace}: {source}")]
    SearchPath {
        namespace: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("statement {} failed, transaction rolled back: {source}\n  {statement}", .index + 1)]
    Statement {
        /// Zero-based position in the plan.
        index: usize,
        statement: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("cannot commit transaction: {0}")]
    Commit(#[source] tokio_postgres::Error),
}
