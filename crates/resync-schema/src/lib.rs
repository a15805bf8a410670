//! Database schema types for resync.
//!
//! A [`Schema`] is a point-in-time snapshot of one database's tables and
//! columns. It is produced once by introspection and never mutated afterwards;
//! the planner only ever reads it.

use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::fmt;

/// Dialect-neutral column types.
///
/// Each variant describes what the column holds rather than how a particular
/// engine spells it. The renderer decides the spelling, and refuses variants
/// that a dialect cannot express.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// 16-bit integer
    SmallInt,
    /// 32-bit integer
    Integer,
    /// 64-bit integer
    BigInt,
    /// 32-bit floating point
    Real,
    /// 64-bit floating point
    DoublePrecision,
    /// Exact numeric with optional precision and scale
    Numeric {
        precision: Option<u32>,
        scale: Option<u32>,
    },
    /// Boolean
    Boolean,
    /// Unbounded text
    Text,
    /// Variable-length string with optional maximum length
    Varchar { length: Option<u32> },
    /// Fixed-length, blank-padded string
    Char { length: Option<u32> },
    /// Binary data
    Bytea,
    /// Timestamp without time zone, with optional fractional-second
    /// precision (`None` is the engine default)
    Timestamp { precision: Option<u32> },
    /// Timestamp with time zone
    Timestamptz { precision: Option<u32> },
    /// Calendar date
    Date,
    /// Time of day
    Time { precision: Option<u32> },
    /// Time span
    Interval,
    /// UUID
    Uuid,
    /// JSON stored as text
    Json,
    /// JSON stored in binary form
    Jsonb,
    /// One-dimensional array of another type
    Array(Box<ColumnType>),
    /// Engine-specific or user-defined type, carried by name.
    Other(String),
}

impl ColumnType {
    /// Shorthand for `VARCHAR(length)`.
    pub fn varchar(length: u32) -> Self {
        ColumnType::Varchar {
            length: Some(length),
        }
    }

    /// `TIMESTAMPTZ` with the default precision.
    pub fn timestamptz() -> Self {
        ColumnType::Timestamptz { precision: None }
    }

    /// Shorthand for an array of `inner`.
    pub fn array(inner: ColumnType) -> Self {
        ColumnType::Array(Box::new(inner))
    }

    /// Whether the type is an integer type (the only ones that can be
    /// auto-incremented).
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::SmallInt | ColumnType::Integer | ColumnType::BigInt
        )
    }
}

/// Human-readable, Postgres-flavoured spelling. Used for summaries only;
/// statement text goes through the renderer.
impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::SmallInt => write!(f, "SMALLINT"),
            ColumnType::Integer => write!(f, "INTEGER"),
            ColumnType::BigInt => write!(f, "BIGINT"),
            ColumnType::Real => write!(f, "REAL"),
            ColumnType::DoublePrecision => write!(f, "DOUBLE PRECISION"),
            ColumnType::Numeric { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => write!(f, "NUMERIC({}, {})", p, s),
                (Some(p), None) => write!(f, "NUMERIC({})", p),
                _ => write!(f, "NUMERIC"),
            },
            ColumnType::Boolean => write!(f, "BOOLEAN"),
            ColumnType::Text => write!(f, "TEXT"),
            ColumnType::Varchar { length: Some(n) } => write!(f, "VARCHAR({})", n),
            ColumnType::Varchar { length: None } => write!(f, "VARCHAR"),
            ColumnType::Char { length: Some(n) } => write!(f, "CHAR({})", n),
            ColumnType::Char { length: None } => write!(f, "CHAR"),
            ColumnType::Bytea => write!(f, "BYTEA"),
            ColumnType::Timestamp { precision } => write_precision(f, "TIMESTAMP", precision),
            ColumnType::Timestamptz { precision } => {
                write_precision(f, "TIMESTAMPTZ", precision)
            }
            ColumnType::Date => write!(f, "DATE"),
            ColumnType::Time { precision } => write_precision(f, "TIME", precision),
            ColumnType::Interval => write!(f, "INTERVAL"),
            ColumnType::Uuid => write!(f, "UUID"),
            ColumnType::Json => write!(f, "JSON"),
            ColumnType::Jsonb => write!(f, "JSONB"),
            ColumnType::Array(inner) => write!(f, "{}[]", inner),
            ColumnType::Other(name) => write!(f, "{}", name),
        }
    }
}

fn write_precision(f: &mut fmt::Formatter<'_>, name: &str, precision: &Option<u32>) -> fmt::Result {
    match precision {
        Some(p) => write!(f, "{}({})", name, p),
        None => write!(f, "{}", name),
    }
}

/// A database column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name, compared case-sensitively
    pub name: String,
    /// Column type
    pub column_type: ColumnType,
    /// Whether the column allows NULL
    pub nullable: bool,
    /// Server-side default expression, carried verbatim
    pub server_default: Option<String>,
    /// Whether this column is part of the primary key
    pub primary_key: bool,
    /// Whether values come from a sequence or identity (SERIAL-style)
    pub auto_increment: bool,
}

impl Column {
    /// Create a NOT NULL column without a default.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            server_default: None,
            primary_key: false,
            auto_increment: false,
        }
    }

    /// Mark the column as nullable.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark the column as (part of) the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark the column as drawing its values from a sequence.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Set the server-side default expression.
    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.server_default = Some(expr.into());
        self
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    /// Constraint name, if the database reported one
    pub name: Option<String>,
    /// Column(s) in this table
    pub columns: Vec<String>,
    /// Referenced table
    pub references_table: String,
    /// Referenced column(s)
    pub references_columns: Vec<String>,
}

impl ForeignKey {
    /// Single-column foreign key without an explicit constraint name.
    pub fn new(
        column: impl Into<String>,
        references_table: impl Into<String>,
        references_column: impl Into<String>,
    ) -> Self {
        Self {
            name: None,
            columns: vec![column.into()],
            references_table: references_table.into(),
            references_columns: vec![references_column.into()],
        }
    }
}

/// A database table definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Table name
    pub name: String,
    /// Columns in the database's native order
    pub columns: Vec<Column>,
    /// Foreign keys
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    /// Create an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Append a column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Append a foreign key.
    pub fn references(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Get a column by name.
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether a column with this exact name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    /// Names of the tables this table references, self included if it
    /// references itself.
    pub fn referenced_tables(&self) -> BTreeSet<&str> {
        self.foreign_keys
            .iter()
            .map(|fk| fk.references_table.as_str())
            .collect()
    }

    /// Primary key column names, in column order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// A complete database schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    /// Tables in the schema, indexed by name
    pub tables: IndexMap<String, Table>,
}

impl Schema {
    /// Create a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from a list of tables. A later table with the same name
    /// replaces an earlier one.
    pub fn from_tables(tables: impl IntoIterator<Item = Table>) -> Self {
        Self {
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    /// Get a table by name.
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Whether a table with this exact name exists.
    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Iterate over all tables, in insertion order.
    pub fn iter_tables(&self) -> impl DoubleEndedIterator<Item = &Table> + ExactSizeIterator {
        self.tables.values()
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the schema has no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
