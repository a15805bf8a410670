//! DDL rendering.
//!
//! Turns a [`Change`] into a single statement for a given [`Dialect`]. Type
//! spelling, identifier quoting and the statement layout live here; nothing
//! else in the crate produces SQL text for a change.

use crate::{Change, Column, ColumnType, RenderError, Table};
use std::fmt;
use std::str::FromStr;

/// SQL dialect to render statements for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// PostgreSQL
    #[default]
    Postgres,
    /// SQLite
    Sqlite,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(format!(
                "unknown dialect '{}' (expected postgres or sqlite)",
                other
            )),
        }
    }
}

/// Keywords that can never be used as a bare identifier.
const RESERVED: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric",
    "authorization", "between", "binary", "both", "case", "cast", "check", "collate",
    "column", "concurrently", "constraint", "create", "cross", "current_catalog",
    "current_date", "current_role", "current_schema", "current_time", "current_timestamp",
    "current_user", "default", "deferrable", "desc", "distinct", "do", "else", "end",
    "except", "false", "fetch", "for", "foreign", "freeze", "from", "full", "grant",
    "group", "having", "ilike", "in", "initially", "inner", "intersect", "into", "is",
    "isnull", "join", "lateral", "leading", "left", "like", "limit", "localtime",
    "localtimestamp", "natural", "not", "notnull", "null", "offset", "on", "only", "or",
    "order", "outer", "overlaps", "placing", "primary", "references", "returning",
    "right", "select", "session_user", "similar", "some", "symmetric", "table",
    "tablesample", "then", "to", "trailing", "true", "union", "unique", "user", "using",
    "variadic", "verbose", "when", "where", "window", "with",
];

/// An SQL identifier.
///
/// Display writes plain lowercase identifiers as-is and double-quotes
/// everything else (mixed case, reserved words, odd characters), doubling
/// any embedded quotes.
///
/// ```
/// use resync::Ident;
/// assert_eq!(Ident("users").to_string(), "users");
/// assert_eq!(Ident("user").to_string(), "\"user\"");
/// assert_eq!(Ident("createdAt").to_string(), "\"createdAt\"");
/// assert_eq!(Ident("bla\"h").to_string(), "\"bla\"\"h\"");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> Ident<T> {
    fn needs_quotes(&self) -> bool {
        let name = self.0.as_ref();
        let mut chars = name.chars();
        let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_');
        let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        !(starts_ok && rest_ok) || RESERVED.binary_search(&name).is_ok()
    }
}

impl<T: AsRef<str>> fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.needs_quotes() {
            return write!(f, "{}", self.0.as_ref());
        }
        write!(f, "\"")?;
        for c in self.0.as_ref().chars() {
            if c == '"' {
                write!(f, "\"\"")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "\"")
    }
}

fn ident_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| Ident(n).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Change {
    /// Render this change as a single statement terminated by `;`.
    pub fn to_sql(&self, dialect: Dialect) -> Result<String, RenderError> {
        match self {
            Change::CreateTable { table } => create_table_sql(table, dialect),
            Change::AddColumn { table_name, column } => {
                add_column_sql(table_name, column, dialect)
            }
        }
    }
}

/// Render `ALTER TABLE .. ADD COLUMN ..`.
///
/// Only the default clause is appended after the type. Nullability is never
/// rendered here, so a NOT NULL reference column arrives nullable.
pub fn add_column_sql(
    table_name: &str,
    column: &Column,
    dialect: Dialect,
) -> Result<String, RenderError> {
    if column.auto_increment && dialect == Dialect::Sqlite {
        return Err(RenderError {
            dialect,
            table: table_name.to_string(),
            column: Some(column.name.clone()),
            reason: "sqlite cannot add an auto-increment column to an existing table".into(),
        });
    }
    let column_type = column_type_sql(table_name, column, dialect)?;
    let default = default_sql(table_name, column, dialect)?;
    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {} {}{};",
        Ident(table_name),
        Ident(&column.name),
        column_type,
        default
    ))
}

/// Render `CREATE TABLE` with every column, the primary key and the foreign
/// keys of `table`.
pub fn create_table_sql(table: &Table, dialect: Dialect) -> Result<String, RenderError> {
    let mut sql = format!("CREATE TABLE {} (\n", Ident(&table.name));

    let pk_columns = table.primary_key();

    // A composite key cannot be declared inline
    let use_table_pk_constraint = pk_columns.len() > 1;

    let mut parts = Vec::with_capacity(table.columns.len() + table.foreign_keys.len() + 1);
    for col in &table.columns {
        let mut def = format!(
            "    {} {}",
            Ident(&col.name),
            column_type_sql(&table.name, col, dialect)?
        );

        let inline_pk = col.primary_key && !use_table_pk_constraint;
        if col.auto_increment && dialect == Dialect::Sqlite && !inline_pk {
            return Err(RenderError {
                dialect,
                table: table.name.clone(),
                column: Some(col.name.clone()),
                reason: "sqlite only auto-increments a single-column INTEGER PRIMARY KEY".into(),
            });
        }
        if inline_pk {
            def.push_str(" PRIMARY KEY");
            if col.auto_increment && dialect == Dialect::Sqlite {
                def.push_str(" AUTOINCREMENT");
            }
        }

        if !col.nullable && !inline_pk {
            def.push_str(" NOT NULL");
        }

        def.push_str(&default_sql(&table.name, col, dialect)?);

        parts.push(def);
    }

    if use_table_pk_constraint {
        let cols: Vec<_> = pk_columns.iter().map(|c| Ident(c).to_string()).collect();
        parts.push(format!("    PRIMARY KEY ({})", cols.join(", ")));
    }

    for fk in &table.foreign_keys {
        let constraint = fk
            .name
            .as_ref()
            .map(|n| format!("CONSTRAINT {} ", Ident(n)))
            .unwrap_or_default();
        parts.push(format!(
            "    {}FOREIGN KEY ({}) REFERENCES {} ({})",
            constraint,
            ident_list(&fk.columns),
            Ident(&fk.references_table),
            ident_list(&fk.references_columns)
        ));
    }

    sql.push_str(&parts.join(",\n"));
    sql.push_str("\n);");

    Ok(sql)
}

/// Render `SET LOCAL search_path` so unqualified names in the statements
/// that follow resolve inside `namespace`. Only valid inside a transaction.
pub fn search_path_sql(namespace: &str) -> String {
    format!("SET LOCAL search_path TO {};", Ident(namespace))
}

/// Render the ` DEFAULT ..` clause of `column`, or nothing.
///
/// Postgres gets the expression verbatim. SQLite accepts far less (no `::`
/// casts, no bare function calls), and anything it would not parse is an
/// error rather than a statement that fails later.
fn default_sql(table: &str, column: &Column, dialect: Dialect) -> Result<String, RenderError> {
    let Some(expr) = &column.server_default else {
        return Ok(String::new());
    };
    if dialect == Dialect::Sqlite && !sqlite_accepts_default(expr) {
        return Err(RenderError {
            dialect,
            table: table.to_string(),
            column: Some(column.name.clone()),
            reason: format!("default `{}` is not valid in sqlite", expr),
        });
    }
    Ok(format!(" DEFAULT {}", expr))
}

/// Literals, `CURRENT_*` keywords and parenthesized expressions.
fn sqlite_accepts_default(expr: &str) -> bool {
    let expr = expr.trim();
    if expr.contains("::") {
        return false;
    }
    if expr.starts_with('(') && expr.ends_with(')') {
        return true;
    }
    if matches!(
        expr.to_ascii_uppercase().as_str(),
        "NULL" | "TRUE" | "FALSE" | "CURRENT_TIMESTAMP" | "CURRENT_DATE" | "CURRENT_TIME"
    ) {
        return true;
    }
    if let Some(inner) = expr
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        // One string literal, with quotes only as doubled escapes
        return !inner.replace("''", "").contains('\'');
    }
    let digits = expr.trim_start_matches(['+', '-']);
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.parse::<f64>().is_ok()
}

/// Spell a column's type for `dialect`.
fn column_type_sql(table: &str, column: &Column, dialect: Dialect) -> Result<String, RenderError> {
    let unsupported = |reason: String| RenderError {
        dialect,
        table: table.to_string(),
        column: Some(column.name.clone()),
        reason,
    };

    match dialect {
        Dialect::Postgres => {
            if column.auto_increment {
                return match column.column_type {
                    ColumnType::SmallInt => Ok("SMALLSERIAL".into()),
                    ColumnType::Integer => Ok("SERIAL".into()),
                    ColumnType::BigInt => Ok("BIGSERIAL".into()),
                    ref other => Err(unsupported(format!(
                        "auto-increment requires an integer type, found {}",
                        other
                    ))),
                };
            }
            Ok(column.column_type.to_string())
        }
        // AUTOINCREMENT is only accepted on a column declared exactly INTEGER
        Dialect::Sqlite if column.auto_increment => {
            if column.column_type.is_integer() {
                Ok("INTEGER".into())
            } else {
                Err(unsupported(format!(
                    "auto-increment requires an integer type, found {}",
                    column.column_type
                )))
            }
        }
        Dialect::Sqlite => sqlite_type(&column.column_type).map_err(unsupported),
    }
}

fn sqlite_type(column_type: &ColumnType) -> Result<String, String> {
    let sql = match column_type {
        ColumnType::SmallInt => "SMALLINT".to_string(),
        ColumnType::Integer => "INTEGER".to_string(),
        ColumnType::BigInt => "BIGINT".to_string(),
        ColumnType::Real | ColumnType::DoublePrecision => "REAL".to_string(),
        ColumnType::Numeric { .. } => column_type.to_string(),
        ColumnType::Boolean => "BOOLEAN".to_string(),
        ColumnType::Text => "TEXT".to_string(),
        ColumnType::Varchar { .. } | ColumnType::Char { .. } => column_type.to_string(),
        ColumnType::Bytea => "BLOB".to_string(),
        ColumnType::Timestamp { .. } | ColumnType::Timestamptz { .. } => "DATETIME".to_string(),
        ColumnType::Date => "DATE".to_string(),
        ColumnType::Time { .. } => "TIME".to_string(),
        ColumnType::Uuid => "CHAR(32)".to_string(),
        ColumnType::Json | ColumnType::Jsonb => "JSON".to_string(),
        ColumnType::Interval => return Err("sqlite has no INTERVAL type".to_string()),
        ColumnType::Array(_) => {
            return Err(format!("sqlite has no array types ({})", column_type));
        }
        ColumnType::Other(name) => {
            return Err(format!("type '{}' has no sqlite equivalent", name));
        }
    };
    Ok(sql)
}
