//! Applying a plan to the target database.
//!
//! The planner never touches a live connection. Everything that does lives
//! here, behind two narrow seams:
//!
//! - [`Operator`]: shows the statements to a human and asks for a yes/no.
//! - [`Executor`]: runs the statements as one atomic unit.
//!
//! [`run_plan`] wires the two together and can be driven entirely by test
//! doubles.

use crate::introspect::{Introspector, mask_password};
use crate::render::search_path_sql;
use crate::traced::ConnectionExt;
use crate::{Dialect, ExecuteError, Plan, SchemaDiff, Side};
use tokio_postgres::{Client, NoTls};

/// The human in the loop.
pub trait Operator {
    /// Show every statement, in order, before anything runs.
    fn present(&mut self, statements: &[String]);

    /// Ask for explicit confirmation. Anything but an affirmative answer is a
    /// no.
    fn confirm(&mut self) -> bool;
}

/// Something that can run a batch of statements all-or-nothing.
#[allow(async_fn_in_trait)]
pub trait Executor {
    /// Run `statements` in order inside one transaction. Returns the number
    /// of statements applied. On failure nothing is applied.
    async fn execute_atomically(&mut self, statements: &[String]) -> Result<usize, ExecuteError>;
}

/// Run `statements` in a single transaction on `client`.
///
/// The transaction first scopes `search_path` to `namespace`, so the
/// unqualified names in the statements land in the namespace that was
/// introspected. The setting ends with the transaction.
///
/// Stops at the first failing statement, rolls back, and reports which
/// statement failed. Statements after it are never sent.
pub async fn apply_atomically(
    client: &mut Client,
    namespace: &str,
    statements: &[String],
) -> Result<usize, ExecuteError> {
    let tx = client.transaction().await.map_err(ExecuteError::Begin)?;

    tx.traced()
        .execute(&search_path_sql(namespace), &[])
        .await
        .map_err(|source| ExecuteError::SearchPath {
            namespace: namespace.to_string(),
            source,
        })?;

    for (index, statement) in statements.iter().enumerate() {
        let result = tx.traced().execute(statement, &[]).await;
        if let Err(source) = result {
            tracing::warn!(index, error = %source, "statement failed, rolling back");
            if let Err(e) = tx.rollback().await {
                // The server discards the transaction when the connection goes away
                tracing::warn!(error = %e, "rollback failed");
            }
            return Err(ExecuteError::Statement {
                index,
                statement: statement.clone(),
                source,
            });
        }
    }

    tx.commit().await.map_err(ExecuteError::Commit)?;
    tracing::info!(statements = statements.len(), "transaction committed");
    Ok(statements.len())
}

/// A target reached by URL, written into `namespace`. The connection is
/// opened only when there is something to execute and closed right after.
pub struct TargetDatabase<'a> {
    url: &'a str,
    namespace: &'a str,
}

impl<'a> TargetDatabase<'a> {
    pub fn new(url: &'a str, namespace: &'a str) -> Self {
        Self { url, namespace }
    }
}

impl Executor for TargetDatabase<'_> {
    async fn execute_atomically(&mut self, statements: &[String]) -> Result<usize, ExecuteError> {
        let masked = mask_password(self.url);
        let (mut client, connection) =
            tokio_postgres::connect(self.url, NoTls)
                .await
                .map_err(|source| ExecuteError::Connect {
                    url: masked,
                    source,
                })?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "target connection error");
            }
        });

        let result = apply_atomically(&mut client, self.namespace, statements).await;

        drop(client);
        let _ = driver.await;

        result
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The target already has every table and column; nobody was asked.
    NoChanges,
    /// The statements were shown but not executed.
    DryRun(usize),
    /// The operator said no; nothing was executed.
    Declined,
    /// This many statements were committed.
    Applied(usize),
}

/// Present, confirm, and execute `statements`.
///
/// An empty batch returns [`Outcome::NoChanges`] without presenting,
/// prompting, or opening a transaction.
pub async fn run_plan<O: Operator, E: Executor>(
    statements: &[String],
    operator: &mut O,
    executor: &mut E,
    dry_run: bool,
) -> Result<Outcome, ExecuteError> {
    if statements.is_empty() {
        return Ok(Outcome::NoChanges);
    }

    operator.present(statements);

    if dry_run {
        return Ok(Outcome::DryRun(statements.len()));
    }

    if !operator.confirm() {
        tracing::info!("operator declined");
        return Ok(Outcome::Declined);
    }

    let applied = executor.execute_atomically(statements).await?;
    Ok(Outcome::Applied(applied))
}

/// Options for [`synchronize`].
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Namespace to introspect on both sides and to create objects in.
    pub namespace: String,
    /// Show the plan but never execute it.
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            namespace: "public".to_string(),
            dry_run: false,
        }
    }
}

/// Introspect both databases, one after the other, and compute the plan
/// that brings the target up to the reference.
pub async fn plan(reference_url: &str, target_url: &str, namespace: &str) -> crate::Result<Plan> {
    let reference = Introspector::new(Side::Reference, namespace)
        .introspect_url(reference_url)
        .await?;
    let target = Introspector::new(Side::Target, namespace)
        .introspect_url(target_url)
        .await?;

    let plan = reference.diff(&target)?;
    tracing::info!(changes = plan.len(), "plan computed");
    Ok(plan)
}

/// The whole run: introspect, plan, render, present, confirm, apply.
pub async fn synchronize<O: Operator>(
    reference_url: &str,
    target_url: &str,
    options: &SyncOptions,
    operator: &mut O,
) -> crate::Result<Outcome> {
    let plan = plan(reference_url, target_url, &options.namespace).await?;
    let statements = plan.render(Dialect::Postgres)?;

    let mut target = TargetDatabase::new(target_url, &options.namespace);
    let outcome = run_plan(&statements, operator, &mut target, options.dry_run).await?;
    Ok(outcome)
}
