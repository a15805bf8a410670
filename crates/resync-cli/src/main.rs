use clap::{Args, Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use resync::{Dialect, Ident, Introspector, Operator, Outcome, Schema, Side, SyncOptions};
use std::io::{BufRead, Write};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

mod config;

use config::{Config, ConfigError};

/// Bring a Postgres database up to another one by adding missing tables and columns.
#[derive(Parser, Debug)]
#[command(name = "resync", version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    /// URL of the database whose schema is the desired state
    #[arg(long, env = "RESYNC_REFERENCE_URL", hide_env_values = true, global = true)]
    reference_url: Option<String>,

    /// URL of the database to bring up to date
    #[arg(long, env = "RESYNC_TARGET_URL", hide_env_values = true, global = true)]
    target_url: Option<String>,

    /// Namespace (Postgres schema) to compare [default: public]
    #[arg(long, env = "RESYNC_NAMESPACE", global = true)]
    namespace: Option<String>,
}

impl From<ConnectionArgs> for Config {
    fn from(args: ConnectionArgs) -> Self {
        Config {
            reference_url: args.reference_url,
            target_url: args.target_url,
            namespace: args.namespace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the statements that would bring the target up to date
    Plan {
        /// SQL dialect to render
        #[arg(long, default_value_t = Dialect::Postgres)]
        dialect: Dialect,
    },
    /// Show the statements, ask, and apply them in one transaction
    Sync {
        /// Apply without asking
        #[arg(short, long)]
        yes: bool,

        /// Show the statements but never apply them
        #[arg(long, conflicts_with = "yes")]
        dry_run: bool,
    },
    /// Dump the introspected schema of one database
    Schema {
        /// Which database to read
        #[arg(value_enum, default_value_t = Which::Reference)]
        which: Which,
    },
}

/// A printed Postgres script names tables unqualified, so outside `public`
/// it has to select the namespace itself.
fn script_prelude(dialect: Dialect, namespace: &str) -> Option<String> {
    (dialect == Dialect::Postgres && namespace != "public")
        .then(|| format!("SET search_path TO {};", Ident(namespace)))
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Which {
    Reference,
    Target,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resync(#[from] resync::Error),
}

impl From<resync::IntrospectError> for CliError {
    fn from(e: resync::IntrospectError) -> Self {
        CliError::Resync(e.into())
    }
}

impl From<resync::RenderError> for CliError {
    fn from(e: resync::RenderError) -> Self {
        CliError::Resync(e.into())
    }
}

#[tokio::main]
async fn main() {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("RESYNC_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("{} {}", "error:".red().bold(), err);
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            eprintln!("  {} {}", "caused by:".dimmed(), cause);
            source = std::error::Error::source(cause);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let file = match config::load()? {
        Some((config, path)) => {
            tracing::info!(%path, "using config file");
            config
        }
        None => Config::default(),
    };
    let config = Config::from(cli.connection).or(file);

    match cli.command {
        Commands::Plan { dialect } => {
            let plan = resync::plan(
                config.reference_url()?,
                config.target_url()?,
                config.namespace(),
            )
            .await?;

            if plan.is_empty() {
                eprintln!("{}", "Schemas are identical, nothing to do.".green());
                return Ok(());
            }

            eprint!("{}", plan.dimmed());
            if let Some(prelude) = script_prelude(dialect, config.namespace()) {
                println!("{prelude}\n");
            }
            for statement in plan.render(dialect)? {
                println!("{statement}\n");
            }
        }
        Commands::Sync { yes, dry_run } => {
            let options = SyncOptions {
                namespace: config.namespace().to_string(),
                dry_run,
            };
            let mut operator = TerminalOperator { assume_yes: yes };
            let outcome = resync::synchronize(
                config.reference_url()?,
                config.target_url()?,
                &options,
                &mut operator,
            )
            .await?;
            report(outcome);
        }
        Commands::Schema { which } => {
            let (side, url) = match which {
                Which::Reference => (Side::Reference, config.reference_url()?),
                Which::Target => (Side::Target, config.target_url()?),
            };
            let schema = Introspector::new(side, config.namespace())
                .introspect_url(url)
                .await?;
            print_schema(&schema);
        }
    }

    Ok(())
}

fn report(outcome: Outcome) {
    match outcome {
        Outcome::NoChanges => eprintln!("{}", "Schemas are identical, nothing to do.".green()),
        Outcome::DryRun(n) => eprintln!("{} statement(s) not applied (dry run).", n),
        Outcome::Declined => eprintln!("{}", "Aborted, nothing applied.".yellow()),
        Outcome::Applied(n) => eprintln!("{}", format!("Applied {} statement(s).", n).green()),
    }
}

/// Prompts on the terminal.
struct TerminalOperator {
    assume_yes: bool,
}

impl Operator for TerminalOperator {
    fn present(&mut self, statements: &[String]) {
        eprintln!(
            "{}",
            format!("The following {} statement(s) will run:", statements.len()).bold()
        );
        for statement in statements {
            println!("{}\n", statement.cyan());
        }
    }

    fn confirm(&mut self) -> bool {
        if self.assume_yes {
            return true;
        }

        eprint!("Apply these changes? [y/N] ");
        let _ = std::io::stderr().flush();

        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_affirmative(&answer),
            Err(e) => {
                tracing::warn!(error = %e, "cannot read answer, treating as no");
                false
            }
        }
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn print_schema(schema: &Schema) {
    if schema.is_empty() {
        println!("No tables found.");
        return;
    }

    println!("Schema ({} tables):", schema.len());
    println!();
    for table in schema.iter_tables() {
        println!(
            "  {} ({} columns)",
            table.name.bold(),
            table.columns.len()
        );
        for col in &table.columns {
            let mut attrs = Vec::new();
            if col.primary_key {
                attrs.push("PK".to_string());
            }
            if col.auto_increment {
                attrs.push("AUTO".to_string());
            }
            if !col.nullable {
                attrs.push("NOT NULL".to_string());
            }
            if let Some(default) = &col.server_default {
                attrs.push(format!("DEFAULT {}", default));
            }

            let attrs_str = if attrs.is_empty() {
                String::new()
            } else {
                format!(" [{}]", attrs.join(", "))
            };

            println!("    {}: {}{}", col.name, col.column_type, attrs_str.dimmed());
        }

        for fk in &table.foreign_keys {
            println!(
                "    FK: {} -> {}.{}",
                fk.columns.join(", "),
                fk.references_table,
                fk.references_columns.join(", ")
            );
        }
        println!();
    }
}
