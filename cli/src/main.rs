use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use rusqlite::{Connection, OpenFlags};
use stowage_config::StoreConfig;
use stowage_core::Value;
use stowage_sqlite::{
    DataAccess, DatabaseInitializer, MigrationRunner, Migrations, ledger, resolve_store_path,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "stowage")]
#[command(version, about = "Bootstrap, migrate, and inspect a stowage SQLite store")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Application directory holding the store (overrides the config file).
    #[arg(long, global = true, env = "STOWAGE_DIR")]
    dir: Option<PathBuf>,
    /// Application name used for the platform data directory.
    #[arg(long, global = true)]
    app_name: Option<String>,
    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the resolved store file path.
    Path,
    /// Create the store if needed and apply pending SQL migrations.
    Migrate(MigrateArgs),
    /// Show applied migrations and, given a directory, the pending ones.
    Status(StatusArgs),
    /// Run a read-only SQL query and print the rows as JSON.
    Query(QueryArgs),
}

#[derive(Debug, Args)]
struct MigrateArgs {
    /// Directory of `{number}_{description}.sql` files.
    #[arg(long)]
    migrations: PathBuf,
}

#[derive(Debug, Args)]
struct StatusArgs {
    /// Directory of `{number}_{description}.sql` files to compare against.
    #[arg(long)]
    migrations: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct QueryArgs {
    /// SQL text; reference parameters as ?1, ?2, ...
    sql: String,
    /// Positional parameter value (repeatable). Parsed as integer, then
    /// real, otherwise text.
    #[arg(long = "param")]
    params: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let result = match load_config(&cli.global) {
        Ok(config) => match cli.command {
            Command::Path => run_path(&config),
            Command::Migrate(args) => run_migrate(&config, args, &cancel).await,
            Command::Status(args) => run_status(&config, args),
            Command::Query(args) => run_query(&config, args, &cancel).await,
        },
        Err(err) => Err(err),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(global: &GlobalArgs) -> Result<StoreConfig, String> {
    let mut config = match &global.config {
        Some(path) => StoreConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?,
        None => StoreConfig::default(),
    };
    if let Some(dir) = &global.dir {
        config.directory = Some(dir.clone());
    }
    if let Some(name) = &global.app_name {
        config.app_name = Some(name.clone());
    }
    Ok(config)
}

fn store_path(config: &StoreConfig) -> Result<PathBuf, String> {
    resolve_store_path(config.locator().as_ref()).map_err(|e| e.to_string())
}

fn load_migrations(dir: &Path) -> Result<Migrations, String> {
    Migrations::from_dir(dir)
        .map_err(|e| format!("Failed to load migrations from '{}': {e}", dir.display()))
}

// ---------------------------------------------------------------------------
// path command
// ---------------------------------------------------------------------------

fn run_path(config: &StoreConfig) -> Result<(), String> {
    println!("{}", store_path(config)?.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// migrate command
// ---------------------------------------------------------------------------

async fn run_migrate(
    config: &StoreConfig,
    args: MigrateArgs,
    cancel: &CancellationToken,
) -> Result<(), String> {
    let migrations = load_migrations(&args.migrations)?;
    let init = DatabaseInitializer::from_config(config, migrations).map_err(|e| e.to_string())?;
    let report = init
        .initialize(cancel)
        .await
        .map_err(|e| format!("Migration failed: {e}"))?;

    if report.created {
        println!("Created store '{}'.", init.store_path().display());
    }
    if report.applied.is_empty() {
        println!("Store is up to date.");
    } else {
        println!("Applied migrations: {}", join_numbers(&report.applied));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// status command
// ---------------------------------------------------------------------------

fn run_status(config: &StoreConfig, args: StatusArgs) -> Result<(), String> {
    let path = store_path(config)?;
    println!("Store: {}", path.display());

    let mut max_applied = None;
    if path.exists() {
        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| format!("Failed to open store '{}': {e}", path.display()))?;
        let tracked = ledger::table_exists(&conn).map_err(|e| e.to_string())?;
        if tracked {
            let records = ledger::applied(&conn).map_err(|e| e.to_string())?;
            println!("Applied migrations: {}", records.len());
            for record in &records {
                println!(
                    "  {:>6}  {}  {}",
                    record.number,
                    record.applied_at.format("%Y-%m-%d %H:%M:%S"),
                    record.description
                );
            }
            max_applied = ledger::max_applied_number(&conn).map_err(|e| e.to_string())?;
        } else {
            println!("Applied migrations: none (no ledger)");
        }
    } else {
        println!("Store does not exist.");
    }

    if let Some(dir) = args.migrations {
        let migrations = load_migrations(&dir)?;
        let runner = MigrationRunner::new(&migrations).map_err(|e| e.to_string())?;
        let pending: Vec<u32> = runner
            .pending(max_applied)
            .iter()
            .map(|m| m.number())
            .collect();
        if pending.is_empty() {
            println!("Pending migrations: none");
        } else {
            println!("Pending migrations: {}", join_numbers(&pending));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// query command
// ---------------------------------------------------------------------------

async fn run_query(
    config: &StoreConfig,
    args: QueryArgs,
    cancel: &CancellationToken,
) -> Result<(), String> {
    let path = store_path(config)?;
    let access = DataAccess::new(path, config.connection.clone());
    let params: Vec<Value> = args.params.iter().map(|p| parse_param(p)).collect();

    let rows = access
        .read_raw(&args.sql, &params, cancel)
        .await
        .map_err(|e| format!("Query failed: {e}"))?;
    let json = serde_json::to_string_pretty(&rows).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Integer if it parses as one, then real, otherwise text.
fn parse_param(raw: &str) -> Value {
    if let Ok(v) = raw.parse::<i64>() {
        return Value::Integer(v);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Value::Real(v),
        _ => Value::Text(raw.to_string()),
    }
}

fn join_numbers(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("42"), Value::Integer(42));
        assert_eq!(parse_param("-3"), Value::Integer(-3));
        assert_eq!(parse_param("2.5"), Value::Real(2.5));
        assert_eq!(parse_param("red"), Value::from("red"));
        assert_eq!(parse_param("inf"), Value::from("inf"));
    }

    #[test]
    fn test_join_numbers() {
        assert_eq!(join_numbers(&[1, 2, 10]), "1, 2, 10");
        assert_eq!(join_numbers(&[]), "");
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
