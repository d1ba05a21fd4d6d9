//! reportflow CLI - run report definitions against a SQLite database
//!
//! Usage:
//!   reportflow run <report.toml> [--database <db>] [--filters <json>] [--limit N]
//!   reportflow explain <report.toml> [--dialect <dialect>]
//!   reportflow validate <report.toml> [--database <db>]
//!
//! Examples:
//!   reportflow run reports/orders.toml --filters '{"amount": {"op": ">", "value": 100}}'
//!   reportflow explain reports/orders.toml --dialect postgres
//!   RUST_LOG=reportflow=debug reportflow run reports/orders.toml

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use reportflow::cache;
use reportflow::config::ReportConfig;
use reportflow::exec::SqliteExecutor;
use reportflow::filter::FilterParams;
use reportflow::flow::SortSpec;
use reportflow::output::OutputRow;
use reportflow::report::{Column, Report};
use reportflow::schema::{LayeredSchemaProvider, SqliteSchemaProvider};
use reportflow::sql::Dialect;
use reportflow::{ConfigurationError, ReportError};

#[derive(Parser)]
#[command(name = "reportflow")]
#[command(about = "Compile declarative report definitions into SQL and run them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a report and print its rows as JSON
    Run {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        request: Request,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the SQL a report would run
    Explain {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        request: Request,

        /// SQL dialect to render (defaults to the definition's dialect)
        #[arg(short, long)]
        dialect: Option<DialectArg>,
    },

    /// Compile a report without running it
    Validate {
        #[command(flatten)]
        target: Target,
    },
}

#[derive(Args)]
struct Target {
    /// Path to the report definition (.toml or .json)
    file: PathBuf,

    /// SQLite database (overrides the definition's `database`)
    #[arg(long)]
    database: Option<PathBuf>,
}

#[derive(Args)]
struct Request {
    /// Filter values as JSON: {"name": {"op": "=", "value": ...}}
    #[arg(short, long)]
    filters: Option<String>,

    #[arg(long)]
    limit: Option<u64>,

    #[arg(long)]
    offset: Option<u64>,

    /// Sort key as `alias` or `alias:desc`; repeatable
    #[arg(long = "sort")]
    sort: Vec<String>,

    /// Group rows by this output; repeatable
    #[arg(long = "group-by")]
    group_by: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Sqlite,
    Postgres,
    Mysql,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Sqlite => Dialect::Sqlite,
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Mysql => Dialect::MySql,
        }
    }
}

#[derive(Serialize)]
struct RunOutput {
    count: u64,
    columns: Vec<Column>,
    rows: Vec<OutputRow>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            target,
            request,
            pretty,
        } => cmd_run(&target, &request, pretty),
        Commands::Explain {
            target,
            request,
            dialect,
        } => cmd_explain(&target, &request, dialect),
        Commands::Validate { target } => cmd_validate(&target),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn database_path(config: &ReportConfig, target: &Target) -> Result<Option<PathBuf>, ReportError> {
    match &target.database {
        Some(path) => Ok(Some(path.clone())),
        None => Ok(config.database_path()?.map(PathBuf::from)),
    }
}

fn open_database(path: &Path) -> Result<SqliteExecutor, ReportError> {
    Ok(SqliteExecutor::open(path)?)
}

/// Compile against the inline entities, falling back to the database
/// schema for entities the definition does not declare.
fn compile(config: &ReportConfig, exec: Option<&SqliteExecutor>) -> Result<Report, ReportError> {
    let inline = config.schema_provider();
    let report = match exec {
        Some(exec) => {
            let introspected = SqliteSchemaProvider::new(exec.connection());
            Report::from_config(config, &LayeredSchemaProvider::new(&inline, &introspected))?
        }
        None => Report::from_config(config, &inline)?,
    };
    Ok(report)
}

fn apply_request(report: &mut Report, request: &Request) -> Result<(), ReportError> {
    if let Some(json) = &request.filters {
        let params = FilterParams::from_json(json).map_err(|e| ConfigurationError::Parse {
            format: "json",
            message: format!("filters: {}", e),
        })?;
        report.set_filters(params)?;
    }
    if request.limit.is_some() {
        report.set_limit(request.limit)?;
    }
    if request.offset.is_some() {
        report.set_offset(request.offset)?;
    }
    if !request.sort.is_empty() {
        report.clear_sort()?;
        for key in &request.sort {
            let sort = match key.split_once(':') {
                Some((alias, "desc")) => SortSpec::desc(alias),
                Some((alias, _)) => SortSpec::asc(alias),
                None => SortSpec::asc(key),
            };
            report.add_sort(sort)?;
        }
    }
    for alias in &request.group_by {
        report.enable_aggregation(alias)?;
    }
    Ok(())
}

fn cmd_run(target: &Target, request: &Request, pretty: bool) -> Result<(), ReportError> {
    let config = cache::load_file(&target.file)?;
    let path = database_path(&config, target)?.ok_or(ConfigurationError::MissingDatabase)?;
    let exec = open_database(&path)?;

    let mut report = compile(&config, Some(&exec))?;
    apply_request(&mut report, request)?;

    let output = RunOutput {
        count: report.record_count(&exec)?,
        columns: report.columns(),
        rows: report.rows(&exec)?,
    };
    let json = if pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", json);
    Ok(())
}

fn cmd_explain(
    target: &Target,
    request: &Request,
    dialect: Option<DialectArg>,
) -> Result<(), ReportError> {
    let mut config = (*cache::load_file(&target.file)?).clone();
    if let Some(dialect) = dialect {
        config.dialect = dialect.into();
    }
    let exec = match database_path(&config, target)? {
        Some(path) => Some(open_database(&path)?),
        None => None,
    };

    let mut report = compile(&config, exec.as_ref())?;
    apply_request(&mut report, request)?;
    let explain = report.explain()?;

    println!("-- reportflow: {}", target.file.display());
    println!("-- Dialect: {:?}", report.dialect());
    println!();
    println!("{};", explain.sql);
    println!();
    println!("-- Count");
    println!("{};", explain.count_sql);
    Ok(())
}

fn cmd_validate(target: &Target) -> Result<(), ReportError> {
    let config = cache::load_file(&target.file)?;
    let exec = match database_path(&config, target)? {
        Some(path) => Some(open_database(&path)?),
        None => None,
    };
    let report = compile(&config, exec.as_ref())?;
    println!(
        "OK: {} is valid ({} sources, {} joins)",
        target.file.display(),
        report.sources().len(),
        report.joins().len()
    );
    Ok(())
}
