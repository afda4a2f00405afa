//! OneData Command-Line Tool
//!
//! Generates procedure text, CREATE TABLE text, schema diffs and WHERE
//! fragments from JSON documents without touching a database.

mod commands;
mod formatter;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::CliError;
use formatter::OutputFormat;
use onedata_core::reconcile::LiveTable;
use onedata_core::{dialect_for, DatabaseFamily, ManagerConfig, ModelDescriptor};
use onedata_proto::Expr;

/// OneData Command-Line Tool
#[derive(Parser, Debug)]
#[command(name = "onedata")]
#[command(version, about = "Offline schema and predicate tooling for OneData")]
pub struct Args {
    /// Manager configuration (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Database family, overriding the configuration
    #[arg(long, value_enum)]
    pub database: Option<Family>,

    /// Output format
    #[arg(long, default_value = "text", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the CRUD procedures of a model
    Procedures {
        /// Model descriptor (JSON)
        model: PathBuf,
        /// Emit ALTER instead of CREATE
        #[arg(long)]
        alter: bool,
    },
    /// Print the CREATE TABLE statement of a model
    CreateTable {
        /// Model descriptor (JSON)
        model: PathBuf,
    },
    /// Print the statements reconciling a live table with a model
    Diff {
        /// Model descriptor (JSON)
        model: PathBuf,
        /// Live table snapshot (JSON)
        live: PathBuf,
    },
    /// Translate a predicate to a WHERE fragment
    Translate {
        /// Predicate tree (JSON)
        expr: PathBuf,
        /// Qualify columns with this table name
        #[arg(long)]
        table: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Family {
    Mssql,
    Mysql,
}

impl From<Family> for DatabaseFamily {
    fn from(family: Family) -> Self {
        match family {
            Family::Mssql => DatabaseFamily::MsSql,
            Family::Mysql => DatabaseFamily::MySql,
        }
    }
}

fn main() {
    let args = Args::parse();

    let result = load_config(&args).and_then(|config| {
        init_tracing(&config)?;
        run(&args, &config)
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<ManagerConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => ManagerConfig::from_json_file(path)?,
        None => ManagerConfig::default(),
    };
    if let Some(family) = args.database {
        config.database = family.into();
    }
    Ok(config)
}

/// Stderr output filtered by `RUST_LOG`, plus the configured log file.
fn init_tracing(config: &ManagerConfig) -> Result<(), CliError> {
    let file_layer = match (config.log_in_file, &config.log_file) {
        (true, Some(path)) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| CliError::Read {
                    path: path.clone(),
                    source,
                })?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "onedata=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn run(args: &Args, config: &ManagerConfig) -> Result<(), CliError> {
    let dialect = dialect_for(config.database);
    tracing::debug!(database = ?config.database, command = ?args.command, "running");

    let sections = match &args.command {
        Command::Procedures { model, alter } => {
            let composition = commands::compose(&commands::load::<ModelDescriptor>(model)?, config)?;
            commands::procedures(&*dialect, config, &composition, *alter)
        }
        Command::CreateTable { model } => {
            let composition = commands::compose(&commands::load::<ModelDescriptor>(model)?, config)?;
            commands::table(&*dialect, config, &composition)?
        }
        Command::Diff { model, live } => {
            let composition = commands::compose(&commands::load::<ModelDescriptor>(model)?, config)?;
            let live: LiveTable = commands::load(live)?;
            commands::diff(&*dialect, config, &composition, &live)?
        }
        Command::Translate { expr, table } => {
            let expr: Expr = commands::load(expr)?;
            commands::translate(&*dialect, &expr, table.as_deref())?
        }
    };

    println!("{}", formatter::render(args.format, &sections));
    Ok(())
}
