//! Versioned dataset schemas: validation, backward-compatibility reports,
//! migration planning, and an append-only evolution log.

pub mod cli;
pub mod data;
pub mod dataset;
pub mod error;
pub mod history;
mod history_cmd;
pub mod io_utils;
mod migrate_cmd;
pub mod migration;
pub mod schema;
mod schema_cmd;
mod verify;
pub mod version;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

pub use crate::{
    dataset::{Column, ColumnValues, Dataset},
    error::{MigrationError, SchemaError, ValidationError, VersionError},
    history::{EvolutionEntry, EvolutionLog},
    migration::{MigrationFile, MigrationOp, MigrationRegistry, MigrationStep},
    schema::{
        ColumnSpec, Constraints, DataType, Schema,
        evolution::{CompatibilityReport, DiffPolicy, SchemaChange},
        validate::ValidationMode,
    },
    version::{Version, VersionPart},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("schema_managed", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Validate(args) => verify::execute(&args),
        Commands::Diff(args) => schema_cmd::execute_diff(&args),
        Commands::Bump(args) => schema_cmd::execute_bump(&args),
        Commands::Migrate(args) => migrate_cmd::execute(&args),
        Commands::Record(args) => history_cmd::execute_record(&args),
        Commands::History(args) => history_cmd::execute_list(&args),
    }
}
