use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::version::{Version, VersionPart};

#[derive(Debug, Parser)]
#[command(author, version, about = "Validate, compare, and migrate versioned dataset schemas", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate one or more CSV files against a schema
    Validate(ValidateArgs),
    /// Report backward compatibility between two schema versions
    Diff(DiffArgs),
    /// Write a copy of a schema with its version bumped
    Bump(BumpArgs),
    /// Carry a CSV file from one schema version to another using a migration file
    Migrate(MigrateArgs),
    /// Append a schema snapshot to an evolution log
    Record(RecordArgs),
    /// List the entries of an evolution log
    History(HistoryArgs),
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Schema file (YAML, or JSON with a .json extension)
    #[arg(short, long)]
    pub schema: PathBuf,
    /// CSV files to validate (`-` reads stdin)
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Report every violation instead of stopping at the first
    #[arg(long)]
    pub all: bool,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// The newer schema
    #[arg(long)]
    pub current: PathBuf,
    /// The schema it replaces
    #[arg(long)]
    pub previous: PathBuf,
    /// Treat newly added required columns as breaking
    #[arg(long = "added-required-breaking")]
    pub added_required_breaking: bool,
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct BumpArgs {
    /// Schema file to read
    #[arg(short, long)]
    pub schema: PathBuf,
    /// Version component to increment
    #[arg(long, value_enum)]
    pub part: VersionPart,
    /// Destination file (overwrites the input when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Input CSV file (`-` reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Migration file listing declarative steps
    #[arg(short, long)]
    pub migrations: PathBuf,
    /// Schema version the input conforms to
    #[arg(long, value_parser = parse_version)]
    pub from: Version,
    /// Schema version to migrate to
    #[arg(long, value_parser = parse_version)]
    pub to: Version,
    /// Validate the migrated data against this schema before writing
    #[arg(short, long)]
    pub schema: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
}

#[derive(Debug, Args)]
pub struct RecordArgs {
    /// Schema file to snapshot
    #[arg(short, long)]
    pub schema: PathBuf,
    /// Evolution log file (JSON); created when missing
    #[arg(short, long)]
    pub log: PathBuf,
    /// Free-form description of the change
    #[arg(short, long)]
    pub description: Option<String>,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Evolution log file (JSON)
    #[arg(short, long)]
    pub log: PathBuf,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

pub fn parse_version(value: &str) -> Result<Version, String> {
    value.parse().map_err(|err: crate::error::VersionError| err.to_string())
}
