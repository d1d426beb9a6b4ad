use std::path::Path;

use anyhow::{Context, Result, bail};
use log::{error, info};

use crate::{
    cli::ValidateArgs,
    dataset::Dataset,
    io_utils,
    schema::{Schema, validate::ValidationMode},
};

pub fn execute(args: &ValidateArgs) -> Result<()> {
    let schema = Schema::load(&args.schema)
        .with_context(|| format!("Loading schema from {:?}", args.schema))?;
    let mode = if args.all {
        ValidationMode::CollectAll
    } else {
        ValidationMode::FailFast
    };
    let mut failed = 0usize;
    for input in &args.inputs {
        let delimiter = io_utils::resolve_delimiter(input, args.delimiter);
        if validate_file_against_schema(&schema, input, delimiter, mode)? {
            info!("✓ {:?} matches schema {}", input, schema.version());
        } else {
            failed += 1;
        }
    }
    if failed > 0 {
        bail!(
            "{failed} of {} file(s) do not match schema {}",
            args.inputs.len(),
            schema.version()
        );
    }
    Ok(())
}

/// Returns false and logs each violation when the file does not conform.
pub fn validate_file_against_schema(
    schema: &Schema,
    path: &Path,
    delimiter: u8,
    mode: ValidationMode,
) -> Result<bool> {
    let dataset = Dataset::from_path(path, delimiter)?;
    let violations = schema.check(&dataset, mode);
    for violation in &violations {
        error!("{:?}: {violation}", path);
    }
    Ok(violations.is_empty())
}
