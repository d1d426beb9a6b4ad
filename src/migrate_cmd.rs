use std::path::Path;

use anyhow::{Context, Result, bail};
use log::info;

use crate::{
    cli::MigrateArgs, dataset::Dataset, io_utils, migration::MigrationFile, schema::Schema,
};

pub fn execute(args: &MigrateArgs) -> Result<()> {
    let registry = MigrationFile::load(&args.migrations)?
        .into_registry()
        .with_context(|| format!("Registering migrations from {:?}", args.migrations))?;
    let delimiter = io_utils::resolve_delimiter(&args.input, args.delimiter);
    let dataset = Dataset::from_path(&args.input, delimiter)?;
    let rows = dataset.row_count();

    let migrated = registry
        .migrate(dataset, args.from, args.to)
        .with_context(|| format!("Migrating {:?} from {} to {}", args.input, args.from, args.to))?;

    if let Some(path) = &args.schema {
        let schema =
            Schema::load(path).with_context(|| format!("Loading schema from {path:?}"))?;
        if schema.version() != args.to {
            bail!(
                "Schema {:?} is version {} but the migration targets {}",
                path,
                schema.version(),
                args.to
            );
        }
        schema
            .validate(&migrated)
            .with_context(|| format!("Validating migrated data against {path:?}"))?;
    }

    let (target, out_delimiter) = match &args.output {
        Some(path) => (path.as_path(), io_utils::resolve_delimiter(path, args.delimiter)),
        None => (Path::new("-"), delimiter),
    };
    let writer = io_utils::open_output(target)?;
    migrated
        .write_csv(writer, out_delimiter)
        .with_context(|| format!("Writing migrated data to {target:?}"))?;
    info!(
        "Migrated {rows} row(s) from {} to {} using {} registered step(s)",
        args.from,
        args.to,
        registry.len()
    );
    Ok(())
}
