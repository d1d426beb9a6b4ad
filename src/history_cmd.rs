use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::{HistoryArgs, RecordArgs},
    history::EvolutionLog,
    schema::Schema,
};

pub fn execute_record(args: &RecordArgs) -> Result<()> {
    let schema = Schema::load(&args.schema)
        .with_context(|| format!("Loading schema from {:?}", args.schema))?;
    let log = if args.log.exists() {
        load_log(&args.log)?
    } else {
        EvolutionLog::new()
    };
    log.record(&schema, args.description.as_deref())?;
    let rendered = log.to_json()?;
    fs::write(&args.log, rendered)
        .with_context(|| format!("Writing evolution log to {:?}", args.log))?;
    info!(
        "Recorded schema {} in {:?} ({} entries)",
        schema.version(),
        args.log,
        log.len()
    );
    Ok(())
}

pub fn execute_list(args: &HistoryArgs) -> Result<()> {
    let log = load_log(&args.log)?;
    for (idx, entry) in log.entries().iter().enumerate() {
        let columns = entry.schema()?.columns().len();
        match &entry.description {
            Some(description) => println!(
                "{}\t{}\t{columns} column(s)\t{description}",
                idx + 1,
                entry.version
            ),
            None => println!("{}\t{}\t{columns} column(s)", idx + 1, entry.version),
        }
    }
    Ok(())
}

fn load_log(path: &Path) -> Result<EvolutionLog> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Reading evolution log {path:?}"))?;
    EvolutionLog::from_json(&text).with_context(|| format!("Parsing evolution log {path:?}"))
}
