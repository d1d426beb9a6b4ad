//! Schema document commands: compatibility reports and version bumps.

use anyhow::{Context, Result, bail};
use log::info;

use crate::{
    cli::{BumpArgs, DiffArgs},
    schema::{
        Schema,
        evolution::{CompatibilityReport, DiffPolicy},
    },
};

pub fn execute_diff(args: &DiffArgs) -> Result<()> {
    let current = Schema::load(&args.current)
        .with_context(|| format!("Loading schema from {:?}", args.current))?;
    let previous = Schema::load(&args.previous)
        .with_context(|| format!("Loading schema from {:?}", args.previous))?;
    let policy = DiffPolicy {
        added_required_is_breaking: args.added_required_breaking,
    };
    let report = current.diff_with_policy(&previous, policy);

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&report).context("Serializing compatibility report")?;
        println!("{rendered}");
    } else {
        print!("{}", render_report(&report));
    }

    if !report.compatible {
        bail!(
            "Schema {} is not backward compatible with {}",
            current.version(),
            previous.version()
        );
    }
    info!(
        "Schema {} is backward compatible with {}",
        current.version(),
        previous.version()
    );
    Ok(())
}

pub fn render_report(report: &CompatibilityReport) -> String {
    let mut output = String::new();
    output.push_str(if report.compatible {
        "compatible: yes\n"
    } else {
        "compatible: no\n"
    });
    for message in &report.breaking {
        output.push_str(&format!("  breaking      {message}\n"));
    }
    for message in &report.non_breaking {
        output.push_str(&format!("  non-breaking  {message}\n"));
    }
    output
}

pub fn execute_bump(args: &BumpArgs) -> Result<()> {
    let schema = Schema::load(&args.schema)
        .with_context(|| format!("Loading schema from {:?}", args.schema))?;
    let bumped = schema
        .bump(args.part)
        .with_context(|| format!("Bumping schema {:?}", args.schema))?;
    let output = args.output.as_ref().unwrap_or(&args.schema);
    bumped
        .save(output)
        .with_context(|| format!("Writing schema to {output:?}"))?;
    info!(
        "Bumped schema {} -> {} written to {:?}",
        schema.version(),
        bumped.version(),
        output
    );
    Ok(())
}
