//! binary glyph table generator.
//!
//! Takes a path to a build plan, and regenerates every table it describes.

use bitfont_compile::{BuildPlan, Error, ErrorReport};
use log::{warn, LevelFilter};

fn main() -> miette::Result<()> {
    let args = flags::Args::from_env().map_err(|e| ErrorReport::message(e.to_string()))?;
    init_logging(args.verbose);

    let plan = BuildPlan::load(&args.plan).map_err(report)?;
    let output = bitfont_compile::compile(&plan).map_err(report)?;

    if !output.dropped.is_empty() {
        warn!(
            "{} glyphs were dropped because their codes could not be mapped:",
            output.dropped.len()
        );
        for dropped in &output.dropped {
            warn!("  {dropped}");
        }
    }

    if args.dry_run {
        for artifact in &output.artifacts {
            println!(
                "would write {} bytes to {}",
                artifact.contents.len(),
                artifact.path.display()
            );
        }
        return Ok(());
    }

    output.write().map_err(report)?;
    for (symbol, len) in &output.table_sizes {
        println!("{symbol}: {len} glyphs");
    }
    println!("code field: {}", output.code_width.c_type());
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .parse_default_env()
        .init();
}

fn report(error: Error) -> miette::Report {
    ErrorReport::from_error(&error).into()
}

mod flags {
    use std::path::PathBuf;

    xflags::xflags! {
        /// Regenerate bitmap glyph tables from a build plan
        cmd args {
                required plan: PathBuf
                /// Log each stage in detail
                optional -v, --verbose
                /// Run the whole build, but do not write any files
                optional --dry-run
            }
    }
}
