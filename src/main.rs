mod args;
mod sync;

use clap::Parser;
use log::{error, info};
use snafu::{ErrorCompat, ResultExt};

use serde::Serialize;

use crate::args::{Args, Command, IndexUpdateArgs};
use crate::sync::config_reader::ConfigOverrides;
use crate::sync::{SyncError, SyncResult};

fn config_and_overrides(a: IndexUpdateArgs) -> (Option<String>, ConfigOverrides) {
    let overrides = ConfigOverrides {
        input: a.input,
        input_type: a.input_type,
        excel_worksheet_name: a.excel_worksheet_name,
        out: a.out,
        batch_size: a.batch_size,
        dry_run: a.dry_run,
    };
    (a.config, overrides)
}

fn print_summary<T: Serialize>(summary: &T, dry_run: bool) -> SyncResult<()> {
    let pretty_js = serde_json::to_string_pretty(summary).context(sync::WritingJsonSnafu {})?;
    // The dry run prints the updates on the standard output.
    if dry_run {
        eprintln!("{}", pretty_js);
    } else {
        println!("{}", pretty_js);
    }
    Ok(())
}

fn run(args: Args) -> SyncResult<()> {
    match args.command {
        Command::SyncCompany(sc) => {
            let (config, overrides) = config_and_overrides(sc);
            let summary = sync::run_company_update(config, &overrides)?;
            print_summary(&summary, overrides.dry_run)?;
        }
        Command::IndexAnswers(ia) => {
            let (config, overrides) = config_and_overrides(ia);
            let summary = sync::run_answer_index(config, &overrides)?;
            print_summary(&summary, overrides.dry_run)?;
        }
        Command::Convert(c) => {
            let options = sync::ConvertOptions {
                excel_worksheet_name: c.excel_worksheet_name,
                with_ids: c.with_ids,
                out: c.out,
                reference: c.reference,
            };
            sync::run_convert(&c.input, &options)?;
        }
        Command::Headers(h) => {
            sync::run_headers(&h.input, h.out.as_deref())?;
        }
        Command::Derive(d) => {
            let id = sync::run_derive(
                &d.respondent_id,
                &d.survey_id,
                d.question.as_deref(),
                d.response,
            )?;
            println!("{}", id);
        }
    }
    Ok(())
}

fn report(e: &SyncError) {
    error!("Error occured {:?}", e);
    eprintln!("An error occured: {}", e);
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
    if let Some(bt) = ErrorCompat::backtrace(e) {
        eprintln!("trace: {}", bt);
    }
}

fn main() {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }
    info!("args: {:?}", args);

    if let Err(e) = run(args) {
        report(&e);
        std::process::exit(1);
    }
}
