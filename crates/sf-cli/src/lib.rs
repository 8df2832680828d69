use std::ffi::OsString;

use clap::Parser;
use sf_tester::{run_session, write_csv, write_json, FuzzError, FuzzReport};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli_args;
mod error_map;

pub(crate) use cli_args::Cli;
pub(crate) use error_map::emit_error;

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    init_logging(cli.log.as_deref());
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

/// Logs go to stderr so stdout stays machine readable.
fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli) -> Result<i32, FuzzError> {
    let options = cli.fuzz_options();
    let report = run_session(&options)?;

    if let Some(path) = &cli.csv {
        write_csv(&report, path)?;
        info!(path = %path.display(), "csv report written");
    }
    if let Some(path) = &cli.json {
        write_json(&report, path)?;
        info!(path = %path.display(), "json report written");
    }

    emit_summary(&report, &cli);
    Ok(0)
}

fn emit_summary(report: &FuzzReport, cli: &Cli) {
    println!("RESULT:OK");
    println!("RUNS:{}", report.test_runs);
    println!(
        "COVERAGE:{}/{} ({:.2}%)",
        report.coverage.lines_visited, report.coverage.lines_total, report.coverage.coverage_percent
    );
    println!("INCIDENTS:{}", report.out_of_content.len());
    println!(
        "CSV_OUT:{}",
        cli.csv
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "NONE".to_string())
    );
    println!(
        "JSON_OUT:{}",
        cli.json
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "NONE".to_string())
    );
}

#[cfg(test)]
mod tests;
