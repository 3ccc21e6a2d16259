use std::env;
use std::process::ExitCode;
use termsim::{Config, Pipeline};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// usage: termsim <config.json>
// see Config for the keys the json file may hold

fn main() -> ExitCode {

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("termsim=info")))
        .init();

    info!("entering program...");
    let args: Vec<String> = env::args().collect();

    info!("building parameters...");
    let params = match Config::new(&args) {
        Ok(config) => config.get_params(),
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let report = match Pipeline::run(&params) {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(e) = &report.term_sets_failure {
        warn!("term sets were not processed: {}", e);
    }
    for (tag, e) in &report.alignment_failures {
        warn!("term set '{}' was not aligned: {}", tag, e);
    }
    for (tag, e) in &report.exports.failures {
        warn!("table '{}' was not exported: {}", tag, e);
    }
    info!(
        "finished: {} models, {} tables written, {} failures",
        report.models.len(),
        report.exports.written.len(),
        report.exports.failures.len() + report.alignment_failures.len() + usize::from(report.term_sets_failure.is_some())
    );

    if report.is_complete() { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
