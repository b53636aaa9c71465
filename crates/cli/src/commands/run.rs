//! Full suite run: start, check, report, stop

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use tracing::info;

use webcompat_harness::{catalogue, run_cases, CompatClient, Fixture, ProcessLauncher};

use crate::commands::load_targets;
use crate::output::{print_json, print_list, print_success, print_warning, OutputFormat};

#[derive(Args)]
pub struct RunArgs {
    /// Directory for test-results.json
    #[arg(short, long, default_value = "test-results")]
    pub output: PathBuf,

    /// Override the launches allowed per target
    #[arg(long)]
    pub max_start_attempts: Option<u32>,
}

/// Returns true when every target became ready and every check passed.
///
/// Table output reports readiness before the checks run. JSON output is a
/// single [`webcompat_harness::SuiteReport`] document, printed once at the end.
pub async fn execute(
    args: RunArgs,
    config_path: Option<&Path>,
    format: OutputFormat,
) -> anyhow::Result<bool> {
    let (config, targets) = load_targets(config_path)?;

    let mut builder = Fixture::builder()
        .probe(config.probe)
        .max_start_attempts(args.max_start_attempts.unwrap_or(config.max_start_attempts));
    for target in targets {
        let launcher = Arc::new(ProcessLauncher::new(target.host.clone()));
        builder = builder.target(target, launcher);
    }

    let mut fixture = builder.start().await?;

    if let OutputFormat::Table = format {
        print_list(fixture.status(), format);
        for status in fixture.status().iter().filter(|s| !s.ready) {
            print_warning(&format!(
                "{} never became ready on port {}",
                status.target.key, status.target.port
            ));
        }
    }

    // Stop the servers even when reporting fails
    let report = match CompatClient::new() {
        Ok(client) => Ok(run_cases(&fixture, &client, &catalogue()).await),
        Err(e) => Err(e),
    };
    fixture.shutdown().await;
    let report = report?;

    let path = report.write_to(&args.output)?;
    info!(
        "Run {}: {} passed, {} failed ({} ms), results in {}",
        report.run_id,
        report.passed,
        report.failed,
        report.duration_ms,
        path.display()
    );

    match format {
        OutputFormat::Table => {
            print_list(&report.results, format);
            if report.success() {
                print_success(&format!("All {} checks passed", report.total));
            }
        }
        OutputFormat::Json => print_json(&report),
    }

    Ok(report.success())
}
