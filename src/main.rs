//! rsload - synthetic query load testing for a query-serving HTTP API.

use std::process::ExitCode;
use std::sync::Arc;

use rsload::cli::Cli;
use rsload::config::{credential_from_env, Config};
use rsload::dispatch::Dispatcher;
use rsload::error::Result;
use rsload::logging::init_stderr_logging;
use rsload::preflight;
use rsload::query::QueryRunner;
use rsload::report::{ConsoleReporter, CsvReporter};
use rsload::run::RunController;
use rsload::transport::HttpTransport;
use tracing::{error, info, warn};

/// Exit status when `--fail-on-warnings` is set and a summary had warnings.
const EXIT_WARNINGS: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_stderr_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}: {}", e.category(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    info!("Loading config from: {}", cli.config.display());
    let mut config = Config::load_from_file(&cli.config)?;
    cli.apply_to(&mut config);

    let mode = config.run_mode()?;
    let query_sets = config.query_sets()?;
    let mut target = config.target(credential_from_env()?)?;

    let transport = Arc::new(HttpTransport::new(target.request_timeout_secs)?);

    if cli.skip_preflight {
        info!("Skipping preflight check");
    } else {
        target.capacity = preflight::discover(&*transport, &target).await?;
    }

    let mut controller = RunController::new(
        target,
        query_sets,
        Dispatcher::new(QueryRunner::new(transport)),
        config.test_name.clone(),
    )
    .with_mode(mode);

    if config.verbose {
        controller = controller.with_reporter(Box::new(ConsoleReporter::new(cli.no_color)));
    }
    if config.log_output {
        controller = controller.with_reporter(Box::new(CsvReporter::new(
            config.output.dir.clone(),
            config.output.details_name.clone(),
            config.output.summary_name.clone(),
        )));
    }

    let verdict = controller.run().await?;

    if cli.fail_on_warnings && !verdict.is_clean() {
        warn!(
            unclean = verdict.unclean,
            "query sets finished with warnings"
        );
        return Ok(ExitCode::from(EXIT_WARNINGS));
    }
    Ok(ExitCode::SUCCESS)
}
