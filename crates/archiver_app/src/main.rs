mod cli;
mod config;
mod credentials;
mod logging;
mod report;

use std::process::ExitCode;

use anyhow::Context;
use archiver_core::{DefaultPageSet, RunModes};
use archiver_engine::{
    ArchiveError, ConnectError, Discovery, HtmlIndexBackend, Orchestrator, RunReport, WikiBackend,
    XmlRpcBackend,
};
use archiver_logging::{archive_error, archive_info, archive_warn};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use crate::cli::Cli;
use crate::config::{ArchiverConfig, DiscoveryMode};
use crate::credentials::{complete_credentials, TerminalPrompter};
use crate::report::ReportFile;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let modes = match cli.modes() {
        Ok(modes) => modes,
        Err(err) => Cli::command().error(ErrorKind::ArgumentConflict, err).exit(),
    };
    logging::initialize(cli.verbosity(), cli.log_file.as_deref());

    tokio::select! {
        result = run(&cli, modes) => match result {
            Ok(report) if report.has_failures() => {
                archive_warn!("Finished with failures; see the log above");
                ExitCode::from(2)
            }
            Ok(_) => ExitCode::SUCCESS,
            Err(err) => {
                archive_error!("{err:#}");
                ExitCode::from(1)
            }
        },
        _ = tokio::signal::ctrl_c() => {
            archive_warn!("Interrupted; files already written are complete");
            ExitCode::from(130)
        }
    }
}

async fn run(cli: &Cli, modes: RunModes) -> anyhow::Result<RunReport> {
    let started_at = chrono::Utc::now().to_rfc3339();

    let mut config = ArchiverConfig::load(&cli.config)
        .with_context(|| format!("loading configuration {}", cli.config.display()))?;
    config.apply_overrides(cli);
    if config.discovery == DiscoveryMode::Rpc {
        complete_credentials(&mut config, &TerminalPrompter)?;
    }
    config.validate()?;

    let defaults = DefaultPageSet::load(&config.default_pages)?;
    archive_info!("{} default pages will be skipped", defaults.len());

    let context = config.archive_context();
    let backend = connect(&config).await?;
    let discovery = if cli.pages.is_empty() {
        Discovery::Remote
    } else {
        Discovery::Explicit(cli.explicit_pages())
    };

    let report = Orchestrator::new(backend.as_ref(), &context, &defaults)
        .run(discovery, modes)
        .await?;

    if let Some(path) = &cli.report {
        ReportFile::new(started_at, modes, &report).write(path)?;
        archive_info!("Run report written to {}", path.display());
    }
    Ok(report)
}

async fn connect(config: &ArchiverConfig) -> Result<Box<dyn WikiBackend>, ArchiveError> {
    match (config.discovery, &config.index) {
        (DiscoveryMode::Index, Some(site)) => {
            let backend =
                HtmlIndexBackend::new(site.clone(), config.dedup, config.fetch_settings())
                    .map_err(ConnectError::Client)?;
            Ok(Box::new(backend))
        }
        _ => {
            let backend =
                XmlRpcBackend::connect(&config.rpc_server(), config.fetch_settings()).await?;
            Ok(Box::new(backend))
        }
    }
}
