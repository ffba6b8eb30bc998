//! CLI entrypoint for council
//!
//! This is the main binary that wires together all layers using
//! dependency injection. `evaluate` and `revise` start an in-process worker
//! over the in-memory queue, wait for the submitted run to finish, then shut
//! the worker down gracefully.

use anyhow::{Context, Result, bail};
use clap::Parser;
use council_application::{
    CompareRunsUseCase, CompositeProgress, CouncilConfig, CreateRevisionInput,
    CreateRevisionUseCase, JobWorker, PipelineExecutor, PipelineProgress, RunRepository,
    StaticVersions, SubmitRunInput, SubmitRunUseCase, VersionProvider, WorkerError, WorkerReport,
};
use council_domain::{Proposal, Run, RunId, RunStatus, has_errors};
use council_infrastructure::config::FileReviewerConfig;
use council_infrastructure::{
    ConfigError, ConfigLoader, InMemoryJobQueue, InMemoryRunRepository, JsonFileRunRepository,
    JsonlPipelineLog, OpenAiReviewerClient,
};
use council_presentation::{
    Cli, Command, ConsoleFormatter, JsonFormatter, OutputFormatter, ProgressReporter,
    SimpleProgress,
};
use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const EVENT_LOG_FILE: &str = "pipeline-events.jsonl";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose, cli.log_dir.as_deref())?;

    info!("Starting council");

    if let Command::Config = cli.command {
        return show_config(&cli);
    }

    let (reviewer, config) = load_config(&cli)?;
    let formatter: Box<dyn OutputFormatter> = if cli.json {
        Box::new(JsonFormatter)
    } else {
        Box::new(ConsoleFormatter)
    };
    let repository = open_repository(cli.store.as_deref()).await?;

    match &cli.command {
        Command::Evaluate {
            idea,
            priority,
            context,
        } => {
            let council = Council::start(repository, &reviewer, config, progress(&cli))?;
            let input = SubmitRunInput::new(idea.as_str())
                .with_extra_context(Cli::context_map(context))
                .with_priority((*priority).into());
            let run = council.submit().execute(input).await?;
            council.finish(run, formatter.as_ref()).await
        }
        Command::Revise {
            parent,
            proposal_file,
            notes,
            priority,
        } => {
            let mut input = CreateRevisionInput::new(*parent).with_priority((*priority).into());
            if let Some(path) = proposal_file {
                input = input.with_proposal(read_proposal(path).await?);
            }
            if let Some(notes) = notes {
                input = input.with_notes(notes.as_str());
            }

            let council = Council::start(repository, &reviewer, config, progress(&cli))?;
            let run = council.revise().execute(input).await?;
            council.finish(run, formatter.as_ref()).await
        }
        Command::Diff { a, b } => {
            require_store(&cli, "diff")?;
            let diff = CompareRunsUseCase::new(repository, &config.diff)
                .execute(*a, *b)
                .await?;
            println!("{}", formatter.format_diff(&diff));
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { run } => {
            require_store(&cli, "show")?;
            let aggregate = repository
                .load_aggregate(*run)
                .await?
                .with_context(|| format!("Run not found: {}", run))?;
            println!("{}", formatter.format_run(&aggregate));
            Ok(ExitCode::SUCCESS)
        }
        Command::Config => show_config(&cli),
    }
}

/// Initialize logging: stderr always, plus a daily log file under `--log-dir`.
///
/// `RUST_LOG` wins over the `-v` count when set.
fn init_logging(verbose: u8, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace", // -vvv or more
        })
    });

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "council.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Load and validate configuration.
///
/// Warnings are logged; any error-level issue is printed and aborts.
fn load_config(cli: &Cli) -> Result<(FileReviewerConfig, CouncilConfig)> {
    let file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())?
    };
    let reviewer = file_config.reviewer.clone();

    match file_config.into_validated() {
        Ok((config, warnings)) => {
            for issue in &warnings {
                warn!("Config: {}", issue.message);
            }
            Ok((reviewer, config))
        }
        Err(ConfigError::Invalid(issues)) => {
            eprint!("{}", ConsoleFormatter::format_issues(&issues));
            bail!("Invalid configuration: {} issue(s)", issues.len())
        }
        Err(e) => Err(e.into()),
    }
}

fn show_config(cli: &Cli) -> Result<ExitCode> {
    if cli.no_config {
        println!("Configuration files disabled (--no-config), using built-in defaults");
    } else {
        ConfigLoader::print_config_sources(cli.config.as_deref());
    }
    println!();

    let file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())?
    };
    let issues = file_config.validate();
    let formatter: &dyn OutputFormatter = if cli.json {
        &JsonFormatter
    } else {
        &ConsoleFormatter
    };
    print!("{}", formatter.format_issues(&issues));

    Ok(if has_errors(&issues) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn open_repository(store: Option<&Path>) -> Result<Arc<dyn RunRepository>> {
    match store {
        Some(path) => {
            let repository = JsonFileRunRepository::open(path)
                .await
                .with_context(|| format!("Cannot open run store {}", path.display()))?;
            info!(path = %path.display(), "Using file run store");
            Ok(Arc::new(repository))
        }
        None => {
            debug!("Using in-memory run store");
            Ok(Arc::new(InMemoryRunRepository::new()))
        }
    }
}

fn require_store(cli: &Cli, command: &str) -> Result<()> {
    if cli.store.is_none() {
        bail!(
            "`council {}` reads stored runs; pass --store <PATH> (the file used by evaluate/revise)",
            command
        );
    }
    Ok(())
}

/// Progress listeners: bars or plain lines on stderr, plus the JSONL event log.
fn progress(cli: &Cli) -> Arc<dyn PipelineProgress> {
    let mut composite = CompositeProgress::default();

    if !cli.quiet {
        if std::io::stderr().is_terminal() {
            composite.push(Arc::new(ProgressReporter::new()));
        } else {
            composite.push(Arc::new(SimpleProgress));
        }
    }

    if let Some(dir) = &cli.log_dir {
        match JsonlPipelineLog::new(dir.join(EVENT_LOG_FILE)) {
            Some(log) => {
                info!(path = %log.path().display(), "Writing pipeline events");
                composite.push(Arc::new(log));
            }
            None => warn!(dir = %dir.display(), "Pipeline event log disabled"),
        }
    }

    Arc::new(composite)
}

async fn read_proposal(path: &Path) -> Result<Proposal> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("{} is not a proposal JSON document", path.display()))
}

/// One in-process worker serving the in-memory queue for this invocation.
struct Council {
    repository: Arc<dyn RunRepository>,
    queue: Arc<InMemoryJobQueue>,
    versions: Arc<dyn VersionProvider>,
    config: CouncilConfig,
    shutdown: CancellationToken,
    worker: JoinHandle<Result<WorkerReport, WorkerError>>,
}

impl Council {
    fn start(
        repository: Arc<dyn RunRepository>,
        reviewer: &FileReviewerConfig,
        config: CouncilConfig,
        progress: Arc<dyn PipelineProgress>,
    ) -> Result<Self> {
        let client = Arc::new(OpenAiReviewerClient::from_config(reviewer)?);
        let queue = Arc::new(InMemoryJobQueue::new(config.worker.ack_deadline));
        let executor = Arc::new(
            PipelineExecutor::new(client, repository.clone(), &config).with_progress(progress),
        );
        let worker = JobWorker::new(queue.clone(), executor, config.worker.clone());

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let worker = tokio::spawn(async move { worker.run(token).await });

        Ok(Self {
            repository,
            queue,
            versions: Arc::new(StaticVersions(config.versions.clone())),
            config,
            shutdown,
            worker,
        })
    }

    fn submit(&self) -> SubmitRunUseCase {
        SubmitRunUseCase::new(
            self.repository.clone(),
            self.queue.clone(),
            self.versions.clone(),
            self.config.model.clone(),
        )
    }

    fn revise(&self) -> CreateRevisionUseCase {
        CreateRevisionUseCase::new(
            self.repository.clone(),
            self.queue.clone(),
            self.versions.clone(),
            self.config.model.clone(),
        )
    }

    /// Wait for `run`, stop the worker, print the result.
    async fn finish(self, run: Run, formatter: &dyn OutputFormatter) -> Result<ExitCode> {
        info!(run_id = %run.id, kind = %run.kind, "Waiting for run");
        let waited = self.wait_terminal(run.id).await;
        let repository = self.repository.clone();
        self.stop().await;
        let status = waited?;

        let aggregate = repository
            .load_aggregate(run.id)
            .await?
            .with_context(|| format!("Run not found: {}", run.id))?;
        println!("{}", formatter.format_run(&aggregate));

        Ok(match status {
            RunStatus::Completed => ExitCode::SUCCESS,
            _ => ExitCode::from(2),
        })
    }

    async fn wait_terminal(&self, id: RunId) -> Result<RunStatus> {
        loop {
            let run = self
                .repository
                .get_run(id)
                .await?
                .with_context(|| format!("Run {} disappeared from the store", id))?;
            if run.status.is_terminal() {
                return Ok(run.status);
            }
            if self.worker.is_finished() {
                bail!("Worker stopped while run {} was {}", id, run.status);
            }

            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
                _ = tokio::signal::ctrl_c() => {
                    bail!("Interrupted; run {} left {}", id, run.status);
                }
            }
        }
    }

    /// Graceful shutdown: in-flight jobs get the configured grace period.
    async fn stop(self) {
        self.shutdown.cancel();
        match self.worker.await {
            Ok(Ok(report)) => debug!(?report, "Worker stopped"),
            Ok(Err(e)) => warn!(error = %e, "Worker stopped with an error"),
            Err(e) => warn!(error = %e, "Worker task panicked"),
        }
        self.queue.close();
    }
}
