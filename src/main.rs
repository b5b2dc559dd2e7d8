//! Auraprobe - headless command-line front end
//!
//! Logs go to stderr (or a rotating file); results are printed to stdout as
//! JSON so they can be piped or saved and resumed later.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auraprobe::actions::{
    discover_objects, filter_names, CaptureMiningAction, ObjectProbeAction, PatternSearchAction,
};
use auraprobe::app::Config;
use auraprobe::error::{AuraprobeError, CaptureError, ConfigError, PatternError, ScanError, ScopeError, UserHint};
use auraprobe::capture::{Capture, CaptureFilter, CapturedBody};
use auraprobe::http::{HttpClient, Request, Transport};
use auraprobe::mining::RouteMiner;
use auraprobe::pattern::{GuardLimits, PatternExecutor, PatternGuard, SearchPattern};
use auraprobe::results::{ResultAccumulator, ResultDestination, ResultSessions, SessionChoice};
use auraprobe::scan::{JobState, JobSummary, LogSink, ScanAction, ScanJob, ScanOrchestrator, ThrottlePolicy};
use auraprobe::scope::Scope;
use auraprobe::sfid::{RecordId, MAX_COUNTER};
use auraprobe::wordlist::Wordlist;

/// Lightning/Aura object exposure scanner
#[derive(Parser, Debug)]
#[command(name = "auraprobe")]
#[command(author, version, about = "Lightning/Aura object exposure scanner", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "AURAPROBE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "AURAPROBE_LOG_LEVEL")]
    log_level: String,

    /// Log file path (enables daily-rotated file logging)
    #[arg(long, global = true, env = "AURAPROBE_LOG_FILE")]
    log_file: Option<String>,

    /// Enable JSON structured logging
    #[arg(long, global = true, env = "AURAPROBE_LOG_JSON")]
    log_json: bool,

    /// Print the default configuration and exit
    #[arg(long)]
    generate_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the objects the target exposes
    Discover {
        #[command(flatten)]
        target: TargetArgs,

        /// Keep only names matching this regular expression (case-insensitive)
        #[arg(long)]
        filter: Option<String>,
    },

    /// Retrieve the records of one object by name
    Object {
        #[command(flatten)]
        target: TargetArgs,

        /// Object API name, e.g. `Account` or `Invoice__c`
        name: String,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Discover objects, then retrieve the records of each one
    Retrieve {
        #[command(flatten)]
        target: TargetArgs,

        /// Which discovered objects to retrieve
        #[arg(long, value_enum, default_value = "all")]
        objects: ObjectSelection,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Retrieve the records of every object named in a wordlist
    Wordlist {
        #[command(flatten)]
        target: TargetArgs,

        /// Wordlist file (one object name per line); defaults to the preset list
        #[arg(short, long)]
        wordlist: Option<PathBuf>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Mine captured bodies for routes and action descriptors
    Mine {
        #[command(flatten)]
        capture: CaptureArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Search captured bodies with a regular expression
    Search {
        #[command(flatten)]
        capture: CaptureArgs,

        /// Pattern to search for
        #[arg(short, long)]
        pattern: String,

        /// Match case exactly
        #[arg(long)]
        case_sensitive: bool,

        /// Let `^` and `$` match only at the start and end of the body
        #[arg(long)]
        single_line: bool,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Record identifier tools
    #[command(subcommand)]
    Sfid(SfidCommand),
}

#[derive(Subcommand, Debug)]
enum SfidCommand {
    /// Print the record counter encoded in an id
    Decode {
        /// 15 or 18 character record id
        id: String,
    },

    /// Print ids sharing a prefix with `id`
    Enum {
        /// 15 or 18 character record id
        id: String,

        /// Counter to start from (defaults to the id's own counter)
        #[arg(long)]
        start: Option<u64>,

        /// Number of ids; negative walks downward
        #[arg(long, allow_hyphen_values = true)]
        count: i64,

        /// Print 18 character ids
        #[arg(long)]
        to18: bool,
    },
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// HAR capture holding an Aura request to replay
    #[arg(long)]
    har: PathBuf,

    /// 1-based capture entry to use as the base request
    #[arg(long)]
    entry: Option<usize>,
}

#[derive(Args, Debug)]
struct CaptureArgs {
    /// HAR capture to read bodies from
    #[arg(long)]
    har: PathBuf,

    /// In-scope host, `*.domain`, URL prefix or `re:` pattern (repeatable)
    #[arg(long)]
    include: Vec<String>,

    /// Out-of-scope rule, same forms as --include (repeatable)
    #[arg(long)]
    exclude: Vec<String>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Continue the results of an earlier run (its JSON output)
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Thread setting; only scales the delay between requests
    #[arg(long)]
    threads: Option<usize>,

    /// Fixed delay between items in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ObjectSelection {
    All,
    Standard,
    Custom,
}

/// What a bulk command prints
#[derive(Serialize, Deserialize)]
struct JobReport {
    summary: JobSummary,
    results: ResultAccumulator,
}

/// Enough of a saved report to resume from
#[derive(Deserialize)]
struct SavedResults {
    results: ResultAccumulator,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.generate_config {
        println!("{}", Config::default().to_toml()?);
        return Ok(());
    }

    init_logging(&cli)?;

    let config = Config::load(cli.config.as_deref())?;
    config.validate()?;

    let Some(command) = cli.command else {
        anyhow::bail!("No command given, see --help");
    };

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Starting auraprobe");
    let result = run_command(command, config).await;
    if let Some(hint) = result.as_ref().err().and_then(hint_for) {
        tracing::error!("{}", hint);
    }
    result
}

/// Operator hint for the errors the front end knows how to explain
fn hint_for(error: &anyhow::Error) -> Option<String> {
    if let Some(e) = error.downcast_ref::<PatternError>() {
        return Some(AuraprobeError::from(e.clone()).user_message());
    }
    if let Some(e) = error.downcast_ref::<ScanError>() {
        return Some(AuraprobeError::from(e.clone()).user_message());
    }
    if let Some(e) = error.downcast_ref::<ConfigError>() {
        return Some(e.user_hint());
    }
    if let Some(e) = error.downcast_ref::<ScopeError>() {
        return Some(e.user_hint());
    }
    error.downcast_ref::<CaptureError>().map(|e| e.user_hint())
}

/// Initialize the logging system
fn init_logging(cli: &Cli) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let subscriber = tracing_subscriber::registry().with(env_filter);

    if let Some(log_path) = &cli.log_file {
        let path = Path::new(log_path);
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => Config::data_dir()
                .map(|d| d.join("logs"))
                .unwrap_or_else(|_| PathBuf::from(".")),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("auraprobe.log");
        let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, filename);

        if cli.log_json {
            subscriber
                .with(fmt::layer().json().with_writer(file_appender).with_ansi(false))
                .init();
        } else {
            subscriber
                .with(fmt::layer().with_writer(file_appender).with_ansi(false))
                .init();
        }
    } else if cli.log_json {
        subscriber.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    Ok(())
}

async fn run_command(command: Command, mut config: Config) -> Result<()> {
    match command {
        Command::Discover { target, filter } => {
            // Reject a bad filter before touching the network
            let filter = match filter {
                Some(filter) => Some(
                    PatternGuard::new(GuardLimits::from(&config.pattern))
                        .evaluate(&SearchPattern::new(filter).case_insensitive(true))
                        .into_result()?,
                ),
                None => None,
            };

            let (transport, base) = connect(&target, &config).await?;
            let names = discover_objects(transport.as_ref(), &base).await?;
            match filter {
                Some(pattern) => {
                    let executor = PatternExecutor::from_config(&config.pattern);
                    print_json(&filter_names(&names, &pattern, &executor).await)
                }
                None => print_json(&names),
            }
        }

        Command::Object { target, name, run } => {
            apply_run_overrides(&mut config, &run)?;
            let name = name.trim().to_string();
            if name.is_empty() {
                anyhow::bail!("Object name must not be empty");
            }

            let (transport, base) = connect(&target, &config).await?;
            let action: Arc<dyn ScanAction<String>> = Arc::new(ObjectProbeAction::new(transport, base));
            run_bulk(vec![name], action, &config, &run).await
        }

        Command::Retrieve { target, objects, run } => {
            apply_run_overrides(&mut config, &run)?;
            let (transport, base) = connect(&target, &config).await?;
            let names = discover_objects(transport.as_ref(), &base).await?;

            let items: Vec<String> = match objects {
                ObjectSelection::All => names.all().map(String::from).collect(),
                ObjectSelection::Standard => names.standard().iter().cloned().collect(),
                ObjectSelection::Custom => names.custom().iter().cloned().collect(),
            };
            let action: Arc<dyn ScanAction<String>> = Arc::new(ObjectProbeAction::new(transport, base));
            run_bulk(items, action, &config, &run).await
        }

        Command::Wordlist { target, wordlist, run } => {
            apply_run_overrides(&mut config, &run)?;
            let list = match &wordlist {
                Some(path) => Wordlist::from_file(path).await?,
                None => Wordlist::standard_objects(),
            };
            tracing::info!(wordlist = %list.name, words = list.len(), "Using wordlist");

            let (transport, base) = connect(&target, &config).await?;
            let action: Arc<dyn ScanAction<String>> = Arc::new(ObjectProbeAction::new(transport, base));
            run_bulk(list.into_items(), action, &config, &run).await
        }

        Command::Mine { capture, run } => {
            apply_run_overrides(&mut config, &run)?;
            let bodies = load_bodies(&capture, &config).await?;
            let action: Arc<dyn ScanAction<CapturedBody>> = Arc::new(CaptureMiningAction::new(
                RouteMiner::new(),
                PatternExecutor::from_config(&config.pattern),
            ));
            run_bulk(bodies, action, &config, &run).await
        }

        Command::Search {
            capture,
            pattern,
            case_sensitive,
            single_line,
            run,
        } => {
            apply_run_overrides(&mut config, &run)?;
            let search = SearchPattern::new(pattern)
                .case_insensitive(!case_sensitive)
                .multi_line(!single_line);
            let compiled = PatternGuard::new(GuardLimits::from(&config.pattern))
                .evaluate(&search)
                .into_result()?;

            let bodies = load_bodies(&capture, &config).await?;
            let action: Arc<dyn ScanAction<CapturedBody>> = Arc::new(PatternSearchAction::new(
                compiled,
                PatternExecutor::from_config(&config.pattern),
            ));
            run_bulk(bodies, action, &config, &run).await
        }

        Command::Sfid(command) => run_sfid(command),
    }
}

fn apply_run_overrides(config: &mut Config, run: &RunArgs) -> Result<()> {
    if let Some(threads) = run.threads {
        config.scan.threads = threads;
    }
    if run.delay_ms.is_some() {
        config.scan.delay_ms = run.delay_ms;
    }
    config.validate()?;
    Ok(())
}

/// Load the capture and pick the base request to replay
async fn connect(target: &TargetArgs, config: &Config) -> Result<(Arc<dyn Transport>, Request)> {
    let capture = Capture::from_har_file(&target.har).await?;
    let base = capture.base_request(target.entry)?.clone();
    tracing::info!(entry = base.id, url = %base.url, "Using base request");

    let client = HttpClient::new(&config.scan)?;
    Ok((Arc::new(client), base))
}

async fn load_bodies(args: &CaptureArgs, config: &Config) -> Result<Vec<CapturedBody>> {
    let capture = Capture::from_har_file(&args.har).await?;

    let scope = if args.include.is_empty() && args.exclude.is_empty() {
        None
    } else {
        let scope = Scope::from_rules(&args.include, &args.exclude)?;
        tracing::info!(scope = %scope.summary(), "Filtering capture by scope");
        Some(scope)
    };

    Ok(CaptureFilter::new(&config.capture, scope).select(&capture))
}

async fn open_destination(run: &RunArgs) -> Result<ResultDestination> {
    let mut sessions = ResultSessions::new();
    match &run.resume {
        Some(path) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read saved results: {}", path.display()))?;
            let saved: SavedResults = serde_json::from_str(&content)
                .with_context(|| format!("Not a saved result file: {}", path.display()))?;
            tracing::info!(entries = saved.results.len(), "Resuming earlier results");
            Ok(sessions.open_seeded(saved.results))
        }
        None => Ok(sessions.open(SessionChoice::Fresh)),
    }
}

/// Run one bulk job in the background until it finishes or Ctrl-C cancels it
async fn run_bulk<T>(items: Vec<T>, action: Arc<dyn ScanAction<T>>, config: &Config, run: &RunArgs) -> Result<()>
where
    T: std::fmt::Display + Send + Sync + 'static,
{
    let destination = open_destination(run).await?;
    let job = ScanJob::new(items, destination.name.clone());
    let orchestrator = ScanOrchestrator::new(ThrottlePolicy::from_config(&config.scan));

    let handle = orchestrator.start(job, &destination.results, action, Arc::new(LogSink::default()))?;

    let cancel = handle.cancel_flag();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling scan");
            cancel.cancel();
        }
    });

    let summary = handle.join().await;
    watcher.abort();

    let failed = summary.state == JobState::Failed;
    let error = summary.error.clone();
    print_json(&JobReport {
        summary,
        results: destination.results.snapshot(),
    })?;

    if failed {
        anyhow::bail!("Scan failed: {}", error.unwrap_or_default());
    }
    Ok(())
}

fn run_sfid(command: SfidCommand) -> Result<()> {
    match command {
        SfidCommand::Decode { id } => {
            let id = RecordId::parse(&id)?;
            println!("{}", id.counter());
        }
        SfidCommand::Enum { id, start, count, to18 } => {
            let id = RecordId::parse(&id)?;
            let ids = match start {
                Some(start) => id
                    .enumerate(start, count)
                    .with_context(|| format!("--start must be between 0 and {}", MAX_COUNTER))?,
                None => id.enumerate_from_current(count),
            };

            let mut produced = 0usize;
            for next in ids {
                println!("{}", if to18 { next.to_id18() } else { next.to_id15() });
                produced += 1;
            }
            if produced == 0 {
                anyhow::bail!("No ids generated");
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
