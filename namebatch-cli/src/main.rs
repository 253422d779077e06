mod progress;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use namebatch::config::default_config_path;
use namebatch::{
    provider_from_config, query, report, Action, BatchConfig, BatchReport, BatchRunner,
    BatchStatus, CancelToken, Confirm, EsProvider, FixedAnswer, Outcome, ProviderKind,
};
use progress::{PromptConfirm, ProgressView};
use std::{num::NonZeroUsize, path::PathBuf, process::ExitCode, thread};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find files by name and optionally copy, move or delete them
    Run(Box<RunArgs>),

    /// Check that the configured search provider is usable
    Check {
        /// Configuration file to load on top of the defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write the effective configuration to a YAML file
    InitConfig {
        /// Where to write (default: the user configuration directory)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderArg {
    Everything,
    Walk,
}

impl From<ProviderArg> for ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Everything => ProviderKind::Everything,
            ProviderArg::Walk => ProviderKind::Walk,
        }
    }
}

#[derive(Args)]
struct RunArgs {
    /// Text file with one file name per line
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// File name to look for (can be specified multiple times)
    #[arg(short, long = "name")]
    names: Vec<String>,

    /// Copy every match under this folder
    #[arg(long, value_name = "DIR", conflicts_with_all = ["move_to", "delete"])]
    copy_to: Option<PathBuf>,

    /// Move every match under this folder
    #[arg(long, value_name = "DIR", conflicts_with = "delete")]
    move_to: Option<PathBuf>,

    /// Delete every match
    #[arg(long)]
    delete: bool,

    /// Put every file directly in the destination instead of recreating folders
    #[arg(long, visible_alias = "no-structure")]
    flatten: bool,

    /// Only keep matches whose full path matches this regular expression
    #[arg(short, long)]
    regex: Option<String>,

    /// Extension appended to names that have none (e.g. pdf)
    #[arg(short = 'x', long, value_name = "EXT")]
    append_extension: Option<String>,

    /// Folder for the run log
    #[arg(long, value_name = "DIR")]
    log_path: Option<PathBuf>,

    /// Extra location that must never be touched (can be specified multiple times)
    #[arg(long, value_name = "DIR")]
    protect: Vec<PathBuf>,

    /// Search provider to use
    #[arg(long, value_enum)]
    provider: Option<ProviderArg>,

    /// Path to the Everything command-line client
    #[arg(long)]
    es_path: Option<PathBuf>,

    /// Folder to walk with the walk provider (can be specified multiple times)
    #[arg(long = "search-root", value_name = "DIR")]
    search_roots: Vec<PathBuf>,

    /// Number of threads to use
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Answer yes to the move/delete confirmation
    #[arg(short, long)]
    yes: bool,

    /// Print the full report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Configuration file to load on top of the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl RunArgs {
    fn action(&self) -> (Action, Option<PathBuf>) {
        if let Some(dir) = &self.copy_to {
            (Action::Copy, Some(dir.clone()))
        } else if let Some(dir) = &self.move_to {
            (Action::Move, Some(dir.clone()))
        } else if self.delete {
            (Action::Delete, None)
        } else {
            (Action::None, None)
        }
    }

    /// Settings given on the command line, in configuration form
    fn to_config(&self) -> BatchConfig {
        let defaults = BatchConfig::default();
        let (action, destination_root) = self.action();
        BatchConfig {
            match_extension: self.append_extension.is_none(),
            default_extension: self.append_extension.clone().unwrap_or_default(),
            preserve_structure: !self.flatten,
            action,
            destination_root,
            regex_pattern: self.regex.clone(),
            log_path: self.log_path.clone(),
            protected_paths: self.protect.clone(),
            provider: defaults.provider,
            es_path: self.es_path.clone(),
            search_roots: self.search_roots.clone(),
            thread_count: self.threads.unwrap_or(defaults.thread_count),
            log_level: self.log_level.clone().unwrap_or(defaults.log_level),
        }
    }

    fn lines(&self) -> anyhow::Result<Vec<String>> {
        let mut lines = Vec::new();
        if let Some(path) = &self.input {
            lines.extend(
                query::read_input_file(path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
            );
        }
        lines.extend(self.names.iter().cloned());
        if lines.is_empty() {
            bail!("nothing to search for: pass --input FILE or --name NAME");
        }
        Ok(lines)
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_batch(&args),
        Commands::Check { config } => {
            let config = BatchConfig::load_from(config.as_deref())?;
            init_logging(&config.log_level);
            check_provider(&config)
        }
        Commands::InitConfig { path, force } => {
            let Some(path) = path.or_else(default_config_path) else {
                bail!("no configuration directory on this system, pass a path");
            };
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            BatchConfig::load()?.save_to(&path)?;
            println!("Wrote {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run_batch(args: &RunArgs) -> anyhow::Result<ExitCode> {
    let mut config =
        BatchConfig::load_from(args.config.as_deref())?.merge_with_cli(args.to_config());
    if let Some(provider) = args.provider {
        config.provider = provider.into();
    }
    init_logging(&config.log_level);

    let lines = args.lines()?;
    config.validate()?;
    let provider = provider_from_config(&config)?;

    let view = ProgressView::new(!args.json);
    let prompt = PromptConfirm::new(view.clone());
    let assume_yes = FixedAnswer(true);
    let confirm: &dyn Confirm = if args.yes { &assume_yes } else { &prompt };

    let cancel = CancelToken::new();
    if let Err(e) = ctrlc::set_handler(on_interrupt(&cancel)) {
        warn!("Ctrl-C will stop the process instead of the batch: {}", e);
    }

    let (sink, events) = report::channel();
    let report = thread::scope(|s| {
        let drawer = s.spawn(|| view.drive(events));
        let report = BatchRunner::new(&config, provider.as_ref())
            .with_sink(&sink)
            .with_confirmation(confirm)
            .with_cancel(cancel)
            .run(&lines);
        drop(sink);
        let _ = drawer.join();
        report
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// First interrupt stops the batch after in-flight files finish, a second one exits
fn on_interrupt(cancel: &CancelToken) -> impl Fn() + Send + 'static {
    let cancel = cancel.clone();
    move || {
        if cancel.is_cancelled() {
            std::process::exit(130);
        }
        eprintln!("{}", "Stopping after the files in progress...".yellow());
        cancel.cancel();
    }
}

fn check_provider(config: &BatchConfig) -> anyhow::Result<ExitCode> {
    match config.provider {
        ProviderKind::Everything => {
            let es = EsProvider::from_config(config.es_path.as_deref())?;
            println!("Client: {}", es.executable().display());
            let version = es.version()?;
            println!("Everything {} is running", version.green());
        }
        ProviderKind::Walk => {
            config.validate()?;
            for root in &config.search_roots {
                let state = if root.is_dir() {
                    "ok".green()
                } else {
                    "missing".red()
                };
                println!("{}: {}", root.display(), state);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &BatchReport) {
    for failure in &report.query_failures {
        println!(
            "{} {}: {}",
            "search failed".red(),
            failure.query.to_string().yellow(),
            failure.reason
        );
    }

    if report.action == Action::None {
        for m in &report.matches {
            println!("{}", m.path.display().to_string().blue());
        }
    }

    for result in &report.results {
        if let Outcome::Failed(reason) = &result.outcome {
            println!(
                "{} {}: {}",
                "failed".red(),
                result.plan.source.path.display(),
                reason
            );
        }
    }

    let summary = &report.summary;
    match report.status {
        BatchStatus::NoMatches => println!("\nNo matching files found"),
        BatchStatus::Cancelled => println!("\n{}", "Cancelled, no further actions taken".yellow()),
        BatchStatus::Completed => {}
    }
    println!(
        "\nProcessed {} queries, found {} files",
        summary.queries_processed, summary.total_found
    );
    if report.action != Action::None {
        println!(
            "{}: {} succeeded, {} skipped",
            report.action,
            summary.success_processed.to_string().green(),
            summary.skipped
        );
    }
    if summary.failed_operations > 0 {
        println!(
            "{} failed operations ({} search, {} action)",
            summary.failed_operations.to_string().red(),
            summary.search_failures,
            summary.action_failures
        );
    }
    if let Some(log) = &report.log_file {
        println!("Log written to {}", log.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_interrupt_cancels_batch() {
        let cancel = CancelToken::new();
        let handler = on_interrupt(&cancel);
        assert!(!cancel.is_cancelled());

        handler();
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_run_args_select_action() {
        let cli = Cli::parse_from(["namebatch-cli", "run", "--name", "a.txt", "--move-to", "out"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.action(), (Action::Move, Some(PathBuf::from("out"))));

        let cli = Cli::parse_from(["namebatch-cli", "run", "--name", "a.txt"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.to_config().action, Action::None);
    }
}
