use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use treescout::{
    format_file_size, CliOverrides, EncodingMode, SearchConfig, SearchError, SearchEvent,
    SearchManager, SearchOptions, SearchProgress, SearchResult,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct CliSearchConfig {
    /// Text to look for (case-insensitive, literal)
    query: String,

    /// Root directory to search in
    #[arg(short = 'd', long, default_value = ".")]
    root: PathBuf,

    /// Match file contents instead of file and directory names
    #[arg(short = 'c', long)]
    content: bool,

    /// Skip files larger than this many MB in content mode
    #[arg(long = "max-size")]
    max_size: Option<u64>,

    /// Only scan these extensions in content mode (e.g. rs,toml,md)
    #[arg(short = 'e', long)]
    extensions: Option<String>,

    /// Number of worker threads
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Additional configuration file (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show only statistics, not results
    #[arg(short, long)]
    stats: bool,

    /// Show a live progress spinner on stderr
    #[arg(long)]
    progress: bool,

    /// Show size, type and modification time of each result
    #[arg(short = 'l', long)]
    long: bool,

    /// Print results as JSON lines
    #[arg(long, conflicts_with = "long")]
    json: bool,

    /// How to handle invalid UTF-8 sequences (failfast|lossy)
    #[arg(long)]
    encoding: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Cancel the search after this long (e.g. 500ms, 2s)
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a directory tree for matching names or contents
    Search(Box<CliSearchConfig>),
}

fn main() -> Result<()> {
    run()
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Search(args) => run_search(*args),
    }
}

fn run_search(args: CliSearchConfig) -> Result<()> {
    let encoding_mode = args
        .encoding
        .as_deref()
        .map(parse_encoding)
        .transpose()?;

    let config = SearchConfig::load_from(args.config.as_deref())
        .context("Failed to load configuration")?
        .merge_with_cli(CliOverrides {
            thread_count: args.threads,
            default_max_file_size: args.max_size.map(megabytes_to_bytes),
            encoding_mode,
            log_level: args.log_level.clone(),
        });

    init_logging(&config.log_level);
    debug!("Effective configuration: {:?}", config);

    if !args.root.is_dir() {
        return Err(SearchError::root_not_found(&args.root).into());
    }

    let mut options = if args.content {
        SearchOptions::content()
    } else {
        SearchOptions::file_name()
    }
    .with_max_file_size(config.default_max_file_size);
    options.text_extensions = args.extensions.as_deref().map(parse_extensions);

    let (manager, events) = SearchManager::new(config)?;
    let started = Instant::now();
    let generation = manager.start_search(&args.query, &args.root, options)?;
    debug!("Waiting for events of search generation {}", generation);
    let deadline = args.timeout.map(|timeout| started + timeout);

    let spinner = if args.progress {
        Some(spinner()?)
    } else {
        None
    };
    let printer = Printer {
        spinner: spinner.as_ref(),
        stats_only: args.stats,
        long: args.long,
        json: args.json,
    };

    let mut total = 0;
    let mut progress = SearchProgress::default();
    let mut timed_out = false;
    let completed = loop {
        let event = match deadline.filter(|_| !timed_out) {
            Some(deadline) => match events.recv_deadline(deadline) {
                Ok(event) => event,
                Err(_) => {
                    timed_out = true;
                    manager.stop_search();
                    continue;
                }
            },
            None => events.recv()?,
        };

        if event.generation() != generation {
            continue;
        }
        match event {
            SearchEvent::ResultsFound { batch, .. } => {
                total += batch.len();
                for result in &batch {
                    printer.print(result)?;
                }
            }
            SearchEvent::Progress { progress: p, .. } => {
                progress = p;
                if let Some(spinner) = &spinner {
                    spinner.set_message(format!(
                        "{} files, {} directories, {} results",
                        p.files_processed, p.directories_processed, total
                    ));
                }
            }
            SearchEvent::Completed { total_results, .. } => {
                total = total_results;
                break true;
            }
            SearchEvent::Cancelled { .. } => break false,
        }
    };

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if completed {
        println!(
            "\nFound {} results ({} files, {} directories scanned)",
            total, progress.files_processed, progress.directories_processed
        );
    } else {
        println!("\nSearch cancelled");
    }

    if args.stats {
        let elapsed = Duration::from_millis(started.elapsed().as_millis() as u64);
        println!("Elapsed: {}", humantime::format_duration(elapsed));
        if let Some(stats) = manager.stats() {
            println!(
                "Skipped: {} too large, {} not text, {} not UTF-8, {} unreadable, {} unreadable directories",
                stats.skipped_too_large,
                stats.skipped_not_text,
                stats.skipped_not_utf8,
                stats.skipped_unreadable,
                stats.unreadable_directories
            );
        }
    }

    Ok(())
}

struct Printer<'a> {
    spinner: Option<&'a ProgressBar>,
    stats_only: bool,
    long: bool,
    json: bool,
}

impl Printer<'_> {
    fn print(&self, result: &SearchResult) -> Result<()> {
        if self.stats_only {
            return Ok(());
        }
        let line = if self.json {
            serde_json::to_string(result)?
        } else {
            self.format(result)
        };
        match self.spinner {
            Some(spinner) => spinner.suspend(|| println!("{}", line)),
            None => println!("{}", line),
        }
        Ok(())
    }

    fn format(&self, result: &SearchResult) -> String {
        let mut line = result.path.display().to_string().blue().to_string();
        if let (Some(number), Some(text)) = (result.line_number, &result.matched_line) {
            line = format!("{}:{}: {}", line, number.to_string().green(), text);
        } else if result.is_directory {
            line.push('/');
        }

        if self.long {
            let modified = result
                .last_modified
                .map(|time| humantime::format_rfc3339_seconds(time).to_string())
                .unwrap_or_else(|| "-".to_string());
            let size = if result.is_directory {
                "-".to_string()
            } else {
                format_file_size(result.size)
            };
            line = format!(
                "{}  {}  {}  {}",
                line,
                result.file_type.dimmed(),
                size,
                modified
            );
        }
        line
    }
}

fn spinner() -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} [{elapsed}] {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("starting");
    Ok(spinner)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    // A second initialization (tests driving run() twice) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_encoding(value: &str) -> Result<EncodingMode> {
    match value.to_lowercase().as_str() {
        "failfast" | "fail-fast" => Ok(EncodingMode::FailFast),
        "lossy" => Ok(EncodingMode::Lossy),
        other => Err(SearchError::config_error(format!(
            "Unknown encoding mode {:?} (expected failfast or lossy)",
            other
        ))
        .into()),
    }
}

fn megabytes_to_bytes(mb: u64) -> u64 {
    mb.saturating_mul(1024 * 1024)
}

fn parse_extensions(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}
