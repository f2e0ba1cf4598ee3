//! exif-sort - Command-line interface for the sort engine.
//!
//! Sorts photos into a date-based folder tree and reports progress to stderr.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sort_engine::{
    create_sorter,
    model::{SortConfiguration, SortSummary, DEFAULT_GROUP_FORMAT},
    SortError, SortObserver,
};
use tracing_subscriber::EnvFilter;

/// exif-sort - Sort photos into folders by the date they were taken
#[derive(Parser, Debug)]
#[command(name = "exif-sort")]
#[command(version = "0.1.0")]
#[command(about = "Move photos into a date-based folder tree using their EXIF timestamps")]
struct Args {
    /// Directory containing the photos to sort
    #[arg(long, value_name = "PATH")]
    input: PathBuf,

    /// Root of the sorted tree [default: <input>/sort_output]
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Also sort photos in every subdirectory
    #[arg(long)]
    recursive: bool,

    /// strftime template for the folder of each photo
    #[arg(long, value_name = "TEMPLATE", default_value = DEFAULT_GROUP_FORMAT)]
    group_format: String,

    /// strftime template for the new file name (extension is kept)
    #[arg(long, value_name = "TEMPLATE")]
    rename_format: Option<String>,

    /// Move files without a date into the output root instead of leaving them
    #[arg(long)]
    sort_unknown: bool,

    /// Number of directories sorted in parallel [default: available cores]
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Warn when nothing happened for this many seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    stall_seconds: u64,

    /// Enable verbose output
    #[arg(long)]
    verbose: bool,
}

/// CLI implementation of SortObserver for displaying sort progress
struct CliProgress {
    verbose: bool,
    last_progress_update: Mutex<Option<Instant>>,
}

impl CliProgress {
    fn new(verbose: bool) -> Self {
        CliProgress {
            verbose,
            last_progress_update: Mutex::new(None),
        }
    }

    fn format_duration(elapsed: Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }

    fn print_progress_bar(percent: u32) -> String {
        let filled = (percent.min(100) / 5) as usize;
        let empty = 20 - filled;
        format!(
            "[{}{}] {}%",
            "=".repeat(filled),
            " ".repeat(empty),
            percent
        )
    }

    fn file_name(path: &Path) -> &str {
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("(unknown)")
    }

    /// One line per error, with its cause and a hint for permission problems
    fn describe_error(error: &SortError) -> String {
        let mut line = format!("Error: {}", error);
        if let Some(cause) = std::error::Error::source(error) {
            line.push_str(&format!(": {}", cause));
        }
        if error.is_permission_denied() {
            line.push_str(" (check that you can read the photos and write to the output folder)");
        }
        line
    }

    fn show_progress(&self, progress: f64) {
        // Throttle progress updates to avoid spam (max once per 200ms), but
        // always draw the final state
        if progress < 1.0 {
            let mut last = match self.last_progress_update.lock() {
                Ok(last) => last,
                Err(poisoned) => poisoned.into_inner(),
            };
            if last.is_some_and(|at| at.elapsed() < Duration::from_millis(200)) {
                return;
            }
            *last = Some(Instant::now());
        }

        let percent = (progress * 100.0).round() as u32;
        eprint!("\rProgress: {}", Self::print_progress_bar(percent));
        let _ = std::io::Write::flush(&mut std::io::stderr());
    }
}

impl SortObserver for CliProgress {
    fn on_moved(&self, from: &Path, to: &Path, progress: f64) {
        if self.verbose {
            eprintln!("\rMoved: {} -> {}", Self::file_name(from), to.display());
        }
        self.show_progress(progress);
    }

    fn on_skipped(&self, path: &Path, progress: f64) {
        if self.verbose {
            eprintln!("\rSkipped (no date): {}", path.display());
        }
        self.show_progress(progress);
    }

    fn on_error(&self, error: &SortError, progress: f64) {
        eprintln!("\r{}", Self::describe_error(error));
        self.show_progress(progress);
    }

    fn on_stall(&self, progress: f64) {
        eprintln!(
            "\rStill waiting at {:.0}%, a slow disk or a large file may be holding things up",
            progress * 100.0
        );
    }

    fn on_finished(&self) {
        eprintln!();
    }
}

/// Parse command-line arguments, then run the sort
fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    // Exit code tracking
    let exit_code = match run_cli(&args) {
        Ok(()) => 0,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Log to stderr; RUST_LOG overrides the default level.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "sort_engine=debug"
    } else {
        "sort_engine=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Map flags onto a configuration
fn build_config(args: &Args) -> SortConfiguration {
    let mut config = SortConfiguration::new(&args.input);
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    config.recursive = args.recursive;
    config.group_format = args.group_format.clone();
    config.rename_format = args.rename_format.clone();
    config.sort_unknown = args.sort_unknown;
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.stall_timeout = Duration::from_secs(args.stall_seconds);
    config
}

fn print_summary(summary: &SortSummary) {
    let elapsed = summary
        .end_time
        .duration_since(summary.start_time)
        .unwrap_or_default();

    if summary.cancelled {
        eprintln!("Sort cancelled.");
    } else {
        eprintln!("Sort complete!");
    }
    eprintln!(
        "Summary: {} moved, {} skipped, {} failed",
        summary.moved, summary.skipped, summary.failed
    );
    eprintln!(
        "Scanned: {} files in {} directories",
        summary.total_files, summary.directories
    );
    if summary.stalls > 0 {
        eprintln!("Stall warnings: {}", summary.stalls);
    }
    eprintln!("Elapsed: {}", CliProgress::format_duration(elapsed));
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<(), String> {
    let config = build_config(args);
    let sorter = create_sorter(config).map_err(|e| format!("Invalid configuration: {}", e))?;

    eprintln!("Sorting photos...");
    eprintln!("  Input: {}", sorter.config().input_dir.display());
    eprintln!("  Output: {}", sorter.config().output_dir.display());
    eprintln!("  Folders: {}", sorter.config().group_format);
    eprintln!();

    let progress = CliProgress::new(args.verbose);
    let summary = sorter.run(Some(&progress));
    print_summary(&summary);

    if summary.failed > 0 {
        Err(format!("{} file(s) or folder(s) could not be sorted", summary.failed))
    } else {
        Ok(())
    }
}
