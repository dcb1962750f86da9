#![forbid(unsafe_code)]

mod cmd;
mod output;

use anyhow::Context as _;
use clap::{CommandFactory, Parser, Subcommand};
use offertrail_core::config::{Config, resolve_config};
use offertrail_core::timing;
use output::{OutputMode, resolve_output_mode};
use std::env;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "offertrail: attribute user events to offer instances",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit command timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Emit the run summary as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Suppress the run summary.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file to use instead of the discovered one.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Attribution",
        about = "Attribute events to offer instances",
        long_about = "Read the event log, portfolio and (optionally) profiles, build one row per \
                      offer receipt and write the table as JSON Lines.",
        after_help = "EXAMPLES:\n    # Write instances to a file\n    ot attribute --transcript transcript.jsonl --portfolio portfolio.jsonl --profile profile.jsonl --output instances.jsonl\n\n    # Stream instances to stdout, summary as JSON on stderr\n    ot attribute --transcript transcript.jsonl --portfolio portfolio.jsonl --json"
    )]
    Attribute(cmd::attribute::AttributeArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    ot completions bash\n\n    # Generate zsh completions\n    ot completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("OFFERTRAIL_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "offertrail=debug,info"
        } else {
            "offertrail=info,warn"
        })
    });

    let format = env::var("OFFERTRAIL_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(io::stderr))
                .init();
        }
    }
}

/// Size the global rayon pool from config; rayon's default applies otherwise.
fn init_thread_pool(config: &Config) -> anyhow::Result<()> {
    if let Some(threads) = config.attribution.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure worker threads")?;
        debug!(threads, "configured worker pool");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let timing_enabled = cli.timing || timing::timing_enabled_from_env();
    timing::set_timing_enabled(timing_enabled);
    timing::clear_timings();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let command_result = match cli.command {
        Commands::Attribute(ref args) => timing::timed("cmd.attribute", || {
            let working_dir = env::current_dir()?;
            let config = resolve_config(cli.config.as_deref(), &working_dir)
                .context("E1001 Config file parse error")?;
            init_thread_pool(&config)?;

            // Rows stream to stdout without --output, so the summary goes to stderr.
            let summary_tty = if args.output.is_some() {
                io::stdout().is_terminal()
            } else {
                io::stderr().is_terminal()
            };
            let output: OutputMode =
                resolve_output_mode(cli.json, config.output.format.as_deref(), summary_tty);
            cmd::attribute::run_attribute(args, &config, output, cli.quiet)
        }),
        Commands::Completions(ref args) => timing::timed("cmd.completions", || {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command, &mut io::stdout())
        }),
    };

    if timing_enabled {
        let report = timing::collect_report();
        if report.is_empty() {
            eprintln!("timing report: no samples recorded");
        } else {
            eprintln!("timing report:");
            eprintln!("{}", report.display_table());
            eprintln!("timing report (json):");
            eprintln!("{}", serde_json::to_string_pretty(&report.to_json())?);
        }
    }

    command_result
}
