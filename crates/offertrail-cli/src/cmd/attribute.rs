use anyhow::{Context as _, Result};
use clap::Args;
use offertrail_core::catalog::{OfferCatalog, parse_portfolio};
use offertrail_core::config::Config;
use offertrail_core::enrich::{EnrichedRow, eligible_events, enrich};
use offertrail_core::error::{ErrorCode, IngestError};
use offertrail_core::event::{Event, parse_transcript};
use offertrail_core::profile::{ProfileTable, parse_profiles};
use offertrail_core::summary::Summary;
use offertrail_core::{attribute_with, timing};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

/// Arguments for `ot attribute`.
#[derive(Args, Debug)]
pub struct AttributeArgs {
    /// Event log (JSON Lines with `person`, `event`, `value`, `time`).
    #[arg(long, value_name = "PATH")]
    pub transcript: PathBuf,

    /// Offer catalog (JSON Lines with `id`, `duration`, ...).
    #[arg(long, value_name = "PATH")]
    pub portfolio: PathBuf,

    /// User profiles (JSON Lines). Enables the demographics filter and columns.
    #[arg(long, value_name = "PATH")]
    pub profile: Option<PathBuf>,

    /// Output JSONL path (defaults to stdout).
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Process users one at a time instead of on the thread pool.
    #[arg(long)]
    pub sequential: bool,
}

#[derive(Debug, Serialize)]
struct AttributeReport {
    #[serde(flatten)]
    summary: Summary,
    events: usize,
    output: Option<String>,
}

/// Run the full pipeline and write one JSON line per offer instance.
///
/// The summary goes to stdout when rows go to a file, and to stderr when rows
/// go to stdout.
///
/// # Errors
///
/// Fails on unreadable or malformed inputs, on receipts of offers missing from
/// the portfolio, and on output write failures. Nothing is written on failure.
pub fn run_attribute(
    args: &AttributeArgs,
    config: &Config,
    output: OutputMode,
    quiet: bool,
) -> Result<()> {
    let catalog = timing::timed("cmd.attribute.portfolio", || {
        load_portfolio(&args.portfolio, config)
    })?;
    let events = timing::timed("cmd.attribute.transcript", || {
        load_transcript(&args.transcript)
    })?;
    let profiles = args
        .profile
        .as_deref()
        .map(|path| timing::timed("cmd.attribute.profile", || load_profiles(path)))
        .transpose()?;

    let events = match &profiles {
        Some(profiles) => {
            eligible_events(events, profiles, config.enrich.require_demographics)
        }
        None => {
            if config.enrich.require_demographics {
                warn!("no profile table given; demographics filter skipped");
            }
            events
        }
    };
    let event_count = events.len();

    let mut options = config.attribution.options();
    if args.sequential {
        options.parallel = false;
    }

    let instances = attribute_with(&events, &catalog, &options).map_err(|err| {
        let code = err.code();
        coded(anyhow::Error::new(err), code)
    })?;
    let summary = Summary::from_instances(&instances);

    let empty = ProfileTable::default();
    let rows = enrich(
        instances,
        profiles.as_ref().unwrap_or(&empty),
        &catalog,
        &config.enrich,
    );

    timing::timed("cmd.attribute.write", || write_rows(&rows, args.output.as_deref()))?;
    info!(rows = rows.len(), "wrote instance table");

    if quiet {
        return Ok(());
    }

    let report = AttributeReport {
        summary,
        events: event_count,
        output: args.output.as_ref().map(|p| p.display().to_string()),
    };
    if args.output.is_some() {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        render_report(output, &mut out, &report)
    } else {
        let stderr = io::stderr();
        let mut out = stderr.lock();
        render_report(output, &mut out, &report)
    }
}

fn load_portfolio(path: &Path, config: &Config) -> Result<OfferCatalog> {
    let reader = open(path)?;
    parse_portfolio(reader, config.catalog.hours_per_duration_unit)
        .map_err(|err| ingest_error(err, path))
}

fn load_transcript(path: &Path) -> Result<Vec<Event>> {
    let reader = open(path)?;
    parse_transcript(reader).map_err(|err| ingest_error(err, path))
}

fn load_profiles(path: &Path) -> Result<ProfileTable> {
    let reader = open(path)?;
    parse_profiles(reader).map_err(|err| ingest_error(err, path))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|err| {
        coded(
            anyhow::Error::new(err).context(format!("failed to open {}", path.display())),
            ErrorCode::InputReadFailed,
        )
    })?;
    Ok(BufReader::new(file))
}

fn ingest_error(err: IngestError, path: &Path) -> anyhow::Error {
    let code = err.code();
    coded(
        anyhow::Error::new(err).context(format!("failed to load {}", path.display())),
        code,
    )
}

/// Prefix an error with its stable code and remediation hint.
fn coded(err: anyhow::Error, code: ErrorCode) -> anyhow::Error {
    let hint = code.hint().map(|h| format!(" ({h})")).unwrap_or_default();
    err.context(format!("{code} {}{hint}", code.message()))
}

/// Write rows as JSON Lines to `path`, or to stdout when `None`.
///
/// File output goes through a temporary sibling that is renamed into place
/// once every row is written.
fn write_rows(rows: &[EnrichedRow], path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        let stdout = io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        write_jsonl(rows, &mut out)?;
        return Ok(());
    };

    let tmp = path.with_extension("jsonl.tmp");
    let written = File::create(&tmp)
        .with_context(|| format!("failed to create {}", tmp.display()))
        .and_then(|file| {
            let mut out = BufWriter::new(file);
            write_jsonl(rows, &mut out)?;
            out.into_inner()
                .map_err(io::IntoInnerError::into_error)?
                .sync_all()?;
            Ok(())
        });
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(coded(err, ErrorCode::OutputWriteFailed));
    }

    fs::rename(&tmp, path).map_err(|err| {
        coded(
            anyhow::Error::new(err).context(format!("failed to move output into {}", path.display())),
            ErrorCode::OutputWriteFailed,
        )
    })
}

fn write_jsonl(rows: &[EnrichedRow], out: &mut impl Write) -> Result<()> {
    for row in rows {
        serde_json::to_writer(&mut *out, row)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

fn render_report(mode: OutputMode, out: &mut dyn Write, report: &AttributeReport) -> Result<()> {
    render_mode(
        mode,
        out,
        report,
        |r, w| {
            writeln!(
                w,
                "instances={} users={} offers={} viewed={} completed={} viewed_before_completion={} repeat_receipts={}",
                r.summary.instances,
                r.summary.users,
                r.summary.offers,
                r.summary.viewed,
                r.summary.completed,
                r.summary.viewed_before_completion,
                r.summary.repeat_receipts,
            )
        },
        |r, w| {
            pretty_section(w, "Attribution summary")?;
            pretty_kv(w, "Events", r.events.to_string())?;
            pretty_kv(w, "Offer instances", r.summary.instances.to_string())?;
            pretty_kv(w, "Users", r.summary.users.to_string())?;
            pretty_kv(w, "Offers", r.summary.offers.to_string())?;
            pretty_kv(w, "View rate", percent(r.summary.view_rate))?;
            pretty_kv(w, "Completion rate", percent(r.summary.completion_rate))?;
            pretty_kv(
                w,
                "Viewed before completion",
                r.summary.viewed_before_completion.to_string(),
            )?;
            pretty_kv(w, "Repeat receipts", r.summary.repeat_receipts.to_string())?;
            if let Some(path) = &r.output {
                pretty_kv(w, "Output", path)?;
            }
            Ok(())
        },
    )
}

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}
