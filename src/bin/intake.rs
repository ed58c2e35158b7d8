//! CLI binary for disclosure-intake.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ClientConfig` / `JobConfig`, drives one job, and renders tracker state.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use disclosure_intake::candidate::{display_name, read_local};
use disclosure_intake::{
    resolve_candidate, ClientConfig, Intake, JobTracker, Phase, ReqwestTransport, Standard,
    TrackerObserver,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: one spinner whose prefix is the phase and whose
/// message is the latest progress line from the backend.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new(file_name: &str) -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Staged");
        bar.set_message(file_name.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl TrackerObserver for CliObserver {
    fn on_phase_change(&self, _from: Phase, to: Phase) {
        let prefix = match to {
            Phase::Uploading => "Uploading",
            Phase::Processing => "Processing",
            Phase::Success => "Done",
            Phase::Error => "Failed",
            Phase::Idle | Phase::Staged => "Staged",
        };
        self.bar.set_prefix(prefix);
        if to == Phase::Processing {
            self.bar
                .println(format!("{} {}", cyan("◆"), bold("Upload accepted, pipeline running…")));
        }
    }

    fn on_progress(&self, message: &str) {
        // Keep the spinner on one line.
        let msg = if message.chars().count() > 80 {
            let cut: String = message.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            message.to_string()
        };
        self.bar.set_message(msg);
    }

    fn on_finished(&self, phase: Phase, message: &str) {
        self.bar.finish_and_clear();
        if phase == Phase::Success {
            eprintln!("{} {}", green("✔"), bold("Analysis complete"));
        } else {
            eprintln!("{} {}  {}", red("✘"), bold("Pipeline failed"), red(message));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a report against TCFD (default standard)
  intake submit report.pdf

  # Another standard, forcing the backend to re-vectorise
  intake submit --standard sasb --force report.pdf

  # Report from a URL, final state as JSON
  intake submit --json https://example.com/esg-2024.pdf

  # Upload the rules workbook for a standard first
  intake upload-standard tnfd TNFD.xlsx

  # Talk to a remote backend, poll every second
  intake --server http://analysis:8000 --poll-interval-ms 1000 submit report.pdf

ENVIRONMENT VARIABLES:
  INTAKE_SERVER           Backend origin (default http://localhost:8000)
  INTAKE_POLL_MS          Poll interval in milliseconds (default 1500)
  INTAKE_TIMEOUT          Per-request timeout in seconds (default none)
  RUST_LOG                Log filter, overrides --verbose

Press Ctrl-C while a job runs to abandon it. The backend keeps processing;
this client simply stops listening.
"#;

/// Submit PDF disclosure reports for analysis and follow the pipeline.
#[derive(Parser, Debug)]
#[command(
    name = "intake",
    version,
    about = "Submit PDF disclosure reports for analysis and follow the pipeline",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Backend origin, e.g. http://localhost:8000.
    #[arg(long, global = true, env = "INTAKE_SERVER", default_value = "http://localhost:8000")]
    server: String,

    /// Delay between status polls in milliseconds.
    #[arg(long, global = true, env = "INTAKE_POLL_MS", default_value_t = 1500,
          value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: u64,

    /// Per-request timeout in seconds (none by default).
    #[arg(long, global = true, env = "INTAKE_TIMEOUT")]
    timeout: Option<u64>,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, global = true, env = "INTAKE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, global = true, env = "INTAKE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "INTAKE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the final result.
    #[arg(short, long, global = true, env = "INTAKE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a PDF and track the analysis job until it finishes.
    Submit {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        /// Disclosure standard to analyse against.
        #[arg(long, value_enum, default_value = "tcfd")]
        standard: StandardArg,

        /// Re-vectorise even if the backend already knows this report.
        #[arg(long)]
        force: bool,

        /// Print the final snapshot as JSON on stdout.
        #[arg(long)]
        json: bool,
    },

    /// Upload the Excel rules workbook for a standard.
    UploadStandard {
        /// Standard the rules belong to.
        #[arg(value_enum)]
        standard: StandardArg,

        /// Path to the .xlsx / .xls workbook.
        workbook: PathBuf,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StandardArg {
    Tcfd,
    Tnfd,
    S1,
    Sasb,
}

impl From<StandardArg> for Standard {
    fn from(v: StandardArg) -> Self {
        match v {
            StandardArg::Tcfd => Standard::Tcfd,
            StandardArg::Tnfd => Standard::Tnfd,
            StandardArg::S1 => Standard::S1,
            StandardArg::Sasb => Standard::Sasb,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner provides the feedback that matters; keep library INFO logs
    // out of its way unless --verbose was asked for.
    let json = matches!(cli.command, Command::Submit { json: true, .. });
    let show_progress = !cli.quiet && !cli.no_progress && !json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let transport = Arc::new(ReqwestTransport::new(config.clone()).context("Failed to create HTTP client")?);

    match cli.command {
        Command::Submit {
            ref input,
            standard,
            force,
            json,
        } => {
            let mut tracker = JobTracker::new(transport, config.clone());
            if show_progress {
                tracker = tracker.with_observer(CliObserver::new(&display_name(input)));
            }
            let mut intake = Intake::new(tracker);

            let candidate = resolve_candidate(input, config.download_timeout_secs)
                .await
                .with_context(|| format!("Failed to read '{input}'"))?;
            intake.select_file(candidate).context("Cannot stage file")?;
            intake.set_standard(standard.into())?;
            intake.set_force_update(force)?;
            intake.begin_submission()?;

            let finished = tokio::select! {
                phase = intake.run_to_completion() => Some(phase),
                _ = tokio::signal::ctrl_c() => None,
            };

            let Some(phase) = finished else {
                intake.reset();
                eprintln!("{} {}", cyan("⚠"), "Job abandoned");
                std::process::exit(130);
            };

            let snapshot = intake.snapshot();
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&snapshot).context("Failed to serialise snapshot")?
                );
            } else if !cli.quiet || phase == Phase::Success {
                println!("{}", snapshot.message);
                if let Some(ref id) = snapshot.job_id {
                    if !cli.quiet {
                        eprintln!("   job {}", dim(id));
                    }
                }
            }

            if phase != Phase::Success {
                if !show_progress && !json {
                    eprintln!("{} {}", red("✘"), snapshot.message);
                }
                std::process::exit(1);
            }
        }
        Command::UploadStandard { standard, ref workbook } => {
            let file = read_local(workbook)
                .await
                .with_context(|| format!("Failed to read {:?}", workbook))?;
            let message = disclosure_intake::upload_standard_rules(
                transport.as_ref(),
                &config,
                standard.into(),
                &file,
            )
            .await
            .context("Standard upload failed")?;
            if !cli.quiet {
                eprintln!("{} {}", green("✔"), message);
            }
        }
    }

    Ok(())
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli) -> Result<ClientConfig> {
    ClientConfig::builder()
        .base_url(&cli.server)
        .poll_interval_ms(cli.poll_interval_ms)
        .request_timeout_secs(cli.timeout)
        .download_timeout_secs(cli.download_timeout)
        .build()
        .context("Invalid configuration")
}
