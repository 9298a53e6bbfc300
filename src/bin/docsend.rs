//! CLI binary for docsend-dl.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `DownloadConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use docsend_dl::{
    download, inspect, Credentials, DocumentRef, DownloadConfig, DownloadProgressCallback,
    OutputTarget, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::ops::Range;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while the viewer page loads, then a
/// page counter once the page count is known.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_download_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading viewer…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  {msg}  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Downloading");
        self.bar.reset_eta();
    }
}

// A failed download never reaches `on_download_complete`; clear the bar so
// the spinner stops before the error is printed.
impl Drop for CliProgressCallback {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl DownloadProgressCallback for CliProgressCallback {
    fn on_download_start(&self, total_pages: usize, total_batches: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Fetching {total_pages} pages in {total_batches} batches…"
            ))
        ));
    }

    fn on_batch_start(&self, batch_index: usize, pages: Range<usize>) {
        self.bar.set_message(dim(&format!(
            "batch {} (pages {}–{})",
            batch_index + 1,
            pages.start,
            pages.end.saturating_sub(1)
        )));
    }

    fn on_page_complete(&self, _page_num: usize, _total_pages: usize) {
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(&msg),
        ));
    }

    fn on_download_complete(&self, total_pages: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages fetched",
            green("✔"),
            bold(&total_pages.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Public document to abc123.pdf
  docsend https://docsend.com/view/abc123

  # Gated document, explicit output file
  docsend abc123 --email me@example.com -o deck.pdf

  # Passcode-protected document as one PNG per page
  docsend abc123 --email me@example.com --passcode s3cret --format images -o deck/

  # Show page count and whether the document is gated
  docsend --inspect-only abc123

  # JSON report for scripting
  docsend --json abc123 > report.json

ENVIRONMENT VARIABLES:
  DOCSEND_EMAIL           Email for gated documents
  DOCSEND_PASSCODE        Passcode for protected documents
  DOCSEND_BASE_URL        Viewer origin (default: https://docsend.com)
  RUST_LOG                Override log filter (e.g. docsend_dl=debug)
"#;

/// Download DocSend documents as PDF or PNG images.
#[derive(Parser, Debug)]
#[command(
    name = "docsend",
    version,
    about = "Download DocSend documents as PDF or PNG images",
    long_about = "Download a document from the DocSend web viewer. Pages are fetched as \
rendered images in concurrent batches and written either as a single PDF or as one PNG \
per page. Gated documents need an email; protected ones also need a passcode.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document id or viewer URL (e.g. https://docsend.com/view/abc123).
    input: String,

    /// Output PDF file or image directory. Default: <doc_id>.pdf or <doc_id>/.
    #[arg(short, long, env = "DOCSEND_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format.
    #[arg(long, env = "DOCSEND_FORMAT", value_enum, default_value = "pdf")]
    format: FormatArg,

    /// Email submitted to the authorization form.
    #[arg(long, env = "DOCSEND_EMAIL")]
    email: Option<String>,

    /// Passcode submitted with the email.
    #[arg(long, env = "DOCSEND_PASSCODE", requires = "email")]
    passcode: Option<String>,

    /// Pages fetched concurrently per batch.
    #[arg(short, long, env = "DOCSEND_BATCH_SIZE", default_value_t = 5,
          value_parser = clap::value_parser!(u64).range(1..=64))]
    batch_size: u64,

    /// Retries per request on 5xx or connection failure.
    #[arg(long, env = "DOCSEND_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Backoff before the first retry, in milliseconds; doubles each retry.
    #[arg(long, env = "DOCSEND_RETRY_BACKOFF_MS", default_value_t = 1000)]
    retry_backoff_ms: u64,

    /// Per-request timeout in seconds.
    #[arg(long, env = "DOCSEND_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Viewer origin.
    #[arg(long, env = "DOCSEND_BASE_URL", default_value = docsend_dl::config::DEFAULT_BASE_URL,
          hide_default_value = true)]
    base_url: String,

    /// Print a JSON report instead of human-readable output.
    #[arg(long, env = "DOCSEND_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCSEND_NO_PROGRESS")]
    no_progress: bool,

    /// Print document metadata only, no download.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCSEND_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCSEND_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FormatArg {
    Pdf,
    Images,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn DownloadProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let document = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect document")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&document).context("Failed to serialize metadata")?
            );
        } else {
            println!("Document:     {}", document.doc_id());
            println!("Viewer:       {}", document.viewer_url());
            println!("Pages:        {}", document.page_count());
            println!(
                "Gated:        {}",
                if document.authenticity_token().is_some() {
                    "yes (email required)"
                } else {
                    "no"
                }
            );
        }
        return Ok(());
    }

    // ── Run download ─────────────────────────────────────────────────────
    let target = output_target(&cli, &config)?;
    let report = download(&cli.input, &target, &config)
        .await
        .context("Download failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {} pages  {} batches  {}ms  →  {}",
            green("✔"),
            report.page_count,
            report.batches,
            report.total_duration_ms,
            bold(&report.output_path.display().to_string()),
        );
        if report.authorized {
            eprintln!("   {}", dim("authorized with the supplied email"));
        }
    }

    Ok(())
}

/// Map CLI args to `DownloadConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DownloadConfig> {
    let mut builder = DownloadConfig::builder()
        .base_url(&cli.base_url)
        .batch_size(cli.batch_size as usize)
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .request_timeout_secs(cli.timeout);

    if let Some(ref email) = cli.email {
        let mut credentials = Credentials::new(email);
        if let Some(ref passcode) = cli.passcode {
            credentials = credentials.with_passcode(passcode);
        }
        builder = builder.credentials(credentials);
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Resolve `--output`, defaulting to `<doc_id>.pdf` or `<doc_id>/`.
fn output_target(cli: &Cli, config: &DownloadConfig) -> Result<OutputTarget> {
    let path = match cli.output {
        Some(ref path) => path.clone(),
        None => {
            let reference = DocumentRef::parse(&cli.input, &config.base_url)
                .context("Cannot derive an output path")?;
            match cli.format {
                FormatArg::Pdf => PathBuf::from(format!("{}.pdf", reference.doc_id())),
                FormatArg::Images => PathBuf::from(reference.doc_id()),
            }
        }
    };

    Ok(match cli.format {
        FormatArg::Pdf => OutputTarget::Pdf(path),
        FormatArg::Images => OutputTarget::Images(path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("docsend").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn default_pdf_path_uses_doc_id() {
        let cli = parse(&["https://docsend.com/view/abc123"]);
        let config = build_config(&cli, None).unwrap();
        let target = output_target(&cli, &config).unwrap();
        assert_eq!(target, OutputTarget::Pdf(PathBuf::from("abc123.pdf")));
    }

    #[test]
    fn default_image_dir_uses_doc_id() {
        let cli = parse(&["abc123", "--format", "images"]);
        let config = build_config(&cli, None).unwrap();
        let target = output_target(&cli, &config).unwrap();
        assert_eq!(target, OutputTarget::Images(PathBuf::from("abc123")));
    }

    #[test]
    fn dropped_progress_clears_bar() {
        let cb = CliProgressCallback::new_dynamic();
        let bar = cb.bar.clone();
        cb.on_download_start(12, 3);
        drop(cb);
        assert!(bar.is_finished());
    }

    #[test]
    fn passcode_requires_email() {
        let result =
            Cli::try_parse_from(["docsend", "abc123", "--passcode", "s3cret"].iter().copied());
        assert!(result.is_err());
    }

    #[test]
    fn credentials_flow_into_config() {
        let cli = parse(&["abc123", "--email", "me@example.com", "--passcode", "s3cret"]);
        let config = build_config(&cli, None).unwrap();
        let creds = config.credentials.unwrap();
        assert_eq!(creds.email, "me@example.com");
        assert_eq!(creds.passcode.as_deref(), Some("s3cret"));
    }
}
