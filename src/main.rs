//! # postmortem-pdf
//!
//! Renders an incident postmortem JSON payload to a PDF file.
//!
//! ```bash
//! postmortem-pdf incident.json --out-dir reports/ --config render.toml
//! ```
//!
//! Exit status is 2 when the payload is not a valid report and 1 for any
//! other failure.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use postmortem_pdf::{
    Catalog, RenderConfig, ReportError, ReportRenderer, init_logging, inspect_pdf_path,
    require_readable,
};

#[derive(Parser, Debug)]
#[command(name = "postmortem-pdf")]
#[command(about = "Render an incident postmortem JSON payload to PDF")]
#[command(version)]
struct Args {
    /// Postmortem payload (JSON)
    input: PathBuf,

    /// Directory the PDF is written to
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Render configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extra label catalog (JSON) merged over the built-in languages
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Language for payloads that do not set `lang`
    #[arg(long)]
    lang: Option<String>,

    /// TrueType font for regular text outside Latin-1
    #[arg(long)]
    font: Option<PathBuf>,

    /// TrueType font for bold text outside Latin-1
    #[arg(long)]
    bold_font: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code(&err)
        }
    }
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    let client = err
        .downcast_ref::<ReportError>()
        .is_some_and(ReportError::is_client_error);
    if client {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}

fn run(args: Args) -> Result<PathBuf> {
    let mut config = match &args.config {
        Some(path) => RenderConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RenderConfig::default(),
    };
    if let Some(lang) = &args.lang {
        config.default_language = lang.clone();
    }
    if let Some(path) = &args.font {
        config.fonts.regular = Some(path.clone());
    }
    if let Some(path) = &args.bold_font {
        config.fonts.bold = Some(path.clone());
    }
    init_logging(args.log_level.as_deref().unwrap_or(&config.log_level));

    let catalog = load_catalog(args.labels.as_deref())?;
    let renderer = ReportRenderer::builder()
        .config(config)
        .labels(Arc::new(catalog))
        .build()
        .context("building renderer")?;

    let payload = fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let report = renderer
        .render_json(&payload)
        .with_context(|| format!("rendering {}", args.input.display()))?;

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;
    let path = report
        .write_to_dir(&args.out_dir)
        .with_context(|| format!("writing into {}", args.out_dir.display()))?;

    let summary = inspect_pdf_path(&path).context("re-reading written pdf")?;
    require_readable(&summary).context("written pdf is not readable")?;
    info!(
        pages = summary.page_count,
        images = summary.image_count,
        version = %summary.pdf_version,
        "verified output"
    );
    Ok(path)
}

fn load_catalog(extra: Option<&Path>) -> Result<Catalog> {
    let mut catalog = Catalog::builtin();
    if let Some(path) = extra {
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading labels {}", path.display()))?;
        let overlay = Catalog::from_json(&json)
            .with_context(|| format!("parsing labels {}", path.display()))?;
        catalog.merge(overlay);
        info!(languages = ?catalog.languages().collect::<Vec<_>>(), "loaded label catalog");
    }
    Ok(catalog)
}
