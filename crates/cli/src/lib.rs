use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doc_model::{PageAnnotationSet, SubmissionPayload};
use pdf_engine::{flatten_document, page_geometries, FlattenError, FlattenOptions, PageGeometry};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use viewer_core::{restore_page, store_page, LiveAnnotation, ViewTransform};

#[derive(Debug, Parser)]
#[command(name = "signflat")]
#[command(about = "Flatten signature annotations into PDF pages")]
pub struct Cli {
    /// Log at debug level on stderr.
    #[arg(long, short, global = true, env = "SIGNFLAT_VERBOSE")]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF page geometry.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Bake a submission's annotations into the PDF.
    Flatten {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Submission payload JSON with a `pages` map.
        #[arg(long, value_name = "JSON")]
        annotations: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write uncompressed content streams.
        #[arg(long, env = "SIGNFLAT_NO_COMPRESS")]
        no_compress: bool,
        /// Caption drawn in place of an unreadable signature image.
        #[arg(long, env = "SIGNFLAT_CAPTION", default_value = "SIGNATURE")]
        caption: String,
        #[arg(long, env = "SIGNFLAT_MIN_FONT_SIZE", default_value_t = 6.0)]
        min_font_size: f64,
        #[arg(long, env = "SIGNFLAT_MAX_FONT_SIZE", default_value_t = 72.0)]
        max_font_size: f64,
    },
    /// Convert a page annotation set between live and stored geometry.
    Normalize {
        #[arg(value_name = "JSON")]
        file: PathBuf,
        /// Editing scale (fit-to-width scale times zoom).
        #[arg(long, env = "SIGNFLAT_SCALE")]
        scale: f64,
        /// Produce live geometry at `--scale` from stored geometry.
        #[arg(long)]
        restore: bool,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: usize,
    pages: Vec<PageGeometry>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Flatten {
            file,
            annotations,
            output,
            no_compress,
            caption,
            min_font_size,
            max_font_size,
        } => {
            let options = FlattenOptions::default()
                .with_compress(!no_compress)
                .with_placeholder_caption(caption)
                .with_font_bounds(min_font_size, max_font_size);
            run_flatten(&file, &annotations, output.as_deref(), &options)
        }
        Commands::Normalize { file, scale, restore } => run_normalize(&file, scale, restore),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

fn run_info(file: &Path) -> Result<()> {
    ensure_file_exists(file)?;

    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let pages = page_geometries(&bytes).context("failed to open PDF")?;

    let payload = InfoOutput { path: file.display().to_string(), page_count: pages.len(), pages };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

fn run_flatten(
    file: &Path,
    annotations: &Path,
    output: Option<&Path>,
    options: &FlattenOptions,
) -> Result<()> {
    ensure_file_exists(file)?;
    ensure_file_exists(annotations)?;

    let payload_bytes = fs::read(annotations)
        .with_context(|| format!("failed to read {}", annotations.display()))?;
    let payload =
        SubmissionPayload::from_json(&payload_bytes).context("failed to parse annotations")?;

    let pdf = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let flattened = flatten_document(&pdf, &payload.pages, options).map_err(|err| match err {
        FlattenError::Parse(_) | FlattenError::EncryptedUnsupported | FlattenError::NoPages => {
            anyhow::Error::new(err).context("failed to open PDF")
        }
        other => anyhow::Error::new(other).context("failed to flatten PDF"),
    })?;

    if flattened.report.failed > 0 {
        tracing::warn!(failed = flattened.report.failed, "some annotations were not drawn");
    }

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_flatten_output(file));

    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    fs::write(&output, &flattened.bytes)
        .with_context(|| format!("failed to write PDF to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

fn run_normalize(file: &Path, scale: f64, restore: bool) -> Result<()> {
    ensure_file_exists(file)?;

    let view = ViewTransform::from_scale(scale)?;
    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let set: PageAnnotationSet =
        serde_json::from_slice(&bytes).context("failed to parse annotations")?;

    let json = if restore {
        serde_json::to_string_pretty(&restore_set(&set, &view))?
    } else {
        serde_json::to_string_pretty(&store_set(&set, &view))?
    };
    println!("{json}");

    Ok(())
}

fn store_set(set: &PageAnnotationSet, view: &ViewTransform) -> PageAnnotationSet {
    let mut stored = PageAnnotationSet::new();

    for (page, annotations) in set.pages() {
        let live: Vec<LiveAnnotation> = annotations
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| match LiveAnnotation::from_wire(&raw.0) {
                Ok(live) => Some(live),
                Err(err) => {
                    tracing::warn!(page, index, error = %err, "dropping malformed annotation");
                    None
                }
            })
            .collect();
        store_page(&mut stored, page, &live, view);
    }

    stored
}

fn restore_set(set: &PageAnnotationSet, view: &ViewTransform) -> BTreeMap<String, Vec<Value>> {
    set.page_numbers()
        .into_iter()
        .map(|page| {
            let live = restore_page(set, page, view)
                .into_iter()
                .enumerate()
                .filter_map(|(index, restored)| match restored {
                    Ok(live) => Some(live.to_wire()),
                    Err(err) => {
                        tracing::warn!(page, index, error = %err, "dropping malformed annotation");
                        None
                    }
                })
                .collect();
            (page.to_string(), live)
        })
        .collect()
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_flatten_output(file: &Path) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("document");

    file.with_file_name(format!("{stem}-signed.pdf"))
}
