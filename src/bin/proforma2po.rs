//! CLI binary for proforma2po.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `PipelineConfig` and a `PurchaseRequest`, runs one pipeline, and
//! prints the resulting record.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use proforma2po::{
    generate_purchase_order, validate_receipt, Attachment, DirStore, PipelineConfig,
    PurchaseRequest, RequestStatus,
};
use rust_decimal::Decimal;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────

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

const AFTER_HELP: &str = r#"EXAMPLES:
  # Validate a receipt against an approved request
  proforma2po validate --receipt receipt.pdf \
      --title "Office chairs" --description "10 chairs from Acme" --amount 500.00

  # Include the original quote as comparison context
  proforma2po validate --receipt receipt.pdf --proforma quote.pdf \
      --title "Office chairs" --description "10 chairs from Acme" --amount 500.00

  # Generate a purchase-order PDF from a proforma invoice
  proforma2po generate --proforma quote.pdf --out-dir ./purchase_orders \
      --title "Office chairs" --description "10 chairs from Acme" --amount 500.00

  # Machine-readable output
  proforma2po validate --receipt receipt.pdf --title t --description d \
      --amount 42 --json > verdict.json

SUPPORTED ATTACHMENTS:
  .pdf                       structural text extraction (lopdf)
  .jpg .jpeg .png .bmp .tiff OCR, requires the `ocr` build feature and
                             --ocr-models pointing at det.onnx,
                             latin_rec.onnx, latin_dict.txt

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY       API key for the completion endpoint
  PROFORMA2PO_API_BASE Override the endpoint base URL
  PROFORMA2PO_MODEL    Override the model ID (default: gpt-4o-mini)

EXIT CODES:
  0  validate: verdict is_valid=true / generate: PO written
  1  validate: verdict is_valid=false / generate: failed / I/O or config error
  2  usage error
"#;

/// Validate receipts and generate purchase orders from proforma invoices.
#[derive(Parser, Debug)]
#[command(
    name = "proforma2po",
    version,
    about = "Validate receipts and generate purchase orders from proforma invoices",
    long_about = "LLM-backed document automation for purchase-request approval workflows. \
Validates expense receipts against approved requests, and extracts structured data from \
proforma invoices to render purchase-order PDFs.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// API key for the completion endpoint.
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint.
    #[arg(long, global = true, env = "PROFORMA2PO_API_BASE")]
    api_base: Option<String>,

    /// Completion model ID.
    #[arg(long, global = true, env = "PROFORMA2PO_MODEL")]
    model: Option<String>,

    /// Per-call HTTP timeout in seconds.
    #[arg(long, global = true, default_value_t = 60)]
    api_timeout: u64,

    /// Directory with OCR model files (needs the `ocr` build feature).
    #[arg(long, global = true, env = "PROFORMA2PO_OCR_MODELS")]
    ocr_models: Option<PathBuf>,

    /// Print the result record as pretty JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a receipt against an approved purchase request.
    Validate {
        /// Receipt file (.pdf or a raster image).
        #[arg(long)]
        receipt: PathBuf,

        /// Proforma invoice to include as comparison context.
        #[arg(long)]
        proforma: Option<PathBuf>,

        #[command(flatten)]
        request: RequestArgs,
    },
    /// Generate a purchase-order PDF from a proforma invoice.
    Generate {
        /// Proforma invoice file.
        #[arg(long)]
        proforma: PathBuf,

        /// Directory the PO PDF is written into.
        #[arg(long, default_value = "./purchase_orders")]
        out_dir: PathBuf,

        #[command(flatten)]
        request: RequestArgs,
    },
}

/// Fields of the purchase request being processed.
#[derive(clap::Args, Debug)]
struct RequestArgs {
    /// Request identifier (used in the PO file name).
    #[arg(long, default_value_t = 0)]
    id: i64,

    /// Request title.
    #[arg(long)]
    title: String,

    /// Request description (vendor and items, free text).
    #[arg(long)]
    description: String,

    /// Approved amount, e.g. 500.00.
    #[arg(long)]
    amount: Decimal,
}

impl RequestArgs {
    fn into_request(self, proforma: Option<Attachment>) -> PurchaseRequest {
        PurchaseRequest {
            id: self.id,
            title: self.title,
            description: self.description,
            amount: self.amount,
            status: RequestStatus::Approved,
            proforma,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    match cli.command {
        Command::Validate {
            receipt,
            proforma,
            request,
        } => {
            let receipt = Attachment::from_path(&receipt)
                .with_context(|| format!("failed to read receipt {}", receipt.display()))?;
            let proforma = match proforma {
                Some(path) => Some(
                    Attachment::from_path(&path)
                        .with_context(|| format!("failed to read proforma {}", path.display()))?,
                ),
                None => None,
            };
            let request = request.into_request(proforma);

            let verdict = validate_receipt(&request, &receipt, &config).await;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&verdict)?);
            } else {
                let tick = if verdict.is_valid {
                    green("✔ valid")
                } else {
                    red("✘ not valid")
                };
                println!(
                    "{tick}  {} {}",
                    bold(&format!("{}%", verdict.confidence_score)),
                    dim("confidence")
                );
                println!("{}", verdict.summary);
                for d in &verdict.discrepancies {
                    println!("  {} {:?}: {}", red("•"), d.kind, d.description);
                }
            }
            Ok(if verdict.is_valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::Generate {
            proforma,
            out_dir,
            request,
        } => {
            let proforma = Attachment::from_path(&proforma)
                .with_context(|| format!("failed to read proforma {}", proforma.display()))?;
            let request = request.into_request(Some(proforma));

            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("failed to create {}", out_dir.display()))?;
            let store = DirStore::new(&out_dir);

            let outcome = generate_purchase_order(&request, &store, &config).await;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else if outcome.success {
                let file = outcome.po_file.as_deref().unwrap_or("<unknown>");
                println!("{} {}", green("✔"), bold(file));
                if let Some(data) = &outcome.extracted_data {
                    if !data.is_draft() {
                        println!(
                            "{}",
                            dim("extraction degraded — document flagged for manual review")
                        );
                    }
                }
            } else {
                let error = outcome.error.as_deref().unwrap_or("unknown failure");
                println!("{} {}", red("✘"), error);
            }
            Ok(if outcome.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

/// Map CLI args to a `PipelineConfig`.
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder().api_timeout_secs(cli.api_timeout);

    if let Some(key) = &cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(base) = &cli.api_base {
        builder = builder.api_base(base);
    }
    if let Some(model) = &cli.model {
        builder = builder.model(model);
    }

    #[cfg(feature = "ocr")]
    if let Some(dir) = &cli.ocr_models {
        let backend = proforma2po::PureOcr::from_dir(dir)
            .with_context(|| format!("failed to load OCR models from {}", dir.display()))?;
        builder = builder.ocr(std::sync::Arc::new(backend));
    }
    #[cfg(not(feature = "ocr"))]
    if cli.ocr_models.is_some() {
        anyhow::bail!("this build has no OCR support; rebuild with --features ocr");
    }

    builder.build().context("Invalid configuration")
}
