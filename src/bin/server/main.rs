//! OCR Gateway server and CLI
//!
//! PaddleOCR text recognition and PP-Structure document analysis over HTTP,
//! or once from the command line.
//!
//! # Usage
//!
//! ## CLI Mode
//! ```bash
//! ocr-gateway ocr --file invoice.jpg --model-dir models
//! ocr-gateway ocr --url "https://example.com/report.pdf" --mode pdf-tables --output json
//! ```
//!
//! ## Server Mode
//! ```bash
//! OCR_LANGUAGE=ch ocr-gateway serve --model-dir models --port 8000
//! ```

mod cli;
mod config;
mod handlers;
mod server;

use clap::{Args, Parser, Subcommand};
use ocr_gateway::core::{ModelConfig, ModelOverrides};
use ocr_gateway::input::{InputLimits, InputSource};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "ocr-gateway")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "PaddleOCR / PP-Structure gateway via CLI or HTTP server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a single image or PDF via CLI
    Ocr {
        /// URL of the document to process
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        url: Option<String>,

        /// Local path of the document to process
        #[arg(long, conflicts_with = "url")]
        file: Option<PathBuf>,

        /// What to extract
        #[arg(long, value_enum, default_value = "text")]
        mode: cli::Mode,

        /// Output format
        #[arg(long, value_enum, default_value = "pretty")]
        output: cli::OutputFormat,

        #[command(flatten)]
        models: ModelArgs,

        #[command(flatten)]
        limits: LimitArgs,
    },
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(long, short, default_value = "8000", env = "OCR_PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0", env = "OCR_HOST")]
        host: String,

        /// Maximum concurrent engine calls (defaults to number of CPUs)
        #[arg(long, env = "OCR_WORKERS")]
        workers: Option<usize>,

        /// Load all models before accepting requests
        #[arg(long, env = "OCR_PRELOAD")]
        preload: bool,

        #[command(flatten)]
        models: ModelArgs,

        #[command(flatten)]
        limits: LimitArgs,
    },
}

/// Model location and execution options
#[derive(Args)]
struct ModelArgs {
    /// Directory holding the ONNX models and dictionaries
    #[arg(long = "model-dir", default_value = "models", env = "OCR_MODEL_DIR")]
    model_dir: PathBuf,

    /// OCR language (PaddleOCR language code)
    #[arg(long = "lang", default_value = "ch", env = "OCR_LANGUAGE")]
    language: String,

    /// Device to use (cpu, cuda, cuda:0, etc.)
    #[arg(long, default_value = "cpu", env = "OCR_DEVICE")]
    device: String,

    /// Text detection model (overrides the model directory)
    #[arg(long = "det-model", env = "OCR_DET_MODEL")]
    det_model: Option<PathBuf>,

    /// Text recognition model
    #[arg(long = "rec-model", env = "OCR_REC_MODEL")]
    rec_model: Option<PathBuf>,

    /// Character dictionary
    #[arg(long = "dict-path", env = "OCR_DICT_PATH")]
    dict_path: Option<PathBuf>,

    /// Document orientation classification model
    #[arg(long = "doc-orientation-model", env = "OCR_DOC_ORIENTATION_MODEL")]
    doc_orientation_model: Option<PathBuf>,

    /// Document unwarping model
    #[arg(long = "doc-unwarping-model", env = "OCR_DOC_UNWARPING_MODEL")]
    doc_unwarping_model: Option<PathBuf>,

    /// Text line orientation model
    #[arg(long = "textline-orientation-model", env = "OCR_TEXTLINE_ORIENTATION_MODEL")]
    textline_orientation_model: Option<PathBuf>,

    /// Layout detection model (enables the structure endpoints)
    #[arg(long = "layout-model", env = "OCR_LAYOUT_MODEL")]
    layout_model: Option<PathBuf>,

    /// Table structure recognition model
    #[arg(long = "table-model", env = "OCR_TABLE_MODEL")]
    table_structure_model: Option<PathBuf>,

    /// Table structure dictionary
    #[arg(long = "table-dict", env = "OCR_TABLE_DICT")]
    table_structure_dict: Option<PathBuf>,

    /// Formula recognition model
    #[arg(long = "formula-model", env = "OCR_FORMULA_MODEL")]
    formula_model: Option<PathBuf>,

    /// Formula tokenizer
    #[arg(long = "formula-tokenizer", env = "OCR_FORMULA_TOKENIZER")]
    formula_tokenizer: Option<PathBuf>,
}

impl ModelArgs {
    fn into_config(self) -> ModelConfig {
        ModelConfig::new(self.model_dir)
            .with_language(self.language)
            .with_device(self.device)
            .with_overrides(ModelOverrides {
                det_model: self.det_model,
                rec_model: self.rec_model,
                dict_path: self.dict_path,
                doc_orientation_model: self.doc_orientation_model,
                doc_unwarping_model: self.doc_unwarping_model,
                textline_orientation_model: self.textline_orientation_model,
                layout_model: self.layout_model,
                table_structure_model: self.table_structure_model,
                table_structure_dict: self.table_structure_dict,
                formula_model: self.formula_model,
                formula_tokenizer: self.formula_tokenizer,
            })
    }
}

/// Upload and download limits
#[derive(Args)]
struct LimitArgs {
    /// Maximum upload and download size in MiB
    #[arg(long = "max-upload-mb", default_value = "50", env = "OCR_MAX_UPLOAD_MB")]
    max_upload_mb: usize,

    /// Timeout for downloading remote documents, in seconds
    #[arg(long = "download-timeout", default_value = "30", env = "OCR_DOWNLOAD_TIMEOUT_SECS")]
    download_timeout_secs: u64,
}

impl LimitArgs {
    fn max_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }

    fn input_limits(&self) -> InputLimits {
        InputLimits {
            download_timeout: Duration::from_secs(self.download_timeout_secs),
            max_download_bytes: self.max_bytes(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    ocr_gateway::utils::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ocr {
            url,
            file,
            mode,
            output,
            models,
            limits,
        } => {
            let source = match (url, file) {
                (Some(url), _) => InputSource::Url(url),
                (None, Some(file)) => InputSource::Path(file),
                (None, None) => return Err("Either --url or --file must be provided".into()),
            };

            let config = config::GatewayConfig {
                model: models.into_config(),
                limits: limits.input_limits(),
                workers: Some(1),
            };
            cli::run(source, mode, output, &config).await?;
        }
        Commands::Serve {
            port,
            host,
            workers,
            preload,
            models,
            limits,
        } => {
            let config = config::ServerConfig {
                gateway: config::GatewayConfig {
                    model: models.into_config(),
                    limits: limits.input_limits(),
                    workers,
                },
                host,
                port,
                max_upload_bytes: limits.max_bytes(),
                preload,
            };

            info!("Starting server on {}:{}", config.host, config.port);
            server::run_server(config).await?;
        }
    }

    Ok(())
}
