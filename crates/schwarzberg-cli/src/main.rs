//! `schwarzberg` command-line interface.
//!
//! `process` prints one JSON decision payload to stdout regardless of how
//! the run ended; diagnostics go to stderr via tracing. The exit code is 0
//! for `processed` and `skipped` (both are decisions) and 1 for `error`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use schwarzberg::core::{Pipeline, RedactionConfig, RunRequest, ScopedInput};
use schwarzberg::extract::PdftoppmRasterizer;
use schwarzberg::ocr::{default_backend_set, BackendMode};
use schwarzberg::render::PdfRenderer;
use schwarzberg::{DecisionPayload, RunStatus};

#[derive(Parser)]
#[command(name = "schwarzberg", version, about = "Redaction decision engine")]
struct Cli {
    /// TOML config file; built-in defaults are used when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose diagnostics on stderr (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available packs.
    Packs,
    /// Decide about one document and write the artifact when warranted.
    Process {
        /// Input document (PDF or image).
        input: PathBuf,

        /// Pack id, e.g. global.pci_lite.v1.
        #[arg(long)]
        pack: String,

        /// OCR backend selection: auto, combo, or an engine name. Overrides
        /// the SCHWARZBERG_OCR_BACKEND environment variable.
        #[arg(long = "ocr-backend")]
        ocr_backend: Option<String>,

        /// Directory for artifacts.
        #[arg(long, short, default_value = "out")]
        outdir: PathBuf,

        /// Write a review artifact with detections marked but legible,
        /// instead of redacting.
        #[arg(long)]
        highlight: bool,

        /// Treat the input as staged scratch data and delete it once the
        /// run has decided.
        #[arg(long)]
        scratch_input: bool,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "schwarzberg=info",
        1 => "schwarzberg=debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<RedactionConfig> {
    match path {
        Some(path) => RedactionConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(RedactionConfig::default()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Packs => {
            for id in config.registry().ids() {
                println!("{id}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Process {
            input,
            pack,
            ocr_backend,
            outdir,
            highlight,
            scratch_input,
        } => {
            let backends = default_backend_set();
            let rasterizer = PdftoppmRasterizer::default();
            let renderer = PdfRenderer;
            let pipeline = Pipeline::new(&config, &backends, &rasterizer, &renderer);

            let guard = scratch_input.then(|| ScopedInput::new(input.clone()));
            let request = RunRequest {
                input,
                pack_id: pack,
                backend_mode: BackendMode::resolve(ocr_backend.as_deref()),
                output_dir: outdir,
            };
            let result = if highlight {
                pipeline.run_highlight(&request)
            } else {
                pipeline.run_redaction(&request)
            };
            if let Err(err) = &result {
                error!("{err}");
            }
            drop(guard);

            let payload = DecisionPayload::from_run(&result);
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(match payload.status {
                RunStatus::Processed | RunStatus::Skipped => ExitCode::SUCCESS,
                RunStatus::Error => ExitCode::FAILURE,
            })
        }
    }
}
