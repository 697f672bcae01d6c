//! # Mailcraft CLI
//!
//! Command-line access to the template engine.
//!
//! ## Usage
//!
//! ```bash
//! # List print formats
//! mailcraft formats
//!
//! # Show variable fields in a saved template
//! mailcraft inspect template.json
//!
//! # Move a template to another format
//! mailcraft migrate template.json --to postcard_6x9 --strategy crop
//!
//! # Render a side as PNG
//! mailcraft thumbnail template.json --side back --out back.png
//! ```
//!
//! Logs go to stderr (`RUST_LOG=debug` for detail); results go to stdout.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use mailcraft::{
    EditorConfig, MailcraftError, PrintFormat, TemplateEditor,
    editor::SurfaceLayout,
    persist::{self, TemplateRecord},
    resize::ResizeStrategy,
    surface::Side,
};

/// Mailcraft - Print template utility
#[derive(Parser, Debug)]
#[command(name = "mailcraft")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Editor configuration (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the built-in print formats as JSON
    Formats,

    /// Load a template record and list its variable fields per side
    Inspect {
        /// Template or surface record (JSON)
        record: PathBuf,
    },

    /// Migrate a template record to another print format
    Migrate {
        /// Template or surface record (JSON)
        record: PathBuf,

        /// Target format id or custom:WxH[@DPI]
        #[arg(long)]
        to: String,

        /// scale, crop or reflow
        #[arg(long, default_value = "scale")]
        strategy: ResizeStrategy,
    },

    /// Render one side of a template record to PNG
    Thumbnail {
        /// Template or surface record (JSON)
        record: PathBuf,

        /// Output PNG path
        #[arg(long, value_name = "FILE")]
        out: PathBuf,

        /// Side to render
        #[arg(long, default_value = "front")]
        side: Side,

        /// Width in pixels, 16 to 2048 (defaults to the configured thumbnail width)
        #[arg(long)]
        width: Option<u32>,
    },
}

fn main() {
    init_tracing();
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<(), MailcraftError> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EditorConfig::from_json_file(path)?,
        None => EditorConfig::default(),
    };

    match cli.command {
        Commands::Formats => {
            println!("{}", serde_json::to_string_pretty(&PrintFormat::built_in())?);
        }

        Commands::Inspect { record } => {
            let mut editor = open(&record, config)?;
            let mut report = serde_json::Map::new();
            for &side in editor.layout().sides() {
                let surface = editor.surface(side)?;
                let fields: Vec<serde_json::Value> = surface
                    .objects()
                    .iter()
                    .filter(|o| !o.binding.is_none())
                    .map(|o| {
                        serde_json::json!({
                            "id": o.id,
                            "label": o.label(),
                            "variableType": o.binding.variable_type,
                            "isReusable": o.binding.is_reusable,
                            "fieldNames": o.binding.field_names,
                        })
                    })
                    .collect();
                report.insert(side.to_string(), serde_json::Value::Array(fields));
            }
            for notice in editor.take_notices() {
                tracing::warn!(level = ?notice.level, "{}", notice.message);
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Migrate { record, to, strategy } => {
            let mut editor = open(&record, config)?;
            let target = PrintFormat::parse(&to)?;
            let report = editor.change_format(target, strategy)?;
            for warning in &report.warnings {
                tracing::warn!("{}", warning);
            }
            let output = serde_json::json!({
                "record": editor.extract_template()?,
                "report": report,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Commands::Thumbnail {
            record,
            out,
            side,
            width,
        } => {
            let config = match width {
                Some(w) => config.with_thumbnail_width(w),
                None => config,
            };
            let width = config.thumbnail_width;
            let editor = open(&record, config)?;
            let surface = editor.surface(side)?;
            let png = persist::thumbnail::render_png(surface.objects(), surface.background_color(), editor.format(), width)?;
            std::fs::write(&out, png)?;
            println!("Saved to {}", out.display());
        }
    }

    Ok(())
}

/// Load a template (or bare surface) record into a fresh front/back editor.
fn open(path: &Path, config: EditorConfig) -> Result<TemplateEditor, MailcraftError> {
    let json = std::fs::read_to_string(path)?;
    let record: TemplateRecord = persist::parse_template_record(&json)?;
    let format = record.format()?;
    tracing::info!(path = %path.display(), format = %format.id, surfaces = record.surfaces.len(), "loading template");

    let mut editor = TemplateEditor::new(format, SurfaceLayout::Dual, config);
    editor.load_template(&record)?;
    Ok(editor)
}
