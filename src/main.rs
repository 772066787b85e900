//! # pdsgen CLI
//!
//! ```bash
//! # One PDF per data row, into <data dir>/PDS
//! pdsgen generate --layout layout.json --data people.json
//!
//! # Render row 3 only
//! pdsgen preview --layout layout.json --data people.json --row 3 -o row3.pdf
//!
//! # Print an example layout document
//! pdsgen example > layout.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use pdsgen::batch::BatchEvent;
use pdsgen::config::LayoutDocument;
use pdsgen::data::{self, DataSource};
use pdsgen::image_loader::ImageLoader;
use pdsgen::session::Session;
use pdsgen::PdsError;

/// pdsgen - lay out a page template and generate one PDF per spreadsheet row
#[derive(Parser, Debug)]
#[command(name = "pdsgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate one PDF per data row
    Generate {
        /// Layout document (JSON)
        #[arg(long, value_name = "FILE")]
        layout: PathBuf,

        /// Data source (JSON); defaults to the one the layout points at
        #[arg(long, value_name = "FILE")]
        data: Option<PathBuf>,

        /// Output directory (defaults to <data dir>/PDS)
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
    },
    /// Render a single row
    Preview {
        #[arg(long, value_name = "FILE")]
        layout: PathBuf,

        #[arg(long, value_name = "FILE")]
        data: Option<PathBuf>,

        /// Row number, starting at 1
        #[arg(long)]
        row: String,

        /// Output PDF file
        #[arg(short, long, default_value = "preview.pdf")]
        output: PathBuf,
    },
    /// Print an example layout document
    Example,
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), PdsError> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Generate { layout, data, out } => generate(&layout, data.as_deref(), out),
        Commands::Preview {
            layout,
            data,
            row,
            output,
        } => preview(&layout, data.as_deref(), &row, &output),
        Commands::Example => {
            println!("{}", LayoutDocument::example().to_json()?);
            Ok(())
        }
    }
}

/// A session with the layout applied and data bound: `data` when given,
/// else the layout's own data file.
fn open_session(layout: &Path, data: Option<&Path>) -> Result<Session, PdsError> {
    let mut session = Session::default();
    match data {
        Some(path) => {
            session.apply_document(&LayoutDocument::load(layout)?);
            session.load_data(path)?;
        }
        None => session.load_layout(layout)?,
    }
    if session.data().is_none() {
        return Err(PdsError::InvalidInput(
            "no data source: pass --data or set excel_path in the layout".to_string(),
        ));
    }
    Ok(session)
}

fn generate(layout: &Path, data: Option<&Path>, out: Option<PathBuf>) -> Result<(), PdsError> {
    let session = open_session(layout, data)?;
    let mut handle = session.start_batch(out)?;
    eprintln!("Writing {} PDF(s) to {}", handle.total(), handle.output_dir().display());

    while let Some(event) = handle.recv() {
        match event {
            BatchEvent::Progress {
                row,
                total,
                remaining,
            } => eprintln!("  {}/{}  ~{} s left", row + 1, total, remaining.as_secs()),
            BatchEvent::RowFailed { row, error } => eprintln!("  row {} failed: {}", row + 1, error),
            BatchEvent::Finished {
                output_dir,
                written,
                failed,
            } => {
                eprintln!(
                    "✓ {} written, {} failed, in {}",
                    written,
                    failed,
                    output_dir.display()
                );
            }
        }
    }
    Ok(())
}

fn preview(layout: &Path, data: Option<&Path>, row: &str, output: &Path) -> Result<(), PdsError> {
    let session = open_session(layout, data)?;
    let source: &DataSource = session
        .data()
        .ok_or_else(|| PdsError::InvalidInput("no data source loaded".to_string()))?;
    let index = data::parse_row_number(row, source.row_count())?;
    let images = ImageLoader::new(source.base_dir());
    let bytes = pdsgen::render_row(session.template(), source, index, &images)?;
    fs::write(output, &bytes)?;
    eprintln!("✓ Written {} bytes to {}", bytes.len(), output.display());
    Ok(())
}
