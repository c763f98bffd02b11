use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use spoonfeeder::{Config, Error, RenderMode};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Html,
    Typst,
    Pdf,
    Json,
}

#[derive(Parser)]
#[command(name = "spoonfeeder")]
#[command(about = "Render note and question text to HTML, Typst, PDF or JSON")]
struct Cli {
    /// Input text file, or `-` for stdin
    input: PathBuf,

    /// Output file (stdout by default; PDF defaults to the input name with .pdf extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// How math and code are treated (defaults to the config file's value)
    #[arg(short, long, value_enum)]
    mode: Option<RenderMode>,

    #[arg(short, long, value_enum, default_value = "html")]
    format: Format,

    /// Emit a complete HTML page instead of a fragment
    #[arg(long)]
    standalone: bool,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::compiled_default(),
    };
    if cli.standalone {
        config.html.standalone = true;
    }
    let mode = cli.mode.unwrap_or(config.render.mode);

    let source = read_input(&cli.input)?;
    tracing::debug!(?mode, format = ?cli.format, "rendering {}", cli.input.display());

    let bytes = match cli.format {
        Format::Html => spoonfeeder::render_html(&source, mode, &config).into_bytes(),
        Format::Typst => spoonfeeder::render_typst(&source, mode, &config).into_bytes(),
        Format::Json => {
            let mut json = spoonfeeder::render_json(&source, mode)?;
            json.push('\n');
            json.into_bytes()
        }
        Format::Pdf => spoonfeeder::render_pdf(&source, mode, &config)?,
    };

    let output = match (cli.output, cli.format) {
        (Some(path), _) => Some(path),
        (None, Format::Pdf) if !is_stdin(&cli.input) => Some(cli.input.with_extension("pdf")),
        (None, _) => None,
    };

    match output {
        Some(path) => {
            fs::write(&path, bytes).map_err(|source| Error::Write {
                path: path.clone(),
                source,
            })?;
            println!("Created {}", path.display());
        }
        None => io::stdout().write_all(&bytes).into_diagnostic()?,
    }

    Ok(())
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn read_input(path: &Path) -> Result<String, Error> {
    if is_stdin(path) {
        let mut source = String::new();
        io::stdin()
            .read_to_string(&mut source)
            .map_err(|source| Error::Read {
                path: path.to_path_buf(),
                source,
            })?;
        return Ok(source);
    }
    fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}
