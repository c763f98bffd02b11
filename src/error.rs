use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("failed to read {}", .path.display())]
    #[diagnostic(code(spoonfeeder::io::read))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}", .path.display())]
    #[diagnostic(code(spoonfeeder::io::write))]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}", .path.display())]
    #[diagnostic(
        code(spoonfeeder::config),
        help("see src/default_config.toml for the accepted keys")
    )]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown render mode `{0}`")]
    #[diagnostic(
        code(spoonfeeder::mode),
        help("expected one of: normal, math, code")
    )]
    UnknownMode(String),

    #[error("typst compilation failed: {0}")]
    #[diagnostic(code(spoonfeeder::typst))]
    Typst(String),

    #[error("PDF export failed: {0}")]
    #[diagnostic(code(spoonfeeder::pdf))]
    Pdf(String),

    #[error(transparent)]
    #[diagnostic(code(spoonfeeder::json))]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
