//! Thin CLI front-end exposing the document engine's consumer-facing API
//! (§6) as subcommands. Owns no parsing/rendering logic of its own.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::CliConfig;

#[derive(Parser, Debug)]
#[command(name = "xmd", version, about = "Document engine CLI", long_about = None)]
struct Cli {
    /// Path to a TOML config file overriding renderer/tracker defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a document to an output format.
    Render {
        #[command(subcommand)]
        target: RenderTarget,
    },
    /// Parse a bounded LaTeX document into IR and print it as JSON.
    ParseLatex {
        /// Path to the LaTeX source file.
        file: PathBuf,
    },
    /// Diff two text files and print the resulting change hunks as JSON.
    Diff {
        /// Path to the original revision.
        a: PathBuf,
        /// Path to the proposed revision.
        b: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum RenderTarget {
    /// Render XMD source to preview HTML.
    Html {
        /// Path to the XMD source file.
        file: PathBuf,
    },
    /// Render XMD source to a complete LaTeX document.
    Latex {
        /// Path to the XMD source file.
        file: PathBuf,
        /// Emit a fragment with no preamble instead of a full document.
        #[arg(long)]
        fragment: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let config = match cli.config.as_deref().map(CliConfig::load) {
        Some(Ok(c)) => c,
        Some(Err(e)) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
        None => CliConfig::default(),
    };

    match run(cli.command, &config) {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, config: &CliConfig) -> Result<String, String> {
    match command {
        Command::Render { target: RenderTarget::Html { file } } => {
            let xmd = read_file(&file)?;
            let doc_id = doc_id_for(&file);
            let root = xmd_parse::parse_xmd(&doc_id, &xmd);
            Ok(xmd_render::render_html(&root, &config.html))
        }
        Command::Render { target: RenderTarget::Latex { file, fragment } } => {
            let xmd = read_file(&file)?;
            let doc_id = doc_id_for(&file);
            let root = xmd_parse::parse_xmd(&doc_id, &xmd);
            if fragment {
                Ok(xmd_latex::render_latex_fragment(&root, &config.latex))
            } else {
                Ok(xmd_latex::render_latex(&root, &config.latex))
            }
        }
        Command::ParseLatex { file } => {
            let latex = read_file(&file)?;
            let doc_id = doc_id_for(&file);
            let root = xmd_latex::parse_latex(&doc_id, &latex);
            serde_json::to_string_pretty(&root).map_err(|e| e.to_string())
        }
        Command::Diff { a, b } => {
            let original = read_file(&a)?;
            let next = read_file(&b)?;
            let session = xmd_track::TrackingSession::start_tracking_with_config(
                &original,
                &next,
                None,
                &config.tracker,
            );
            serde_json::to_string_pretty(&session.hunks).map_err(|e| e.to_string())
        }
    }
}

fn read_file(path: &PathBuf) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))
}

fn doc_id_for(path: &PathBuf) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("doc").to_string()
}
