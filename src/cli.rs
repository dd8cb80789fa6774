use crate::config::{load_config, merge_config};
use crate::layout::compute_layout;
use crate::layout_dump::write_layout_dump;
use crate::parser::parse_fragment_tree;
use crate::text_metrics;
use anyhow::{Context, Result};
use clap::Parser;
use std::collections::BTreeSet;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "flowgrid",
    version,
    about = "Lays out control-flow diagrams from a fragment tree"
)]
pub struct Args {
    /// Fragment tree (.json / .json5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Layout dump output file. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config JSON file (theme, skin, flow and colors sections)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Group id to draw collapsed; may be repeated
    #[arg(long = "collapse", value_name = "ID")]
    pub collapse: Vec<String>,

    /// Keep comments only as minimized markers
    #[arg(long = "hide-comments")]
    pub hide_comments: bool,

    /// Measure text with monospace arithmetic instead of font files
    #[arg(long = "fast-text")]
    pub fast_text: bool,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let mut config = load_config(args.config.as_deref())?;
    let input = read_input(args.input.as_deref())?;
    let parsed = parse_fragment_tree(&input).context("failed to read the fragment tree")?;
    if let Some(overrides) = parsed.config {
        config = merge_config(config, overrides)?;
    }
    if args.hide_comments {
        config.layout.flow.hide_comments = true;
    }
    if args.fast_text {
        config.layout.fast_text_metrics = true;
    }

    let collapsed: BTreeSet<String> = args.collapse.into_iter().collect();
    let metrics = text_metrics::for_config(&config.layout);
    let layout = compute_layout(&parsed.module, &config.layout, metrics.as_ref(), &collapsed)?;
    for warning in &layout.warnings {
        eprintln!("warning: {warning}");
    }
    write_layout_dump(args.output.as_deref(), &layout, &config.theme)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber may already be installed when embedded in another binary.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()));
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
