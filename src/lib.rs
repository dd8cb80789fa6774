pub mod annotation;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod parser;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use layout::{Layout, LayoutError, compute_layout};
pub use parser::{ParseError, parse_fragment_tree};

use std::collections::BTreeSet;

use config::{Config, merge_config};
use layout_dump::LayoutDump;

/// Lays out a fragment tree document in one call. Overrides embedded in the
/// document are applied on top of `config`.
pub fn layout_with_config(
    input: &str,
    config: Config,
    collapsed: &BTreeSet<String>,
) -> anyhow::Result<LayoutDump> {
    let parsed = parse_fragment_tree(input)?;
    let config = match parsed.config {
        Some(overrides) => merge_config(config, overrides)?,
        None => config,
    };
    let metrics = text_metrics::for_config(&config.layout);
    let layout = compute_layout(&parsed.module, &config.layout, metrics.as_ref(), collapsed)?;
    Ok(LayoutDump::from_layout(&layout, &config.theme))
}
