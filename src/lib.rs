//! gost-flowchart: C-like AST (JSON) to GOST 19.701-90 SVG flowcharts.
//!
//! Public API: `generate_svg()`, `generate_svg_with()` and `build_flowchart()`.
//!
//! Pipeline: JSON → `ast::Program` → `cfg::Flowchart` → (validated by
//! `cfg::FlowGraph`) → `render::SvgRenderer`.

pub mod ast;
pub mod cfg;
pub mod config;
pub mod error;
pub mod format;
pub mod render;

#[cfg(feature = "wasm")]
pub mod wasm;

use tracing::debug;

pub use ast::Program;
pub use cfg::{FlowGraph, Flowchart};
pub use config::RenderConfig;
pub use error::{FlowchartError, Result};
pub use render::{Renderer, SvgRenderer};

/// Render the `main` function of an AST document with default settings.
pub fn generate_svg(json: &str) -> Result<String> {
    generate_svg_with(json, &RenderConfig::default())
}

/// Render the entry function named in `config`.
pub fn generate_svg_with(json: &str, config: &RenderConfig) -> Result<String> {
    let mut chart = build_flowchart(json, &config.entry)?;

    if config.validate {
        FlowGraph::from_flowchart(&chart).validate(&chart)?;
    }

    let svg = SvgRenderer::new(config.clone()).render(&mut chart);
    debug!(bytes = svg.len(), "svg rendered");
    Ok(svg)
}

/// Parse an AST document and build the CFG of function `entry`.
pub fn build_flowchart(json: &str, entry: &str) -> Result<Flowchart> {
    let program = Program::from_json(json)?;
    debug!(declarations = program.declarations.len(), "ast parsed");
    let chart = cfg::builder::build_program(&program, entry)?;
    debug!(entry, nodes = chart.len(), "cfg built");
    Ok(chart)
}
