//! Renderer trait and the SVG implementation.

pub mod svg;

pub use svg::SvgRenderer;

use crate::cfg::Flowchart;

/// Trait for flowchart renderers.
///
/// Layout and emission happen in one pass, so rendering records each node's
/// final position in the chart.
pub trait Renderer {
    fn render(&self, chart: &mut Flowchart) -> String;
}
