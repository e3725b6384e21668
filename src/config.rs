/// Configuration for the generation pipeline.
///
/// Every field has a default matching the stock GOST layout, so most
/// callers only override `entry`.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Name of the function to render.
    pub entry: String,
    /// Space added around the drawing in the viewBox.
    pub padding: f64,
    /// Horizontal centre of the start terminator.
    pub origin_x: f64,
    /// Top edge of the start terminator.
    pub origin_y: f64,
    /// Check CFG invariants before rendering.
    pub validate: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            entry: "main".to_string(),
            padding: 60.0,
            origin_x: 700.0,
            origin_y: 100.0,
            validate: true,
        }
    }
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same defaults, different entry function.
    pub fn with_entry(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            ..Self::default()
        }
    }
}
