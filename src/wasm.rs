//! WASM bindings for gost-flowchart.
//!
//! Exposes `generateSvg` and `generateSvgWithEntry` to JavaScript via wasm-bindgen.

use wasm_bindgen::prelude::*;

use crate::config::RenderConfig;

/// Render the `main` function of an AST JSON document.
#[wasm_bindgen(js_name = "generateSvg")]
pub fn generate_svg(json: &str) -> Result<String, JsError> {
    crate::generate_svg(json).map_err(|e| JsError::new(&e.to_string()))
}

/// Render the function named `entry`; an empty string means `main`.
#[wasm_bindgen(js_name = "generateSvgWithEntry")]
pub fn generate_svg_with_entry(json: &str, entry: &str) -> Result<String, JsError> {
    let config = if entry.is_empty() {
        RenderConfig::default()
    } else {
        RenderConfig::with_entry(entry)
    };
    crate::generate_svg_with(json, &config).map_err(|e| JsError::new(&e.to_string()))
}
