//! gost-flowchart CLI entry point.

mod tracing_config;

use std::fs;
use std::io::{self, Read, Write};
use std::process;

use clap::Parser;
use serde_json::{Value, json};

use gost_flowchart::cfg::debug::dump;
use gost_flowchart::{RenderConfig, build_flowchart, generate_svg_with};

/// C AST (JSON) to GOST 19.701-90 SVG flowchart.
#[derive(Parser, Debug)]
#[command(
    name = "gost-flowchart",
    version = env!("GOST_FLOWCHART_VERSION"),
    about = "C AST (JSON) to GOST 19.701-90 SVG flowchart"
)]
struct Cli {
    /// Input file (reads from stdin if not provided)
    input: Option<String>,

    /// Write output to this file instead of stdout
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Function to draw
    #[arg(short = 'e', long = "entry", default_value = "main")]
    entry: String,

    /// Space around the drawing in the viewBox
    #[arg(short = 'p', long = "padding", default_value = "60")]
    padding: f64,

    /// Read a {"ast": ...} request and write a {"svg": ..., "metadata": ...} response
    #[arg(long = "json")]
    json: bool,

    /// Print the control flow graph instead of SVG
    #[arg(long = "dump-graph")]
    dump_graph: bool,

    /// Skip the structural check of the graph before rendering
    #[arg(long = "no-validate")]
    no_validate: bool,
}

fn main() {
    tracing_config::init_tracing();
    let cli = Cli::parse();

    // Read input from file or stdin
    let text = if let Some(ref path) = cli.input {
        match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => fail(cli.json, &format!("cannot read '{}': {}", path, e)),
        }
    } else {
        let mut buf = String::new();
        if let Err(e) = io::stdin().read_to_string(&mut buf) {
            fail(cli.json, &format!("cannot read stdin: {}", e));
        }
        buf
    };

    let ast = if cli.json {
        match unwrap_request(&text) {
            Ok(ast) => ast,
            Err(msg) => fail(true, &msg),
        }
    } else {
        text
    };

    let rendered = if cli.dump_graph {
        match build_flowchart(&ast, &cli.entry) {
            Ok(chart) => dump(&chart),
            Err(e) => fail(cli.json, &e.to_string()),
        }
    } else {
        let config = RenderConfig {
            entry: cli.entry.clone(),
            padding: cli.padding,
            validate: !cli.no_validate,
            ..RenderConfig::default()
        };
        match generate_svg_with(&ast, &config) {
            Ok(svg) if cli.json => json!({
                "svg": svg,
                "metadata": { "success": true, "svgLength": svg.chars().count() },
            })
            .to_string(),
            Ok(svg) => svg,
            Err(e) => fail(cli.json, &e.to_string()),
        }
    };

    // Write output to file or stdout
    if let Some(ref path) = cli.output {
        if let Err(e) = fs::write(path, rendered) {
            fail(cli.json, &format!("cannot write '{}': {}", path, e));
        }
    } else {
        print!("{}", rendered);
        if let Err(e) = io::stdout().flush() {
            eprintln!("error: cannot flush stdout: {}", e);
            process::exit(1);
        }
    }
}

/// Pull the AST document out of a `{"ast": ...}` request.
fn unwrap_request(text: &str) -> Result<String, String> {
    let request: Value =
        serde_json::from_str(text).map_err(|e| format!("invalid request JSON: {}", e))?;
    match request.get("ast") {
        Some(ast) if !ast.is_null() => Ok(ast.to_string()),
        _ => Err("Missing 'ast' field in request".to_string()),
    }
}

fn fail(json_mode: bool, msg: &str) -> ! {
    if json_mode {
        println!(
            "{}",
            json!({ "metadata": { "success": false, "error": msg } })
        );
    } else {
        eprintln!("error: {}", msg);
    }
    process::exit(1);
}
