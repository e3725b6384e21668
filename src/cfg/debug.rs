//! Indented text dump of a flowchart, for `--dump-graph`.

use std::collections::HashMap;
use std::fmt::Write;

use crate::cfg::{Flowchart, NodeId, NodeKind};

/// Render the graph reachable from the start terminal as an indented tree.
/// A node already printed appears again only as `-> [REF #n ...]`.
pub fn dump(chart: &Flowchart) -> String {
    let mut out = String::new();
    let mut seen: HashMap<NodeId, usize> = HashMap::new();
    let _ = writeln!(out, "=== FLOWCHART GRAPH DUMP ===");
    visit(chart, Some(chart.start()), "", &mut seen, &mut out);
    let _ = writeln!(out, "============================");
    out
}

fn visit(
    chart: &Flowchart,
    node: Option<NodeId>,
    indent: &str,
    seen: &mut HashMap<NodeId, usize>,
    out: &mut String,
) {
    let Some(id) = node else {
        let _ = writeln!(out, "{indent}(null)");
        return;
    };
    if let Some(n) = seen.get(&id) {
        let _ = writeln!(out, "{indent}-> [REF #{n} {}]", describe(chart, id));
        return;
    }
    let n = seen.len();
    seen.insert(id, n);
    let _ = writeln!(out, "{indent}#{n} {}", describe(chart, id));

    let child = format!("{indent}    ");
    match *chart.kind(id) {
        NodeKind::PreTestLoop { body, exit } | NodeKind::PostTestLoop { body, exit } => {
            let _ = writeln!(out, "{indent}  [BODY]:");
            visit(chart, body, &child, seen, out);
            let _ = writeln!(out, "{indent}  [EXIT]:");
            visit(chart, exit, &child, seen, out);
            return;
        }
        NodeKind::Decision {
            true_branch,
            false_branch,
        } => {
            let _ = writeln!(out, "{indent}  [TRUE]:");
            visit(chart, true_branch, &child, seen, out);
            let _ = writeln!(out, "{indent}  [FALSE]:");
            visit(chart, false_branch, &child, seen, out);
        }
        NodeKind::LoopBack { header } => {
            let _ = writeln!(out, "{indent}  [TO]:");
            visit(chart, Some(header), &child, seen, out);
        }
        _ => {}
    }

    let next = chart.next(id);
    let _ = writeln!(out, "{indent}  [NEXT({})]:", next.len());
    for &n in next {
        visit(chart, Some(n), &child, seen, out);
    }
}

fn describe(chart: &Flowchart, id: NodeId) -> String {
    let node = chart.node(id);
    match node.kind {
        NodeKind::Connector { jump, .. } => format!("{} \"{}\"", node.kind.name(), jump.as_str()),
        _ => format!("{} \"{}\"", node.kind.name(), node.label),
    }
}

#[cfg(test)]
#[path = "../../tests/rust/test_cfg_debug.rs"]
mod tests;
