use super::*;
use crate::ast::Program;
use crate::cfg::builder::build_program;
use serde_json::{Value, json};

fn build(statements: Value) -> Flowchart {
    let program: Program = serde_json::from_value(json!({
        "type": "Program",
        "declarations": [{ "type": "FunctionDecl", "name": "main",
                           "body": { "type": "BlockStmt", "statements": statements } }],
    }))
    .expect("program should parse");
    build_program(&program, "main").expect("build should succeed")
}

#[test]
fn test_dump_empty_main() {
    let out = dump(&build(json!([])));
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "=== FLOWCHART GRAPH DUMP ===");
    assert_eq!(lines[1], "#0 TERMINAL \"main\"");
    assert_eq!(lines[2], "  [NEXT(1)]:");
    assert_eq!(lines[3], "    #1 TERMINAL \"end\"");
    assert!(lines.last().is_some_and(|l| l.starts_with("====")));
}

#[test]
fn test_dump_decision_slots_and_refs() {
    let out = dump(&build(json!([
        { "type": "IfStmt",
          "condition": { "type": "VariableExpr", "name": "c" },
          "thenBlock": { "type": "ReturnStmt", "value": { "type": "IntLiteral", "value": 1 } },
          "elseBlock": null },
    ])));
    assert!(out.contains("DECISION \"c\""));
    assert!(out.contains("[TRUE]:"));
    assert!(out.contains("[FALSE]:"));
    assert!(out.contains("(null)"));
    assert!(out.contains("PROCESS \"return 1\""));
    // the end terminal is reached from both the branch and the merge
    assert!(out.contains("-> [REF #"));
}

#[test]
fn test_dump_loop_sections() {
    let out = dump(&build(json!([
        { "type": "WhileStmt",
          "condition": { "type": "VariableExpr", "name": "go" },
          "body": { "type": "BlockStmt", "statements": [{ "type": "BreakStmt" }] } },
    ])));
    assert!(out.contains("LOOP \"go\""));
    assert!(out.contains("[BODY]:"));
    assert!(out.contains("[EXIT]:"));
    assert!(out.contains("CONNECTOR \"break\""));
}

#[test]
fn test_dump_loop_back_points_at_header() {
    let out = dump(&build(json!([
        { "type": "DoWhileStmt",
          "condition": { "type": "VariableExpr", "name": "go" },
          "body": { "type": "BlockStmt", "statements": [] } },
    ])));
    assert!(out.contains("DO_WHILE \"go\""));
    assert!(out.contains("LOOP_BACK"));
    assert!(out.contains("[TO]:"));
    assert!(out.contains("-> [REF #1 DO_WHILE \"go\"]"));
}
