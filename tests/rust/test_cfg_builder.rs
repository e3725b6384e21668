use super::*;
use serde_json::{Value, json};

// ─── AST helpers ────────────────────────────────────────────────────────────

fn var(name: &str) -> Value {
    json!({ "type": "VariableExpr", "name": name })
}

fn int(value: i64) -> Value {
    json!({ "type": "IntLiteral", "value": value })
}

fn bin(op: &str, left: Value, right: Value) -> Value {
    json!({ "type": "BinaryExpr", "operator": op, "left": left, "right": right })
}

fn assign(name: &str, right: Value) -> Value {
    json!({ "type": "ExprStmt",
            "expression": { "type": "AssignmentExpr", "op": "=", "left": var(name), "right": right } })
}

fn decl(name: &str, init: Value) -> Value {
    json!({ "type": "VariableDecl",
            "varType": { "baseType": "int", "pointerLevel": 0, "arraySizes": [] },
            "name": name, "initExpr": init })
}

fn ret(value: Value) -> Value {
    json!({ "type": "ReturnStmt", "value": value })
}

fn block(statements: Value) -> Value {
    json!({ "type": "BlockStmt", "statements": statements })
}

fn program(statements: Value) -> Program {
    serde_json::from_value(json!({
        "type": "Program",
        "declarations": [{
            "type": "FunctionDecl",
            "name": "main",
            "returnType": { "baseType": "int", "pointerLevel": 0, "arraySizes": [] },
            "parameters": [],
            "body": block(statements),
        }],
    }))
    .expect("program should parse")
}

fn build(statements: Value) -> Flowchart {
    build_program(&program(statements), "main").expect("build should succeed")
}

fn first(chart: &Flowchart) -> NodeId {
    chart.next(chart.start())[0]
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[test]
fn test_empty_body_links_start_to_end() {
    let chart = build(json!([]));
    assert_eq!(chart.len(), 2);
    assert_eq!(chart.next(chart.start()), &[chart.end()]);
    assert_eq!(chart.label(chart.start()), "main");
    assert_eq!(chart.label(chart.end()), "end");
}

#[test]
fn test_missing_entry() {
    let err = build_program(&program(json!([])), "start").unwrap_err();
    assert!(matches!(err, FlowchartError::MissingEntry { ref name } if name == "start"));
    assert_eq!(err.to_string(), "start not found");
}

#[test]
fn test_return_links_to_end() {
    let chart = build(json!([ret(int(0))]));
    let node = first(&chart);
    assert_eq!(chart.label(node), "return 0");
    assert!(chart.is_return(node));
    assert_eq!(chart.next(node), &[chart.end()]);
}

#[test]
fn test_bare_return_label() {
    let chart = build(json!([ret(Value::Null)]));
    assert_eq!(chart.label(first(&chart)), "return");
}

#[test]
fn test_sequence_and_declaration_labels() {
    let chart = build(json!([decl("x", int(5)), decl("y", Value::Null), assign("y", var("x"))]));
    let a = first(&chart);
    let b = chart.next(a)[0];
    let c = chart.next(b)[0];
    assert_eq!(chart.label(a), "int x = 5");
    assert_eq!(chart.label(b), "int y");
    assert_eq!(chart.label(c), "y = x");
    assert_eq!(chart.next(c), &[chart.end()]);
}

#[test]
fn test_statements_after_return_are_dropped() {
    let chart = build(json!([ret(int(0)), assign("x", int(1))]));
    assert_eq!(chart.len(), 3);
}

#[test]
fn test_if_without_else() {
    let chart = build(json!([
        { "type": "IfStmt", "condition": bin(">", var("x"), int(0)),
          "thenBlock": assign("x", int(1)), "elseBlock": null },
        ret(var("x")),
    ]));
    let decision = first(&chart);
    assert_eq!(chart.label(decision), "x > 0");
    let (t, f) = chart.kind(decision).branches().expect("decision");
    let then = t.expect("then branch");
    assert!(f.is_none());
    assert_eq!(chart.label(then), "x = 1");

    let after = chart.decision_next(decision);
    assert_eq!(after.len(), 1);
    assert_eq!(chart.label(after[0]), "return x");
    // branch leaves are closed onto the end terminal, not the merge
    assert_eq!(chart.next(then), &[chart.end()]);
}

#[test]
fn test_decision_at_tail_reaches_end() {
    let chart = build(json!([
        { "type": "IfStmt", "condition": var("c"),
          "thenBlock": block(json!([assign("a", int(1))])),
          "elseBlock": block(json!([assign("a", int(2))])) },
    ]));
    let decision = first(&chart);
    assert_eq!(chart.next(decision), &[chart.end()]);
    let (t, f) = chart.kind(decision).branches().expect("decision");
    assert_eq!(chart.next(t.expect("then")), &[chart.end()]);
    assert_eq!(chart.next(f.expect("else")), &[chart.end()]);
}

#[test]
fn test_else_if_chain_nests_in_false_branch() {
    let chart = build(json!([
        { "type": "IfStmt", "condition": var("a"),
          "thenBlock": assign("x", int(1)),
          "elseIf": [{ "condition": var("b"), "block": assign("x", int(2)) }],
          "elseBlock": assign("x", int(3)) },
    ]));
    let outer = first(&chart);
    let (_, f) = chart.kind(outer).branches().expect("decision");
    let inner = f.expect("else-if decision");
    assert_eq!(chart.label(inner), "b");
    let (t2, f2) = chart.kind(inner).branches().expect("decision");
    assert_eq!(chart.label(t2.expect("then")), "x = 2");
    assert_eq!(chart.label(f2.expect("else")), "x = 3");
    assert_eq!(chart.diamond_count(), 2);
}

#[test]
fn test_nested_if_in_else_block() {
    let chart = build(json!([
        { "type": "IfStmt", "condition": var("a"),
          "thenBlock": assign("x", int(1)),
          "elseBlock": { "type": "IfStmt", "condition": var("b"),
                         "thenBlock": assign("x", int(2)), "elseBlock": null } },
    ]));
    assert_eq!(chart.diamond_count(), 2);
}

#[test]
fn test_while_loop_slots() {
    let chart = build(json!([
        decl("i", int(0)),
        { "type": "WhileStmt", "condition": bin("<", var("i"), int(10)),
          "body": assign("i", bin("+", var("i"), int(1))) },
    ]));
    let init = first(&chart);
    let header = chart.next(init)[0];
    assert_eq!(chart.label(header), "i < 10");

    let (body, exit) = chart.kind(header).loop_slots().expect("loop");
    let body = body.expect("body");
    assert_eq!(chart.label(body), "i = i + 1");
    assert_eq!(exit, Some(chart.end()));

    let back = chart.next(body)[0];
    assert_eq!(chart.kind(back), &NodeKind::LoopBack { header });
}

#[test]
fn test_empty_loop_body_is_loop_back() {
    let chart = build(json!([
        { "type": "WhileStmt", "condition": var("busy"), "body": block(json!([])) },
    ]));
    let header = first(&chart);
    let (body, _) = chart.kind(header).loop_slots().expect("loop");
    assert!(chart.is_loop_back(body.expect("body")));
}

#[test]
fn test_loop_exit_continues_with_next_statement() {
    let chart = build(json!([
        { "type": "WhileStmt", "condition": var("c"), "body": assign("c", int(0)) },
        ret(int(1)),
    ]));
    let header = first(&chart);
    let (_, exit) = chart.kind(header).loop_slots().expect("loop");
    assert_eq!(chart.label(exit.expect("exit")), "return 1");
}

#[test]
fn test_for_loop_desugars_to_init_header_post() {
    let chart = build(json!([
        { "type": "ForStmt",
          "init": decl("i", int(0)),
          "condition": bin("<", var("i"), int(3)),
          "post": assign("i", bin("+", var("i"), int(1))),
          "body": block(json!([assign("s", var("i"))])) },
    ]));
    let init = first(&chart);
    assert_eq!(chart.label(init), "int i = 0");
    let header = chart.next(init)[0];
    assert!(matches!(chart.kind(header), NodeKind::PreTestLoop { .. }));

    let (body, exit) = chart.kind(header).loop_slots().expect("loop");
    let body = body.expect("body");
    assert_eq!(chart.label(body), "s = i");
    let post = chart.next(body)[0];
    assert_eq!(chart.label(post), "i = i + 1");
    assert!(chart.is_loop_back(chart.next(post)[0]));
    assert_eq!(exit, Some(chart.end()));
}

#[test]
fn test_for_loop_followed_by_statement() {
    let chart = build(json!([
        { "type": "ForStmt", "init": decl("i", int(0)), "condition": var("i"),
          "post": null, "body": block(json!([])) },
        ret(int(0)),
    ]));
    let init = first(&chart);
    let header = chart.next(init)[0];
    assert_eq!(chart.next(init).len(), 1);
    let (_, exit) = chart.kind(header).loop_slots().expect("loop");
    assert_eq!(chart.label(exit.expect("exit")), "return 0");
}

#[test]
fn test_for_loop_without_parts() {
    let chart = build(json!([
        { "type": "ForStmt", "init": null, "condition": null, "post": null,
          "body": block(json!([{ "type": "BreakStmt" }])) },
    ]));
    let header = first(&chart);
    assert_eq!(chart.label(header), "true");
    let (body, _) = chart.kind(header).loop_slots().expect("loop");
    assert_eq!(chart.jump_kind(body.expect("body")), Some(JumpKind::Break));
}

#[test]
fn test_break_targets_innermost_loop() {
    let chart = build(json!([
        { "type": "WhileStmt", "condition": var("a"), "body": block(json!([
            { "type": "WhileStmt", "condition": var("b"), "body": block(json!([
                { "type": "BreakStmt" }
            ])) },
        ])) },
    ]));
    let outer = first(&chart);
    let (outer_body, _) = chart.kind(outer).loop_slots().expect("loop");
    let inner = outer_body.expect("inner loop");
    let (inner_body, inner_exit) = chart.kind(inner).loop_slots().expect("loop");
    assert_eq!(
        chart.kind(inner_body.expect("break")),
        &NodeKind::Connector { jump: JumpKind::Break, target: Some(inner) }
    );
    assert!(chart.is_loop_back(inner_exit.expect("inner exit")));
}

#[test]
fn test_jump_outside_loop_falls_to_end() {
    let chart = build(json!([{ "type": "ContinueStmt" }]));
    let node = first(&chart);
    assert_eq!(
        chart.kind(node),
        &NodeKind::Connector { jump: JumpKind::Continue, target: None }
    );
    assert_eq!(chart.next(node), &[chart.end()]);
}

#[test]
fn test_do_while_body_and_exit() {
    let chart = build(json!([
        decl("i", int(0)),
        { "type": "DoWhileStmt", "condition": bin("<", var("i"), int(10)),
          "body": block(json!([assign("i", bin("+", var("i"), int(1)))])) },
    ]));
    let header = chart.next(first(&chart))[0];
    assert!(matches!(chart.kind(header), NodeKind::PostTestLoop { .. }));
    let (body, exit) = chart.kind(header).loop_slots().expect("loop");
    assert_eq!(chart.label(body.expect("body")), "i = i + 1");
    assert_eq!(exit, Some(chart.end()));
}

#[test]
fn test_return_inside_loop_goes_to_end() {
    let chart = build(json!([
        { "type": "WhileStmt", "condition": var("c"), "body": block(json!([ret(int(1))])) },
    ]));
    let (body, _) = chart.kind(first(&chart)).loop_slots().expect("loop");
    let body = body.expect("body");
    assert!(chart.is_return(body));
    assert_eq!(chart.next(body), &[chart.end()]);
}

#[test]
fn test_unsupported_statement() {
    let err = build_program(&program(json!([{ "type": "SwitchStmt" }])), "main").unwrap_err();
    assert!(matches!(err, FlowchartError::UnsupportedStatement { ref kind } if kind == "SwitchStmt"));
}

#[test]
fn test_unsupported_expression() {
    let statements = json!([
        { "type": "ExprStmt", "expression": bin("+", var("a"), json!({ "type": "FloatLiteral" })) }
    ]);
    let err = build_program(&program(statements), "main").unwrap_err();
    assert_eq!(err.to_string(), "unsupported expression: FloatLiteral");
}

#[test]
fn test_missing_locations_default_to_zero() {
    let chart = build(json!([ret(int(0))]));
    assert_eq!(chart.node(first(&chart)).location, Location::default());
}
