use super::*;
use serde_json::json;

fn parse(value: serde_json::Value) -> Program {
    serde_json::from_value(value).expect("program should parse")
}

fn main_with(statements: serde_json::Value) -> serde_json::Value {
    json!({
        "type": "Program",
        "declarations": [{
            "type": "FunctionDecl",
            "name": "main",
            "returnType": { "baseType": "int", "pointerLevel": 0, "arraySizes": [] },
            "parameters": [],
            "body": { "type": "BlockStmt", "statements": statements },
        }],
    })
}

fn body(program: &Program) -> &[Stmt] {
    let func = program.function("main").expect("main");
    match func.body.as_deref() {
        Some(Stmt::Block(block)) => &block.statements,
        other => panic!("expected block body, got {:?}", other),
    }
}

#[test]
fn test_program_finds_function_by_name() {
    let program = parse(main_with(json!([])));
    assert!(program.function("main").is_some());
    assert!(program.function("helper").is_none());
    assert_eq!(program.functions().count(), 1);
}

#[test]
fn test_from_json_text() {
    let text = main_with(json!([])).to_string();
    let program = Program::from_json(&text).expect("parse");
    assert_eq!(program.declarations.len(), 1);
}

#[test]
fn test_function_signature_fields() {
    let program = parse(json!({
        "type": "Program",
        "declarations": [{
            "type": "FunctionDecl",
            "name": "sum",
            "returnType": { "baseType": "int", "pointerLevel": 1, "arraySizes": [] },
            "parameters": [
                { "type": { "baseType": "int", "pointerLevel": 0, "arraySizes": [4] }, "name": "xs" }
            ],
            "body": null,
        }],
    }));
    let func = program.function("sum").expect("sum");
    assert_eq!(func.return_type.pointer_level, 1);
    assert_eq!(func.parameters[0].name, "xs");
    assert_eq!(func.parameters[0].param_type.array_sizes, vec![4]);
    assert!(func.body.is_none());
}

#[test]
fn test_location_is_read_in_camel_case() {
    let program = parse(main_with(json!([
        { "type": "ReturnStmt", "value": null,
          "location": { "line": 3, "column": 5, "endLine": 3, "endColumn": 14 } }
    ])));
    let loc = body(&program)[0].location().expect("location");
    assert_eq!(loc.line, 3);
    assert_eq!(loc.end_column, 14);
}

#[test]
fn test_null_location_is_none() {
    let program = parse(main_with(json!([
        { "type": "BreakStmt", "location": null }
    ])));
    assert_eq!(body(&program)[0].location(), None);
}

#[test]
fn test_unknown_fields_are_ignored() {
    let program = parse(main_with(json!([
        { "type": "ReturnStmt", "value": { "type": "IntLiteral", "value": 0, "radix": 10 },
          "comment": "exit code", "scopeDepth": 1 }
    ])));
    match &body(&program)[0] {
        Stmt::Return(ret) => assert!(matches!(ret.value, Some(Expr::Int(IntLiteral { value: 0, .. })))),
        other => panic!("expected return, got {:?}", other),
    }
}

#[test]
fn test_unknown_statement_kind_is_kept() {
    let program = parse(main_with(json!([
        { "type": "SwitchStmt", "cases": [] }
    ])));
    let stmt = &body(&program)[0];
    assert_eq!(stmt, &Stmt::Unsupported { kind: "SwitchStmt".to_string() });
    assert_eq!(stmt.kind(), "SwitchStmt");
}

#[test]
fn test_unknown_expression_kind_is_kept() {
    let program = parse(main_with(json!([
        { "type": "ExprStmt", "expression": { "type": "FloatLiteral", "value": 1.5 } }
    ])));
    match &body(&program)[0] {
        Stmt::Expr(stmt) => {
            let expr = stmt.expression.as_ref().expect("expression");
            assert_eq!(expr.kind(), "FloatLiteral");
            assert_eq!(expr.find_unsupported(), Some("FloatLiteral"));
        }
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_missing_discriminator_is_an_error() {
    let result: serde_json::Result<Program> = serde_json::from_value(main_with(json!([
        { "value": 1 }
    ])));
    assert!(result.is_err());
}

#[test]
fn test_operator_aliases() {
    let program = parse(main_with(json!([
        { "type": "ExprStmt", "expression": {
            "type": "BinaryExpr", "op": "+",
            "left": { "type": "VariableExpr", "name": "a" },
            "right": { "type": "IntLiteral", "value": 1 } } },
        { "type": "ExprStmt", "expression": {
            "type": "AssignmentExpr", "operator": "+=",
            "left": { "type": "Identifier", "name": "a" },
            "right": { "type": "IntLiteral", "value": 2 } } },
        { "type": "ExprStmt", "expression": {
            "type": "CallExpr", "function": "printf", "arguments": [] } },
    ])));
    let exprs: Vec<&Expr> = body(&program)
        .iter()
        .filter_map(|s| match s {
            Stmt::Expr(e) => e.expression.as_ref(),
            _ => None,
        })
        .collect();
    assert!(matches!(exprs[0], Expr::Binary(b) if b.operator == "+"));
    assert!(matches!(exprs[1], Expr::Assignment(a) if a.op == "+="));
    assert!(matches!(exprs[2], Expr::Call(c) if c.function_name == "printf"));
}

#[test]
fn test_bare_expression_as_for_init() {
    let program = parse(main_with(json!([
        { "type": "ForStmt",
          "init": { "type": "AssignmentExpr", "op": "=",
                    "left": { "type": "VariableExpr", "name": "i" },
                    "right": { "type": "IntLiteral", "value": 0 } },
          "condition": null, "post": null,
          "body": { "type": "BlockStmt", "statements": [] } }
    ])));
    match &body(&program)[0] {
        Stmt::For(f) => assert!(matches!(f.init.as_deref(), Some(Stmt::Expr(_)))),
        other => panic!("expected for, got {:?}", other),
    }
}

#[test]
fn test_else_if_clauses() {
    let program = parse(main_with(json!([
        { "type": "IfStmt",
          "condition": { "type": "VariableExpr", "name": "a" },
          "thenBlock": { "type": "BlockStmt", "statements": [] },
          "elseIf": [
              { "condition": { "type": "VariableExpr", "name": "b" },
                "block": { "type": "BlockStmt", "statements": [] } }
          ],
          "elseBlock": null }
    ])));
    match &body(&program)[0] {
        Stmt::If(stmt) => {
            assert_eq!(stmt.else_if.len(), 1);
            assert!(stmt.else_block.is_none());
        }
        other => panic!("expected if, got {:?}", other),
    }
}

#[test]
fn test_find_unsupported_walks_nested_expressions() {
    let expr: Expr = serde_json::from_value(json!({
        "type": "CallExpr", "functionName": "f",
        "arguments": [
            { "type": "IntLiteral", "value": 1 },
            { "type": "BinaryExpr", "operator": "+",
              "left": { "type": "StringLiteral", "value": "x" },
              "right": { "type": "IntLiteral", "value": 2 } }
        ]
    }))
    .expect("expr");
    assert_eq!(expr.find_unsupported(), Some("StringLiteral"));

    let clean: Expr = serde_json::from_value(json!({
        "type": "ArrayAccessExpr",
        "array": { "type": "VariableExpr", "name": "a" },
        "index": { "type": "IntLiteral", "value": 0 }
    }))
    .expect("expr");
    assert_eq!(clean.find_unsupported(), None);
}
