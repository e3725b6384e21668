use super::*;
use serde_json::json;

fn expr(value: serde_json::Value) -> Expr {
    serde_json::from_value(value).expect("expression should parse")
}

fn var(name: &str) -> serde_json::Value {
    json!({ "type": "VariableExpr", "name": name })
}

fn int(value: i64) -> serde_json::Value {
    json!({ "type": "IntLiteral", "value": value })
}

#[test]
fn test_missing_expression_is_question_mark() {
    assert_eq!(format_expr(None), "?");
}

#[test]
fn test_literals_and_names() {
    assert_eq!(expr_to_string(&expr(int(-42))), "-42");
    assert_eq!(expr_to_string(&expr(var("count"))), "count");
    assert_eq!(
        expr_to_string(&expr(json!({ "type": "Identifier", "name": "x" }))),
        "x"
    );
}

#[test]
fn test_binary_has_spaces_and_no_parentheses() {
    let e = expr(json!({
        "type": "BinaryExpr", "operator": "*",
        "left": { "type": "BinaryExpr", "operator": "+", "left": var("a"), "right": var("b") },
        "right": int(2)
    }));
    assert_eq!(expr_to_string(&e), "a + b * 2");
}

#[test]
fn test_binary_missing_operand() {
    let e = expr(json!({ "type": "BinaryExpr", "operator": "<", "left": var("i"), "right": null }));
    assert_eq!(expr_to_string(&e), "i < ?");
}

#[test]
fn test_unary_prefix_and_postfix() {
    let prefix = expr(json!({ "type": "UnaryExpr", "operator": "-", "operand": var("x"), "isPostfix": false }));
    let postfix = expr(json!({ "type": "UnaryExpr", "operator": "++", "operand": var("i"), "isPostfix": true }));
    assert_eq!(expr_to_string(&prefix), "-x");
    assert_eq!(expr_to_string(&postfix), "i++");
}

#[test]
fn test_assignment() {
    let e = expr(json!({ "type": "AssignmentExpr", "op": "=", "left": var("x"), "right": int(1) }));
    assert_eq!(expr_to_string(&e), "x = 1");
}

#[test]
fn test_call_arguments_are_comma_separated() {
    let e = expr(json!({ "type": "CallExpr", "functionName": "max", "arguments": [var("a"), int(3)] }));
    assert_eq!(expr_to_string(&e), "max(a, 3)");
    let none = expr(json!({ "type": "CallExpr", "functionName": "tick", "arguments": [] }));
    assert_eq!(expr_to_string(&none), "tick()");
}

#[test]
fn test_array_access_and_init() {
    let access = expr(json!({ "type": "ArrayAccessExpr", "array": var("a"), "index": var("i") }));
    assert_eq!(expr_to_string(&access), "a[i]");
    let init = expr(json!({ "type": "ArrayInitExpr", "elements": [int(1), int(2), int(3)] }));
    assert_eq!(expr_to_string(&init), "{1, 2, 3}");
}

#[test]
fn test_unknown_kind_prints_its_name() {
    let e = expr(json!({ "type": "TernaryExpr" }));
    assert_eq!(expr_to_string(&e), "TernaryExpr");
}

#[test]
fn test_type_spec_display() {
    assert_eq!(TypeSpec::named("int").to_string(), "int");
    let spec = TypeSpec {
        base_type: "char".to_string(),
        pointer_level: 2,
        array_sizes: vec![4, 8],
    };
    assert_eq!(spec.to_string(), "char**[4][8]");
}
