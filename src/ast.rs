//! AST input model.
//!
//! The upstream analyzer emits a JSON tree in which every node object carries a
//! `type` discriminator. Statements and expressions are tagged unions here;
//! they deserialize through `serde_json::Value` so that an unrecognised
//! discriminator becomes an `Unsupported { kind }` variant instead of a parse
//! failure. Unknown fields are ignored everywhere.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

// ── Shared leaves ────────────────────────────────────────────────────────────

/// Source range of a node. Missing or `null` locations become all zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Location {
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

/// `{ baseType, pointerLevel, arraySizes }`, e.g. `int*[10]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeSpec {
    pub base_type: String,
    pub pointer_level: usize,
    pub array_sizes: Vec<i64>,
}

impl TypeSpec {
    pub fn named(base: &str) -> Self {
        Self {
            base_type: base.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Parameter {
    #[serde(rename = "type")]
    pub param_type: TypeSpec,
    pub name: String,
    pub location: Option<Location>,
}

// ── Program / declarations ───────────────────────────────────────────────────

/// Root of the input document (`type: "Program"`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Program {
    pub declarations: Vec<Stmt>,
    pub location: Option<Location>,
}

impl Program {
    /// Parse a program from JSON text.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// First function declaration with the given name.
    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.declarations.iter().find_map(|decl| match decl {
            Stmt::Function(f) if f.name == name => Some(f),
            _ => None,
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.declarations.iter().filter_map(|decl| match decl {
            Stmt::Function(f) => Some(f),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FunctionDecl {
    pub name: String,
    pub return_type: TypeSpec,
    pub parameters: Vec<Parameter>,
    pub body: Option<Box<Stmt>>,
    pub location: Option<Location>,
}

// ── Statements ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockStmt {
    pub statements: Vec<Stmt>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariableDecl {
    pub var_type: TypeSpec,
    pub name: String,
    pub init_expr: Option<Expr>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExprStmt {
    pub expression: Option<Expr>,
    pub location: Option<Location>,
}

/// One `else if (cond) block` link of an if-chain.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElseIfClause {
    pub condition: Option<Expr>,
    pub block: Option<Box<Stmt>>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IfStmt {
    pub condition: Option<Expr>,
    pub then_block: Option<Box<Stmt>>,
    pub else_if: Vec<ElseIfClause>,
    pub else_block: Option<Box<Stmt>>,
    pub location: Option<Location>,
}

/// Shared shape of `WhileStmt` and `DoWhileStmt`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoopStmt {
    pub condition: Option<Expr>,
    pub body: Option<Box<Stmt>>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForStmt {
    pub init: Option<Box<Stmt>>,
    pub condition: Option<Expr>,
    pub post: Option<Box<Stmt>>,
    pub body: Option<Box<Stmt>>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub location: Option<Location>,
}

/// `BreakStmt` / `ContinueStmt` payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JumpStmt {
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Function(FunctionDecl),
    Block(BlockStmt),
    VarDecl(VariableDecl),
    Expr(ExprStmt),
    If(IfStmt),
    While(LoopStmt),
    DoWhile(LoopStmt),
    For(ForStmt),
    Return(ReturnStmt),
    Break(JumpStmt),
    Continue(JumpStmt),
    /// A discriminator this model does not know.
    Unsupported { kind: String },
}

impl Stmt {
    /// The `type` discriminator this variant was read from.
    pub fn kind(&self) -> &str {
        match self {
            Stmt::Function(_) => "FunctionDecl",
            Stmt::Block(_) => "BlockStmt",
            Stmt::VarDecl(_) => "VariableDecl",
            Stmt::Expr(_) => "ExprStmt",
            Stmt::If(_) => "IfStmt",
            Stmt::While(_) => "WhileStmt",
            Stmt::DoWhile(_) => "DoWhileStmt",
            Stmt::For(_) => "ForStmt",
            Stmt::Return(_) => "ReturnStmt",
            Stmt::Break(_) => "BreakStmt",
            Stmt::Continue(_) => "ContinueStmt",
            Stmt::Unsupported { kind } => kind,
        }
    }

    pub fn location(&self) -> Option<Location> {
        match self {
            Stmt::Function(s) => s.location,
            Stmt::Block(s) => s.location,
            Stmt::VarDecl(s) => s.location,
            Stmt::Expr(s) => s.location,
            Stmt::If(s) => s.location,
            Stmt::While(s) | Stmt::DoWhile(s) => s.location,
            Stmt::For(s) => s.location,
            Stmt::Return(s) => s.location,
            Stmt::Break(s) | Stmt::Continue(s) => s.location,
            Stmt::Unsupported { .. } => None,
        }
    }

    fn from_value(value: Value) -> serde_json::Result<Self> {
        let kind = discriminator(&value)?;
        let stmt = match kind.as_str() {
            "FunctionDecl" => Stmt::Function(serde_json::from_value(value)?),
            "BlockStmt" => Stmt::Block(serde_json::from_value(value)?),
            "VariableDecl" => Stmt::VarDecl(serde_json::from_value(value)?),
            "ExprStmt" => Stmt::Expr(serde_json::from_value(value)?),
            "IfStmt" => Stmt::If(serde_json::from_value(value)?),
            "WhileStmt" => Stmt::While(serde_json::from_value(value)?),
            "DoWhileStmt" => Stmt::DoWhile(serde_json::from_value(value)?),
            "ForStmt" => Stmt::For(serde_json::from_value(value)?),
            "ReturnStmt" => Stmt::Return(serde_json::from_value(value)?),
            "BreakStmt" => Stmt::Break(serde_json::from_value(value)?),
            "ContinueStmt" => Stmt::Continue(serde_json::from_value(value)?),
            // for-loop headers may carry a bare expression as init/post
            k if Expr::is_known_kind(k) => {
                let expr = Expr::from_value(value)?;
                let location = expr.location();
                Stmt::Expr(ExprStmt {
                    expression: Some(expr),
                    location,
                })
            }
            _ => Stmt::Unsupported { kind },
        };
        Ok(stmt)
    }
}

impl<'de> Deserialize<'de> for Stmt {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(de::Error::custom)
    }
}

// ── Expressions ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BinaryExpr {
    #[serde(alias = "op")]
    pub operator: String,
    pub left: Option<Box<Expr>>,
    pub right: Option<Box<Expr>>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnaryExpr {
    #[serde(alias = "op")]
    pub operator: String,
    pub operand: Option<Box<Expr>>,
    pub is_postfix: bool,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssignmentExpr {
    #[serde(alias = "operator")]
    pub op: String,
    pub left: Option<Box<Expr>>,
    pub right: Option<Box<Expr>>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallExpr {
    #[serde(alias = "function")]
    pub function_name: String,
    pub arguments: Vec<Expr>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArrayAccessExpr {
    pub array: Option<Box<Expr>>,
    pub index: Option<Box<Expr>>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArrayInitExpr {
    pub elements: Vec<Expr>,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntLiteral {
    pub value: i64,
    pub location: Option<Location>,
}

/// `VariableExpr` and `Identifier` payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NameExpr {
    pub name: String,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(IntLiteral),
    Variable(NameExpr),
    Identifier(NameExpr),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Assignment(AssignmentExpr),
    Call(CallExpr),
    ArrayAccess(ArrayAccessExpr),
    ArrayInit(ArrayInitExpr),
    Unsupported { kind: String },
}

const EXPR_KINDS: &[&str] = &[
    "IntLiteral",
    "VariableExpr",
    "Identifier",
    "BinaryExpr",
    "UnaryExpr",
    "AssignmentExpr",
    "CallExpr",
    "ArrayAccessExpr",
    "ArrayInitExpr",
];

impl Expr {
    pub fn is_known_kind(kind: &str) -> bool {
        EXPR_KINDS.contains(&kind)
    }

    pub fn kind(&self) -> &str {
        match self {
            Expr::Int(_) => "IntLiteral",
            Expr::Variable(_) => "VariableExpr",
            Expr::Identifier(_) => "Identifier",
            Expr::Binary(_) => "BinaryExpr",
            Expr::Unary(_) => "UnaryExpr",
            Expr::Assignment(_) => "AssignmentExpr",
            Expr::Call(_) => "CallExpr",
            Expr::ArrayAccess(_) => "ArrayAccessExpr",
            Expr::ArrayInit(_) => "ArrayInitExpr",
            Expr::Unsupported { kind } => kind,
        }
    }

    /// Kind name of the first `Unsupported` node in this tree, depth first.
    pub fn find_unsupported(&self) -> Option<&str> {
        let children: Vec<&Expr> = match self {
            Expr::Unsupported { kind } => return Some(kind),
            Expr::Int(_) | Expr::Variable(_) | Expr::Identifier(_) => Vec::new(),
            Expr::Binary(e) => [&e.left, &e.right].into_iter().flatten().map(|b| &**b).collect(),
            Expr::Unary(e) => e.operand.as_deref().into_iter().collect(),
            Expr::Assignment(e) => [&e.left, &e.right].into_iter().flatten().map(|b| &**b).collect(),
            Expr::Call(e) => e.arguments.iter().collect(),
            Expr::ArrayAccess(e) => [&e.array, &e.index].into_iter().flatten().map(|b| &**b).collect(),
            Expr::ArrayInit(e) => e.elements.iter().collect(),
        };
        children.into_iter().find_map(Expr::find_unsupported)
    }

    pub fn location(&self) -> Option<Location> {
        match self {
            Expr::Int(e) => e.location,
            Expr::Variable(e) | Expr::Identifier(e) => e.location,
            Expr::Binary(e) => e.location,
            Expr::Unary(e) => e.location,
            Expr::Assignment(e) => e.location,
            Expr::Call(e) => e.location,
            Expr::ArrayAccess(e) => e.location,
            Expr::ArrayInit(e) => e.location,
            Expr::Unsupported { .. } => None,
        }
    }

    fn from_value(value: Value) -> serde_json::Result<Self> {
        let kind = discriminator(&value)?;
        let expr = match kind.as_str() {
            "IntLiteral" => Expr::Int(serde_json::from_value(value)?),
            "VariableExpr" => Expr::Variable(serde_json::from_value(value)?),
            "Identifier" => Expr::Identifier(serde_json::from_value(value)?),
            "BinaryExpr" => Expr::Binary(serde_json::from_value(value)?),
            "UnaryExpr" => Expr::Unary(serde_json::from_value(value)?),
            "AssignmentExpr" => Expr::Assignment(serde_json::from_value(value)?),
            "CallExpr" => Expr::Call(serde_json::from_value(value)?),
            "ArrayAccessExpr" => Expr::ArrayAccess(serde_json::from_value(value)?),
            "ArrayInitExpr" => Expr::ArrayInit(serde_json::from_value(value)?),
            _ => Expr::Unsupported { kind },
        };
        Ok(expr)
    }
}

impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(de::Error::custom)
    }
}

fn discriminator(value: &Value) -> serde_json::Result<String> {
    match value.get("type").and_then(Value::as_str) {
        Some(kind) => Ok(kind.to_string()),
        None => Err(de::Error::custom("AST node without a `type` discriminator")),
    }
}

#[cfg(test)]
#[path = "../tests/rust/test_ast.rs"]
mod tests;
