//! AST → CFG translation for the entry function.
//!
//! Statements are translated into fragments identified by their first node and
//! stitched with `link`, which attaches the next fragment at the outflow of the
//! previous one: a process's `next`, a decision's post-merge `next`, a loop's
//! `exit` slot. A closing pass (`connect_to_end`) hooks every remaining leaf to
//! the single end terminal.

use std::collections::HashSet;

use tracing::{debug, trace, warn};

use crate::ast::{
    ElseIfClause, Expr, ForStmt, FunctionDecl, IfStmt, Location, LoopStmt, Program, Stmt,
};
use crate::cfg::{Flowchart, JumpKind, NodeId, NodeKind};
use crate::error::{FlowchartError, Result};
use crate::format::format_expr;

/// Build the flowchart of the function named `entry`.
pub fn build_program(program: &Program, entry: &str) -> Result<Flowchart> {
    let Some(func) = program.function(entry) else {
        let available: Vec<&str> = program.functions().map(|f| f.name.as_str()).collect();
        debug!(entry, ?available, "entry function not found");
        return Err(FlowchartError::MissingEntry {
            name: entry.to_string(),
        });
    };
    FlowchartBuilder::new(func).build()
}

pub struct FlowchartBuilder<'a> {
    func: &'a FunctionDecl,
    chart: Flowchart,
    /// Innermost enclosing loop header last.
    loops: Vec<NodeId>,
}

impl<'a> FlowchartBuilder<'a> {
    pub fn new(func: &'a FunctionDecl) -> Self {
        let location = located(func.location, "FunctionDecl");
        Self {
            func,
            chart: Flowchart::new(&func.name, location),
            loops: Vec::new(),
        }
    }

    pub fn build(mut self) -> Result<Flowchart> {
        debug!(function = %self.func.name, "building flowchart");
        let start = self.chart.start();
        let end = self.chart.end();

        let body = match self.func.body.as_deref() {
            Some(stmt) => self.translate(stmt)?,
            None => None,
        };

        match body {
            Some(root) => {
                self.chart.node_mut(start).next.push(root);
                let mut visited = HashSet::new();
                self.connect_to_end(root, &mut visited);
            }
            None => self.chart.node_mut(start).next.push(end),
        }

        debug!(nodes = self.chart.len(), "flowchart built");
        Ok(self.chart)
    }

    // ── Statements ───────────────────────────────────────────────────────────

    /// Translate one statement; `None` for statements that produce no node
    /// (empty blocks).
    fn translate(&mut self, stmt: &Stmt) -> Result<Option<NodeId>> {
        let node = match stmt {
            Stmt::Block(block) => return self.translate_block(&block.statements),
            Stmt::VarDecl(decl) => {
                let mut label = format!("{} {}", decl.var_type, decl.name);
                if let Some(init) = &decl.init_expr {
                    label.push_str(" = ");
                    label.push_str(&expr_label(Some(init))?);
                }
                self.process(label, false, decl.location, stmt.kind())
            }
            Stmt::Expr(expr) => {
                let label = expr_label(expr.expression.as_ref())?;
                self.process(label, false, expr.location, stmt.kind())
            }
            Stmt::Return(ret) => {
                let label = match &ret.value {
                    Some(value) => format!("return {}", expr_label(Some(value))?),
                    None => "return".to_string(),
                };
                self.process(label, true, ret.location, stmt.kind())
            }
            Stmt::If(if_stmt) => self.translate_if(if_stmt)?,
            Stmt::While(while_stmt) => self.translate_while(while_stmt)?,
            Stmt::DoWhile(do_while) => self.translate_do_while(do_while)?,
            Stmt::For(for_stmt) => return self.translate_for(for_stmt).map(Some),
            Stmt::Break(jump) => self.connector(JumpKind::Break, jump.location),
            Stmt::Continue(jump) => self.connector(JumpKind::Continue, jump.location),
            Stmt::Function(_) | Stmt::Unsupported { .. } => {
                return Err(FlowchartError::UnsupportedStatement {
                    kind: stmt.kind().to_string(),
                });
            }
        };
        Ok(Some(node))
    }

    fn translate_block(&mut self, statements: &[Stmt]) -> Result<Option<NodeId>> {
        let mut first: Option<NodeId> = None;
        let mut prev: Option<NodeId> = None;

        for (i, stmt) in statements.iter().enumerate() {
            if let Some(p) = prev {
                if !self.is_open(p) {
                    warn!(
                        dropped = statements.len() - i,
                        line = stmt.location().map(|l| l.line),
                        kind = stmt.kind(),
                        "unreachable statements after return/break/continue"
                    );
                    break;
                }
            }

            let Some(node) = self.translate(stmt)? else {
                continue;
            };
            if first.is_none() {
                first = Some(node);
            }
            if let Some(p) = prev {
                self.link(p, node);
            }
            prev = Some(node);
        }

        Ok(first)
    }

    fn translate_if(&mut self, stmt: &IfStmt) -> Result<NodeId> {
        let decision = self.decision(stmt.condition.as_ref(), stmt.location, "IfStmt")?;
        let then_branch = self.translate_opt(stmt.then_block.as_deref())?;
        let else_branch = self.translate_else(&stmt.else_if, stmt.else_block.as_deref())?;
        self.set_branches(decision, then_branch, else_branch);
        Ok(decision)
    }

    /// An `else if` chain nests as decisions in the false branch.
    fn translate_else(
        &mut self,
        clauses: &[ElseIfClause],
        else_block: Option<&Stmt>,
    ) -> Result<Option<NodeId>> {
        let Some((clause, rest)) = clauses.split_first() else {
            return self.translate_opt(else_block);
        };
        let decision =
            self.decision(clause.condition.as_ref(), clause.location, "ElseIfClause")?;
        let then_branch = self.translate_opt(clause.block.as_deref())?;
        let else_branch = self.translate_else(rest, else_block)?;
        self.set_branches(decision, then_branch, else_branch);
        Ok(Some(decision))
    }

    fn translate_while(&mut self, stmt: &LoopStmt) -> Result<NodeId> {
        let label = expr_label(stmt.condition.as_ref())?;
        let location = located(stmt.location, "WhileStmt");
        let header = self.chart.add(
            NodeKind::PreTestLoop {
                body: None,
                exit: None,
            },
            label,
            location,
        );

        let body = self.in_loop(header, |b| b.translate_opt(stmt.body.as_deref()))?;
        let body = self.close_loop_body(body, header);
        self.set_loop_body(header, body);
        Ok(header)
    }

    fn translate_do_while(&mut self, stmt: &LoopStmt) -> Result<NodeId> {
        let label = expr_label(stmt.condition.as_ref())?;
        let location = located(stmt.location, "DoWhileStmt");
        let header = self.chart.add(
            NodeKind::PostTestLoop {
                body: None,
                exit: None,
            },
            label,
            location,
        );

        let body = self.in_loop(header, |b| b.translate_opt(stmt.body.as_deref()))?;
        let body = self.close_loop_body(body, header);
        self.set_loop_body(header, body);
        Ok(header)
    }

    /// `init; while (cond) { body; post; }`. Returns the first node of the
    /// fragment: the init process when present, otherwise the loop header.
    fn translate_for(&mut self, stmt: &ForStmt) -> Result<NodeId> {
        let init = self.translate_opt(stmt.init.as_deref())?;

        let label = match &stmt.condition {
            Some(cond) => expr_label(Some(cond))?,
            None => "true".to_string(),
        };
        let location = located(stmt.location, "ForStmt");
        let header = self.chart.add(
            NodeKind::PreTestLoop {
                body: None,
                exit: None,
            },
            label,
            location,
        );

        let (body, post) = self.in_loop(header, |b| {
            let body = b.translate_opt(stmt.body.as_deref())?;
            let post = b.translate_opt(stmt.post.as_deref())?;
            Ok((body, post))
        })?;

        let body = match (body, post) {
            (Some(b), Some(p)) => {
                if self.is_open(b) {
                    self.link(b, p);
                }
                Some(b)
            }
            (b, p) => b.or(p),
        };
        let body = self.close_loop_body(body, header);
        self.set_loop_body(header, body);

        match init {
            Some(init) => {
                self.link(init, header);
                Ok(init)
            }
            None => Ok(header),
        }
    }

    /// Run `f` with `header` as the innermost enclosing loop.
    fn in_loop<T>(
        &mut self,
        header: NodeId,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.loops.push(header);
        let result = f(self);
        self.loops.pop();
        result
    }

    fn translate_opt(&mut self, stmt: Option<&Stmt>) -> Result<Option<NodeId>> {
        match stmt {
            Some(s) => self.translate(s),
            None => Ok(None),
        }
    }

    // ── Node constructors ────────────────────────────────────────────────────

    fn process(
        &mut self,
        label: String,
        is_return: bool,
        location: Option<Location>,
        kind: &str,
    ) -> NodeId {
        let location = located(location, kind);
        self.chart.add(NodeKind::Process { is_return }, label, location)
    }

    fn decision(
        &mut self,
        condition: Option<&Expr>,
        location: Option<Location>,
        kind: &str,
    ) -> Result<NodeId> {
        let label = expr_label(condition)?;
        let location = located(location, kind);
        Ok(self.chart.add(
            NodeKind::Decision {
                true_branch: None,
                false_branch: None,
            },
            label,
            location,
        ))
    }

    fn connector(&mut self, jump: JumpKind, location: Option<Location>) -> NodeId {
        let target = self.loops.last().copied();
        if target.is_none() {
            warn!(jump = jump.as_str(), "jump statement outside of a loop");
        }
        let location = location.unwrap_or_default();
        self.chart
            .add(NodeKind::Connector { jump, target }, jump.as_str(), location)
    }

    fn set_branches(&mut self, decision: NodeId, t: Option<NodeId>, f: Option<NodeId>) {
        if let NodeKind::Decision {
            true_branch,
            false_branch,
        } = &mut self.chart.node_mut(decision).kind
        {
            *true_branch = t;
            *false_branch = f;
        }
    }

    fn set_loop_body(&mut self, header: NodeId, new_body: Option<NodeId>) {
        match &mut self.chart.node_mut(header).kind {
            NodeKind::PreTestLoop { body, .. } | NodeKind::PostTestLoop { body, .. } => {
                *body = new_body;
            }
            _ => {}
        }
    }

    fn set_loop_exit(&mut self, header: NodeId, new_exit: NodeId) {
        match &mut self.chart.node_mut(header).kind {
            NodeKind::PreTestLoop { exit, .. } | NodeKind::PostTestLoop { exit, .. } => {
                *exit = Some(new_exit);
            }
            _ => {}
        }
    }

    /// Append the loop-back marker at the outflow of a loop body. A body that
    /// cannot fall through (ends in return/break/continue) gets none; an empty
    /// body is the marker itself.
    fn close_loop_body(&mut self, body: Option<NodeId>, header: NodeId) -> Option<NodeId> {
        let location = self.chart.node(header).location;
        match body {
            None => Some(self.chart.add(NodeKind::LoopBack { header }, "", location)),
            Some(b) if self.is_open(b) => {
                let back = self.chart.add(NodeKind::LoopBack { header }, "", location);
                self.link(b, back);
                Some(b)
            }
            Some(b) => Some(b),
        }
    }

    // ── Linking ──────────────────────────────────────────────────────────────

    /// Walk from the first node of a fragment to the node whose outflow is
    /// still unattached.
    fn tail(&self, from: NodeId) -> NodeId {
        let mut cur = from;
        let mut seen = HashSet::new();
        while seen.insert(cur) {
            let step = match self.chart.kind(cur) {
                NodeKind::Process { is_return: false } | NodeKind::Decision { .. } => {
                    self.chart.next(cur).first().copied()
                }
                NodeKind::PreTestLoop { exit, .. } | NodeKind::PostTestLoop { exit, .. } => *exit,
                _ => None,
            };
            match step {
                Some(n) => cur = n,
                None => break,
            }
        }
        cur
    }

    /// Can control fall out of this fragment into a following statement?
    fn is_open(&self, fragment: NodeId) -> bool {
        let tail = self.tail(fragment);
        match self.chart.kind(tail) {
            NodeKind::Process { is_return } => !is_return,
            NodeKind::Decision { .. }
            | NodeKind::PreTestLoop { .. }
            | NodeKind::PostTestLoop { .. } => true,
            _ => false,
        }
    }

    /// Attach `next` at the outflow of the fragment starting at `prev`.
    fn link(&mut self, prev: NodeId, next: NodeId) {
        let tail = self.tail(prev);
        trace!(prev = prev.index(), tail = tail.index(), next = next.index(), "link");
        match self.chart.kind(tail) {
            NodeKind::PreTestLoop { .. } | NodeKind::PostTestLoop { .. } => {
                self.set_loop_exit(tail, next);
            }
            NodeKind::Process { is_return: false } | NodeKind::Decision { .. } => {
                self.chart.node_mut(tail).next.push(next);
            }
            _ => {}
        }
    }

    // ── Finalization ─────────────────────────────────────────────────────────

    /// Hook every leaf to the end terminal. Decisions and loops are walked
    /// through their typed slots; a return always leads straight to the end.
    fn connect_to_end(&mut self, id: NodeId, visited: &mut HashSet<NodeId>) {
        if !visited.insert(id) {
            return;
        }
        let end = self.chart.end();

        match self.chart.kind(id).clone() {
            NodeKind::Process { is_return: true } => {
                let node = self.chart.node_mut(id);
                node.next.clear();
                node.next.push(end);
            }
            NodeKind::Terminal { is_start: false } | NodeKind::LoopBack { .. } => {}
            NodeKind::Connector { target, .. } => {
                if target.is_none() {
                    self.chart.node_mut(id).next.push(end);
                }
            }
            NodeKind::Decision {
                true_branch,
                false_branch,
            } => {
                for branch in [true_branch, false_branch].into_iter().flatten() {
                    self.connect_to_end(branch, visited);
                }
                self.connect_next(id, visited);
            }
            NodeKind::PreTestLoop { body, exit } | NodeKind::PostTestLoop { body, exit } => {
                if let Some(body) = body {
                    self.connect_to_end(body, visited);
                }
                match exit {
                    Some(exit) => self.connect_to_end(exit, visited),
                    None => self.set_loop_exit(id, end),
                }
            }
            NodeKind::Process { is_return: false } | NodeKind::Terminal { is_start: true } => {
                self.connect_next(id, visited);
            }
        }
    }

    fn connect_next(&mut self, id: NodeId, visited: &mut HashSet<NodeId>) {
        let next = self.chart.next(id).to_vec();
        if next.is_empty() {
            let end = self.chart.end();
            self.chart.node_mut(id).next.push(end);
        } else {
            for n in next {
                self.connect_to_end(n, visited);
            }
        }
    }
}

/// Label text of an expression; unknown kinds anywhere in the tree are an
/// error.
fn expr_label(expr: Option<&Expr>) -> Result<String> {
    if let Some(kind) = expr.and_then(Expr::find_unsupported) {
        return Err(FlowchartError::UnsupportedExpression {
            kind: kind.to_string(),
        });
    }
    Ok(format_expr(expr))
}

fn located(location: Option<Location>, kind: &str) -> Location {
    location.unwrap_or_else(|| {
        trace!(kind = kind, "missing location, using zero location");
        Location::default()
    })
}

#[cfg(test)]
#[path = "../../tests/rust/test_cfg_builder.rs"]
mod tests;
