//! SVG renderer: single-pass GOST 19.701-90 layout of a `Flowchart`.
//!
//! Nodes are positioned while they are drawn. Everything hangs off one vertical
//! axis: decisions spread their branches into side columns and merge below,
//! pre-test loops put their body in a column to the right and route the
//! back-arrow through a gutter right of the body, post-test loops draw the body
//! first and the condition underneath.
//!
//! `x` is always the horizontal centre of a shape, `y` its top edge. Arrows
//! stop 5 units short of the shape they point at. The end terminal is drawn
//! last, below wherever the final flow left off.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::cfg::{Flowchart, JumpKind, NodeId, NodeKind};
use crate::config::RenderConfig;
use crate::render::Renderer;

// ── Constants ────────────────────────────────────────────────────────────────

const PROCESS_WIDTH: f64 = 220.0;
const PROCESS_HEIGHT: f64 = 70.0;
const TERMINAL_WIDTH: f64 = 220.0;
const TERMINAL_HEIGHT: f64 = 60.0;
const DECISION_WIDTH: f64 = 220.0;
const DECISION_HEIGHT: f64 = 120.0;

const VERTICAL_SPACING: f64 = 80.0;
const HORIZONTAL_SPACING: f64 = 260.0;
const BREAK_HORIZONTAL_SPACING: f64 = 130.0;
const BACK_ARROW_MARGIN: f64 = 40.0;

/// Gap between an arrowhead and the shape it enters.
const ARROW_GAP: f64 = 5.0;

const YES: &str = "ДА";
const NO: &str = "НЕТ";

const STYLE: &str = "\
<style>
.shape  { fill: white; stroke: black; stroke-width: 2; }
.line   { stroke: black; stroke-width: 2; fill: none; }
.arrow  { stroke: black; stroke-width: 2; fill: none; marker-end: url(#arrow); }
.text   { font-family: Arial; font-size: 13px; text-anchor: middle; dominant-baseline: middle; }
.label  { font-family: Arial; font-size: 11px; fill: #333; }
</style>
";

// ── Helpers ──────────────────────────────────────────────────────────────────

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ── Renderer ─────────────────────────────────────────────────────────────────

/// Renders a flowchart to an SVG document. Each call to `render` works on
/// fresh state, so one renderer can be shared.
#[derive(Debug, Clone, Default)]
pub struct SvgRenderer {
    config: RenderConfig,
}

impl SvgRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }
}

impl Renderer for SvgRenderer {
    fn render(&self, chart: &mut Flowchart) -> String {
        let mut pass = Layout::new(chart);
        pass.run(self.config.origin_x, self.config.origin_y);
        pass.finish(self.config.padding)
    }
}

/// Geometry of a decision inside a loop body whose branch ends in a jump,
/// kept until the loop has its final gutter position.
#[derive(Debug, Clone, Copy)]
struct JumpColumns {
    decision: NodeId,
    jump: JumpKind,
    /// Column of the branch ending in break/continue.
    jump_x: f64,
    /// Column of the branch that stays in the body.
    flow_x: f64,
    col_start_y: f64,
    jump_end_y: f64,
    flow_end_y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopStyle {
    PreTest,
    PostTest,
}

/// Outcome of drawing a decision that sits in a loop body.
enum BodyDecision {
    /// Ordinary decision; branches reconverge at this y.
    Merged(f64),
    /// Jump decision drawn in two columns; bottom of the block.
    Jump(f64),
}

/// Per-render state.
struct Layout<'a> {
    chart: &'a mut Flowchart,
    svg: String,
    rendered: HashSet<NodeId>,
    /// Jump columns of the loop currently being drawn.
    jumps: Vec<JumpColumns>,
    min_x: f64,
    max_x: f64,
    max_y: f64,
    /// Where the arrow into the end terminal starts.
    end_arrow_from: Option<(f64, f64)>,
    /// Column of the last block in the current loop body.
    last_body_block_x: Option<f64>,
}

impl<'a> Layout<'a> {
    fn new(chart: &'a mut Flowchart) -> Self {
        Self {
            chart,
            svg: String::new(),
            rendered: HashSet::new(),
            jumps: Vec::new(),
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: 0.0,
            end_arrow_from: None,
            last_body_block_x: None,
        }
    }

    fn run(&mut self, origin_x: f64, origin_y: f64) {
        let start = self.chart.start();
        self.render_node(start, origin_x, origin_y, None);

        let (end_x, from_y) = self.end_arrow_from.unwrap_or((origin_x, self.max_y));
        let end_y = from_y + VERTICAL_SPACING;
        self.arrow(end_x, from_y, end_x, end_y - ARROW_GAP);
        let end = self.chart.end();
        self.rendered.insert(end);
        self.render_terminal(end, end_x, end_y);
        self.update_max_y(end_y + TERMINAL_HEIGHT);
    }

    fn finish(self, padding: f64) -> String {
        let view_x = self.min_x - padding;
        let width = self.max_x - self.min_x + padding * 2.0;
        let height = self.max_y + padding;
        debug!(view_x, width, height, "svg frame");

        let mut out = String::with_capacity(self.svg.len() + 1024);
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"100%\" height=\"100%\" \
             viewBox=\"{view_x:.1} 0 {width:.1} {height:.1}\" \
             preserveAspectRatio=\"xMidYMin meet\">\n"
        ));
        out.push_str("<defs>\n");
        out.push_str(
            "<marker id=\"arrow\" markerWidth=\"10\" markerHeight=\"10\" refX=\"9\" refY=\"5\" orient=\"auto\">\n",
        );
        out.push_str("<path d=\"M0,0 L10,5 L0,10 z\" fill=\"black\"/>\n");
        out.push_str("</marker>\n");
        out.push_str(STYLE);
        out.push_str("</defs>\n");
        out.push_str(&self.svg);
        out.push_str("</svg>");
        out
    }

    // ── Bounds ────────────────────────────────────────────────────────────────

    fn track_x(&mut self, x: f64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
    }

    fn update_max_y(&mut self, y: f64) {
        self.max_y = self.max_y.max(y);
    }

    /// Run `f` and return the lowest y it drew, starting from `top`.
    fn measure(&mut self, top: f64, f: impl FnOnce(&mut Self)) -> f64 {
        let outer = self.max_y;
        self.max_y = top;
        f(self);
        let bottom = self.max_y;
        self.max_y = outer.max(bottom);
        bottom
    }

    fn place(&mut self, id: NodeId, x: f64, y: f64, width: f64, height: f64) {
        let bounds = &mut self.chart.node_mut(id).bounds;
        bounds.x = x;
        bounds.y = y;
        bounds.width = width;
        bounds.height = height;
    }

    fn defer_end(&mut self, x: f64, y: f64) {
        trace!(x, y, "end arrow origin");
        self.end_arrow_from = Some((x, y));
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    fn render_node(&mut self, id: NodeId, x: f64, y: f64, stop_before: Option<NodeId>) {
        if self.rendered.contains(&id) || Some(id) == stop_before {
            return;
        }
        match self.chart.kind(id) {
            NodeKind::Terminal { is_start: false }
            | NodeKind::LoopBack { .. }
            | NodeKind::Connector { .. } => return,
            _ => {}
        }

        self.rendered.insert(id);
        self.track_x(x - PROCESS_WIDTH / 2.0);
        self.track_x(x + PROCESS_WIDTH / 2.0);
        trace!(node = id.index(), x, y, "render node");

        match self.chart.kind(id).clone() {
            NodeKind::Terminal { .. } => {
                self.render_terminal(id, x, y);
                self.update_max_y(y + TERMINAL_HEIGHT);
                self.render_linear_next(id, x, y + TERMINAL_HEIGHT, None);
            }
            NodeKind::Process { .. } => {
                self.render_process(id, x, y);
                self.update_max_y(y + PROCESS_HEIGHT);
                self.render_linear_next(id, x, y + PROCESS_HEIGHT, stop_before);
            }
            NodeKind::Decision { .. } => self.render_decision(id, x, y, stop_before),
            NodeKind::PreTestLoop { .. } => {
                self.render_loop(id, x, y, stop_before);
            }
            NodeKind::PostTestLoop { .. } => {
                self.render_do_while(id, x, y, stop_before);
            }
            NodeKind::LoopBack { .. } | NodeKind::Connector { .. } => {}
        }
    }

    /// Continue the flow from `(x, from_y)` into `target`, one vertical
    /// spacing lower. Reaching the end terminal only records the arrow origin.
    fn continue_to(&mut self, target: NodeId, x: f64, from_y: f64, stop_before: Option<NodeId>) {
        if self.chart.is_end(target) {
            self.defer_end(x, from_y);
            return;
        }
        if Some(target) == stop_before
            || self.rendered.contains(&target)
            || matches!(
                self.chart.kind(target),
                NodeKind::LoopBack { .. } | NodeKind::Connector { .. } | NodeKind::Terminal { .. }
            )
        {
            return;
        }
        let next_y = from_y + VERTICAL_SPACING;
        self.arrow(x, from_y, x, next_y - ARROW_GAP);
        self.render_node(target, x, next_y, stop_before);
    }

    fn render_linear_next(&mut self, id: NodeId, x: f64, bottom: f64, stop_before: Option<NodeId>) {
        let next = self.chart.next(id).to_vec();
        for n in next {
            if Some(n) == stop_before {
                continue;
            }
            self.continue_to(n, x, bottom, stop_before);
        }
    }

    // ── Shapes ────────────────────────────────────────────────────────────────

    fn render_terminal(&mut self, id: NodeId, x: f64, y: f64) {
        let (w, h) = (TERMINAL_WIDTH, TERMINAL_HEIGHT);
        self.place(id, x, y, w, h);
        self.svg.push_str(&format!(
            "<ellipse class=\"shape\" cx=\"{:.1}\" cy=\"{:.1}\" rx=\"{:.1}\" ry=\"{:.1}\"/>\n",
            x,
            y + h / 2.0,
            w / 2.0,
            h / 2.0
        ));
        let label = self.chart.label(id).to_string();
        self.text(&label, x, y + h / 2.0);
        self.track_x(x - w / 2.0);
        self.track_x(x + w / 2.0);
    }

    fn render_process(&mut self, id: NodeId, x: f64, y: f64) {
        self.place(id, x, y, PROCESS_WIDTH, PROCESS_HEIGHT);
        self.svg.push_str(&format!(
            "<rect class=\"shape\" x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\"/>\n",
            x - PROCESS_WIDTH / 2.0,
            y,
            PROCESS_WIDTH,
            PROCESS_HEIGHT
        ));
        let label = self.chart.label(id).to_string();
        self.text(&label, x, y + PROCESS_HEIGHT / 2.0);
    }

    fn render_diamond(&mut self, id: NodeId, x: f64, y: f64) {
        self.place(id, x, y, DECISION_WIDTH, DECISION_HEIGHT);
        self.diamond(x, y, DECISION_WIDTH, DECISION_HEIGHT);
        let label = self.chart.label(id).to_string();
        self.text(&label, x, y + DECISION_HEIGHT / 2.0);
    }

    // ── Decision ──────────────────────────────────────────────────────────────

    fn render_decision(&mut self, id: NodeId, x: f64, y: f64, stop_before: Option<NodeId>) {
        let next = self.chart.decision_next(id);
        let branch_stop = next.first().copied().or(stop_before);
        let merge_y = self.draw_decision(id, x, y, branch_stop);

        if next.is_empty() {
            self.defer_end(x, merge_y);
        }
        for n in next {
            self.continue_to(n, x, merge_y, stop_before);
        }
    }

    /// Diamond, both branch columns and the merge line. Returns the merge y.
    fn draw_decision(&mut self, id: NodeId, x: f64, y: f64, stop_before: Option<NodeId>) -> f64 {
        let (true_branch, false_branch) = self.chart.kind(id).branches().unwrap_or((None, None));
        let half_w = DECISION_WIDTH / 2.0;
        let tip_y = y + DECISION_HEIGHT / 2.0;
        self.render_diamond(id, x, y);

        let branch_y = y + DECISION_HEIGHT + VERTICAL_SPACING;
        let left_x = x - HORIZONTAL_SPACING;
        let right_x = x + HORIZONTAL_SPACING;
        self.track_x(left_x - PROCESS_WIDTH / 2.0);
        self.track_x(right_x + PROCESS_WIDTH / 2.0);

        let mut left_bottom = branch_y;
        let mut right_bottom = branch_y;

        if let Some(t) = true_branch {
            self.line(x - half_w, tip_y, left_x, tip_y);
            self.arrow(left_x, tip_y, left_x, branch_y - ARROW_GAP);
            self.label_text(YES, x - half_w - 30.0, tip_y - 10.0);
            left_bottom = self.measure(branch_y, |s| s.render_node(t, left_x, branch_y, stop_before));
        }
        if let Some(f) = false_branch {
            self.line(x + half_w, tip_y, right_x, tip_y);
            self.arrow(right_x, tip_y, right_x, branch_y - ARROW_GAP);
            self.label_text(NO, x + half_w + 10.0, tip_y - 10.0);
            right_bottom =
                self.measure(branch_y, |s| s.render_node(f, right_x, branch_y, stop_before));
        }

        let merge_y = left_bottom.max(right_bottom) + VERTICAL_SPACING;

        if true_branch.is_some() {
            self.line(left_x, left_bottom, left_x, merge_y);
        } else {
            self.line(x - half_w, tip_y, left_x, tip_y);
            self.label_text(YES, x - half_w - 30.0, tip_y - 10.0);
            self.line(left_x, tip_y, left_x, merge_y);
            self.track_x(left_x - ARROW_GAP);
        }
        self.line(left_x, merge_y, x, merge_y);

        if false_branch.is_some() {
            self.line(right_x, right_bottom, right_x, merge_y);
        } else {
            self.line(x + half_w, tip_y, right_x, tip_y);
            self.label_text(NO, x + half_w + 10.0, tip_y - 10.0);
            self.line(right_x, tip_y, right_x, merge_y);
            self.track_x(right_x + ARROW_GAP);
        }
        self.line(right_x, merge_y, x, merge_y);

        self.place(id, x, y, DECISION_WIDTH, merge_y - y);
        self.update_max_y(merge_y);
        merge_y
    }

    // ── Pre-test loop ─────────────────────────────────────────────────────────

    /// Draw a while/for loop with its body, back-arrows and exit arm. Returns
    /// the y where the exit arm leaves the loop.
    fn render_loop(&mut self, id: NodeId, x: f64, y: f64, stop_before: Option<NodeId>) -> f64 {
        let (body, exit) = self.chart.kind(id).loop_slots().unwrap_or((None, None));
        let half_w = DECISION_WIDTH / 2.0;
        let tip_y = y + DECISION_HEIGHT / 2.0;
        self.render_diamond(id, x, y);

        let right_x = x + HORIZONTAL_SPACING;
        let branch_y = y + DECISION_HEIGHT + VERTICAL_SPACING;

        self.line(x + half_w, tip_y, right_x, tip_y);
        self.arrow(right_x, tip_y, right_x, branch_y - ARROW_GAP);
        self.label_text(YES, x + half_w + 10.0, tip_y - 10.0);

        let outer_jumps = std::mem::take(&mut self.jumps);
        let outer_last = self.last_body_block_x.take();
        let max_x_before_body = self.max_x;

        let chain = self.collect_body_chain(body, id);
        let body_end_y =
            self.render_loop_body_chain(&chain, right_x, branch_y, id, LoopStyle::PreTest);

        // gutter clears everything the body drew
        let body_max_x = if self.max_x > max_x_before_body {
            self.max_x
        } else {
            right_x + PROCESS_WIDTH / 2.0
        };
        let return_right_x = body_max_x + BACK_ARROW_MARGIN;
        let back_target_y = y - VERTICAL_SPACING / 2.0;

        let diamond_bottom = y + DECISION_HEIGHT;
        self.label_text(NO, x + 8.0, diamond_bottom + 15.0);

        let jumps = std::mem::replace(&mut self.jumps, outer_jumps);
        let last_block_x = std::mem::replace(&mut self.last_body_block_x, outer_last);

        // exit row sits below every corner of the side channels
        let mut max_corner_y = body_end_y + VERTICAL_SPACING / 2.0;
        for g in &jumps {
            max_corner_y = max_corner_y.max(g.flow_end_y + VERTICAL_SPACING / 2.0);
            if g.jump == JumpKind::Continue {
                max_corner_y = max_corner_y.max(g.jump_end_y + VERTICAL_SPACING / 2.0);
            }
        }
        let exit_y = max_corner_y + VERTICAL_SPACING / 2.0;

        let break_join_y = exit_y - VERTICAL_SPACING / 2.0;
        let breaks_out = self.ends_in_break(&chain, body);

        for g in &jumps {
            match g.jump {
                JumpKind::Continue => {
                    let drop = VERTICAL_SPACING * 1.5;
                    let low_y = g.flow_end_y.max(g.jump_end_y);
                    let corner_y = low_y + drop;
                    if breaks_out {
                        // flow column leaves the loop, continue takes the gutter itself
                        self.join_exit(g.flow_x, g.flow_end_y, x, break_join_y);
                        self.line(g.jump_x, g.jump_end_y, g.jump_x, corner_y);
                        self.back_to_header(g.jump_x, corner_y, return_right_x, back_target_y, x);
                    } else {
                        // flow column: longer drop, then through the gutter to the header
                        self.line(g.flow_x, g.flow_end_y, g.flow_x, corner_y);
                        self.back_to_header(g.flow_x, corner_y, return_right_x, back_target_y, x);

                        // continue column joins the flow column halfway down
                        let join_y = low_y + drop / 2.0;
                        self.line(g.jump_x, g.jump_end_y, g.jump_x, join_y);
                        let join_end = if g.jump_x < g.flow_x { g.flow_x - 1.0 } else { g.flow_x + 1.0 };
                        self.arrow(g.jump_x, join_y, join_end, join_y);
                    }
                    self.update_max_y(corner_y);
                    self.track_x(g.flow_x + ARROW_GAP);
                    self.track_x(g.jump_x - ARROW_GAP);
                }
                JumpKind::Break => {
                    if breaks_out {
                        self.join_exit(g.flow_x, g.flow_end_y, x, break_join_y);
                    } else {
                        // flow column: short drop, then through the gutter to the header
                        let corner_y = g.flow_end_y + VERTICAL_SPACING / 2.0;
                        self.line(g.flow_x, g.flow_end_y, g.flow_x, corner_y);
                        self.back_to_header(g.flow_x, corner_y, return_right_x, back_target_y, x);
                    }

                    // break column drops onto the exit arm
                    self.join_exit(g.jump_x, g.jump_end_y, x, break_join_y);
                    self.track_x(g.jump_x - ARROW_GAP);
                }
            }
            trace!(decision = g.decision.index(), jump = g.jump.as_str(), "side channel");
        }

        let falls_through = chain.last().is_none_or(|&n| !self.chart.is_return(n));
        if jumps.is_empty() && falls_through {
            let back_start_x = last_block_x.unwrap_or(right_x);
            if breaks_out {
                self.join_exit(back_start_x, body_end_y, x, break_join_y);
            } else {
                let corner_y = body_end_y + VERTICAL_SPACING / 2.0;
                self.line(back_start_x, body_end_y, back_start_x, corner_y);
                self.back_to_header(back_start_x, corner_y, return_right_x, back_target_y, x);
            }
        }

        self.update_max_y(body_end_y);

        let outflow_y = exit_y - VERTICAL_SPACING;
        self.line(x, diamond_bottom, x, outflow_y);
        self.update_max_y(outflow_y);
        self.place(id, x, y, DECISION_WIDTH, outflow_y - y);

        match exit {
            Some(e) => self.continue_to(e, x, outflow_y, stop_before),
            None => self.defer_end(x, outflow_y),
        }
        outflow_y
    }

    /// Linear run of a loop body: follows `next` through processes, the
    /// post-merge continuation of decisions and the exit of nested loops.
    fn collect_body_chain(&self, start: Option<NodeId>, loop_id: NodeId) -> Vec<NodeId> {
        let exit = self.chart.kind(loop_id).loop_slots().and_then(|(_, e)| e);
        let stops = |n: NodeId| {
            Some(n) == exit
                || matches!(
                    self.chart.kind(n),
                    NodeKind::LoopBack { .. } | NodeKind::Terminal { .. } | NodeKind::Connector { .. }
                )
        };

        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cur = start;
        while let Some(c) = cur {
            if stops(c) || !seen.insert(c) {
                break;
            }
            chain.push(c);
            cur = match self.chart.kind(c) {
                NodeKind::Decision { .. } => self.chart.decision_next(c).into_iter().find(|&n| !stops(n)),
                NodeKind::PreTestLoop { exit, .. } | NodeKind::PostTestLoop { exit, .. } => {
                    exit.filter(|&n| !stops(n))
                }
                _ => self.chart.next(c).iter().copied().find(|&n| !stops(n)),
            };
        }
        chain
    }

    /// Draw a body chain top-down in column `x`. Returns the bottom y of the
    /// body; jump decisions leave their geometry in `self.jumps`.
    fn render_loop_body_chain(
        &mut self,
        chain: &[NodeId],
        x: f64,
        start_y: f64,
        loop_id: NodeId,
        style: LoopStyle,
    ) -> f64 {
        let mut current_y = start_y;

        for (i, &node) in chain.iter().enumerate() {
            let next_node = chain.get(i + 1).copied();

            match self.chart.kind(node).clone() {
                NodeKind::Process { .. } => {
                    self.rendered.insert(node);
                    self.render_process(node, x, current_y);
                    self.track_x(x + PROCESS_WIDTH / 2.0);
                    self.update_max_y(current_y + PROCESS_HEIGHT);

                    let bottom = current_y + PROCESS_HEIGHT;
                    if next_node.is_none() {
                        self.last_body_block_x = Some(x);
                        return bottom;
                    }
                    let next_y = bottom + VERTICAL_SPACING;
                    self.arrow(x, bottom, x, next_y - ARROW_GAP);
                    current_y = next_y;
                }
                NodeKind::Decision { .. } => {
                    self.rendered.insert(node);
                    self.track_x(x - PROCESS_WIDTH / 2.0);
                    self.track_x(x + PROCESS_WIDTH / 2.0);

                    match self.render_decision_in_body(node, x, current_y, next_node, style) {
                        BodyDecision::Jump(block_bottom) => {
                            let Some(pos) = self.jumps.iter().position(|g| g.decision == node) else {
                                return block_bottom;
                            };
                            let tail = &chain[i + 1..];
                            if !tail.is_empty() {
                                let g = self.jumps[pos];
                                let tail_y = if g.flow_end_y > g.col_start_y {
                                    let y = g.flow_end_y + VERTICAL_SPACING;
                                    self.arrow(g.flow_x, g.flow_end_y, g.flow_x, y - ARROW_GAP);
                                    y
                                } else {
                                    g.flow_end_y
                                };
                                let tail_end = self.render_break_tail_chain(tail, g.flow_x, tail_y);
                                self.jumps[pos].flow_end_y = tail_end;
                            }

                            let g = self.jumps[pos];
                            let bottom = block_bottom.max(g.flow_end_y);
                            if style == LoopStyle::PostTest {
                                // flow column carries on down to the condition
                                if bottom > g.flow_end_y {
                                    self.line(g.flow_x, g.flow_end_y, g.flow_x, bottom);
                                }
                                self.last_body_block_x = Some(g.flow_x);
                            }
                            return bottom;
                        }
                        BodyDecision::Merged(merge_y) => {
                            if next_node.is_some() {
                                let next_y = merge_y + VERTICAL_SPACING;
                                self.arrow(x, merge_y, x, next_y - ARROW_GAP);
                                current_y = next_y;
                            } else {
                                self.last_body_block_x = Some(x);
                                if style == LoopStyle::PostTest {
                                    return merge_y;
                                }
                                let line_end_y = merge_y + VERTICAL_SPACING;
                                self.line(x, merge_y, x, line_end_y);
                                self.update_max_y(line_end_y);
                                return line_end_y;
                            }
                        }
                    }
                }
                NodeKind::PreTestLoop { exit, .. } | NodeKind::PostTestLoop { exit, .. } => {
                    self.rendered.insert(node);
                    self.track_x(x - PROCESS_WIDTH / 2.0);
                    self.track_x(x + PROCESS_WIDTH / 2.0);
                    let stop = next_node.or(exit);
                    let outflow_y = if matches!(self.chart.kind(node), NodeKind::PreTestLoop { .. }) {
                        self.render_loop(node, x, current_y, stop)
                    } else {
                        self.render_do_while(node, x, current_y, stop)
                    };
                    if next_node.is_none() {
                        self.last_body_block_x = Some(x);
                        return outflow_y;
                    }
                    let next_y = outflow_y + VERTICAL_SPACING;
                    self.arrow(x, outflow_y, x, next_y - ARROW_GAP);
                    current_y = next_y;
                }
                _ => break,
            }
        }

        trace!(loop_id = loop_id.index(), current_y, "body chain ended early");
        current_y
    }

    fn render_decision_in_body(
        &mut self,
        id: NodeId,
        x: f64,
        y: f64,
        stop_before: Option<NodeId>,
        style: LoopStyle,
    ) -> BodyDecision {
        let (t, f) = self.chart.kind(id).branches().unwrap_or((None, None));
        let breaks = self.chain_ends_with(t, JumpKind::Break) || self.chain_ends_with(f, JumpKind::Break);
        let continues =
            self.chain_ends_with(t, JumpKind::Continue) || self.chain_ends_with(f, JumpKind::Continue);

        // post-test jumps head right: continue into the condition's right tip,
        // break past it; the left side belongs to the "ДА" return
        let jump_left = style == LoopStyle::PreTest;
        if continues && !breaks {
            return BodyDecision::Jump(self.render_jump_decision(id, x, y, JumpKind::Continue, jump_left));
        }
        if breaks {
            return BodyDecision::Jump(self.render_jump_decision(id, x, y, JumpKind::Break, jump_left));
        }
        BodyDecision::Merged(self.draw_decision(id, x, y, stop_before))
    }

    /// Compact two-column decision: the jumping branch in one narrow column,
    /// the other branch in the opposite one. Returns the block bottom.
    fn render_jump_decision(&mut self, id: NodeId, x: f64, y: f64, jump: JumpKind, jump_left: bool) -> f64 {
        let (t, f) = self.chart.kind(id).branches().unwrap_or((None, None));
        self.render_diamond(id, x, y);

        let true_jumps = self.chain_ends_with(t, jump);
        let (jump_branch, flow_branch) = if true_jumps { (t, f) } else { (f, t) };
        let (jump_label, flow_label) = if true_jumps { (YES, NO) } else { (NO, YES) };

        let (jump_x, flow_x) = if jump_left {
            (x - BREAK_HORIZONTAL_SPACING, x + BREAK_HORIZONTAL_SPACING)
        } else {
            (x + BREAK_HORIZONTAL_SPACING, x - BREAK_HORIZONTAL_SPACING)
        };
        self.track_x(x - BREAK_HORIZONTAL_SPACING - PROCESS_WIDTH / 2.0);
        self.track_x(x + BREAK_HORIZONTAL_SPACING + PROCESS_WIDTH / 2.0);

        let tip_y = y + DECISION_HEIGHT / 2.0;
        let col_start_y = y + DECISION_HEIGHT + VERTICAL_SPACING;

        self.column_stub(x, tip_y, jump_x, col_start_y, jump_label);
        let jump_end_y = self.render_column_chain(jump_branch, jump_x, col_start_y);

        self.column_stub(x, tip_y, flow_x, col_start_y, flow_label);
        let flow_end_y = self.render_column_chain(flow_branch, flow_x, col_start_y);

        self.jumps.push(JumpColumns {
            decision: id,
            jump,
            jump_x,
            flow_x,
            col_start_y,
            jump_end_y,
            flow_end_y,
        });

        let block_bottom = jump_end_y.max(flow_end_y) + VERTICAL_SPACING;
        self.place(id, x, y, DECISION_WIDTH, block_bottom - y);
        self.update_max_y(block_bottom);
        block_bottom
    }

    /// Branch label, horizontal from the diamond tip and an arrow down into
    /// the column.
    fn column_stub(&mut self, x: f64, tip_y: f64, col_x: f64, col_start_y: f64, label: &str) {
        let half_w = DECISION_WIDTH / 2.0;
        if col_x < x {
            self.label_text(label, x - half_w - 30.0, tip_y - 10.0);
            self.line(x - half_w, tip_y, col_x, tip_y);
        } else {
            self.label_text(label, x + half_w + 10.0, tip_y - 10.0);
            self.line(x + half_w, tip_y, col_x, tip_y);
        }
        self.arrow(col_x, tip_y, col_x, col_start_y - ARROW_GAP);
    }

    /// Draw a branch in a side column until it reaches a jump sentinel or
    /// leaves the loop. Returns the bottom of the last block, or `start_y` for
    /// a bare branch.
    fn render_column_chain(&mut self, start: Option<NodeId>, x: f64, start_y: f64) -> f64 {
        let mut current_y = start_y;
        let mut cur = start;

        while let Some(c) = cur {
            if self.rendered.contains(&c) {
                break;
            }
            match self.chart.kind(c) {
                NodeKind::Process { .. } => {
                    self.rendered.insert(c);
                    self.render_process(c, x, current_y);
                    self.track_x(x + PROCESS_WIDTH / 2.0);
                    self.update_max_y(current_y + PROCESS_HEIGHT);

                    let bottom = current_y + PROCESS_HEIGHT;
                    let next = self.chart.next(c).first().copied().filter(|&n| {
                        !matches!(
                            self.chart.kind(n),
                            NodeKind::Connector { .. } | NodeKind::LoopBack { .. } | NodeKind::Terminal { .. }
                        )
                    });
                    match next {
                        Some(n) => {
                            let next_y = bottom + VERTICAL_SPACING;
                            self.arrow(x, bottom, x, next_y - ARROW_GAP);
                            current_y = next_y;
                            cur = Some(n);
                        }
                        None => return bottom,
                    }
                }
                NodeKind::Decision { .. } | NodeKind::PreTestLoop { .. } | NodeKind::PostTestLoop { .. } => {
                    return self.measure(current_y, |s| s.render_node(c, x, current_y, None));
                }
                _ => break,
            }
        }
        current_y
    }

    /// Body statements after a jump decision, drawn in its flow column.
    fn render_break_tail_chain(&mut self, tail: &[NodeId], x: f64, start_y: f64) -> f64 {
        let mut current_y = start_y;

        for (i, &node) in tail.iter().enumerate() {
            let next_node = tail.get(i + 1).copied();
            let bottom = if self.chart.is_process(node) {
                self.rendered.insert(node);
                self.render_process(node, x, current_y);
                self.track_x(x + PROCESS_WIDTH / 2.0);
                self.update_max_y(current_y + PROCESS_HEIGHT);
                current_y + PROCESS_HEIGHT
            } else {
                let top = current_y;
                self.measure(top, |s| s.render_node(node, x, top, next_node))
            };

            if next_node.is_none() {
                self.last_body_block_x = Some(x);
                return bottom;
            }
            let next_y = bottom + VERTICAL_SPACING;
            self.arrow(x, bottom, x, next_y - ARROW_GAP);
            current_y = next_y;
        }

        current_y
    }

    /// Does a loop body's straight run end in an unconditional break?
    fn ends_in_break(&self, chain: &[NodeId], body: Option<NodeId>) -> bool {
        let after = match chain.last() {
            None => body,
            Some(&n) => match *self.chart.kind(n) {
                NodeKind::PreTestLoop { exit, .. } | NodeKind::PostTestLoop { exit, .. } => exit,
                NodeKind::Decision { .. } => self.chart.decision_next(n).first().copied(),
                _ => self.chart.next(n).first().copied(),
            },
        };
        after.and_then(|n| self.chart.jump_kind(n)) == Some(JumpKind::Break)
    }

    /// Does the linear run of processes starting at `node` end in `jump`?
    fn chain_ends_with(&self, node: Option<NodeId>, jump: JumpKind) -> bool {
        let mut cur = node;
        let mut seen = HashSet::new();
        while let Some(c) = cur {
            if !seen.insert(c) {
                return false;
            }
            match self.chart.kind(c) {
                NodeKind::Connector { jump: j, .. } => return *j == jump,
                NodeKind::Process { .. } => cur = self.chart.next(c).first().copied(),
                _ => return false,
            }
        }
        false
    }

    // ── Post-test loop ────────────────────────────────────────────────────────

    /// Draw a do-while: body from `y` down, condition below it, "ДА" back to
    /// the midpoint of the arrow entering the body. Returns the y where the
    /// exit arm leaves the condition.
    fn render_do_while(&mut self, id: NodeId, x: f64, y: f64, stop_before: Option<NodeId>) -> f64 {
        let (body, exit) = self.chart.kind(id).loop_slots().unwrap_or((None, None));
        let half_w = DECISION_WIDTH / 2.0;
        let arrow_mid_y = y - VERTICAL_SPACING / 2.0;

        let outer_jumps = std::mem::take(&mut self.jumps);
        let outer_last = self.last_body_block_x.take();
        let max_x_before_body = self.max_x;
        // "ДА" column clears this loop's own extent
        let outer_min_x = std::mem::replace(&mut self.min_x, x - DECISION_WIDTH / 2.0);

        let chain = self.collect_body_chain(body, id);
        let body_end_y = self.render_loop_body_chain(&chain, x, y, id, LoopStyle::PostTest);

        let body_max_x = if self.max_x > max_x_before_body {
            self.max_x
        } else {
            x + PROCESS_WIDTH / 2.0
        };
        let body_min_x = self.min_x;
        self.min_x = outer_min_x.min(body_min_x);
        let jumps = std::mem::replace(&mut self.jumps, outer_jumps);
        let last_block_x = std::mem::replace(&mut self.last_body_block_x, outer_last);

        let d_y = body_end_y + VERTICAL_SPACING;
        let d_bottom = d_y + DECISION_HEIGHT;
        let tip_y = d_y + DECISION_HEIGHT / 2.0;
        let left_tip_x = x - half_w;
        let break_join_y = d_bottom + VERTICAL_SPACING / 2.0;
        let bx = last_block_x.unwrap_or(x);

        if self.ends_in_break(&chain, body) {
            // body leaves past the condition, which only continue reaches
            if bx == x {
                let mid_y = body_end_y + VERTICAL_SPACING / 2.0;
                let side_x = x + BREAK_HORIZONTAL_SPACING;
                self.line(x, body_end_y, x, mid_y);
                self.line(x, mid_y, side_x, mid_y);
                self.join_exit(side_x, mid_y, x, break_join_y);
                self.track_x(side_x + ARROW_GAP);
            } else {
                self.join_exit(bx, body_end_y, x, break_join_y);
            }
            self.update_max_y(break_join_y);
        } else if bx != x {
            // body ended off-axis: across to the axis, then down
            let mid_y = body_end_y + VERTICAL_SPACING / 2.0;
            self.line(bx, body_end_y, bx, mid_y);
            self.line(bx, mid_y, x, mid_y);
            self.arrow(x, mid_y, x, d_y - ARROW_GAP);
        } else {
            self.arrow(x, body_end_y, x, d_y - ARROW_GAP);
        }

        self.render_diamond(id, x, d_y);
        self.update_max_y(d_bottom);

        // "ДА": left of the loop, back up to the entry arrow
        let left_col_x = body_min_x - BACK_ARROW_MARGIN;
        self.line(left_tip_x, tip_y, left_col_x, tip_y);
        self.line(left_col_x, tip_y, left_col_x, arrow_mid_y);
        self.arrow(left_col_x, arrow_mid_y, x - 1.0, arrow_mid_y);
        self.label_text(YES, left_tip_x - 40.0, tip_y - 10.0);
        self.track_x(left_col_x - ARROW_GAP);

        let right_col_x = body_max_x + BACK_ARROW_MARGIN;
        for g in &jumps {
            match g.jump {
                JumpKind::Continue => {
                    let corner_y = g.jump_end_y + VERTICAL_SPACING / 2.0;
                    self.line(g.jump_x, g.jump_end_y, g.jump_x, corner_y);
                    self.line(g.jump_x, corner_y, right_col_x, corner_y);
                    self.line(right_col_x, corner_y, right_col_x, tip_y);
                    self.arrow(right_col_x, tip_y, x + half_w + ARROW_GAP, tip_y);
                    self.track_x(right_col_x + ARROW_GAP);
                }
                JumpKind::Break => {
                    self.join_exit(g.jump_x, g.jump_end_y, x, break_join_y);
                    self.update_max_y(break_join_y);
                    self.track_x(g.jump_x + ARROW_GAP);
                }
            }
        }

        self.label_text(NO, x + 8.0, d_bottom + 15.0);
        self.place(id, x, d_y, DECISION_WIDTH, DECISION_HEIGHT);

        match exit {
            Some(e) => self.continue_to(e, x, d_bottom, stop_before),
            None => self.defer_end(x, d_bottom),
        }
        d_bottom
    }

    // ── Loop routing ──────────────────────────────────────────────────────────

    /// From `(from_x, corner_y)` across to the gutter, up it and into the
    /// arrow entering the loop header.
    fn back_to_header(&mut self, from_x: f64, corner_y: f64, gutter_x: f64, target_y: f64, header_x: f64) {
        self.line(from_x, corner_y, gutter_x, corner_y);
        self.line(gutter_x, corner_y, gutter_x, target_y);
        self.arrow(gutter_x, target_y, header_x + ARROW_GAP, target_y);
        self.track_x(gutter_x + ARROW_GAP);
    }

    /// Drop a column to `join_y` and join the exit line on `axis_x`.
    fn join_exit(&mut self, from_x: f64, from_y: f64, axis_x: f64, join_y: f64) {
        self.line(from_x, from_y, from_x, join_y);
        let join_end = if from_x < axis_x { axis_x - 1.0 } else { axis_x + 1.0 };
        self.arrow(from_x, join_y, join_end, join_y);
    }

    // ── Primitives ────────────────────────────────────────────────────────────

    fn diamond(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let (half_w, half_h) = (w / 2.0, h / 2.0);
        self.svg.push_str(&format!(
            "<polygon class=\"shape\" points=\"{:.1},{:.1} {:.1},{:.1} {:.1},{:.1} {:.1},{:.1}\"/>\n",
            x,
            y,
            x + half_w,
            y + half_h,
            x,
            y + h,
            x - half_w,
            y + half_h
        ));
    }

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.svg.push_str(&format!(
            "<line class=\"line\" x1=\"{x1:.1}\" y1=\"{y1:.1}\" x2=\"{x2:.1}\" y2=\"{y2:.1}\"/>\n"
        ));
    }

    fn arrow(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.svg.push_str(&format!(
            "<line class=\"arrow\" x1=\"{x1:.1}\" y1=\"{y1:.1}\" x2=\"{x2:.1}\" y2=\"{y2:.1}\"/>\n"
        ));
    }

    fn text(&mut self, txt: &str, x: f64, y: f64) {
        self.svg.push_str(&format!(
            "<text class=\"text\" x=\"{x:.1}\" y=\"{y:.1}\">{}</text>\n",
            escape(txt)
        ));
    }

    fn label_text(&mut self, txt: &str, x: f64, y: f64) {
        self.svg.push_str(&format!(
            "<text class=\"label\" x=\"{x:.1}\" y=\"{y:.1}\">{}</text>\n",
            escape(txt)
        ));
    }
}

#[cfg(test)]
#[path = "../../tests/rust/test_render_svg.rs"]
mod tests;
