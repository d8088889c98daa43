//! Structural recovery: turns lifted basic blocks plus the CFG back into
//! `if`/`else`, loops, `switch`, and `try`/`catch`/`finally` statements.
//!
//! The walker emits blocks in flow order, consulting dominators and
//! post-dominators for join points. Anything it cannot shape (irreducible
//! flow, unmatched exception ranges) degrades to labeled breaks or a
//! comment, always with a diagnostic.

use std::collections::{HashMap, HashSet};

use jloader::attributes::ExceptionEntry;
use jloader::constants::ConstantPool;
use log::warn;

use crate::ast::{
    CatchClause, Expression, LiteralValue, Statement, SwitchCase, UnaryOp,
};
use crate::cfg::{ControlFlowGraph, EdgeKind};
use crate::decompiler::{Diagnostic, Options, Severity};
use crate::lift::{BlockExit, LiftedBlock, LiftedMethod};
use jloader::descriptors::{BaseType, FieldType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CtxKind {
    Loop,
    Switch,
}

#[derive(Debug)]
struct Ctx {
    kind: CtxKind,
    /// Where `continue` lands: the header for `while`, the condition
    /// block for `do`/`while`.
    continue_target: Option<usize>,
    follow: Option<usize>,
    label: Option<String>,
}

#[derive(Debug)]
struct TryRegion {
    start_pc: u32,
    end_pc: u32,
    entry_block: usize,
    /// `(caught class, handler block)` per catch clause.
    catches: Vec<(String, usize)>,
    finally_handler: Option<usize>,
    done: bool,
}

pub struct Structurer<'a> {
    cfg: &'a ControlFlowGraph,
    lifted: &'a [LiftedBlock],
    options: &'a Options,
    diagnostics: &'a mut Vec<Diagnostic>,
    regions: Vec<TryRegion>,
    ctx_stack: Vec<Ctx>,
    /// Headers of loops currently being emitted, so re-entering one is a
    /// back edge rather than a fresh loop.
    active_headers: HashSet<usize>,
    bounds: Vec<u32>,
    escape: Option<usize>,
    emitted: HashSet<usize>,
    label_count: u32,
}

/// Entry point: structure one lifted method into a statement list.
pub fn structure_method(
    cfg: &ControlFlowGraph,
    lifted: &LiftedMethod,
    exception_table: &[ExceptionEntry],
    pool: &ConstantPool,
    options: &Options,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Statement> {
    let regions = build_regions(cfg, &lifted.blocks, exception_table, pool, diagnostics);
    let mut structurer = Structurer {
        cfg,
        lifted: &lifted.blocks,
        options,
        diagnostics,
        regions,
        ctx_stack: Vec::new(),
        active_headers: HashSet::new(),
        bounds: Vec::new(),
        escape: None,
        emitted: HashSet::new(),
        label_count: 0,
    };
    if !cfg.irreducible_edges.is_empty() {
        structurer.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            pc: None,
            message: "irreducible control flow; falling back to labels".to_string(),
        });
    }
    let mut body = lifted.prologue.clone();
    structurer.emit_range(cfg.entry, None, &mut body);
    fold_synchronized(&mut body, structurer.diagnostics);
    fold_ternaries(&mut body);
    body
}

/// Groups the exception table into try regions: entries sharing a
/// protected range become sibling catches, `catch_type` zero becomes the
/// `finally`, and the compiler's range-extension entries (which re-protect
/// a handler with the same finally) are dropped.
fn build_regions(
    cfg: &ControlFlowGraph,
    lifted: &[LiftedBlock],
    exception_table: &[ExceptionEntry],
    pool: &ConstantPool,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<TryRegion> {
    let mut grouped: Vec<((u16, u16), Vec<&ExceptionEntry>)> = Vec::new();
    for entry in exception_table {
        let key = (entry.start_pc, entry.end_pc);
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, entries)) => entries.push(entry),
            None => grouped.push((key, vec![entry])),
        }
    }
    let mut regions: Vec<TryRegion> = Vec::new();
    let mut claimed_finally: HashSet<u16> = HashSet::new();
    for ((start_pc, end_pc), entries) in grouped {
        let Some(entry_block) = cfg.block_at(start_pc as u32) else {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                pc: Some(start_pc as u32),
                message: "exception range does not start a block".to_string(),
            });
            continue;
        };
        let mut catches = Vec::new();
        let mut finally_handler = None;
        let mut finally_pc = None;
        for entry in entries {
            let Some(handler) = cfg.block_at(entry.handler_pc as u32) else {
                diagnostics.push(Diagnostic {
                    severity: Severity::Warning,
                    pc: Some(entry.handler_pc as u32),
                    message: "exception handler does not start a block".to_string(),
                });
                continue;
            };
            // The compiler's synchronized-cleanup handler is a
            // monitorexit plus rethrow; it is not source-level at all.
            if entry.catch_type == 0
                && matches!(lifted[handler].exit, BlockExit::Throw(_))
                && lifted[handler].statements.len() == 1
                && matches!(lifted[handler].statements[0], Statement::MonitorExit(_))
            {
                continue;
            }
            if entry.catch_type == 0 {
                finally_handler = Some(handler);
                finally_pc = Some(entry.handler_pc);
            } else {
                match pool.class_name(entry.catch_type) {
                    Ok(name) => catches.push((name.to_string(), handler)),
                    Err(e) => {
                        diagnostics.push(Diagnostic {
                            severity: Severity::Warning,
                            pc: Some(entry.handler_pc as u32),
                            message: format!("unresolvable catch type: {e}"),
                        });
                        catches.push(("java/lang/Throwable".to_string(), handler));
                    }
                }
            }
        }
        if catches.is_empty() && finally_handler.is_some() {
            let pc = finally_pc.unwrap_or_default();
            if claimed_finally.contains(&pc) {
                // Range extension of an already-built try/finally.
                continue;
            }
            // A lone finally attaches to an existing region opening at
            // the same place, if one exists.
            if let Some(base) = regions
                .iter_mut()
                .find(|r| r.start_pc == start_pc as u32 && r.finally_handler.is_none())
            {
                base.finally_handler = finally_handler;
                claimed_finally.insert(pc);
                continue;
            }
            claimed_finally.insert(pc);
        } else if let Some(pc) = finally_pc {
            claimed_finally.insert(pc);
        }
        if catches.is_empty() && finally_handler.is_none() {
            continue;
        }
        regions.push(TryRegion {
            start_pc: start_pc as u32,
            end_pc: end_pc as u32,
            entry_block,
            catches,
            finally_handler,
            done: false,
        });
    }
    regions
}

impl<'a> Structurer<'a> {
    /// Emits statements from `start` until flow ends, `stop` is reached,
    /// or the current bound is crossed (recorded in `self.escape`).
    fn emit_range(&mut self, start: usize, stop: Option<usize>, out: &mut Vec<Statement>) {
        let mut cursor = Some(start);
        while let Some(block) = cursor {
            if Some(block) == stop {
                return;
            }
            if let Some(jump) = self.resolve_jump(block) {
                out.push(jump);
                return;
            }
            if let Some(&bound) = self.bounds.last() {
                if self.cfg.blocks[block].start >= bound {
                    self.escape.get_or_insert(block);
                    return;
                }
            }
            if self.emitted.contains(&block) {
                self.revisit(block, out);
                return;
            }
            if let Some(region) = self.take_region_at(block) {
                cursor = self.emit_try(region, out);
                continue;
            }
            if self.cfg.loop_with_header(block).is_some() && !self.active_headers.contains(&block)
            {
                cursor = self.emit_loop(block, out);
                continue;
            }
            self.emitted.insert(block);
            out.extend(self.lifted[block].statements.iter().cloned());
            let exit_pc = self.lifted[block].exit_pc;
            cursor = match &self.lifted[block].exit {
                BlockExit::Return(value) => {
                    out.push(Statement::Return {
                        value: value.clone(),
                        pc: Some(exit_pc),
                    });
                    None
                }
                BlockExit::Throw(value) => {
                    out.push(Statement::Throw {
                        value: value.clone(),
                        pc: Some(exit_pc),
                    });
                    None
                }
                BlockExit::Branch { condition } => {
                    self.emit_if(block, condition.clone(), stop, out)
                }
                BlockExit::Switch { selector } => {
                    self.emit_switch(block, selector.clone(), out)
                }
                BlockExit::Jump | BlockExit::FallThrough => {
                    self.cfg.blocks[block].successor(EdgeKind::Normal)
                }
            };
        }
    }

    fn collect_range(&mut self, start: usize, stop: Option<usize>) -> Vec<Statement> {
        let mut out = Vec::new();
        self.emit_range(start, stop, &mut out);
        out
    }

    /// `break`/`continue` statement reaching `target` through the active
    /// contexts, labeled when the target context is not the innermost.
    fn resolve_jump(&mut self, target: usize) -> Option<Statement> {
        let len = self.ctx_stack.len();
        for offset in 0..len {
            let index = len - 1 - offset;
            let is_innermost = offset == 0;
            let ctx = &self.ctx_stack[index];
            if ctx.follow == Some(target) {
                let label = if is_innermost {
                    None
                } else {
                    Some(self.label_for(index))
                };
                return Some(Statement::Break { label });
            }
            if ctx.kind == CtxKind::Loop && ctx.continue_target == Some(target) {
                let innermost_loop = self
                    .ctx_stack
                    .iter()
                    .rev()
                    .position(|c| c.kind == CtxKind::Loop)
                    .map(|p| len - 1 - p);
                let label = if innermost_loop == Some(index) {
                    None
                } else {
                    Some(self.label_for(index))
                };
                return Some(Statement::Continue { label });
            }
        }
        None
    }

    fn label_for(&mut self, index: usize) -> String {
        if self.ctx_stack[index].label.is_none() {
            self.label_count += 1;
            self.ctx_stack[index].label = Some(format!("label{}", self.label_count));
        }
        self.ctx_stack[index].label.clone().unwrap_or_default()
    }

    /// A block reached a second time: split small terminal blocks by
    /// re-emitting them; otherwise give up with a diagnostic.
    fn revisit(&mut self, block: usize, out: &mut Vec<Statement>) {
        let lifted = &self.lifted[block];
        let splittable = lifted.statements.len() <= 4
            && matches!(lifted.exit, BlockExit::Return(_) | BlockExit::Throw(_));
        if splittable {
            out.extend(lifted.statements.iter().cloned());
            match &lifted.exit {
                BlockExit::Return(value) => out.push(Statement::Return {
                    value: value.clone(),
                    pc: Some(lifted.exit_pc),
                }),
                BlockExit::Throw(value) => out.push(Statement::Throw {
                    value: value.clone(),
                    pc: Some(lifted.exit_pc),
                }),
                _ => {}
            }
            return;
        }
        let pc = self.cfg.blocks[block].start;
        warn!("unstructurable jump to pc {pc}");
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            pc: Some(pc),
            message: "control flow could not be structured here".to_string(),
        });
        out.push(Statement::Comment(format!(
            "unstructured jump to offset {pc}"
        )));
    }

    fn take_region_at(&mut self, block: usize) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (index, region) in self.regions.iter().enumerate() {
            if region.done || region.entry_block != block {
                continue;
            }
            best = match best {
                Some(current) if self.regions[current].end_pc >= region.end_pc => Some(current),
                _ => Some(index),
            };
        }
        if let Some(index) = best {
            self.regions[index].done = true;
        }
        best
    }

    fn emit_if(
        &mut self,
        block: usize,
        condition: Expression,
        stop: Option<usize>,
        out: &mut Vec<Statement>,
    ) -> Option<usize> {
        let true_target = self.cfg.blocks[block]
            .successor(EdgeKind::True)
            .expect("branch block has a true edge");
        let false_target = self.cfg.blocks[block]
            .successor(EdgeKind::False)
            .expect("branch block has a false edge");
        if true_target == false_target {
            out.push(Statement::If {
                condition,
                then_branch: Vec::new(),
                else_branch: None,
                pc: Some(self.lifted[block].exit_pc),
            });
            return Some(true_target);
        }
        let pc = Some(self.lifted[block].exit_pc);
        // A branch arm that is a break or continue stays a one-statement
        // arm, and flow continues down the other edge.
        let true_jump = self.resolve_jump(true_target);
        let false_jump = self.resolve_jump(false_target);
        match (true_jump, false_jump) {
            (Some(true_jump), Some(false_jump)) => {
                out.push(Statement::If {
                    condition,
                    then_branch: vec![true_jump],
                    else_branch: None,
                    pc,
                });
                out.push(false_jump);
                return None;
            }
            (Some(true_jump), None) => {
                out.push(Statement::If {
                    condition,
                    then_branch: vec![true_jump],
                    else_branch: None,
                    pc,
                });
                return Some(false_target);
            }
            (None, Some(false_jump)) => {
                out.push(Statement::If {
                    condition: negate(condition),
                    then_branch: vec![false_jump],
                    else_branch: None,
                    pc,
                });
                return Some(true_target);
            }
            (None, None) => {}
        }
        let join = self.ipostdom_clamped(block, stop);
        if join == Some(false_target) {
            // Only the taken edge has a body.
            let then_branch = self.collect_range(true_target, join);
            out.push(Statement::If {
                condition,
                then_branch,
                else_branch: None,
                pc,
            });
            return join;
        }
        if join == Some(true_target) {
            let then_branch = self.collect_range(false_target, join);
            out.push(Statement::If {
                condition: negate(condition),
                then_branch,
                else_branch: None,
                pc,
            });
            return join;
        }
        let then_branch = self.collect_range(false_target, join);
        let else_branch = self.collect_range(true_target, join);
        if else_branch.is_empty() {
            out.push(Statement::If {
                condition: negate(condition),
                then_branch,
                else_branch: None,
                pc,
            });
        } else {
            out.push(Statement::If {
                condition: negate(condition),
                then_branch,
                else_branch: Some(else_branch),
                pc,
            });
        }
        join
    }

    /// The branch join: its immediate post-dominator, bounded by the
    /// surrounding stop block.
    fn ipostdom_clamped(&self, block: usize, stop: Option<usize>) -> Option<usize> {
        let join = self.cfg.ipostdom[block];
        if join.is_some() && join == stop {
            return stop;
        }
        join
    }

    fn emit_loop(&mut self, header: usize, out: &mut Vec<Statement>) -> Option<usize> {
        let lp = self
            .cfg
            .loop_with_header(header)
            .expect("emit_loop called on a loop header");
        let body_set = lp.body.clone();
        let latches = lp.latches.clone();
        let pc = Some(self.lifted[header].exit_pc);
        self.active_headers.insert(header);
        let cursor = self.emit_loop_shape(header, body_set, latches, pc, out);
        self.active_headers.remove(&header);
        cursor
    }

    fn emit_loop_shape(
        &mut self,
        header: usize,
        body_set: std::collections::BTreeSet<usize>,
        latches: Vec<usize>,
        pc: Option<u32>,
        out: &mut Vec<Statement>,
    ) -> Option<usize> {

        // while (cond) { ... }: a bare conditional header with one edge
        // staying inside and one leaving.
        if let BlockExit::Branch { condition } = &self.lifted[header].exit {
            let t = self.cfg.blocks[header].successor(EdgeKind::True).unwrap_or(header);
            let f = self.cfg.blocks[header].successor(EdgeKind::False).unwrap_or(header);
            let t_inside = body_set.contains(&t);
            let f_inside = body_set.contains(&f);
            if t_inside != f_inside && self.lifted[header].statements.is_empty() {
                let (cond, body_entry, follow) = if t_inside {
                    (condition.clone(), t, f)
                } else {
                    (negate(condition.clone()), f, t)
                };
                self.emitted.insert(header);
                self.ctx_stack.push(Ctx {
                    kind: CtxKind::Loop,
                    continue_target: Some(header),
                    follow: Some(follow),
                    label: None,
                });
                let body = self.collect_range(body_entry, Some(header));
                let ctx = self.ctx_stack.pop().expect("loop ctx pushed above");
                let statement = Statement::While {
                    condition: cond,
                    body,
                    pc,
                };
                let statement = self.try_fold_for(statement, out);
                out.push(apply_label(statement, ctx.label));
                return Some(follow);
            }
        }

        // do { ... } while (cond): the single latch tests and jumps back.
        if let [latch] = latches.as_slice() {
            if let BlockExit::Branch { condition } = &self.lifted[*latch].exit {
                let t = self.cfg.blocks[*latch].successor(EdgeKind::True).unwrap_or(header);
                let f = self.cfg.blocks[*latch].successor(EdgeKind::False).unwrap_or(header);
                if t == header || f == header {
                    let (cond, follow) = if t == header {
                        (condition.clone(), f)
                    } else {
                        (negate(condition.clone()), t)
                    };
                    self.ctx_stack.push(Ctx {
                        kind: CtxKind::Loop,
                        continue_target: Some(*latch),
                        follow: Some(follow),
                        label: None,
                    });
                    let mut body = if *latch == header {
                        Vec::new()
                    } else {
                        self.collect_range(header, Some(*latch))
                    };
                    self.emitted.insert(*latch);
                    body.extend(self.lifted[*latch].statements.iter().cloned());
                    let ctx = self.ctx_stack.pop().expect("loop ctx pushed above");
                    let statement = Statement::DoWhile {
                        body,
                        condition: cond,
                        pc: Some(self.lifted[*latch].exit_pc),
                    };
                    out.push(apply_label(statement, ctx.label));
                    return Some(follow);
                }
            }
        }

        // Anything else: while (true) with explicit breaks.
        let follow = self.loop_follow(&body_set);
        self.ctx_stack.push(Ctx {
            kind: CtxKind::Loop,
            continue_target: Some(header),
            follow,
            label: None,
        });
        let mut body = self.collect_range(header, None);
        if matches!(body.last(), Some(Statement::Continue { label: None })) {
            // The back edge at the lexical end of the body is implicit.
            body.pop();
        }
        let ctx = self.ctx_stack.pop().expect("loop ctx pushed above");
        let statement = Statement::While {
            condition: Expression::Literal {
                value: LiteralValue::Bool(true),
            },
            body,
            pc,
        };
        out.push(apply_label(statement, ctx.label));
        follow
    }

    /// The block where a multi-exit loop resumes: the earliest target
    /// outside the body.
    fn loop_follow(&self, body: &std::collections::BTreeSet<usize>) -> Option<usize> {
        let mut candidates: Vec<usize> = body
            .iter()
            .flat_map(|&b| {
                self.cfg.blocks[b]
                    .successors
                    .iter()
                    .filter(|(_, k)| !matches!(k, EdgeKind::Exception))
                    .map(|(s, _)| *s)
            })
            .filter(|s| !body.contains(s))
            .collect();
        candidates.sort_by_key(|&b| self.cfg.blocks[b].start);
        candidates.first().copied()
    }

    /// `while` into `for` when the loop is driven by a variable that is
    /// initialized just before the loop, tested by the condition, and
    /// updated as the body's final act.
    fn try_fold_for(&mut self, statement: Statement, out: &mut Vec<Statement>) -> Statement {
        if !self.options.prefer_for_loops {
            return statement;
        }
        let (condition, mut body, pc) = match statement {
            Statement::While {
                condition,
                body,
                pc,
            } => (condition, body, pc),
            other => return other,
        };
        let update_name = match body.last() {
            Some(Statement::Assign {
                target: Expression::Local { name, .. },
                ..
            }) => Some(name.clone()),
            _ => None,
        };
        let init_matches = |name: &str| match out.last() {
            Some(Statement::LocalDecl {
                name: decl_name,
                init: Some(_),
                ..
            }) => decl_name == name,
            Some(Statement::Assign {
                target: Expression::Local {
                    name: assign_name, ..
                },
                ..
            }) => assign_name == name,
            _ => false,
        };
        match update_name {
            Some(name) if condition.reads_name(&name) && init_matches(&name) => {
                let update = body.pop().expect("checked non-empty above");
                let init = out.pop().expect("checked non-empty above");
                Statement::For {
                    init: Some(Box::new(init)),
                    condition: Some(condition),
                    update: Some(Box::new(update)),
                    body,
                    pc,
                }
            }
            _ => Statement::While {
                condition,
                body,
                pc,
            },
        }
    }

    fn emit_switch(
        &mut self,
        block: usize,
        selector: Expression,
        out: &mut Vec<Statement>,
    ) -> Option<usize> {
        // Group case keys by their target block, in PC order.
        let mut order: Vec<usize> = Vec::new();
        let mut labels_by_target: HashMap<usize, Vec<Option<i32>>> = HashMap::new();
        let mut default_target = None;
        for (successor, kind) in &self.cfg.blocks[block].successors {
            let EdgeKind::Case(key) = kind else { continue };
            if key.is_none() {
                default_target = Some(*successor);
            }
            if !order.contains(successor) {
                order.push(*successor);
            }
            labels_by_target.entry(*successor).or_default().push(*key);
        }
        order.sort_by_key(|&b| self.cfg.blocks[b].start);
        // Table entries that fall to the default block are padding, not
        // source-level cases.
        if let Some(default_target) = default_target {
            if let Some(labels) = labels_by_target.get_mut(&default_target) {
                labels.retain(|l| l.is_none());
            }
        }
        let follow = self.cfg.ipostdom[block];
        self.ctx_stack.push(Ctx {
            kind: CtxKind::Switch,
            continue_target: None,
            follow,
            label: None,
        });
        let mut cases = Vec::new();
        for (position, &target) in order.iter().enumerate() {
            if Some(target) == follow {
                continue;
            }
            let boundary = order.get(position + 1).copied().or(follow);
            let body = self.collect_range(target, boundary);
            let falls_through = !matches!(
                body.last(),
                Some(
                    Statement::Break { .. }
                        | Statement::Continue { .. }
                        | Statement::Return { .. }
                        | Statement::Throw { .. }
                )
            ) && position + 1 < order.len();
            let mut labels = labels_by_target.remove(&target).unwrap_or_default();
            labels.sort();
            cases.push(SwitchCase {
                labels,
                body,
                falls_through,
            });
        }
        let ctx = self.ctx_stack.pop().expect("switch ctx pushed above");
        let statement = Statement::Switch {
            selector,
            cases,
            pc: Some(self.lifted[block].exit_pc),
        };
        out.push(apply_label(statement, ctx.label));
        follow
    }

    fn emit_try(&mut self, region_index: usize, out: &mut Vec<Statement>) -> Option<usize> {
        let entry_block = self.regions[region_index].entry_block;
        let catches: Vec<(String, usize)> = self.regions[region_index].catches.clone();
        let finally_handler = self.regions[region_index].finally_handler;
        let mut handler_starts: Vec<u32> = catches
            .iter()
            .map(|(_, h)| self.cfg.blocks[*h].start)
            .chain(
                finally_handler
                    .iter()
                    .map(|&h| self.cfg.blocks[h].start),
            )
            .collect();
        handler_starts.sort_unstable();
        let Some(&first_handler_start) = handler_starts.first() else {
            return self.cfg.blocks[entry_block].successor(EdgeKind::Normal);
        };

        // Body runs up to the first handler; where it jumps past the
        // handlers is the whole statement's follow.
        let saved_escape = self.escape.take();
        self.bounds.push(first_handler_start);
        let mut body = Vec::new();
        self.emit_range(entry_block, None, &mut body);
        self.bounds.pop();
        let mut follow = self.escape.take();

        let mut catch_clauses = Vec::new();
        for (position, (class, handler)) in catches.iter().enumerate() {
            let next_start = handler_starts
                .iter()
                .find(|&&s| s > self.cfg.blocks[*handler].start)
                .copied();
            if let Some(bound) = next_start {
                self.bounds.push(bound);
            }
            let mut clause_body = Vec::new();
            self.emit_range(*handler, follow, &mut clause_body);
            if next_start.is_some() {
                self.bounds.pop();
            }
            if follow.is_none() {
                follow = self.escape.take();
            } else {
                self.escape = None;
            }
            let name = self.lifted[*handler]
                .caught_name
                .clone()
                .unwrap_or_else(|| format!("e{}", position + 1));
            catch_clauses.push(CatchClause {
                exception_type: class.clone(),
                name,
                body: clause_body,
            });
        }

        let finally = finally_handler.map(|handler| {
            let mut clause_body = Vec::new();
            self.emit_range(handler, follow, &mut clause_body);
            if follow.is_none() {
                follow = self.escape.take();
            } else {
                self.escape = None;
            }
            // The handler form is `{ cleanup; throw caught; }`; the
            // rethrow is the encoding, not the source.
            if let (Some(Statement::Throw { value, .. }), Some(caught)) =
                (clause_body.last(), self.lifted[handler].caught_name.as_ref())
            {
                if matches!(value, Expression::Local { name, .. } if name == caught) {
                    clause_body.pop();
                }
            }
            clause_body
        });

        // The compiler inlines the finally block ahead of every normal
        // exit; those copies do not belong in the emitted source.
        if let Some(finally) = &finally {
            if !finally.is_empty() {
                strip_suffix(&mut body, finally);
                for clause in &mut catch_clauses {
                    strip_suffix(&mut clause.body, finally);
                }
            }
        }
        self.escape = saved_escape;

        out.push(Statement::Try {
            body,
            catches: catch_clauses,
            finally,
        });
        follow
    }
}

fn apply_label(statement: Statement, label: Option<String>) -> Statement {
    match label {
        Some(label) => Statement::Labeled {
            label,
            body: Box::new(statement),
        },
        None => statement,
    }
}

fn negate(condition: Expression) -> Expression {
    match condition {
        Expression::Binary { op, lhs, rhs, ty } => match op.negated() {
            Some(negated) => Expression::Binary {
                op: negated,
                lhs,
                rhs,
                ty,
            },
            None => not(Expression::Binary { op, lhs, rhs, ty }),
        },
        Expression::Unary {
            op: UnaryOp::Not,
            value,
            ..
        } => *value,
        Expression::Literal {
            value: LiteralValue::Bool(b),
        } => Expression::Literal {
            value: LiteralValue::Bool(!b),
        },
        other => not(other),
    }
}

fn not(value: Expression) -> Expression {
    Expression::Unary {
        op: UnaryOp::Not,
        value: Box::new(value),
        ty: FieldType::Base(BaseType::Boolean),
    }
}

/// Removes `suffix` from the end of `statements` when it is duplicated
/// there. The duplicated copies come from different PCs, so comparison
/// ignores source attribution.
fn strip_suffix(statements: &mut Vec<Statement>, suffix: &[Statement]) {
    if statements.len() < suffix.len() {
        return;
    }
    let tail = statements.len() - suffix.len();
    let matches = statements[tail..]
        .iter()
        .zip(suffix)
        .all(|(a, b)| without_pc(a) == without_pc(b));
    if matches {
        statements.truncate(tail);
    }
}

/// A copy of the statement with every PC attribution cleared, for
/// structural comparison of compiler-duplicated code.
fn without_pc(statement: &Statement) -> Statement {
    let mut cleared = statement.clone();
    clear_pc(&mut cleared);
    cleared
}

fn clear_pcs(statements: &mut [Statement]) {
    for statement in statements {
        clear_pc(statement);
    }
}

fn clear_pc(statement: &mut Statement) {
    match statement {
        Statement::LocalDecl { pc, .. }
        | Statement::Expr { pc, .. }
        | Statement::Assign { pc, .. }
        | Statement::Return { pc, .. }
        | Statement::Throw { pc, .. } => *pc = None,
        Statement::Block(body) => clear_pcs(body),
        Statement::If {
            then_branch,
            else_branch,
            pc,
            ..
        } => {
            *pc = None;
            clear_pcs(then_branch);
            if let Some(else_branch) = else_branch {
                clear_pcs(else_branch);
            }
        }
        Statement::While { body, pc, .. }
        | Statement::DoWhile { body, pc, .. }
        | Statement::For { body, pc, .. } => {
            *pc = None;
            clear_pcs(body);
        }
        Statement::Switch { cases, pc, .. } => {
            *pc = None;
            for case in cases {
                clear_pcs(&mut case.body);
            }
        }
        Statement::Try {
            body,
            catches,
            finally,
        } => {
            clear_pcs(body);
            for catch in catches {
                clear_pcs(&mut catch.body);
            }
            if let Some(finally) = finally {
                clear_pcs(finally);
            }
        }
        Statement::Synchronized { body, .. } => clear_pcs(body),
        Statement::Labeled { body, .. } => clear_pc(body),
        Statement::Break { .. }
        | Statement::Continue { .. }
        | Statement::MonitorEnter(_)
        | Statement::MonitorExit(_)
        | Statement::Comment(_) => {}
    }
}

/// Pairs monitorenter/monitorexit markers into `synchronized` blocks,
/// dropping the duplicate exits the compiler plants before early returns.
fn fold_synchronized(statements: &mut Vec<Statement>, diagnostics: &mut Vec<Diagnostic>) {
    let mut index = 0;
    while index < statements.len() {
        recurse_fold_synchronized(&mut statements[index], diagnostics);
        if !matches!(statements[index], Statement::MonitorEnter(_)) {
            index += 1;
            continue;
        }
        // Find the matching exit: the last exit at depth one.
        let mut depth = 1usize;
        let mut matching = None;
        for (offset, statement) in statements[index + 1..].iter().enumerate() {
            match statement {
                Statement::MonitorEnter(_) => depth += 1,
                Statement::MonitorExit(_) => {
                    if depth == 1 {
                        matching = Some(index + 1 + offset);
                    } else {
                        depth -= 1;
                    }
                }
                _ => {}
            }
        }
        let Some(matching) = matching else {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                pc: None,
                message: "unmatched monitorenter".to_string(),
            });
            statements[index] = Statement::Comment("monitorenter".to_string());
            index += 1;
            continue;
        };
        let Statement::MonitorEnter(monitor) = statements[index].clone() else {
            unreachable!("checked above");
        };
        let mut body: Vec<Statement> = statements.drain(index + 1..=matching).collect();
        body.pop();
        // Early-exit duplicates inside the region.
        body.retain(|s| !matches!(s, Statement::MonitorExit(_)));
        fold_synchronized(&mut body, diagnostics);
        statements[index] = Statement::Synchronized { monitor, body };
        index += 1;
    }
}

fn recurse_fold_synchronized(statement: &mut Statement, diagnostics: &mut Vec<Diagnostic>) {
    match statement {
        Statement::Block(body)
        | Statement::While { body, .. }
        | Statement::DoWhile { body, .. }
        | Statement::For { body, .. }
        | Statement::Synchronized { body, .. } => fold_synchronized(body, diagnostics),
        Statement::If {
            then_branch,
            else_branch,
            ..
        } => {
            fold_synchronized(then_branch, diagnostics);
            if let Some(else_branch) = else_branch {
                fold_synchronized(else_branch, diagnostics);
            }
        }
        Statement::Switch { cases, .. } => {
            for case in cases {
                fold_synchronized(&mut case.body, diagnostics);
            }
        }
        Statement::Try {
            body,
            catches,
            finally,
        } => {
            fold_synchronized(body, diagnostics);
            for catch in catches {
                fold_synchronized(&mut catch.body, diagnostics);
            }
            if let Some(finally) = finally {
                fold_synchronized(finally, diagnostics);
            }
        }
        Statement::Labeled { body, .. } => recurse_fold_synchronized(body, diagnostics),
        _ => {}
    }
}

/// `if (c) t = a; else t = b;` into `t = c ? a : b;` — the shape join
/// temporaries leave behind.
fn fold_ternaries(statements: &mut Vec<Statement>) {
    for statement in statements.iter_mut() {
        fold_ternaries_in(statement);
    }
    for statement in statements.iter_mut() {
        let folded = match statement {
            Statement::If {
                condition,
                then_branch,
                else_branch: Some(else_branch),
                pc,
            } => match (then_branch.as_slice(), else_branch.as_slice()) {
                (
                    [Statement::Assign {
                        target: then_target,
                        value: then_value,
                        op: None,
                        ..
                    }],
                    [Statement::Assign {
                        target: else_target,
                        value: else_value,
                        op: None,
                        ..
                    }],
                ) => {
                    let same_local = matches!(
                        (then_target, else_target),
                        (
                            Expression::Local { name: a, .. },
                            Expression::Local { name: b, .. }
                        ) if a == b
                    );
                    if same_local {
                        Some(Statement::Assign {
                            target: then_target.clone(),
                            value: Expression::Ternary {
                                condition: Box::new(condition.clone()),
                                then_value: Box::new(then_value.clone()),
                                else_value: Box::new(else_value.clone()),
                            },
                            op: None,
                            pc: *pc,
                        })
                    } else {
                        None
                    }
                }
                _ => None,
            },
            _ => None,
        };
        if let Some(folded) = folded {
            *statement = folded;
        }
    }
}

fn fold_ternaries_in(statement: &mut Statement) {
    match statement {
        Statement::Block(body)
        | Statement::While { body, .. }
        | Statement::DoWhile { body, .. }
        | Statement::For { body, .. }
        | Statement::Synchronized { body, .. } => fold_ternaries(body),
        Statement::If {
            then_branch,
            else_branch,
            ..
        } => {
            fold_ternaries(then_branch);
            if let Some(else_branch) = else_branch {
                fold_ternaries(else_branch);
            }
        }
        Statement::Switch { cases, .. } => {
            for case in cases {
                fold_ternaries(&mut case.body);
            }
        }
        Statement::Try {
            body,
            catches,
            finally,
        } => {
            fold_ternaries(body);
            for catch in catches {
                fold_ternaries(&mut catch.body);
            }
            if let Some(finally) = finally {
                fold_ternaries(finally);
            }
        }
        Statement::Labeled { body, .. } => fold_ternaries_in(body),
        _ => {}
    }
}
