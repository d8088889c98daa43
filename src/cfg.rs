//! Control-flow graph over decoded bytecode: basic blocks, dominators,
//! and natural-loop detection.
//!
//! Blocks hold their successors; predecessor lists are derived from the
//! successor lists, so the whole graph lives in one `Vec` and is wired
//! with integer indices instead of cyclic pointers.

use std::collections::{BTreeSet, HashMap};

use jloader::attributes::ExceptionEntry;
use log::debug;

use crate::errors::bytecode::{BytecodeCause, BytecodeError};
use crate::ops::mnemonics::Mnemonic;
use crate::ops::CodeListing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Normal,
    /// Taken edge of a conditional branch.
    True,
    /// Fall-through edge of a conditional branch.
    False,
    /// One switch case; `None` is the default edge.
    Case(Option<i32>),
    Exception,
}

#[derive(Debug)]
pub struct BasicBlock {
    /// Half-open PC range `[start, end)`.
    pub start: u32,
    pub end: u32,
    /// Indices into the listing's instruction vector, inclusive.
    pub first: usize,
    pub last: usize,
    pub successors: Vec<(usize, EdgeKind)>,
    pub predecessors: Vec<usize>,
    pub is_handler: bool,
}

impl BasicBlock {
    /// Successor along the given edge kind, if present.
    pub fn successor(&self, kind: EdgeKind) -> Option<usize> {
        self.successors
            .iter()
            .find_map(|(b, k)| (*k == kind).then_some(*b))
    }

    fn normal_successors(&self) -> impl Iterator<Item = usize> + '_ {
        self.successors
            .iter()
            .filter(|(_, k)| !matches!(k, EdgeKind::Exception))
            .map(|(b, _)| *b)
    }
}

/// A natural loop: the blocks that can reach a back edge's source without
/// leaving through its target.
#[derive(Debug)]
pub struct NaturalLoop {
    pub header: usize,
    pub latches: Vec<usize>,
    pub body: BTreeSet<usize>,
}

#[derive(Debug)]
pub struct ControlFlowGraph {
    pub blocks: Vec<BasicBlock>,
    pub entry: usize,
    /// Reverse post order over all edges.
    pub rpo: Vec<usize>,
    /// Immediate dominator per block; `None` for the entry.
    pub idom: Vec<Option<usize>>,
    /// Immediate post-dominator per block; `None` when the block reaches
    /// the method exit directly.
    pub ipostdom: Vec<Option<usize>>,
    pub loops: Vec<NaturalLoop>,
    /// Retreating edges whose target does not dominate their source.
    pub irreducible_edges: Vec<(usize, usize)>,
    block_by_start: HashMap<u32, usize>,
}

impl ControlFlowGraph {
    pub fn build(
        listing: &CodeListing,
        exception_table: &[ExceptionEntry],
    ) -> Result<ControlFlowGraph, BytecodeError> {
        let blocks = build_blocks(listing, exception_table)?;
        let mut cfg = ControlFlowGraph {
            block_by_start: blocks
                .iter()
                .enumerate()
                .map(|(i, b)| (b.start, i))
                .collect(),
            blocks,
            entry: 0,
            rpo: Vec::new(),
            idom: Vec::new(),
            ipostdom: Vec::new(),
            loops: Vec::new(),
            irreducible_edges: Vec::new(),
        };
        cfg.compute_predecessors();
        cfg.compute_rpo();
        cfg.compute_dominators();
        cfg.compute_postdominators();
        cfg.find_loops();
        debug!(
            "cfg: {} blocks, {} loops",
            cfg.blocks.len(),
            cfg.loops.len()
        );
        Ok(cfg)
    }

    pub fn block_at(&self, pc: u32) -> Option<usize> {
        self.block_by_start.get(&pc).copied()
    }

    /// Whether `a` dominates `b` (reflexively).
    pub fn dominates(&self, a: usize, b: usize) -> bool {
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.idom[current] {
                Some(next) => current = next,
                None => return false,
            }
        }
    }

    pub fn loop_with_header(&self, header: usize) -> Option<&NaturalLoop> {
        self.loops.iter().find(|l| l.header == header)
    }

    fn compute_predecessors(&mut self) {
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); self.blocks.len()];
        for (index, block) in self.blocks.iter().enumerate() {
            for (successor, _) in &block.successors {
                if !predecessors[*successor].contains(&index) {
                    predecessors[*successor].push(index);
                }
            }
        }
        for (block, preds) in self.blocks.iter_mut().zip(predecessors) {
            block.predecessors = preds;
        }
    }

    fn compute_rpo(&mut self) {
        let mut visited = vec![false; self.blocks.len()];
        let mut on_stack = vec![false; self.blocks.len()];
        let mut postorder = Vec::with_capacity(self.blocks.len());
        let mut irreducible = Vec::new();
        // Iterative DFS; the explicit stack carries (block, next-edge).
        let mut stack = vec![(self.entry, 0usize)];
        visited[self.entry] = true;
        on_stack[self.entry] = true;
        while let Some((block, edge)) = stack.last_mut() {
            let block = *block;
            let successors: Vec<(usize, EdgeKind)> = self.blocks[block].successors.clone();
            if *edge < successors.len() {
                let (next, kind) = successors[*edge];
                *edge += 1;
                if !visited[next] {
                    visited[next] = true;
                    on_stack[next] = true;
                    stack.push((next, 0));
                } else if on_stack[next] && !matches!(kind, EdgeKind::Exception) {
                    // Retreating edge; reducibility is judged after
                    // dominators are known. Exception edges never form
                    // source-level loops.
                    irreducible.push((block, next));
                }
            } else {
                postorder.push(block);
                on_stack[block] = false;
                stack.pop();
            }
        }
        postorder.reverse();
        self.rpo = postorder;
        // Candidates only; filtered against dominators in find_loops.
        self.irreducible_edges = irreducible;
    }

    /// Iterative dominator computation over the reverse post order.
    fn compute_dominators(&mut self) {
        let len = self.blocks.len();
        let mut rpo_number = vec![usize::MAX; len];
        for (number, block) in self.rpo.iter().enumerate() {
            rpo_number[*block] = number;
        }
        let mut idom: Vec<Option<usize>> = vec![None; len];
        idom[self.entry] = Some(self.entry);
        let mut changed = true;
        while changed {
            changed = false;
            for &block in &self.rpo {
                if block == self.entry {
                    continue;
                }
                let mut new_idom: Option<usize> = None;
                for &pred in &self.blocks[block].predecessors {
                    if idom[pred].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => intersect(&idom, &rpo_number, pred, current),
                    });
                }
                if new_idom != idom[block] && new_idom.is_some() {
                    idom[block] = new_idom;
                    changed = true;
                }
            }
        }
        idom[self.entry] = None;
        self.idom = idom;
    }

    /// Post-dominators over the reversed graph with a virtual exit that
    /// every return and throw block reaches.
    fn compute_postdominators(&mut self) {
        let len = self.blocks.len();
        let exit = len;
        // Reverse edges; the virtual exit adopts every block with no
        // forward successors.
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); len + 1];
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); len + 1];
        for (index, block) in self.blocks.iter().enumerate() {
            let mut forward: Vec<usize> = block.normal_successors().collect();
            forward.dedup();
            if forward.is_empty() {
                forward.push(exit);
            }
            for target in forward {
                successors[index].push(target);
                predecessors[target].push(index);
            }
        }
        // Postorder of the reversed graph, rooted at the virtual exit.
        let mut visited = vec![false; len + 1];
        let mut order = Vec::with_capacity(len + 1);
        let mut stack = vec![(exit, 0usize)];
        visited[exit] = true;
        while let Some((node, edge)) = stack.last_mut() {
            let node = *node;
            if *edge < predecessors[node].len() {
                let next = predecessors[node][*edge];
                *edge += 1;
                if !visited[next] {
                    visited[next] = true;
                    stack.push((next, 0));
                }
            } else {
                order.push(node);
                stack.pop();
            }
        }
        order.reverse();
        let mut order_number = vec![usize::MAX; len + 1];
        for (number, node) in order.iter().enumerate() {
            order_number[*node] = number;
        }
        let mut ipdom: Vec<Option<usize>> = vec![None; len + 1];
        ipdom[exit] = Some(exit);
        let mut changed = true;
        while changed {
            changed = false;
            for &node in &order {
                if node == exit {
                    continue;
                }
                let mut new_ipdom: Option<usize> = None;
                for &succ in &successors[node] {
                    if ipdom[succ].is_none() {
                        continue;
                    }
                    new_ipdom = Some(match new_ipdom {
                        None => succ,
                        Some(current) => intersect(&ipdom, &order_number, succ, current),
                    });
                }
                if new_ipdom != ipdom[node] && new_ipdom.is_some() {
                    ipdom[node] = new_ipdom;
                    changed = true;
                }
            }
        }
        self.ipostdom = ipdom
            .into_iter()
            .take(len)
            .map(|d| d.filter(|&d| d != exit))
            .collect();
    }

    /// Natural loops from back edges; a retreating edge whose target does
    /// not dominate its source marks the flow irreducible there.
    fn find_loops(&mut self) {
        let candidates = std::mem::take(&mut self.irreducible_edges);
        let mut loops: HashMap<usize, NaturalLoop> = HashMap::new();
        for (source, target) in candidates {
            if !self.dominates(target, source) {
                self.irreducible_edges.push((source, target));
                continue;
            }
            let entry = loops.entry(target).or_insert_with(|| NaturalLoop {
                header: target,
                latches: Vec::new(),
                body: BTreeSet::from([target]),
            });
            entry.latches.push(source);
            // Everything that reaches the latch without passing the
            // header belongs to the body.
            let mut work = vec![source];
            while let Some(block) = work.pop() {
                if entry.body.insert(block) {
                    for &pred in &self.blocks[block].predecessors {
                        work.push(pred);
                    }
                }
            }
        }
        let mut loops: Vec<NaturalLoop> = loops.into_values().collect();
        // Outer loops first.
        loops.sort_by_key(|l| (l.header, std::cmp::Reverse(l.body.len())));
        self.loops = loops;
    }
}

fn intersect(
    idom: &[Option<usize>],
    number: &[usize],
    mut a: usize,
    mut b: usize,
) -> usize {
    while a != b {
        while number[a] > number[b] {
            a = idom[a].expect("dominator walk left the processed region");
        }
        while number[b] > number[a] {
            b = idom[b].expect("dominator walk left the processed region");
        }
    }
    a
}

fn build_blocks(
    listing: &CodeListing,
    exception_table: &[ExceptionEntry],
) -> Result<Vec<BasicBlock>, BytecodeError> {
    if listing.instructions.is_empty() {
        return Err(BytecodeError::new(
            BytecodeCause::TruncatedInstruction { pc: 0 },
            "method has an empty code array",
        ));
    }
    let code_length = listing.code_length;
    let mut leaders: BTreeSet<u32> = BTreeSet::from([0]);
    let leader_check = |pc: u32, target: u32| -> Result<u32, BytecodeError> {
        if listing.index_of_pc(target).is_none() {
            return Err(BytecodeError::new(
                BytecodeCause::InvalidBranchTarget { pc, target },
                "branch lands inside another instruction",
            ));
        }
        Ok(target)
    };
    for instruction in &listing.instructions {
        let mnemonic = instruction.mnemonic;
        if !mnemonic.is_block_terminator() {
            continue;
        }
        if let Some(target) = instruction.jump_target() {
            leaders.insert(leader_check(instruction.pc, target)?);
        }
        if let Some(table) = instruction.table_switch() {
            for &target in table.targets.iter().chain(std::iter::once(&table.default)) {
                leaders.insert(leader_check(instruction.pc, target)?);
            }
        }
        if let Some(lookup) = instruction.lookup_switch() {
            for &(_, target) in &lookup.pairs {
                leaders.insert(leader_check(instruction.pc, target)?);
            }
            leaders.insert(leader_check(instruction.pc, lookup.default)?);
        }
        if instruction.next_pc() < code_length {
            leaders.insert(leader_check(instruction.pc, instruction.next_pc())?);
        }
    }
    for entry in exception_table {
        leaders.insert(leader_check(entry.handler_pc as u32, entry.handler_pc as u32)?);
        leaders.insert(leader_check(entry.start_pc as u32, entry.start_pc as u32)?);
        if (entry.end_pc as u32) < code_length {
            leaders.insert(leader_check(entry.start_pc as u32, entry.end_pc as u32)?);
        }
    }

    let starts: Vec<u32> = leaders.into_iter().collect();
    let mut blocks = Vec::with_capacity(starts.len());
    let mut index_of_start: HashMap<u32, usize> = HashMap::new();
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(code_length);
        let first = listing
            .index_of_pc(start)
            .expect("leader is an instruction start");
        // Last instruction beginning before `end`.
        let mut last = first;
        while last + 1 < listing.instructions.len() && listing.instructions[last + 1].pc < end {
            last += 1;
        }
        index_of_start.insert(start, i);
        blocks.push(BasicBlock {
            start,
            end,
            first,
            last,
            successors: Vec::new(),
            predecessors: Vec::new(),
            is_handler: false,
        });
    }

    let block_of = |pc: u32| -> usize { index_of_start[&pc] };
    for i in 0..blocks.len() {
        let last = &listing.instructions[blocks[i].last];
        let mut successors: Vec<(usize, EdgeKind)> = Vec::new();
        match last.mnemonic {
            Mnemonic::Goto | Mnemonic::GotoW => {
                successors.push((block_of(last.jump_target().expect("goto target")), EdgeKind::Normal));
            }
            m if m.is_conditional_branch() => {
                successors.push((
                    block_of(last.jump_target().expect("branch target")),
                    EdgeKind::True,
                ));
                successors.push((block_of(last.next_pc()), EdgeKind::False));
            }
            Mnemonic::Tableswitch => {
                let table = last.table_switch().expect("tableswitch operand");
                for (offset, &target) in table.targets.iter().enumerate() {
                    let key = table.low.wrapping_add(offset as i32);
                    successors.push((block_of(target), EdgeKind::Case(Some(key))));
                }
                successors.push((block_of(table.default), EdgeKind::Case(None)));
            }
            Mnemonic::Lookupswitch => {
                let lookup = last.lookup_switch().expect("lookupswitch operand");
                for &(key, target) in &lookup.pairs {
                    successors.push((block_of(target), EdgeKind::Case(Some(key))));
                }
                successors.push((block_of(lookup.default), EdgeKind::Case(None)));
            }
            Mnemonic::Ireturn
            | Mnemonic::Lreturn
            | Mnemonic::Freturn
            | Mnemonic::Dreturn
            | Mnemonic::Areturn
            | Mnemonic::Return
            | Mnemonic::Athrow
            | Mnemonic::Ret => {}
            _ => {
                // Plain fall-through into the next block.
                if last.next_pc() < code_length {
                    successors.push((block_of(last.next_pc()), EdgeKind::Normal));
                }
            }
        }
        blocks[i].successors = successors;
    }

    // Each protected range feeds an exception edge from every overlapping
    // block to its handler.
    for entry in exception_table {
        let handler = block_of(entry.handler_pc as u32);
        blocks[handler].is_handler = true;
        for i in 0..blocks.len() {
            let overlaps =
                blocks[i].start < entry.end_pc as u32 && blocks[i].end > entry.start_pc as u32;
            if overlaps && !blocks[i].successors.contains(&(handler, EdgeKind::Exception)) {
                blocks[i].successors.push((handler, EdgeKind::Exception));
            }
        }
    }

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(code: &[u8]) -> CodeListing {
        CodeListing::decode(code).unwrap()
    }

    /// `max(a, b)` shape: a diamond that rejoins at the return.
    ///
    /// ```text
    /// 0: iload_1  1: iload_2  2: if_icmple -> 7
    /// 5: iload_1  6: ireturn
    /// 7: iload_2  8: ireturn
    /// ```
    #[test]
    fn diamond_blocks_and_dominators() {
        let code = [0x1B, 0x1C, 0xA4, 0x00, 0x05, 0x1B, 0xAC, 0x1C, 0xAC];
        let listing = decode(&code);
        let cfg = ControlFlowGraph::build(&listing, &[]).unwrap();
        assert_eq!(cfg.blocks.len(), 3);
        let head = cfg.block_at(0).unwrap();
        let then_arm = cfg.block_at(5).unwrap();
        let else_arm = cfg.block_at(7).unwrap();
        assert_eq!(cfg.blocks[head].successor(EdgeKind::True), Some(else_arm));
        assert_eq!(cfg.blocks[head].successor(EdgeKind::False), Some(then_arm));
        assert!(cfg.dominates(head, then_arm));
        assert!(cfg.dominates(head, else_arm));
        // Both arms return, so neither has a post-dominator block.
        assert_eq!(cfg.ipostdom[then_arm], None);
        assert_eq!(cfg.ipostdom[head], None);
        assert!(cfg.loops.is_empty());
    }

    /// Counting loop:
    ///
    /// ```text
    /// 0: iconst_1  1: istore_2
    /// 2: iload_2  3: iload_1  4: if_icmpgt -> 13
    /// 7: iinc 2 1  10: goto -> 2
    /// 13: return
    /// ```
    #[test]
    fn natural_loop_is_detected() {
        let code = [
            0x04, 0x3D, 0x1C, 0x1B, 0xA3, 0x00, 0x09, 0x84, 0x02, 0x01, 0xA7, 0xFF, 0xF8, 0xB1,
        ];
        let listing = decode(&code);
        let cfg = ControlFlowGraph::build(&listing, &[]).unwrap();
        let header = cfg.block_at(2).unwrap();
        let latch = cfg.block_at(7).unwrap();
        let follow = cfg.block_at(13).unwrap();
        let found = cfg.loop_with_header(header).unwrap();
        assert_eq!(found.latches, vec![latch]);
        assert!(found.body.contains(&header) && found.body.contains(&latch));
        assert!(!found.body.contains(&follow));
        assert!(cfg.irreducible_edges.is_empty());
        // The loop exits through the header's taken edge.
        assert_eq!(cfg.blocks[header].successor(EdgeKind::True), Some(follow));
    }

    #[test]
    fn exception_edges_reach_the_handler() {
        // 0: aload_0  1: invokevirtual #1  4: return
        // 5: astore_1  6: return      handler for [0, 4)
        let code = [0x2A, 0xB6, 0x00, 0x01, 0xB1, 0x4C, 0xB1];
        let listing = decode(&code);
        let table = [ExceptionEntry {
            start_pc: 0,
            end_pc: 4,
            handler_pc: 5,
            catch_type: 0,
        }];
        let cfg = ControlFlowGraph::build(&listing, &table).unwrap();
        let body = cfg.block_at(0).unwrap();
        let handler = cfg.block_at(5).unwrap();
        assert!(cfg.blocks[handler].is_handler);
        assert!(cfg.blocks[body]
            .successors
            .contains(&(handler, EdgeKind::Exception)));
    }

    #[test]
    fn branch_into_an_instruction_is_rejected() {
        // goto -> 1 lands inside the goto itself.
        let code = [0xA7, 0x00, 0x01, 0xB1];
        let listing = decode(&code);
        let err = ControlFlowGraph::build(&listing, &[]).unwrap_err();
        assert_eq!(
            err.cause,
            BytecodeCause::InvalidBranchTarget { pc: 0, target: 1 }
        );
    }
}
