//! Multi-branch contexts
//!
//! Bookkeeping shared by every construct where one block forks into
//! several alternatives that later rejoin: IF/ELSE, EVALUATE/WHEN,
//! SEARCH/WHEN, in-line PERFORM loops and exception conditions.

use crate::graph::{BlockFlags, BlockId, ControlFlowGraph, EdgeId, Instruction};
use crate::node::NodeTag;

/// One open decision construct
#[derive(Debug, Clone)]
pub struct MultiBranchContext {
    /// Node that opened the context; `None` for a synthetic cascade level
    pub instruction: Option<Instruction>,
    /// Block the alternatives fork from
    pub origin: Option<BlockId>,
    /// Entry block of each alternative
    pub branches: Vec<BlockId>,
    /// Edge slot leading into each alternative
    pub branch_edges: Vec<EdgeId>,
    /// WHEN / WHEN OTHER / AT END clauses waiting for their block
    pub conditions: Vec<Instruction>,
    /// SEARCH: block evaluating the search condition
    pub root_block: Option<BlockId>,
    /// SEARCH: edge slot entering `root_block`, reused by the loop-back edge
    pub root_edge: Option<EdgeId>,
}

impl MultiBranchContext {
    pub fn new(instruction: Option<Instruction>) -> Self {
        Self {
            instruction,
            origin: None,
            branches: Vec::new(),
            branch_edges: Vec::new(),
            conditions: Vec::new(),
            root_block: None,
            root_edge: None,
        }
    }

    /// A synthetic level of a cascade lowering
    pub fn synthetic() -> Self {
        Self::new(None)
    }

    pub fn is_synthetic(&self) -> bool {
        self.instruction.is_none()
    }

    pub fn is_search(&self) -> bool {
        matches!(self.instruction, Some(i) if i.tag == NodeTag::Search)
    }

    pub fn is_evaluate(&self) -> bool {
        matches!(self.instruction, Some(i) if i.tag == NodeTag::Evaluate)
    }

    pub fn start(&mut self, origin: BlockId) {
        self.origin = Some(origin);
    }

    /// Add an alternative and wire the origin to it
    pub fn add_branch(&mut self, cfg: &mut ControlFlowGraph, branch: BlockId) {
        if let Some(origin) = self.origin {
            let edge = cfg.add_edge(origin, branch);
            self.branch_edges.push(edge);
        }
        self.branches.push(branch);
    }

    /// Add an alternative already wired by the caller
    pub fn track_branch(&mut self, branch: BlockId, edge: EdgeId) {
        self.branches.push(branch);
        self.branch_edges.push(edge);
    }

    pub fn last_branch(&self) -> Option<BlockId> {
        self.branches.last().copied()
    }

    /// Close the construct: every non-ending terminal block of every
    /// alternative falls through to `next`, and the origin too when
    /// `branch_to_next` is set.
    pub fn end(&self, cfg: &mut ControlFlowGraph, branch_to_next: bool, next: BlockId) {
        self.close(cfg, branch_to_next, None, next);
    }

    /// Like [`end`](Self::end), but terminal blocks are searched without
    /// entering `root`, the SEARCH condition block the cascade loops back to
    pub fn end_with_root(
        &self,
        cfg: &mut ControlFlowGraph,
        branch_to_next: bool,
        root: BlockId,
        next: BlockId,
    ) {
        self.close(cfg, branch_to_next, Some(root), next);
    }

    fn close(
        &self,
        cfg: &mut ControlFlowGraph,
        branch_to_next: bool,
        stop: Option<BlockId>,
        next: BlockId,
    ) {
        let terminals = self.terminal_blocks(cfg, stop);
        let mut next_edge = None;
        for terminal in terminals {
            if terminal == next || cfg.block(terminal).has_flag(BlockFlags::ENDING) {
                continue;
            }
            let edge = *next_edge.get_or_insert_with(|| cfg.new_edge(next));
            cfg.link(terminal, edge);
        }
        if branch_to_next {
            if let Some(origin) = self.origin {
                let edge = *next_edge.get_or_insert_with(|| cfg.new_edge(next));
                cfg.link(origin, edge);
            }
        }
    }

    /// Terminal blocks reachable from the alternatives, each listed once
    pub fn terminal_blocks(&self, cfg: &ControlFlowGraph, stop: Option<BlockId>) -> Vec<BlockId> {
        let mut terminals: Vec<BlockId> = Vec::new();
        for &branch in &self.branches {
            for terminal in cfg.terminal_blocks(branch, stop) {
                if !terminals.contains(&terminal) {
                    terminals.push(terminal);
                }
            }
        }
        terminals
    }
}

/// Open DECLARATIVES region
#[derive(Debug, Clone, Copy)]
pub struct DeclarativesContext {
    /// Block that was current when the region opened
    pub origin: BlockId,
}

impl DeclarativesContext {
    pub fn start(origin: BlockId) -> Self {
        Self { origin }
    }

    /// Resume normal flow at `next` once the region closes
    pub fn end(&self, cfg: &mut ControlFlowGraph, next: BlockId) {
        cfg.add_edge(self.origin, next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;

    #[test]
    fn test_if_without_else_shape() {
        let mut cfg = ControlFlowGraph::new();
        let cond = cfg.add_block();
        let mut ctx = MultiBranchContext::new(Some(Instruction::new(NodeId(1), NodeTag::If)));
        ctx.start(cond);
        let then = cfg.add_block();
        ctx.add_branch(&mut cfg, then);
        let next = cfg.add_block();
        ctx.end(&mut cfg, true, next);

        assert_eq!(cfg.successors(cond).collect::<Vec<_>>(), vec![then, next]);
        assert_eq!(cfg.successors(then).collect::<Vec<_>>(), vec![next]);
        // then and origin share the slot into `next`
        assert_eq!(cfg.edges().len(), 2);
    }

    #[test]
    fn test_ending_terminals_are_not_wired() {
        let mut cfg = ControlFlowGraph::new();
        let cond = cfg.add_block();
        let mut ctx = MultiBranchContext::new(None);
        ctx.start(cond);
        let a = cfg.add_block();
        let b = cfg.add_block();
        ctx.add_branch(&mut cfg, a);
        ctx.add_branch(&mut cfg, b);
        cfg.block_mut(b).set_flag(BlockFlags::ENDING);
        let next = cfg.add_block();
        ctx.end(&mut cfg, false, next);

        assert_eq!(cfg.successors(a).collect::<Vec<_>>(), vec![next]);
        assert_eq!(cfg.successors(b).count(), 0);
        assert_eq!(cfg.successors(cond).count(), 2);
    }

    #[test]
    fn test_declaratives_resume() {
        let mut cfg = ControlFlowGraph::new();
        let origin = cfg.add_block();
        let next = cfg.add_block();
        DeclarativesContext::start(origin).end(&mut cfg, next);
        assert_eq!(cfg.successors(origin).collect::<Vec<_>>(), vec![next]);
    }
}
