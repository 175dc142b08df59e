//! Decision constructs: IF/ELSE, EVALUATE, SEARCH, in-line PERFORM loops
//! and exception conditions.
//!
//! EVALUATE and SEARCH have two lowerings. Direct lowering keeps every WHEN
//! as a sibling branch of one context. Cascade lowering turns each WHEN
//! into a synthetic ELSE/IF level of its own, and the levels are unwound
//! one by one when the statement closes.

use std::mem;

use super::branch::MultiBranchContext;
use super::program::ProgramBuilder;
use crate::graph::{BlockFlags, BlockId, Instruction};
use crate::node::{ConditionKind, Iteration, NodeTag};

impl ProgramBuilder {
    fn top_context(&mut self) -> Option<&mut MultiBranchContext> {
        debug_assert!(!self.contexts.is_empty(), "no open decision context");
        self.contexts.last_mut()
    }

    fn pop_context(&mut self) -> Option<MultiBranchContext> {
        debug_assert!(!self.contexts.is_empty(), "no open decision context");
        self.contexts.pop()
    }

    /// Add a new alternative to the innermost context and make it current
    fn open_branch(&mut self, block: BlockId) {
        if let Some(ctx) = self.contexts.last_mut() {
            ctx.add_branch(&mut self.cfg, block);
        }
        self.current_block = Some(block);
    }

    /// Create the continuation of a closed context
    fn close_context(&mut self, ctx: &MultiBranchContext, branch_to_next: bool) {
        let next = self.new_block(None, true);
        ctx.end(&mut self.cfg, branch_to_next, next);
        self.current_block = Some(next);
    }

    fn take_conditions(&mut self, depth_from_top: usize) -> Vec<Instruction> {
        let len = self.contexts.len();
        if depth_from_top >= len {
            return Vec::new();
        }
        mem::take(&mut self.contexts[len - 1 - depth_from_top].conditions)
    }

    pub(super) fn buffer_condition(&mut self, instr: Instruction) {
        if let Some(ctx) = self.top_context() {
            ctx.conditions.push(instr);
        }
    }

    // ------------------------------------------------------------------
    // IF / ELSE
    // ------------------------------------------------------------------

    pub(super) fn enter_if(&mut self, instr: Instruction) {
        let Some(origin) = self.current() else { return };
        let mut ctx = MultiBranchContext::new(Some(instr));
        ctx.start(origin);
        self.contexts.push(ctx);
        self.add_instruction(instr);
        let then = self.new_block(None, true);
        self.open_branch(then);
    }

    /// ELSE, or the synthetic ELSE of a cascade level when `instr` is `None`
    pub(super) fn enter_else(&mut self, instr: Option<Instruction>) {
        let block = self.new_block(instr, true);
        self.open_branch(block);
    }

    pub(super) fn leave_if(&mut self) {
        let Some(ctx) = self.pop_context() else { return };
        let branch_to_next = ctx.branches.len() == 1;
        self.close_context(&ctx, branch_to_next);
    }

    // ------------------------------------------------------------------
    // EVALUATE
    // ------------------------------------------------------------------

    pub(super) fn enter_evaluate(&mut self, instr: Instruction) {
        let Some(origin) = self.current() else { return };
        let mut ctx = MultiBranchContext::new(Some(instr));
        ctx.start(origin);
        self.contexts.push(ctx);
        self.add_instruction(instr);
    }

    pub(super) fn start_when_condition_clause(&mut self) {
        if self.contexts.is_empty() {
            debug_assert!(false, "WHEN outside EVALUATE");
            return;
        }
        if self.config.evaluate_cascade() {
            let at_evaluate = self.contexts.last().is_some_and(|c| c.is_evaluate());
            if !at_evaluate {
                self.enter_else(None);
            }
            self.push_cascade_level();
        } else {
            let conditions = self.take_conditions(0);
            let block = self.new_block(None, true);
            for condition in conditions {
                self.cfg.block_mut(block).instructions.push(condition);
                self.cfg.set_block_for(condition.node, block);
            }
            self.open_branch(block);
        }
    }

    /// Push a synthetic level whose test block holds the buffered WHEN
    /// conditions of the level below
    fn push_cascade_level(&mut self) {
        let Some(origin) = self.current() else { return };
        let (root_block, root_edge) = self
            .contexts
            .last()
            .map(|c| (c.root_block, c.root_edge))
            .unwrap_or((None, None));
        let mut level = MultiBranchContext::synthetic();
        level.root_block = root_block;
        level.root_edge = root_edge;
        level.start(origin);
        self.contexts.push(level);
        for condition in self.take_conditions(1) {
            self.add_instruction(condition);
        }
        let when = self.new_block(None, true);
        self.open_branch(when);
    }

    pub(super) fn start_when_other_clause(&mut self) {
        if self.contexts.is_empty() {
            debug_assert!(false, "WHEN OTHER outside EVALUATE");
            return;
        }
        let conditions = self.take_conditions(0);
        let block = self.new_block(None, true);
        self.cfg.block_mut(block).set_flag(BlockFlags::DEFAULT);
        for condition in conditions {
            self.cfg.set_block_for(condition.node, block);
        }
        self.open_branch(block);
    }

    pub(super) fn leave_evaluate(&mut self) {
        let Some(mut ctx) = self.pop_context() else { return };
        if self.config.evaluate_cascade() {
            while ctx.is_synthetic() {
                let branch_to_next = ctx.branches.len() == 1;
                self.close_context(&ctx, branch_to_next);
                match self.pop_context() {
                    Some(below) => ctx = below,
                    None => return,
                }
            }
            // WHEN OTHER with no WHEN before it hangs off the EVALUATE itself
            if !ctx.branches.is_empty() {
                let branch_to_next = !self.is_default(ctx.last_branch());
                self.close_context(&ctx, branch_to_next);
            }
        } else {
            let branch_to_next = !self.is_default(ctx.last_branch());
            self.close_context(&ctx, branch_to_next);
        }
    }

    fn is_default(&self, block: Option<BlockId>) -> bool {
        block.is_some_and(|b| self.cfg.block(b).has_flag(BlockFlags::DEFAULT))
    }

    // ------------------------------------------------------------------
    // SEARCH
    // ------------------------------------------------------------------

    pub(super) fn enter_search(&mut self, instr: Instruction) {
        let Some(current) = self.current() else { return };
        if !self.config.search_cascade() {
            let mut ctx = MultiBranchContext::new(Some(instr));
            ctx.start(current);
            self.contexts.push(ctx);
            self.add_instruction(instr);
            return;
        }

        // The search condition block is the loop re-entry point, so it must
        // not carry the statements that precede the SEARCH.
        let (search_block, root_edge) = if self.cfg.block(current).instructions.is_empty() {
            self.add_instruction(instr);
            (current, None)
        } else {
            let block = self.new_block(Some(instr), true);
            let edge = self.cfg.add_edge(current, block);
            (block, Some(edge))
        };
        let body = self.new_block(None, true);
        self.cfg.add_edge(search_block, body);

        let mut ctx = MultiBranchContext::new(Some(instr));
        ctx.root_block = Some(search_block);
        ctx.root_edge = root_edge;
        ctx.start(body);
        self.contexts.push(ctx);
        self.current_block = Some(body);
    }

    /// Start a WHEN clause of a SEARCH, or its AT END clause
    pub(super) fn start_when_search_condition_clause(&mut self, at_end: bool) {
        if self.contexts.is_empty() {
            debug_assert!(false, "WHEN outside SEARCH");
            return;
        }
        if at_end || !self.config.search_cascade() {
            let conditions = self.take_conditions(0);
            let block = self.new_block(None, true);
            if at_end {
                self.cfg.block_mut(block).set_flag(BlockFlags::DEFAULT);
            }
            for condition in conditions {
                self.cfg.block_mut(block).instructions.push(condition);
                self.cfg.set_block_for(condition.node, block);
            }
            self.open_branch(block);
            return;
        }

        let top = self.contexts.last().map(|c| (c.is_search(), c.branches.len(), c.origin));
        match top {
            Some((false, _, _)) => self.enter_else(None),
            // back from AT END: the next test hangs off the search body
            Some((true, 1, Some(origin))) => self.current_block = Some(origin),
            _ => {}
        }
        self.push_cascade_level();
    }

    pub(super) fn leave_search(&mut self) {
        let Some(mut ctx) = self.pop_context() else { return };
        if !self.config.search_cascade() {
            let branch_to_next = !self.is_default(ctx.branches.first().copied());
            self.close_context(&ctx, branch_to_next);
            return;
        }

        let mut root_edge = ctx.root_edge;
        let mut last_level = true;
        let mut continuation = None;
        while ctx.is_synthetic() {
            let next = self.new_block(None, true);
            if last_level {
                last_level = false;
                ctx.end(&mut self.cfg, false, next);
                // a failed last test goes back to the search condition
                if let (Some(origin), Some(root)) = (ctx.origin, ctx.root_block) {
                    let edge = *root_edge.get_or_insert_with(|| self.cfg.new_edge(root));
                    self.cfg.link(origin, edge);
                }
            } else {
                ctx.end(&mut self.cfg, ctx.branches.len() == 1, next);
            }
            self.current_block = Some(next);
            continuation = Some(next);
            match self.pop_context() {
                Some(below) => ctx = below,
                None => return,
            }
        }

        let next = match continuation {
            Some(next) => next,
            None => {
                let next = self.new_block(None, true);
                self.current_block = Some(next);
                next
            }
        };
        match ctx.root_block {
            Some(root) => ctx.end_with_root(&mut self.cfg, ctx.branches.is_empty(), root, next),
            None => ctx.end(&mut self.cfg, ctx.branches.is_empty(), next),
        }
    }

    // ------------------------------------------------------------------
    // In-line PERFORM
    // ------------------------------------------------------------------

    pub(super) fn enter_perform_loop(&mut self, instr: Instruction, test_after: bool) {
        let Some(origin) = self.current() else { return };
        let mut ctx = MultiBranchContext::new(Some(instr));
        ctx.start(origin);
        let test = self.new_block(Some(instr), true);
        let body = self.new_block(None, true);
        let (test_edge, body_edge) = if test_after {
            let body_edge = self.cfg.add_edge(origin, body);
            (self.cfg.new_edge(test), body_edge)
        } else {
            let test_edge = self.cfg.add_edge(origin, test);
            (test_edge, self.cfg.new_edge(body))
        };
        self.cfg.link(test, body_edge);
        ctx.track_branch(test, test_edge);
        ctx.track_branch(body, body_edge);
        self.contexts.push(ctx);
        self.current_block = Some(body);
    }

    pub(super) fn leave_perform_loop(&mut self, iteration: Iteration) {
        let Some(ctx) = self.pop_context() else { return };
        let (Some(&test), Some(&body), Some(&test_edge)) =
            (ctx.branches.first(), ctx.branches.get(1), ctx.branch_edges.first())
        else {
            debug_assert!(false, "malformed PERFORM loop context");
            return;
        };
        let terminals = self.cfg.terminal_blocks(body, None);
        let next = self.new_block(None, true);
        let next_edge = self.cfg.new_edge(next);
        let back = if iteration.is_iterative() {
            self.cfg.link(test, next_edge);
            test_edge
        } else {
            next_edge
        };
        for terminal in terminals {
            if !self.cfg.block(terminal).has_flag(BlockFlags::ENDING) {
                self.cfg.link(terminal, back);
            }
        }
        self.current_block = Some(next);
    }

    // ------------------------------------------------------------------
    // Exception conditions
    // ------------------------------------------------------------------

    /// AT END written directly under a SEARCH belongs to the SEARCH
    fn is_search_at_end(&self, kind: ConditionKind) -> bool {
        kind == ConditionKind::AtEnd
            && self.parents.last() == Some(&NodeTag::Search)
            && self.contexts.last().is_some_and(|c| c.is_search())
    }

    pub(super) fn enter_exception_condition(&mut self, instr: Instruction, kind: ConditionKind) {
        if self.is_search_at_end(kind) {
            self.buffer_condition(instr);
            self.start_when_search_condition_clause(true);
            return;
        }
        let Some(origin) = self.current() else { return };
        let mut ctx = MultiBranchContext::new(Some(instr));
        ctx.start(origin);
        self.contexts.push(ctx);
        let block = self.new_block(Some(instr), true);
        self.open_branch(block);
    }

    pub(super) fn leave_exception_condition(&mut self, kind: ConditionKind) {
        if self.is_search_at_end(kind) {
            return;
        }
        let Some(ctx) = self.pop_context() else { return };
        self.close_context(&ctx, true);
    }
}
