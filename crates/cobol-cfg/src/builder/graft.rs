//! Grafting of PERFORM groups (extended mode)
//!
//! Each resolved group gets a fresh clone of its members spliced in at the
//! call site: the call site enters the clone, and the clone's non-ending
//! terminal blocks continue where the call site used to.

use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use super::program::ProgramBuilder;
use crate::graph::{BlockFlags, BlockId, EdgeId, GroupId};

impl ProgramBuilder {
    pub(super) fn graft_groups(&mut self) {
        let count = self.cfg.groups().len();
        for i in 0..count {
            self.graft(GroupId(i as u32), 0);
        }
    }

    fn graft(&mut self, id: GroupId, depth: usize) {
        let group = self.cfg.group(id);
        if group.is_empty() || group.recursive {
            return;
        }
        if depth >= self.config.max_graft_depth {
            warn!(
                group = %id,
                range = %group.range,
                depth,
                "graft depth limit reached, keeping call edge"
            );
            return;
        }
        let members = group.members.clone();
        let call_site = group.call_site;

        let mut clones: FxHashMap<BlockId, BlockId> = FxHashMap::default();
        let mut grafted = Vec::with_capacity(members.len());
        for &member in &members {
            let clone = self.cfg.clone_block(member);
            clones.insert(member, clone);
            grafted.push(clone);
        }

        let mut remapped: FxHashMap<EdgeId, EdgeId> = FxHashMap::default();
        for &member in &members {
            let successors = self.cfg.block(member).successors.clone();
            let mut edges = Vec::with_capacity(successors.len());
            for edge in successors {
                let target = self.cfg.target(edge);
                let mapped = match (remapped.get(&edge), clones.get(&target)) {
                    (Some(&mapped), _) => mapped,
                    (None, Some(&clone)) => {
                        let mapped = self.cfg.new_edge(clone);
                        remapped.insert(edge, mapped);
                        mapped
                    }
                    (None, None) => edge,
                };
                edges.push(mapped);
            }
            self.cfg.block_mut(clones[&member]).successors = edges;
        }

        let Some(&first) = grafted.first() else { return };
        let terminals = self.cfg.terminal_blocks_within(&grafted);
        let continuation = self.cfg.block(call_site).successors.first().copied();
        let entry = self.cfg.new_edge(first);
        self.cfg.block_mut(call_site).successors = vec![entry];
        if let Some(continuation) = continuation {
            for &terminal in &terminals {
                if !self.cfg.block(terminal).has_flag(BlockFlags::ENDING) {
                    self.cfg.link(terminal, continuation);
                }
            }
        }
        self.cfg.block_mut(call_site).set_flag(BlockFlags::GROUP_GRAFTED);

        // Nested call sites inside the clone get their own groups, grafted
        // after the splice: a nested call site ending the range must already
        // continue past the outer call.
        for &clone in &grafted {
            let Some(nested) = self.cfg.block(clone).group else {
                continue;
            };
            let source = self.cfg.group(nested).clone();
            let copy = self.cfg.add_group(clone, source.node, source.range.clone());
            if source.recursive {
                self.cfg.group_mut(copy).recursive = true;
                continue;
            }
            if source.is_empty() {
                continue;
            }
            if depth + 1 >= self.config.max_graft_depth {
                warn!(
                    group = %copy,
                    range = %source.range,
                    depth = depth + 1,
                    "graft depth limit reached, keeping call edge"
                );
                self.cfg.group_mut(copy).truncated = true;
                continue;
            }
            let group = self.cfg.group_mut(copy);
            group.members = source.members;
            group.terminal_blocks = source.terminal_blocks;
            self.graft(copy, depth + 1);
        }

        let group = self.cfg.group_mut(id);
        group.members = grafted;
        group.terminal_blocks = terminals;
        trace!(group = %id, depth, "grafted");
    }
}
