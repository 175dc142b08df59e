//! Graphviz DOT export
//!
//! Blocks are emitted in depth-first order from the root blocks as
//! `record` nodes; plain edges are collected and written after them.
//! An out-of-line PERFORM call site is followed by a `cluster_N`
//! subgraph holding its group and a dashed edge into it. Each group is
//! emitted at most once, and its members appear only inside the cluster.

use std::fmt::{self, Write};

use rustc_hash::FxHashSet;

use crate::graph::{BasicBlock, BlockFlags, BlockId, ControlFlowGraph, GroupId, Instruction};
use crate::procedure::ROOT_SECTION;

/// DOT renderer for a [`ControlFlowGraph`]
pub struct DotWriter<'a> {
    cfg: &'a ControlFlowGraph,
    full_instruction: bool,
}

impl<'a> DotWriter<'a> {
    pub fn new(cfg: &'a ControlFlowGraph) -> Self {
        Self {
            cfg,
            full_instruction: false,
        }
    }

    /// Print statement source text instead of statement kinds
    pub fn full_instruction(mut self, full: bool) -> Self {
        self.full_instruction = full;
        self
    }

    /// Write the whole graph
    pub fn write_to<W: Write>(&self, out: &mut W) -> fmt::Result {
        writeln!(out, "digraph Cfg {{")?;
        if self.cfg.is_compound() {
            writeln!(out, "compound=true;")?;
        }
        writeln!(out, "node [")?;
        writeln!(out, "shape = \"record\"")?;
        writeln!(out, "]")?;
        writeln!(out)?;
        writeln!(out, "edge [")?;
        writeln!(out, "arrowtail = \"empty\"")?;
        writeln!(out, "]")?;

        // group members are written inside their cluster only
        let members: FxHashSet<BlockId> = self
            .cfg
            .groups()
            .iter()
            .flat_map(|group| group.members.iter().copied())
            .collect();
        let mut emitted_groups = FxHashSet::default();
        let mut edges = String::new();
        let mut result = Ok(());
        self.cfg.dfs(|block| {
            if members.contains(&block.id) {
                return true;
            }
            result = self.emit_block(block, out, &mut edges, &mut emitted_groups);
            result.is_ok()
        });
        result?;
        out.write_str(&edges)?;
        writeln!(out, "}}")
    }

    fn emit_block<W: Write>(
        &self,
        block: &BasicBlock,
        out: &mut W,
        edges: &mut String,
        emitted_groups: &mut FxHashSet<GroupId>,
    ) -> fmt::Result {
        writeln!(out, "Block{} [", block.id.as_u32())?;
        write!(out, "label = \"{{{}|", self.block_name(block))?;
        for instr in &block.instructions {
            write!(out, "{}\\l", self.instruction_text(instr))?;
        }
        writeln!(out, "}}\"")?;
        writeln!(out, "]")?;

        for next in self.cfg.successors(block.id) {
            writeln!(edges, "Block{} -> Block{}", block.id.as_u32(), next.as_u32())?;
        }

        if let Some(group_id) = block.group {
            self.emit_group(block.id, group_id, out, emitted_groups)?;
        }
        Ok(())
    }

    fn emit_group<W: Write>(
        &self,
        call_site: BlockId,
        group_id: GroupId,
        out: &mut W,
        emitted_groups: &mut FxHashSet<GroupId>,
    ) -> fmt::Result {
        let group = self.cfg.group(group_id);
        if emitted_groups.insert(group_id) {
            writeln!(out, "subgraph cluster_{}{{", group_id)?;
            writeln!(out, "color = blue;")?;
            if let Some(first) = group.first() {
                let label = self.cfg.block(first).tag.as_deref().unwrap_or_default();
                writeln!(out, "label = \"{}\";", escape(label))?;
                let members: FxHashSet<BlockId> = group.members.iter().copied().collect();
                let mut inner_edges = String::new();
                let mut result = Ok(());
                self.walk_members(first, &members, &mut |block| {
                    result = self.emit_block(block, out, &mut inner_edges, emitted_groups);
                    result.is_ok()
                });
                result?;
                out.write_str(&inner_edges)?;
            }
            writeln!(out, "}}")?;
        }
        match group.first() {
            Some(first) => writeln!(
                out,
                "Block{} -> Block{} [style=dashed, arrowhead=none]",
                call_site.as_u32(),
                first.as_u32()
            ),
            None => writeln!(
                out,
                "Block{} -> \"\" [style=dashed, arrowhead=none]",
                call_site.as_u32()
            ),
        }
    }

    /// Depth-first walk that stays inside a group's members
    fn walk_members<F>(&self, first: BlockId, members: &FxHashSet<BlockId>, callback: &mut F)
    where
        F: FnMut(&BasicBlock) -> bool,
    {
        let mut discovered = FxHashSet::default();
        let mut stack = vec![first];
        while let Some(id) = stack.pop() {
            if !discovered.insert(id) {
                continue;
            }
            let block = self.cfg.block(id);
            if !callback(block) {
                return;
            }
            let successors: Vec<BlockId> = self.cfg.successors(id).collect();
            for next in successors.into_iter().rev() {
                if members.contains(&next) && !discovered.contains(&next) {
                    stack.push(next);
                }
            }
        }
    }

    fn block_name(&self, block: &BasicBlock) -> String {
        let name = if block.has_flag(BlockFlags::START) {
            "START".to_string()
        } else if block.has_flag(BlockFlags::END) {
            "END".to_string()
        } else {
            format!("Block{}", block.id.as_u32())
        };
        match &block.tag {
            Some(tag) if !block.has_flag(BlockFlags::START) && tag != ROOT_SECTION => {
                format!("{}. {}", escape(&tag.to_uppercase()), name)
            }
            _ => name,
        }
    }

    fn instruction_text(&self, instr: &Instruction) -> String {
        if !self.full_instruction {
            return instr.tag.name().to_string();
        }
        match self.cfg.node_info(instr.node).and_then(|info| info.text.as_deref()) {
            Some(text) => escape(text),
            None => "<null>".to_string(),
        }
    }
}

impl fmt::Display for DotWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_to(f)
    }
}

/// Render a graph with statement kinds as labels
pub fn to_dot(cfg: &ControlFlowGraph) -> String {
    DotWriter::new(cfg).to_string()
}

/// Escape record-label metacharacters; line breaks become spaces
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '"' | '|' | '<' | '>' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '\n' | '\r' => out.push(' '),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("MOVE \"A\" TO B"), "MOVE \\\"A\\\" TO B");
        assert_eq!(escape("IF A > B\nDISPLAY {X}"), "IF A \\> B DISPLAY \\{X\\}");
        assert_eq!(escape("a|b\\c"), "a\\|b\\\\c");
    }

    #[test]
    fn test_empty_graph() {
        let cfg = ControlFlowGraph::new();
        let dot = to_dot(&cfg);
        assert!(dot.starts_with("digraph Cfg {\n"));
        assert!(!dot.contains("compound=true;"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn test_block_names() {
        let mut cfg = ControlFlowGraph::new();
        let start = cfg.add_block();
        let body = cfg.add_block();
        let end = cfg.add_block();
        cfg.block_mut(start).set_flag(BlockFlags::START);
        cfg.block_mut(body).tag = Some("para-1".into());
        cfg.block_mut(end).set_flag(BlockFlags::END);
        cfg.add_root(start);
        cfg.add_edge(start, body);
        cfg.add_edge(body, end);

        let dot = to_dot(&cfg);
        assert!(dot.contains("label = \"{START|}\""));
        assert!(dot.contains("label = \"{PARA-1. Block1|}\""));
        assert!(dot.contains("label = \"{END|}\""));
        assert!(dot.contains("Block0 -> Block1\nBlock1 -> Block2\n"));
    }
}
