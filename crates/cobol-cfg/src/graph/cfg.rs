//! Control Flow Graph
//!
//! Arena of basic blocks plus a shared, append-only pool of edge targets.
//! Blocks refer to their successors through edge slots; several blocks may
//! share one slot, and relocation allocates fresh slots instead of renumbering.

use rustc_hash::{FxHashMap, FxHashSet};

use super::block::{BasicBlock, BlockFlags, BlockGroup, BlockId, EdgeId, GroupId};
use crate::error::GraphError;
use crate::node::{Node, NodeId, NodeKind, Span};

/// Graph-level flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CfgFlags(u8);

impl CfgFlags {
    pub const NONE: Self = Self(0x00);
    /// At least one out-of-line PERFORM was seen
    pub const COMPOUND: Self = Self(0x01);

    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

/// What the graph remembers about a statement beyond its tag
#[derive(Debug, Clone, Default)]
pub struct NodeInfo {
    pub span: Span,
    pub text: Option<String>,
    /// Literal program name of a CALL
    pub call_target: Option<String>,
}

/// Control flow graph of one procedure division
#[derive(Debug, Clone, Default)]
pub struct ControlFlowGraph {
    blocks: Vec<BasicBlock>,
    root_blocks: Vec<BlockId>,
    edges: Vec<BlockId>,
    block_for: FxHashMap<NodeId, BlockId>,
    nodes: FxHashMap<NodeId, NodeInfo>,
    groups: Vec<BlockGroup>,
    flags: CfgFlags,
    procedure_division: Option<NodeId>,
}

impl ControlFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the graph as built from the given procedure division
    pub fn initialize(&mut self, procedure_division: NodeId) {
        self.procedure_division = Some(procedure_division);
    }

    /// False for programs without a procedure division
    pub fn is_initialized(&self) -> bool {
        self.procedure_division.is_some()
    }

    pub fn procedure_division(&self) -> Option<NodeId> {
        self.procedure_division
    }

    // ------------------------------------------------------------------
    // Blocks and edges
    // ------------------------------------------------------------------

    /// Append an empty block
    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new(id));
        id
    }

    /// Append a copy of `source` with no successors
    pub fn clone_block(&mut self, source: BlockId) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        let copy = self.blocks[source.index()].detached_copy(id);
        self.blocks.push(copy);
        id
    }

    /// Allocate an edge slot pointing at `to`, without attaching it
    pub fn new_edge(&mut self, to: BlockId) -> EdgeId {
        let edge = EdgeId(self.edges.len() as u32);
        self.edges.push(to);
        edge
    }

    /// Allocate an edge slot and append it to `from`'s successors
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) -> EdgeId {
        let edge = self.new_edge(to);
        self.blocks[from.index()].successors.push(edge);
        edge
    }

    /// Append an existing edge slot to `from` unless already present
    pub fn link(&mut self, from: BlockId, edge: EdgeId) -> bool {
        let successors = &mut self.blocks[from.index()].successors;
        if successors.contains(&edge) {
            return false;
        }
        successors.push(edge);
        true
    }

    pub fn target(&self, edge: EdgeId) -> BlockId {
        self.edges[edge.index()]
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub fn edges(&self) -> &[BlockId] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn add_root(&mut self, block: BlockId) {
        if !self.root_blocks.contains(&block) {
            self.root_blocks.push(block);
        }
    }

    pub fn root_blocks(&self) -> &[BlockId] {
        &self.root_blocks
    }

    /// Successor blocks of `id`, in edge order
    pub fn successors(&self, id: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks[id.index()]
            .successors
            .iter()
            .map(move |edge| self.edges[edge.index()])
    }

    /// The first START / END flagged block, if any
    pub fn find_flagged(&self, flag: BlockFlags) -> Option<BlockId> {
        self.blocks.iter().find(|b| b.has_flag(flag)).map(|b| b.id)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Remember the node's span, text and CALL target
    pub fn record_node(&mut self, node: &Node) {
        let call_target = match &node.kind {
            NodeKind::Call { program } => program.clone(),
            _ => None,
        };
        self.nodes.insert(
            node.id,
            NodeInfo {
                span: node.span,
                text: node.text.clone(),
                call_target,
            },
        );
    }

    pub fn node_info(&self, node: NodeId) -> Option<&NodeInfo> {
        self.nodes.get(&node)
    }

    pub fn set_block_for(&mut self, node: NodeId, block: BlockId) {
        self.block_for.insert(node, block);
    }

    /// Block that owns the given statement
    pub fn block_for(&self, node: NodeId) -> Option<BlockId> {
        self.block_for.get(&node).copied()
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    pub fn add_group(&mut self, call_site: BlockId, node: NodeId, range: String) -> GroupId {
        let id = GroupId(self.groups.len() as u32);
        self.groups.push(BlockGroup::new(id, call_site, node, range));
        self.blocks[call_site.index()].group = Some(id);
        id
    }

    pub fn groups(&self) -> &[BlockGroup] {
        &self.groups
    }

    pub fn group(&self, id: GroupId) -> &BlockGroup {
        &self.groups[id.index()]
    }

    pub fn group_mut(&mut self, id: GroupId) -> &mut BlockGroup {
        &mut self.groups[id.index()]
    }

    /// Group of a call-site block
    pub fn group_of(&self, block: BlockId) -> Option<&BlockGroup> {
        self.blocks[block.index()]
            .group
            .map(|id| &self.groups[id.index()])
    }

    pub fn flags(&self) -> CfgFlags {
        self.flags
    }

    pub fn set_flag(&mut self, flag: CfgFlags) {
        self.flags.insert(flag);
    }

    pub fn is_compound(&self) -> bool {
        self.flags.contains(CfgFlags::COMPOUND)
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Depth-first walk from every root block, in root order.
    ///
    /// The callback returns `false` to stop the whole walk.
    pub fn dfs<F>(&self, mut callback: F)
    where
        F: FnMut(&BasicBlock) -> bool,
    {
        let mut discovered = vec![false; self.blocks.len()];
        for &root in &self.root_blocks {
            if !discovered[root.index()] && !self.dfs_visit(root, &mut discovered, &mut callback) {
                return;
            }
        }
    }

    /// Depth-first walk from a single block
    pub fn dfs_from<F>(&self, start: BlockId, mut callback: F)
    where
        F: FnMut(&BasicBlock) -> bool,
    {
        let mut discovered = vec![false; self.blocks.len()];
        self.dfs_visit(start, &mut discovered, &mut callback);
    }

    fn dfs_visit<F>(&self, id: BlockId, discovered: &mut [bool], callback: &mut F) -> bool
    where
        F: FnMut(&BasicBlock) -> bool,
    {
        discovered[id.index()] = true;
        let block = &self.blocks[id.index()];
        if !callback(block) {
            return false;
        }
        for edge in &block.successors {
            let next = self.edges[edge.index()];
            if !discovered[next.index()] && !self.dfs_visit(next, discovered, callback) {
                return false;
            }
        }
        true
    }

    /// Stack-based depth-first walk; visits blocks in the same order as [`dfs`](Self::dfs)
    pub fn dfs_iterative<F>(&self, mut callback: F)
    where
        F: FnMut(&BasicBlock) -> bool,
    {
        let mut discovered = vec![false; self.blocks.len()];
        let mut stack = Vec::new();
        for &root in &self.root_blocks {
            stack.push(root);
            while let Some(id) = stack.pop() {
                if discovered[id.index()] {
                    continue;
                }
                discovered[id.index()] = true;
                let block = &self.blocks[id.index()];
                if !callback(block) {
                    return;
                }
                for edge in block.successors.iter().rev() {
                    let next = self.edges[edge.index()];
                    if !discovered[next.index()] {
                        stack.push(next);
                    }
                }
            }
        }
    }

    /// Blocks reachable from `start` that have no successors.
    ///
    /// The walk never enters `stop`, which lets a SEARCH ignore the edges
    /// that loop back to its condition block.
    pub fn terminal_blocks(&self, start: BlockId, stop: Option<BlockId>) -> Vec<BlockId> {
        let mut terminals = Vec::new();
        let mut visited = vec![false; self.blocks.len()];
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if visited[id.index()] || Some(id) == stop {
                continue;
            }
            visited[id.index()] = true;
            let block = &self.blocks[id.index()];
            if block.successors.is_empty() {
                terminals.push(id);
                continue;
            }
            for edge in block.successors.iter().rev() {
                stack.push(self.edges[edge.index()]);
            }
        }
        terminals
    }

    /// Blocks of `members` with no successor inside `members`, in member
    /// order. Edges that leave the set are never followed.
    pub fn terminal_blocks_within(&self, members: &[BlockId]) -> Vec<BlockId> {
        let inside: FxHashSet<BlockId> = members.iter().copied().collect();
        members
            .iter()
            .copied()
            .filter(|&member| !self.successors(member).any(|next| inside.contains(&next)))
            .collect()
    }

    /// Predecessors of every block, indexed by block
    pub fn predecessor_map(&self) -> Vec<Vec<BlockId>> {
        let mut predecessors = vec![Vec::new(); self.blocks.len()];
        for block in &self.blocks {
            for next in self.successors(block.id) {
                if !predecessors[next.index()].contains(&block.id) {
                    predecessors[next.index()].push(block.id);
                }
            }
        }
        predecessors
    }

    /// Check that every edge and block reference is in range
    pub fn validate(&self) -> Result<(), GraphError> {
        let block_count = self.blocks.len();
        for (i, block) in self.blocks.iter().enumerate() {
            if block.id.index() != i {
                return Err(GraphError::MisplacedBlock {
                    block: block.id.as_u32(),
                    index: i,
                });
            }
            for edge in &block.successors {
                let Some(target) = self.edges.get(edge.index()) else {
                    return Err(GraphError::InvalidEdge {
                        block: block.id.as_u32(),
                        edge: edge.0,
                    });
                };
                if target.index() >= block_count {
                    return Err(GraphError::InvalidTarget {
                        edge: edge.0,
                        target: target.as_u32(),
                    });
                }
            }
            if let Some(group) = block.group {
                if group.index() >= self.groups.len() {
                    return Err(GraphError::InvalidGroup {
                        block: block.id.as_u32(),
                        group: group.0,
                    });
                }
            }
        }
        for root in &self.root_blocks {
            if root.index() >= block_count {
                return Err(GraphError::InvalidRoot { block: root.as_u32() });
            }
        }
        for group in &self.groups {
            if let Some(member) = group.members.iter().find(|m| m.index() >= block_count) {
                return Err(GraphError::InvalidGroupMember {
                    group: group.id.0,
                    block: member.as_u32(),
                });
            }
        }
        Ok(())
    }
}
