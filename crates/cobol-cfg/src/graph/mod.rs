//! Graph data model: blocks, groups, the edge pool and traversal

mod block;
mod cfg;

pub use block::{BasicBlock, BlockFlags, BlockGroup, BlockId, EdgeId, GroupId, Instruction};
pub use cfg::{CfgFlags, ControlFlowGraph, NodeInfo};
