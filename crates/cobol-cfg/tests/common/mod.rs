//! Shared helpers for the integration tests

#![allow(dead_code)]

use cobol_cfg::graph::{BlockFlags, BlockId, ControlFlowGraph};
use cobol_cfg::node::NodeTag;
use cobol_cfg::{drive, CfgBuilder, CfgConfig, ProgramCfg, SourceTree};
use serde_json::{json, Value};

/// Build every program of a JSON statement tree
pub fn build_with(config: CfgConfig, tree: Value) -> Vec<ProgramCfg> {
    let tree: SourceTree = serde_json::from_value(tree).expect("valid statement tree");
    let mut builder = CfgBuilder::new(config);
    drive(&tree, &mut builder);
    builder.finish()
}

/// Build a single program named MAIN from its procedure division
pub fn build_division(config: CfgConfig, division: Value) -> ProgramCfg {
    let tree = json!({
        "programs": [{ "name": "MAIN", "procedure_division": division }]
    });
    let mut programs = build_with(config, tree);
    assert_eq!(programs.len(), 1);
    let program = programs.remove(0);
    program.graph.validate().expect("well-formed graph");
    program
}

pub fn build(division: Value) -> ProgramCfg {
    build_division(CfgConfig::default(), division)
}

pub fn stmt(verb: &str) -> Value {
    json!({ "kind": "statement", "verb": verb })
}

pub fn go_to(target: &str) -> Value {
    json!({ "kind": "go_to", "targets": [{ "name": target }] })
}

pub fn perform(procedure: &str) -> Value {
    json!({ "kind": "perform", "procedure": { "name": procedure } })
}

pub fn paragraph(name: &str, sentences: Value) -> Value {
    json!({ "name": name, "sentences": sentences })
}

/// Successor block ids in edge order
pub fn succ(cfg: &ControlFlowGraph, block: BlockId) -> Vec<u32> {
    cfg.successors(block).map(|b| b.as_u32()).collect()
}

/// Blocks holding an instruction with `tag`, in block order
pub fn blocks_with(cfg: &ControlFlowGraph, tag: NodeTag) -> Vec<BlockId> {
    cfg.blocks()
        .iter()
        .filter(|b| b.instructions.iter().any(|i| i.tag == tag))
        .map(|b| b.id)
        .collect()
}

pub fn first_with(cfg: &ControlFlowGraph, tag: NodeTag) -> BlockId {
    blocks_with(cfg, tag)
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("no block holds {}", tag))
}

/// Blocks reachable from the root blocks
pub fn reachable(cfg: &ControlFlowGraph) -> Vec<BlockId> {
    let mut seen = Vec::new();
    cfg.dfs(|b| {
        seen.push(b.id);
        true
    });
    seen
}

pub fn reaches(cfg: &ControlFlowGraph, from: BlockId, to: BlockId) -> bool {
    let mut found = false;
    cfg.dfs_from(from, |b| {
        found = b.id == to;
        !found
    });
    found
}

/// The program's END block
pub fn end_block(cfg: &ControlFlowGraph) -> BlockId {
    cfg.find_flagged(BlockFlags::END).expect("END block")
}

/// Every group's terminal blocks are among its own members
pub fn assert_terminals_within_groups(cfg: &ControlFlowGraph) {
    for group in cfg.groups() {
        for terminal in &group.terminal_blocks {
            assert!(
                group.members.contains(terminal),
                "group {} lists {:?} as terminal but its members are {:?}",
                group.range,
                terminal,
                group.members
            );
        }
    }
}
