//! Static call report
//!
//! Lists every CALL statement of every program together with the paragraph
//! holding it and the PERFORM ranges through which it is reached.

use std::io;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::builder::ProgramCfg;
use crate::graph::{BasicBlock, ControlFlowGraph};
use crate::node::{NodeId, NodeTag};

/// Callee name used when the CALL target is not a literal
pub const DYNAMIC_CALLEE: &str = "<dynamic>";

/// One CALL statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRow {
    pub program: String,
    pub paragraph: String,
    pub callee: String,
    /// PERFORM ranges reaching the call, separated by `;`
    pub performed_through: String,
}

/// Call rows of a set of programs, in discovery order
#[derive(Debug, Clone, Default)]
pub struct CallReport {
    rows: Vec<CallRow>,
}

impl CallReport {
    pub fn build(programs: &[ProgramCfg]) -> Self {
        let mut rows = Vec::new();
        for program in programs {
            collect(&program.name, &program.graph, &mut rows);
        }
        Self { rows }
    }

    pub fn rows(&self) -> &[CallRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the rows as CSV with a header line
    pub fn write_csv<W: io::Write>(&self, out: W) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(out);
        if self.rows.is_empty() {
            writer.write_record(["program", "paragraph", "callee", "performed_through"])?;
        }
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[derive(Default)]
struct CallSite {
    paragraph: String,
    callee: String,
    ranges: Vec<String>,
}

fn collect(program: &str, cfg: &ControlFlowGraph, rows: &mut Vec<CallRow>) {
    let members: FxHashSet<_> = cfg
        .groups()
        .iter()
        .flat_map(|g| g.members.iter().copied())
        .collect();

    let mut order: Vec<NodeId> = Vec::new();
    let mut sites: FxHashMap<NodeId, CallSite> = FxHashMap::default();

    cfg.dfs(|block| {
        if !members.contains(&block.id) {
            visit(cfg, block, None, &mut order, &mut sites);
        }
        true
    });
    for group in cfg.groups() {
        for &member in &group.members {
            visit(cfg, cfg.block(member), Some(&group.range), &mut order, &mut sites);
        }
    }

    for node in order {
        let Some(site) = sites.remove(&node) else { continue };
        rows.push(CallRow {
            program: program.to_string(),
            paragraph: site.paragraph,
            callee: site.callee,
            performed_through: site.ranges.join(";"),
        });
    }
}

fn visit(
    cfg: &ControlFlowGraph,
    block: &BasicBlock,
    range: Option<&str>,
    order: &mut Vec<NodeId>,
    sites: &mut FxHashMap<NodeId, CallSite>,
) {
    for instr in block.instructions.iter().filter(|i| i.tag == NodeTag::Call) {
        let site = sites.entry(instr.node).or_insert_with(|| {
            order.push(instr.node);
            CallSite {
                paragraph: block.tag.clone().unwrap_or_default(),
                callee: cfg
                    .node_info(instr.node)
                    .and_then(|info| info.call_target.clone())
                    .unwrap_or_else(|| DYNAMIC_CALLEE.to_string()),
                ranges: Vec::new(),
            }
        });
        if let Some(range) = range {
            if !site.ranges.iter().any(|r| r == range) {
                site.ranges.push(range.to_string());
            }
        }
    }
}
