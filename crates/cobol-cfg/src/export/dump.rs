//! Plain-text dump: one `BLOCK[i] -> {a,b}` line per block, in
//! depth-first order from the root blocks.

use std::fmt::{self, Write};

use crate::graph::{BlockId, ControlFlowGraph};

/// Write the dump of `cfg` to `out`
pub fn write_dump<W: Write>(cfg: &ControlFlowGraph, out: &mut W) -> fmt::Result {
    let mut result = Ok(());
    cfg.dfs(|block| {
        result = write_block(cfg, block.id, out);
        result.is_ok()
    });
    result
}

fn write_block<W: Write>(cfg: &ControlFlowGraph, id: BlockId, out: &mut W) -> fmt::Result {
    write!(out, "BLOCK[{}] -> {{", id.as_u32())?;
    for (i, next) in cfg.successors(id).enumerate() {
        if i > 0 {
            out.write_char(',')?;
        }
        write!(out, "{}", next.as_u32())?;
    }
    writeln!(out, "}}")
}

/// Dump `cfg` into a string
pub fn dump(cfg: &ControlFlowGraph) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_dump(cfg, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_format() {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.add_block();
        let b = cfg.add_block();
        let c = cfg.add_block();
        cfg.add_root(a);
        cfg.add_edge(a, b);
        cfg.add_edge(a, c);
        cfg.add_edge(b, c);

        assert_eq!(dump(&cfg), "BLOCK[0] -> {1,2}\nBLOCK[1] -> {2}\nBLOCK[2] -> {}\n");
    }

    #[test]
    fn test_unreachable_blocks_are_skipped() {
        let mut cfg = ControlFlowGraph::new();
        let a = cfg.add_block();
        cfg.add_block();
        cfg.add_root(a);
        assert_eq!(dump(&cfg), "BLOCK[0] -> {}\n");
    }
}
