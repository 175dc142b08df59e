//! `cobcfg dot`: Graphviz output

use std::path::Path;

use anyhow::Context;
use cobol_cfg::DotWriter;

use super::{select, BuildArgs};

pub fn execute(
    build: &BuildArgs,
    file: &Path,
    full_instruction: bool,
    program: Option<&str>,
    out_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let programs = select(build.build(file)?, program)?;

    if let Some(dir) = out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    for program in &programs {
        let dot = DotWriter::new(&program.graph)
            .full_instruction(full_instruction)
            .to_string();
        match out_dir {
            Some(dir) => {
                let path = dir.join(format!("{}.dot", program.name));
                std::fs::write(&path, dot)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                tracing::info!(path = %path.display(), "wrote graph");
            }
            None => {
                if programs.len() > 1 {
                    println!("// {}", program.name);
                }
                print!("{}", dot);
            }
        }
    }
    Ok(())
}
