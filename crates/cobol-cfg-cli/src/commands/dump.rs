//! `cobcfg dump`: successor lists in depth-first order

use std::path::Path;

use cobol_cfg::dump;

use super::{select, BuildArgs};

pub fn execute(build: &BuildArgs, file: &Path, program: Option<&str>) -> anyhow::Result<()> {
    let programs = select(build.build(file)?, program)?;
    for program in &programs {
        if programs.len() > 1 {
            println!("{}:", program.name);
        }
        print!("{}", dump(&program.graph));
    }
    Ok(())
}
