//! `cobcfg report`: CALL statements and the PERFORM ranges that reach them

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use cobol_cfg::CallReport;

use super::BuildArgs;

pub fn execute(build: &BuildArgs, files: &[PathBuf], output: Option<&Path>) -> anyhow::Result<()> {
    let mut programs = Vec::new();
    for file in files {
        programs.extend(build.build(file)?);
    }

    let report = CallReport::build(&programs);
    if report.is_empty() {
        tracing::warn!("no CALL statements found");
    }

    match output {
        Some(path) => {
            let out = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            report.write_csv(out).context("Failed to write report")?;
        }
        None => report.write_csv(io::stdout().lock()).context("Failed to write report")?,
    }
    Ok(())
}
