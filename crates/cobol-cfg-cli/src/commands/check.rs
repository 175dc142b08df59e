//! `cobcfg check`: build the graphs and print what could not be resolved

use std::path::Path;

use anyhow::{bail, Context};
use cobol_cfg::diagnostic::{create_files, Diagnostic, JsonDiagnostic};
use termcolor::{ColorChoice, StandardStream};

use super::BuildArgs;
use crate::output::StyledOutput;

pub fn execute(
    build: &BuildArgs,
    file: &Path,
    source: Option<&Path>,
    json: bool,
    deny_warnings: bool,
    color: ColorChoice,
) -> anyhow::Result<()> {
    let programs = build.build(file)?;

    // without the COBOL source, spans cannot be rendered against any text
    let (name, text) = match source {
        Some(path) => (
            path.to_path_buf(),
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        None => (file.to_path_buf(), String::new()),
    };
    let files = create_files(name, text);

    let mut count = 0;
    let mut json_diagnostics = Vec::new();
    let mut out = StyledOutput::new(color);
    let mut stderr = StandardStream::stderr(color);

    for program in &programs {
        for error in &program.diagnostics {
            count += 1;
            let diag = Diagnostic::from_cfg_error(error, 0);
            if json {
                json_diagnostics.push(JsonDiagnostic::from_diagnostic(&diag, &files));
            } else if source.is_some() {
                diag.emit_to(&mut stderr, &files)
                    .context("Failed to render diagnostic")?;
            } else {
                out.diagnostic_line(&program.name, &diag);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&json_diagnostics)?);
    } else {
        for program in &programs {
            out.summary(program);
        }
        out.flush();
    }

    if deny_warnings && count > 0 {
        bail!("{} diagnostic(s) reported", count);
    }
    Ok(())
}
