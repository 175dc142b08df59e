//! Subcommand implementations and the shared build step

pub mod check;
pub mod dot;
pub mod dump;
pub mod report;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use cobol_cfg::{drive, BuildMode, CfgBuilder, CfgConfig, Lowering, ProgramCfg, SourceTree};

use crate::{LoweringArg, ModeArg};

const DEFAULT_CONFIG: &str = "cobcfg.toml";

/// Configuration flags shared by every subcommand
pub struct BuildArgs {
    pub config: Option<PathBuf>,
    pub mode: Option<ModeArg>,
    pub evaluate: Option<LoweringArg>,
    pub search: Option<LoweringArg>,
}

impl BuildArgs {
    /// Resolve the configuration: explicit file, else ./cobcfg.toml, else
    /// defaults; command-line flags win over the file.
    pub fn config(&self) -> anyhow::Result<CfgConfig> {
        let mut config = match &self.config {
            Some(path) => CfgConfig::from_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None if Path::new(DEFAULT_CONFIG).exists() => {
                CfgConfig::from_file(Path::new(DEFAULT_CONFIG))
                    .with_context(|| format!("Failed to load {}", DEFAULT_CONFIG))?
            }
            None => CfgConfig::default(),
        };

        if let Some(mode) = self.mode {
            config.mode = match mode {
                ModeArg::Normal => BuildMode::Normal,
                ModeArg::Extended => BuildMode::Extended,
            };
        }
        if let Some(lowering) = self.evaluate {
            config.evaluate = lowering.into();
        }
        if let Some(lowering) = self.search {
            config.search = lowering.into();
        }
        tracing::debug!(?config, "resolved configuration");
        Ok(config)
    }

    /// Read a statement tree and build the graphs of all its programs
    pub fn build(&self, file: &Path) -> anyhow::Result<Vec<ProgramCfg>> {
        let config = self.config()?;
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let tree = SourceTree::from_json(&text)
            .with_context(|| format!("Failed to parse statement tree {}", file.display()))?;

        let mut builder = CfgBuilder::new(config);
        drive(&tree, &mut builder);
        let programs = builder.finish();
        tracing::info!(file = %file.display(), programs = programs.len(), "built graphs");
        Ok(programs)
    }
}

impl From<LoweringArg> for Lowering {
    fn from(arg: LoweringArg) -> Self {
        match arg {
            LoweringArg::Cascade => Lowering::Cascade,
            LoweringArg::Direct => Lowering::Direct,
        }
    }
}

/// Keep only the program named `name` (case-insensitive) when given
pub fn select(programs: Vec<ProgramCfg>, name: Option<&str>) -> anyhow::Result<Vec<ProgramCfg>> {
    let Some(name) = name else {
        return Ok(programs);
    };
    let selected: Vec<_> = programs
        .into_iter()
        .filter(|p| p.name.eq_ignore_ascii_case(name))
        .collect();
    if selected.is_empty() {
        bail!("No program named '{}'", name);
    }
    Ok(selected)
}
