//! Colored terminal output for `cobcfg check`.
//!
//! Respects the `NO_COLOR` environment variable and the `--color` flag.

use std::io::Write;

use cobol_cfg::diagnostic::Diagnostic;
use cobol_cfg::ProgramCfg;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Resolve `ColorChoice` from CLI flag and environment.
///
/// Priority: `NO_COLOR` env > `--color` flag > auto-detect TTY.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

pub struct StyledOutput {
    stdout: StandardStream,
}

impl StyledOutput {
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            stdout: StandardStream::stdout(choice),
        }
    }

    fn write_styled(&mut self, text: &str, color: Option<Color>, bold: bool) {
        let mut spec = ColorSpec::new();
        spec.set_fg(color).set_bold(bold);
        let _ = self.stdout.set_color(&spec);
        let _ = write!(self.stdout, "{}", text);
        let _ = self.stdout.reset();
    }

    /// `warning[CFG001]: message (PROGRAM)` without source snippets
    pub fn diagnostic_line(&mut self, program: &str, diag: &Diagnostic) {
        let header = match diag.code() {
            Some(code) => format!("warning[{}]", code.as_str()),
            None => "warning".to_string(),
        };
        self.write_styled(&header, Some(Color::Yellow), true);
        self.write_styled(&format!(": {}", diag.inner().message), None, true);
        self.write_styled(&format!(" ({})", program), Some(Color::Cyan), false);
        let _ = writeln!(self.stdout);
        for note in &diag.inner().notes {
            let _ = writeln!(self.stdout, "  = {}", note);
        }
    }

    /// One line per program: block, group and diagnostic counts
    pub fn summary(&mut self, program: &ProgramCfg) {
        let (badge, color) = if program.diagnostics.is_empty() {
            (" ok ", Color::Green)
        } else {
            (" warn ", Color::Yellow)
        };
        self.write_styled(badge, Some(color), true);
        self.write_styled(&program.name, None, true);
        let _ = writeln!(
            self.stdout,
            ": {} blocks, {} groups, {} diagnostics",
            program.graph.blocks().len(),
            program.graph.groups().len(),
            program.diagnostics.len()
        );
    }

    pub fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}
