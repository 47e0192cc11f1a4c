//! Output formatting for matches and warnings.

use std::collections::HashSet;
use std::io::Write;

use owo_colors::OwoColorize;
use resource_filter::{Deprecation, Value, WarningSink};

use crate::error::Result;

/// Writes each match as one line of compact JSON.
pub fn write_lines(out: &mut impl Write, matches: &[&Value]) -> Result<()> {
    for value in matches {
        serde_json::to_writer(&mut *out, value)?;
        writeln!(out)?;
    }
    Ok(())
}

/// Writes the matches as one indented JSON array.
pub fn write_pretty(out: &mut impl Write, matches: &[&Value]) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, matches)?;
    writeln!(out)?;
    Ok(())
}

/// Writes the number of matches.
pub fn write_count(out: &mut impl Write, count: usize) -> Result<()> {
    writeln!(out, "{count}")?;
    Ok(())
}

/// Formats a deprecation for stderr.
pub fn format_warning(deprecation: &Deprecation, use_colors: bool) -> String {
    let label = if use_colors {
        "WARNING:".yellow().bold().to_string()
    } else {
        "WARNING:".to_string()
    };
    format!("{label} {deprecation}")
}

/// Prints each distinct deprecation to stderr once per run.
pub struct StderrWarnings {
    use_colors: bool,
    quiet: bool,
    seen: HashSet<String>,
}

impl StderrWarnings {
    pub fn new(use_colors: bool, quiet: bool) -> Self {
        Self {
            use_colors,
            quiet,
            seen: HashSet::new(),
        }
    }

    /// Number of distinct deprecations seen, printed or not.
    pub fn distinct(&self) -> usize {
        self.seen.len()
    }
}

impl WarningSink for StderrWarnings {
    fn warn(&mut self, deprecation: Deprecation) {
        if !self.seen.insert(deprecation.expression.clone()) {
            return;
        }
        if !self.quiet {
            eprintln!("{}", format_warning(&deprecation, self.use_colors));
        }
    }
}
