//! Reading resources from a file or stdin.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use resource_filter::Value;
use tracing::debug;

use crate::error::{CliError, Result};

/// Reads the input text from `path`, or stdin when there is none.
pub fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => Ok(fs::read_to_string(path)?),
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

/// Parses input text into resources.
///
/// A JSON array yields its elements and any other document yields itself.
/// With `lines`, every non-blank line is a separate document. Blank input is
/// no resources.
pub fn parse_resources(text: &str, lines: bool) -> Result<Vec<Value>> {
    let resources = if lines {
        let mut resources = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let value = serde_json::from_str(line).map_err(|source| CliError::JsonLine {
                line: index + 1,
                source,
            })?;
            resources.push(value);
        }
        resources
    } else if text.trim().is_empty() {
        Vec::new()
    } else {
        match serde_json::from_str(text)? {
            Value::List(items) => items,
            value => vec![value],
        }
    };

    debug!(count = resources.len(), lines, "read resources");
    Ok(resources)
}

/// Reads and parses the resources for a run.
pub fn read_resources(path: Option<&Path>, lines: bool) -> Result<Vec<Value>> {
    let text = read_input(path)?;
    parse_resources(&text, lines)
}
