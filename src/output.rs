//! Rendering parsed values and writing specification files.

use crate::parser::ArgumentParser;
use crate::xml::to_xml;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Render every argument as a `name=value` line in declaration order.
///
/// Multi-value arguments are joined with single spaces; unset arguments
/// render with an empty value.
pub fn render_values(parser: &ArgumentParser) -> String {
    let mut output = String::new();

    let names = parser
        .positional_names()
        .iter()
        .chain(parser.named_names())
        .chain(parser.flag_names());
    for name in names {
        let value = parser
            .values(name)
            .map(|values| values.join(" "))
            .unwrap_or_default();
        output.push_str(&format!("{}={}\n", name, value));
    }

    output
}

/// Write the XML specification of `parser` to `path`.
///
/// The document is written to a temporary file in the same directory and
/// renamed into place, so readers never see a partial file.
pub fn write_specification(parser: &ArgumentParser, path: &Path) -> Result<()> {
    let xml = to_xml(parser).context("failed to serialize specification")?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    file.write_all(xml.as_bytes())?;
    file.persist(path)
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}
