//! File tools: Read, Write, Edit.

use crate::error::ToolError;
use std::path::Path;

/// Read a regular file as UTF-8.
pub fn read_file(path: &Path) -> Result<String, ToolError> {
    let display = path.display().to_string();
    match path.metadata() {
        Ok(meta) if meta.is_file() => {
            std::fs::read_to_string(path).map_err(|e| ToolError::io(display, e))
        }
        Ok(_) => Err(ToolError::NotAFile(display)),
        Err(_) => Err(ToolError::NotFound(display)),
    }
}

/// Write a file, creating parent directories and overwriting any previous
/// content.
pub fn write_file(path: &Path, content: &str) -> Result<(), ToolError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| ToolError::io(parent.display().to_string(), e))?;
    }
    std::fs::write(path, content).map_err(|e| ToolError::io(path.display().to_string(), e))
}

/// Replace `old_string` with `new_string`.
///
/// The anchor must occur exactly once; zero or multiple occurrences fail and
/// the file is left byte-identical.
pub fn edit_file(path: &Path, old_string: &str, new_string: &str) -> Result<(), ToolError> {
    if old_string.is_empty() {
        return Err(ToolError::EmptyAnchor);
    }
    let display = path.display().to_string();
    let content = read_file(path)?;
    let count = content.matches(old_string).count();
    match count {
        0 => Err(ToolError::AnchorMissing(display)),
        1 => {
            let updated = content.replacen(old_string, new_string, 1);
            std::fs::write(path, updated).map_err(|e| ToolError::io(display, e))
        }
        _ => Err(ToolError::AnchorAmbiguous {
            path: display,
            count,
        }),
    }
}
