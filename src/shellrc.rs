//! Idempotent edits to shell startup files.

use std::path::Path;

use crate::error::Result;

pub const PATH_SENTINEL: &str = "# added by frida-setup";

/// Append `line` (preceded by `sentinel` as a comment) to `path` unless the
/// sentinel is already there. Returns whether the file was modified.
pub fn ensure_line_present(path: &Path, sentinel: &str, line: &str) -> Result<bool> {
    let existing = if path.exists() {
        std::fs::read_to_string(path)?
    } else {
        String::new()
    };

    if existing.contains(sentinel) {
        return Ok(false);
    }

    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(sentinel);
    updated.push('\n');
    updated.push_str(line);
    updated.push('\n');
    std::fs::write(path, updated)?;
    Ok(true)
}

/// Put `bin_dir` on PATH via the first shell rc file that exists. No rc file
/// is a warning, not an error.
pub fn ensure_path_entry(candidates: &[std::path::PathBuf], bin_dir: &Path) -> Result<bool> {
    let line = format!("export PATH=\"{}:$PATH\"", bin_dir.display());
    for rc in candidates {
        if rc.exists() {
            let changed = ensure_line_present(rc, PATH_SENTINEL, &line)?;
            if changed {
                tracing::info!(rc = %rc.display(), "added {} to PATH", bin_dir.display());
            }
            return Ok(changed);
        }
    }
    tracing::warn!(
        "no shell startup file found; add {} to PATH yourself",
        bin_dir.display()
    );
    Ok(false)
}
