//! Loading slot elements from disk.
//!
//! One file per slot. Each non-blank line that does not start with `#` reads
//! `payload [name]`, whitespace separated; without a name the payload doubles as one.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::{Element, SourceError};

/// Read one slot file, keeping at most `max` elements.
pub fn read_slot(path: &Path, max: Option<usize>) -> Result<Vec<Element<String>>, SourceError> {
    let text = fs::read_to_string(path).map_err(|source| SourceError::Read {
        source,
        path: path.to_path_buf(),
    })?;
    let mut out = Vec::new();
    for line in text.lines() {
        if max.is_some_and(|m| out.len() >= m) {
            break;
        }
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let Some(payload) = fields.next() else {
            continue;
        };
        let name = fields.next().unwrap_or(payload);
        out.push(Element::new(name, payload.to_string()));
    }
    if out.is_empty() {
        return Err(SourceError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(out)
}

/// Read every slot file in order.
pub fn read_slots(
    paths: &[PathBuf],
    max_per_slot: Option<usize>,
) -> Result<Vec<Vec<Element<String>>>, SourceError> {
    let mut slots = Vec::with_capacity(paths.len());
    for path in paths {
        let elements = read_slot(path, max_per_slot)?;
        info!(path = %path.display(), count = elements.len(), "read slot elements");
        slots.push(elements);
    }
    Ok(slots)
}
