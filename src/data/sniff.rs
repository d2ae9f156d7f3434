use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::data::model::Format;
use crate::error::{ChromError, Result};

/// How many leading lines are inspected for a vendor signature.
pub const SNIFF_LINES: usize = 10;

/// Header tokens that identify each vendor's export.
const SIGNATURES: &[(Format, &str)] = &[
    (Format::Shimadzu, "LabSolutions"),
    (Format::Thermo, "Chromeleon"),
    (Format::Thermo, "File Path"),
    (Format::Waters, "MassLynx"),
];

/// Leading keys of a bannerless Waters key-per-line export.
const WATERS_KEYS: &[&str] = &["name", "id", "precursor"];

/// Identify the vendor of an export from its opening lines.
///
/// Scans at most [`SNIFF_LINES`] lines; on each line the signature occurring
/// earliest wins, and earlier lines win over later ones. Without any
/// signature, a first non-blank line of the form `name,…`, `id,…` or
/// `precursor,…` marks a Waters export.
pub fn sniff_reader<R: BufRead>(mut reader: R) -> Result<Format> {
    let mut line = String::new();
    let mut first_key: Option<String> = None;
    for _ in 0..SNIFF_LINES {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let found = SIGNATURES
            .iter()
            .filter_map(|(format, token)| line.find(token).map(|pos| (pos, *format)))
            .min_by_key(|(pos, _)| *pos);
        if let Some((_, format)) = found {
            return Ok(format);
        }
        if first_key.is_none() && !line.trim().is_empty() {
            let key = line.split(',').next().unwrap_or_default();
            first_key = Some(key.trim().to_string());
        }
    }
    match first_key {
        Some(key) if WATERS_KEYS.contains(&key.as_str()) => Ok(Format::Waters),
        _ => Err(ChromError::UnsupportedFormat(format!(
            "no vendor signature in the first {SNIFF_LINES} lines"
        ))),
    }
}

/// Identify the vendor of the export at `path`.
pub fn sniff_path(path: &Path) -> Result<Format> {
    if !path.exists() {
        return Err(ChromError::FileNotFound(path.to_path_buf()));
    }
    let format = sniff_reader(BufReader::new(fs::File::open(path)?))?;
    log::debug!("{} looks like a {format} export", path.display());
    Ok(format)
}
