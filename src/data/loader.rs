use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use super::ids::IdAllocator;
use super::model::{File, Format, Trace};
use super::sniff::sniff_path;
use super::{shimadzu, thermo, waters};
use crate::error::{ChromError, Result};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

impl File {
    /// Parse an export, detecting its vendor from the header, using the
    /// process-wide id allocator.
    pub fn parse(path: impl AsRef<Path>) -> Result<File> {
        File::parse_with(path, IdAllocator::global())
    }

    /// Parse an export, detecting its vendor, drawing ids from `ids`.
    pub fn parse_with(path: impl AsRef<Path>, ids: &IdAllocator) -> Result<File> {
        let mut file = read_file(path.as_ref(), None, ids.next_file_id())?;
        number_traces(&mut file, ids);
        Ok(file)
    }

    /// Parse an export as an explicitly chosen vendor layout.
    pub fn parse_as(path: impl AsRef<Path>, format: Format, ids: &IdAllocator) -> Result<File> {
        let mut file = read_file(path.as_ref(), Some(format), ids.next_file_id())?;
        number_traces(&mut file, ids);
        Ok(file)
    }

    /// Parse an already opened export. `path` is recorded as given.
    pub fn from_reader<R: BufRead>(
        reader: R,
        path: PathBuf,
        format: Format,
        ids: &IdAllocator,
    ) -> Result<File> {
        let mut file = build_file(reader, path, format, ids.next_file_id())?;
        number_traces(&mut file, ids);
        Ok(file)
    }
}

/// What to do when one file of a batch fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Abort the batch with the first error (in input order).
    #[default]
    FailFast,
    /// Log the failure and continue with the remaining files.
    SkipInvalid,
}

/// Parse several exports concurrently, one result per input path.
///
/// File ids are reserved in input order before any parsing starts. Trace ids
/// are handed out after the parallel parse, file by file in input order, so
/// both are independent of thread scheduling and each file's trace ids are
/// contiguous. Output keeps input order.
pub fn parse_many(paths: &[PathBuf], format: Option<Format>, ids: &IdAllocator) -> Vec<Result<File>> {
    let reserved: Vec<(u64, &PathBuf)> = paths.iter().map(|p| (ids.next_file_id(), p)).collect();
    let mut results: Vec<Result<File>> = reserved
        .par_iter()
        .map(|(file_id, path)| read_file(path, format, *file_id))
        .collect();
    for file in results.iter_mut().flatten() {
        number_traces(file, ids);
    }
    results
}

/// Parse several exports concurrently, applying `policy` to failures.
pub fn load_files(
    paths: &[PathBuf],
    format: Option<Format>,
    ids: &IdAllocator,
    policy: BatchPolicy,
) -> Result<Vec<File>> {
    let results = parse_many(paths, format, ids);
    let kept = policy.apply(results.into_iter().zip(paths))?;
    Ok(kept.into_iter().map(|(file, _)| file).collect())
}

impl BatchPolicy {
    /// Resolve per-item results: the first error under `FailFast`, otherwise
    /// the successes with failures logged.
    pub fn apply<T, C>(&self, results: impl IntoIterator<Item = (Result<T>, C)>) -> Result<Vec<(T, C)>>
    where
        C: std::fmt::Debug,
    {
        let mut kept = Vec::new();
        for (res, ctx) in results {
            match (res, self) {
                (Ok(item), _) => kept.push((item, ctx)),
                (Err(e), BatchPolicy::FailFast) => return Err(e),
                (Err(e), BatchPolicy::SkipInvalid) => log::warn!("skipping {ctx:?}: {e}"),
            }
        }
        Ok(kept)
    }
}

fn read_file(path: &Path, format: Option<Format>, file_id: u64) -> Result<File> {
    if !path.exists() {
        return Err(ChromError::FileNotFound(path.to_path_buf()));
    }
    let format = match format {
        Some(f) => f,
        None => sniff_path(path)?,
    };
    let absolute = std::path::absolute(path)?;
    let reader = BufReader::new(fs::File::open(&absolute)?);
    build_file(reader, absolute, format, file_id)
}

/// Parse one export. Trace ids are left unset; see [`number_traces`].
fn build_file<R: BufRead>(reader: R, path: PathBuf, format: Format, file_id: u64) -> Result<File> {
    let run = match format {
        Format::Shimadzu => shimadzu::parse(reader),
        Format::Thermo => thermo::parse(reader),
        Format::Waters => waters::parse(reader),
    }?;
    log::info!(
        "parsed {} ({format}): {} traces",
        path.display(),
        run.traces.len()
    );
    Ok(File {
        path,
        format,
        name: run.name,
        id: run.id,
        file_id,
        traces: run.traces,
    })
}

/// Give the file's traces one contiguous block of trace ids, in file order.
fn number_traces(file: &mut File, ids: &IdAllocator) {
    let first = ids.reserve_traces(file.traces.len() as u64);
    for (trace_id, trace) in (first..).zip(file.traces.iter_mut()) {
        trace.trace_id = trace_id;
    }
}

// ---------------------------------------------------------------------------
// Shared parser plumbing
// ---------------------------------------------------------------------------

/// Output of a vendor parser, before it is wrapped into a [`File`].
#[derive(Debug, Default)]
pub(crate) struct ParsedRun {
    pub name: Option<String>,
    pub id: Option<String>,
    pub traces: Vec<Trace>,
}

/// Forward-only line source that strips line terminators and counts lines.
pub(crate) struct LineReader<R> {
    inner: R,
    line_no: usize,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, line_no: 0 }
    }

    /// 1-based number of the line most recently returned.
    #[cfg(test)]
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    /// The next line without its `\n`/`\r\n`, or `None` at end of file.
    pub fn next_line(&mut self) -> Result<Option<String>> {
        let mut buf = String::new();
        if self.inner.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        let trimmed_len = buf.trim_end_matches(['\n', '\r']).len();
        buf.truncate(trimmed_len);
        Ok(Some(buf))
    }

    /// Like [`next_line`](Self::next_line) but end of file is a malformed record.
    pub fn require_line(&mut self, what: &str) -> Result<String> {
        match self.next_line()? {
            Some(line) => Ok(line),
            None => Err(ChromError::malformed(
                self.line_no + 1,
                format!("unexpected end of file, expected {what}"),
            )),
        }
    }

    pub fn malformed(&self, message: impl Into<String>) -> ChromError {
        ChromError::malformed(self.line_no, message)
    }
}

/// Parse a numeric field, reporting the line on failure.
pub(crate) fn parse_number<R: BufRead>(
    lines: &LineReader<R>,
    field: Option<&str>,
    what: &str,
) -> Result<f64> {
    let raw = field.ok_or_else(|| lines.malformed(format!("missing {what} column")))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| lines.malformed(format!("'{}' is not a valid {what}", raw.trim())))
}

// ---------------------------------------------------------------------------
// Channel assignment
// ---------------------------------------------------------------------------

/// Which traces count as sharing a channel. Vendors differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRule {
    /// Equal nonzero precursor.
    Precursor,
    /// Equal nonzero precursor, same mode and same product.
    Transition,
}

impl ChannelRule {
    pub fn same_channel(&self, earlier: &Trace, candidate: &Trace) -> bool {
        if candidate.precursor == 0.0 || earlier.precursor != candidate.precursor {
            return false;
        }
        match self {
            ChannelRule::Precursor => true,
            ChannelRule::Transition => {
                earlier.mode == candidate.mode && earlier.product == candidate.product
            }
        }
    }
}

/// Channel of `candidate` given the traces already parsed from the same file:
/// the number of earlier traces that share its channel under `rule`.
pub fn assign_channel(previous: &[Trace], candidate: &Trace, rule: ChannelRule) -> u32 {
    previous
        .iter()
        .filter(|t| rule.same_channel(t, candidate))
        .count() as u32
}

/// Finish a candidate trace: assign its channel, then append it.
pub(crate) fn push_trace(traces: &mut Vec<Trace>, mut candidate: Trace, rule: ChannelRule) {
    candidate.channel = assign_channel(traces, &candidate, rule);
    log::debug!(
        "trace {}: {} event {} channel {} ({} > {}), {} points",
        traces.len(),
        candidate.mode.as_str(),
        candidate.event,
        candidate.channel,
        candidate.precursor,
        candidate.product,
        candidate.len()
    );
    traces.push(candidate);
}
