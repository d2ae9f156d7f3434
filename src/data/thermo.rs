//! Thermo (Chromeleon) chromatogram report export.
//!
//! The first line names the `File Path` field; the character right after it
//! is the field delimiter. Response values may be quoted and carry
//! thousands separators, so rows are split quote-aware.

use std::io::BufRead;

use super::loader::{parse_number, push_trace, ChannelRule, LineReader, ParsedRun};
use super::model::{IonMode, Trace, TraceMode};
use crate::error::Result;

const DELIMITER_FIELD: &str = "File Path";

pub(crate) fn parse<R: BufRead>(reader: R) -> Result<ParsedRun> {
    let mut lines = LineReader::new(reader);
    let header = lines.require_line("export header")?;
    let delim = header
        .find(DELIMITER_FIELD)
        .and_then(|pos| header[pos + DELIMITER_FIELD.len()..].chars().next())
        .ok_or_else(|| lines.malformed(format!("no delimiter after '{DELIMITER_FIELD}'")))?;
    let rows = RowSplitter::new(delim).ok_or_else(|| {
        lines.malformed(format!("delimiter '{delim}' is not a single-byte character"))
    })?;

    let mut run = ParsedRun::default();
    let mut event = 0;
    while let Some(line) = lines.next_line()? {
        if line.starts_with("Injection Information:") {
            read_injection_info(&mut lines, &rows, &mut run)?;
        } else if line.starts_with("Chromatogram Data:") {
            let trace = read_chromatogram(&mut lines, &rows, event)?;
            push_trace(&mut run.traces, trace, ChannelRule::Transition);
            event += 1;
        }
    }
    Ok(run)
}

/// Quote-aware row splitting on the export's delimiter.
struct RowSplitter {
    delim: u8,
    builder: csv::ReaderBuilder,
}

impl RowSplitter {
    /// `None` when `delim` cannot be a csv delimiter.
    fn new(delim: char) -> Option<Self> {
        let delim = u8::try_from(delim).ok().filter(u8::is_ascii)?;
        let mut builder = csv::ReaderBuilder::new();
        builder.has_headers(false).flexible(true).delimiter(delim);
        Some(Self { delim, builder })
    }

    /// A row ends a block when it is blank or its first field is empty.
    fn is_block_end(&self, line: &str) -> bool {
        line.trim().is_empty() || line.as_bytes().first() == Some(&self.delim)
    }

    /// Split a row, keeping delimiters inside quotes as text.
    fn split<R: BufRead>(&self, lines: &LineReader<R>, line: &str) -> Result<Vec<String>> {
        let mut record = csv::StringRecord::new();
        match self.builder.from_reader(line.as_bytes()).read_record(&mut record) {
            Ok(true) => Ok(record.iter().map(str::to_string).collect()),
            Ok(false) => Err(lines.malformed("empty row")),
            Err(e) => Err(lines.malformed(format!("unreadable row: {e}"))),
        }
    }
}

fn read_injection_info<R: BufRead>(
    lines: &mut LineReader<R>,
    rows: &RowSplitter,
    run: &mut ParsedRun,
) -> Result<()> {
    loop {
        let line = lines.require_line("end of 'Injection Information:' block")?;
        if rows.is_block_end(&line) {
            return Ok(());
        }
        let fields = rows.split(lines, &line)?;
        let value = fields
            .get(1)
            .map(|v| v.trim_end().to_string())
            .filter(|v| !v.is_empty());
        match fields.first().map(String::as_str) {
            Some("Injection") => run.name = value,
            Some("Injection Number") => run.id = value,
            _ => {}
        }
    }
}

fn read_chromatogram<R: BufRead>(
    lines: &mut LineReader<R>,
    rows: &RowSplitter,
    event: u32,
) -> Result<Trace> {
    loop {
        let line = lines.require_line("'Time (min)' column header")?;
        if line.starts_with("Time (min)") {
            break;
        }
    }

    let mut times = Vec::new();
    let mut responses = Vec::new();
    while let Some(line) = lines.next_line()? {
        if rows.is_block_end(&line) {
            break;
        }
        let fields = rows.split(lines, &line)?;
        times.push(parse_number(lines, fields.first().map(String::as_str), "time")?);
        // Drop quotes and thousands separators, then the fractional part.
        let value = fields
            .get(2)
            .map(|v| v.trim().replace([',', '"'], ""));
        let response = parse_number(lines, value.as_deref(), "response")?;
        responses.push(response.trunc());
    }

    Ok(Trace {
        mode: TraceMode::Tic,
        ion_mode: IonMode::Negative,
        event,
        channel: 0,
        precursor: 0.0,
        product: 0.0,
        times,
        responses,
        trace_id: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChromError;
    use std::io::Cursor;

    const REPORT: &str = "File Path,C:\\data\\run12.cdf\n\
        Generated by,Chromeleon 7.2\n\
        ,\n\
        Injection Information:\n\
        Injection,Blank 3\n\
        Injection Number,12\n\
        ,\n\
        Chromatogram Data:\n\
        Information:\n\
        Time (min),Step (s),Value (mAU)\n\
        0.000,n.a.,\"1,024.6\"\n\
        0.010,0.6,\"2,048.1\"\n\
        0.020,0.6,512\n\
        ,\n\
        Chromatogram Data:\n\
        Time (min),Step (s),Value (mAU)\n\
        0.000,n.a.,7\n\
        0.010,0.6,9\n";

    #[test]
    fn test_split_row_quote_aware() {
        let lines = LineReader::new(Cursor::new(""));
        let comma = RowSplitter::new(',').unwrap();
        assert_eq!(
            comma.split(&lines, "0.010,0.6,\"2,048.1\"").unwrap(),
            vec!["0.010", "0.6", "2,048.1"]
        );
        let semicolon = RowSplitter::new(';').unwrap();
        assert_eq!(semicolon.split(&lines, "a;b;c").unwrap(), vec!["a", "b", "c"]);
        assert!(semicolon.is_block_end(";"));
        assert!(RowSplitter::new('§').is_none());
    }

    #[test]
    fn test_multibyte_delimiter_rejected() {
        let text = "File Path§C:\\data\\x.cdf\nChromatogram Data:\nTime (min)§Step§Value\n0.1§0.6§5\n";
        let err = parse(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, ChromError::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn test_report_blocks() {
        let run = parse(Cursor::new(REPORT)).unwrap();
        assert_eq!(run.name.as_deref(), Some("Blank 3"));
        assert_eq!(run.id.as_deref(), Some("12"));
        assert_eq!(run.traces.len(), 2);

        let first = &run.traces[0];
        assert_eq!(first.times, vec![0.0, 0.01, 0.02]);
        assert_eq!(first.responses, vec![1024.0, 2048.0, 512.0]);
        assert_eq!(first.mode, TraceMode::Tic);
        assert_eq!(first.ion_mode, IonMode::Negative);

        let events: Vec<u32> = run.traces.iter().map(|t| t.event).collect();
        assert_eq!(events, vec![0, 1]);
        assert!(run.traces.iter().all(|t| t.channel == 0 && t.precursor == 0.0));
    }

    #[test]
    fn test_missing_delimiter_field() {
        let err = parse(Cursor::new("Report\n")).unwrap_err();
        assert!(matches!(err, ChromError::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn test_bad_response_aborts() {
        let text = "File Path;x\nChromatogram Data:\nTime (min);Step;Value\n0.1;0.6;abc\n";
        let err = parse(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, ChromError::MalformedRecord { line: 4, .. }));
    }
}
