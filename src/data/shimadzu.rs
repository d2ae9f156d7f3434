//! Shimadzu LabSolutions ASCII export.
//!
//! ```text
//! [Header]
//! Application Name<TAB>LabSolutions
//! ...
//! [Sample Information]
//! Sample Name<TAB>Caffeine 10 ppm
//! Sample ID<TAB>7
//!
//! [MS Chromatogram]
//! m/z 1-2MS(E+) m/z 195.10>138.00
//! ...
//! R.Time (min)<TAB>Intensity
//! 0.008<TAB>1234
//! ...
//! <blank>
//! ```

use std::io::BufRead;
use std::sync::LazyLock;

use regex::Regex;

use super::loader::{parse_number, push_trace, ChannelRule, LineReader, ParsedRun};
use super::model::{IonMode, Trace, TraceMode};
use crate::error::Result;

/// Product name on the second header line, preceded by the field delimiter.
const PRODUCT_TOKEN: &str = "LabSolutions";

static TRACE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^m/z.(\d+)-(\d+)MS\(\w(.)\)\s*(.*)$").unwrap());
static TRANSITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^m/z ([\d.]+)>([\d.]+)").unwrap());

pub(crate) fn parse<R: BufRead>(reader: R) -> Result<ParsedRun> {
    let mut lines = LineReader::new(reader);
    lines.require_line("export header")?;
    let app_line = lines.require_line("application line")?;
    let delim = app_line
        .rfind(PRODUCT_TOKEN)
        .and_then(|pos| app_line[..pos].chars().next_back())
        .ok_or_else(|| lines.malformed(format!("no delimiter before '{PRODUCT_TOKEN}'")))?;

    let mut run = ParsedRun::default();
    while let Some(line) = lines.next_line()? {
        match line.trim_end() {
            "[Sample Information]" => read_sample_info(&mut lines, delim, &mut run)?,
            "[MS Chromatogram]" => {
                let trace = read_chromatogram(&mut lines, delim)?;
                push_trace(&mut run.traces, trace, ChannelRule::Precursor);
            }
            _ => {}
        }
    }
    Ok(run)
}

fn read_sample_info<R: BufRead>(
    lines: &mut LineReader<R>,
    delim: char,
    run: &mut ParsedRun,
) -> Result<()> {
    loop {
        let line = lines.require_line("blank line ending [Sample Information]")?;
        if line.trim().is_empty() {
            return Ok(());
        }
        let mut fields = line.split(delim);
        let key = fields.next().unwrap_or_default();
        let value = fields
            .next()
            .map(|v| v.trim_end().to_string())
            .filter(|v| !v.is_empty());
        match key {
            "Sample Name" => run.name = value,
            "Sample ID" => run.id = value,
            _ => {}
        }
    }
}

fn read_chromatogram<R: BufRead>(lines: &mut LineReader<R>, delim: char) -> Result<Trace> {
    let header = lines.require_line("MS chromatogram header")?;
    let header = header.trim_end();
    let caps = TRACE_HEADER
        .captures(header)
        .ok_or_else(|| lines.malformed(format!("unrecognised MS chromatogram header '{header}'")))?;

    let event = caps[2]
        .parse::<u32>()
        .map_err(|_| lines.malformed(format!("invalid event '{}'", &caps[2])))?;
    let ion_mode = caps[3]
        .chars()
        .next()
        .and_then(IonMode::from_sign)
        .ok_or_else(|| lines.malformed(format!("invalid ion polarity '{}'", &caps[3])))?;

    let kind = caps[4].trim();
    let (mode, precursor, product) = if kind == "TIC" {
        (TraceMode::Tic, 0.0, 0.0)
    } else {
        let mrm = TRANSITION
            .captures(kind)
            .ok_or_else(|| lines.malformed(format!("unrecognised transition '{kind}'")))?;
        let precursor = parse_number(lines, Some(&mrm[1]), "precursor m/z")?;
        let product = parse_number(lines, Some(&mrm[2]), "product m/z")?;
        (TraceMode::Mrm, precursor, product)
    };

    // Skip detector settings up to the column header.
    loop {
        let line = lines.require_line("'R.Time' column header")?;
        if line.starts_with("R.Time") {
            break;
        }
    }

    let mut times = Vec::new();
    let mut responses = Vec::new();
    loop {
        let line = lines.require_line("blank line ending [MS Chromatogram]")?;
        if line.trim().is_empty() {
            break;
        }
        let mut fields = line.split(delim);
        times.push(parse_number(lines, fields.next(), "retention time")?);
        responses.push(parse_number(lines, fields.next(), "response")?);
    }

    Ok(Trace {
        mode,
        ion_mode,
        event,
        channel: 0,
        precursor,
        product,
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

    const MINIMAL: &str = "[Header]\n\
        Application Name\tLabSolutions\n\
        Version\t5.97\n\
        \n\
        [Sample Information]\n\
        Operator\tlab\n\
        Sample Name\tCaffeine 10 ppm\n\
        Sample ID\t7\n\
        \n\
        [MS Chromatogram]\n\
        m/z 1-1MS(E+) TIC\n\
        Mass\tTIC\n\
        Intensity Units\tcounts\n\
        R.Time (min)\tIntensity\n\
        0.01\t100\n\
        0.02\t350\n\
        0.03\t120\n\
        \n";

    fn mrm_block(event: u32, sign: char, transition: &str) -> String {
        format!(
            "[MS Chromatogram]\nm/z 1-{event}MS(E{sign}) m/z {transition}\n\
             R.Time (min)\tIntensity\n0.01\t5\n0.02\t9\n\n"
        )
    }

    #[test]
    fn test_minimal_export() {
        let run = parse(Cursor::new(MINIMAL)).unwrap();
        assert_eq!(run.name.as_deref(), Some("Caffeine 10 ppm"));
        assert_eq!(run.id.as_deref(), Some("7"));
        assert_eq!(run.traces.len(), 1);
        let t = &run.traces[0];
        assert_eq!(t.mode, TraceMode::Tic);
        assert_eq!(t.ion_mode, IonMode::Positive);
        assert_eq!(t.event, 1);
        assert_eq!(t.channel, 0);
        assert_eq!(t.times, vec![0.01, 0.02, 0.03]);
        assert_eq!(t.responses, vec![100.0, 350.0, 120.0]);
    }

    #[test]
    fn test_mrm_channels_and_delimiter() {
        let mut text = String::from("[Header]\nApplication Name,LabSolutions\n");
        text.push_str(&mrm_block(2, '+', "195.10>138.00").replace('\t', ","));
        text.push_str(&mrm_block(3, '+', "195.10>110.00").replace('\t', ","));
        text.push_str(&mrm_block(4, '-', "250.00>100.00").replace('\t', ","));
        text.push_str(&mrm_block(5, '+', "195.10>42.00").replace('\t', ","));

        let run = parse(Cursor::new(text)).unwrap();
        let summary: Vec<(u32, u32, f64)> = run
            .traces
            .iter()
            .map(|t| (t.event, t.channel, t.product))
            .collect();
        assert_eq!(
            summary,
            vec![(2, 0, 138.0), (3, 1, 110.0), (4, 0, 100.0), (5, 2, 42.0)]
        );
        assert_eq!(run.traces[2].ion_mode, IonMode::Negative);
        assert!(run.traces.iter().all(|t| t.mode == TraceMode::Mrm));
    }

    #[test]
    fn test_bad_header_aborts() {
        let text = "[Header]\nApplication Name\tLabSolutions\n\
                    [MS Chromatogram]\nsomething else\n";
        let err = parse(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, ChromError::MalformedRecord { line: 4, .. }));
    }

    #[test]
    fn test_missing_rtime_marker_aborts() {
        let text = "[Header]\nApplication Name\tLabSolutions\n\
                    [MS Chromatogram]\nm/z 1-1MS(E+) TIC\nMass\tTIC\n";
        let err = parse(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, ChromError::MalformedRecord { .. }));
    }

    #[test]
    fn test_file_ending_mid_section_aborts() {
        let text = MINIMAL.trim_end_matches('\n');
        let err = parse(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, ChromError::MalformedRecord { .. }));
    }

    #[test]
    fn test_missing_product_token() {
        let text = "[Header]\nApplication Name\tSomething\n";
        let err = parse(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, ChromError::MalformedRecord { line: 2, .. }));
    }
}
