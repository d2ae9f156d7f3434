//! Waters (MassLynx) key-per-line export.
//!
//! ```text
//! name,QC high
//! id,4
//! precursor,195.1
//! product,138.0
//! 0.01,120
//! 0.02,340
//! <blank>
//! ```

use std::io::BufRead;

use super::loader::{parse_number, push_trace, ChannelRule, LineReader, ParsedRun};
use super::model::{IonMode, Trace, TraceMode};
use crate::error::Result;

const DELIMITER: char = ',';

pub(crate) fn parse<R: BufRead>(reader: R) -> Result<ParsedRun> {
    let mut lines = LineReader::new(reader);
    let mut run = ParsedRun::default();
    let mut event = 0;

    while let Some(line) = lines.next_line()? {
        let row: Vec<&str> = line.trim_end().split(DELIMITER).collect();
        let value = || row.get(1).map(|v| v.to_string()).filter(|v| !v.is_empty());
        match row[0] {
            "name" => run.name = value(),
            "id" => run.id = value(),
            "precursor" => {
                let precursor = parse_number(&lines, row.get(1).copied(), "precursor m/z")?;
                let trace = read_block(&mut lines, precursor, event)?;
                push_trace(&mut run.traces, trace, ChannelRule::Precursor);
                event += 1;
            }
            _ => {}
        }
    }
    Ok(run)
}

fn read_block<R: BufRead>(lines: &mut LineReader<R>, precursor: f64, event: u32) -> Result<Trace> {
    let product_line = lines.require_line("product line")?;
    let product = parse_number(lines, product_line.trim_end().split(DELIMITER).nth(1), "product m/z")?;

    let mut times = Vec::new();
    let mut responses = Vec::new();
    while let Some(line) = lines.next_line()? {
        let mut fields = line.trim_end().split(DELIMITER);
        let time = fields.next().unwrap_or_default();
        if time.is_empty() {
            break;
        }
        times.push(parse_number(lines, Some(time), "time")?);
        responses.push(parse_number(lines, fields.next(), "response")?);
    }

    let mode = if precursor > 0.0 {
        TraceMode::Mrm
    } else {
        TraceMode::Tic
    };
    Ok(Trace {
        mode,
        ion_mode: IonMode::Positive,
        event,
        channel: 0,
        precursor,
        product,
        times,
        responses,
        trace_id: 0,
    })
}
