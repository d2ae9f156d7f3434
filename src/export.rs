use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{
    ArrayRef, Float64Array, Float64Builder, Int64Array, ListBuilder, StringArray, UInt32Array,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use crate::color::{to_hex, ColorMap, DEFAULT_COLOR};
use crate::plot::PlotEntry;

// ---------------------------------------------------------------------------
// Flattened rows: one per selected trace
// ---------------------------------------------------------------------------

/// One selected trace with its file metadata and transformed series.
#[derive(Debug, Clone, Serialize)]
pub struct TraceRow {
    pub file: String,
    pub sample: Option<String>,
    pub label: Option<String>,
    pub file_id: u64,
    pub trace_id: u64,
    pub mode: &'static str,
    pub ion_mode: &'static str,
    pub event: u32,
    pub channel: u32,
    pub precursor: f64,
    pub product: f64,
    pub row: usize,
    pub col: usize,
    pub color: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Flatten the selected traces of every entry, in entry then parse order.
pub fn collect_rows(entries: &[PlotEntry]) -> Vec<TraceRow> {
    let mut rows = Vec::new();
    for entry in entries {
        let colors = ColorMap::for_entry(entry);
        let explicit = entry.keywords.color();
        let (row, col) = entry.axis();
        for trace in entry.traces() {
            let color = match (&explicit, &colors) {
                (Some(c), _) => c.clone(),
                (None, Some(map)) => to_hex(map.color_or_default(entry.color_key(trace).as_ref())),
                (None, None) => to_hex(DEFAULT_COLOR),
            };
            let (x, y) = entry.series(trace);
            rows.push(TraceRow {
                file: entry.file.path.to_string_lossy().into_owned(),
                sample: entry.file.name.clone(),
                label: entry.label(),
                file_id: entry.file.file_id,
                trace_id: trace.trace_id,
                mode: trace.mode.as_str(),
                ion_mode: trace.ion_mode.as_str(),
                event: trace.event,
                channel: trace.channel,
                precursor: trace.precursor,
                product: trace.product,
                row,
                col,
                color,
                x,
                y,
            });
        }
    }
    rows
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

pub fn write_json(rows: &[TraceRow], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), rows)
        .context("Failed to write JSON")?;
    log::info!("wrote {} traces to {}", rows.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet: x/y list columns plus one column per attribute
// ---------------------------------------------------------------------------

fn list_column(series: impl Iterator<Item = Vec<f64>>) -> ArrayRef {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in series {
        let values = builder.values();
        for v in row {
            values.append_value(v);
        }
        builder.append(true);
    }
    Arc::new(builder.finish())
}

fn schema() -> Arc<Schema> {
    let list = DataType::List(Arc::new(Field::new("item", DataType::Float64, true)));
    Arc::new(Schema::new(vec![
        Field::new("x", list.clone(), false),
        Field::new("y", list, false),
        Field::new("file", DataType::Utf8, false),
        Field::new("sample", DataType::Utf8, true),
        Field::new("file_id", DataType::UInt64, false),
        Field::new("trace_id", DataType::UInt64, false),
        Field::new("mode", DataType::Utf8, false),
        Field::new("ion_mode", DataType::Utf8, false),
        Field::new("event", DataType::UInt32, false),
        Field::new("channel", DataType::UInt32, false),
        Field::new("precursor", DataType::Float64, false),
        Field::new("product", DataType::Float64, false),
        Field::new("color", DataType::Utf8, false),
        Field::new("row", DataType::Int64, false),
        Field::new("col", DataType::Int64, false),
    ]))
}

/// Build the record batch written by [`write_parquet`].
pub fn to_record_batch(rows: &[TraceRow]) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        list_column(rows.iter().map(|r| r.x.clone())),
        list_column(rows.iter().map(|r| r.y.clone())),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.file.as_str()))),
        Arc::new(StringArray::from_iter(rows.iter().map(|r| r.sample.as_deref()))),
        Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.file_id))),
        Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.trace_id))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.mode))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.ion_mode))),
        Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.event))),
        Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.channel))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.precursor))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.product))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.color.as_str()))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.row as i64))),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.col as i64))),
    ];
    RecordBatch::try_new(schema(), columns).context("Failed to create RecordBatch")
}

/// Plain-text table of the rows with each trace's peak, for the terminal.
pub fn summary_table(rows: &[TraceRow]) -> Result<String> {
    let peaks: Vec<Option<(f64, f64)>> = rows
        .iter()
        .map(|r| {
            r.x.iter()
                .zip(&r.y)
                .filter(|(_, y)| !y.is_nan())
                .fold(None, |best: Option<(f64, f64)>, (&x, &y)| match best {
                    Some((_, by)) if by >= y => best,
                    _ => Some((x, y)),
                })
        })
        .collect();
    let schema = Arc::new(Schema::new(vec![
        Field::new("sample", DataType::Utf8, true),
        Field::new("trace_id", DataType::UInt64, false),
        Field::new("mode", DataType::Utf8, false),
        Field::new("event", DataType::UInt32, false),
        Field::new("channel", DataType::UInt32, false),
        Field::new("precursor", DataType::Float64, false),
        Field::new("product", DataType::Float64, false),
        Field::new("peak_x", DataType::Float64, true),
        Field::new("peak_y", DataType::Float64, true),
        Field::new("color", DataType::Utf8, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter(rows.iter().map(|r| r.label.as_deref()))),
        Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.trace_id))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.mode))),
        Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.event))),
        Arc::new(UInt32Array::from_iter_values(rows.iter().map(|r| r.channel))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.precursor))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.product))),
        Arc::new(Float64Array::from_iter(peaks.iter().map(|p| p.map(|(x, _)| x)))),
        Arc::new(Float64Array::from_iter(peaks.iter().map(|p| p.map(|(_, y)| y)))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.color.as_str()))),
    ];
    let batch = RecordBatch::try_new(schema, columns).context("Failed to create RecordBatch")?;
    let table = arrow::util::pretty::pretty_format_batches(&[batch])
        .context("Failed to format summary")?;
    Ok(table.to_string())
}

pub fn write_parquet(rows: &[TraceRow], path: &Path) -> Result<()> {
    let batch = to_record_batch(rows)?;
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("Failed to create writer")?;
    writer.write(&batch).context("Failed to write batch")?;
    writer.close().context("Failed to close writer")?;
    log::info!("wrote {} traces to {}", rows.len(), path.display());
    Ok(())
}
