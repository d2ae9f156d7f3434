use std::path::PathBuf;

use crate::data::ids::IdAllocator;
use crate::data::loader::{parse_many, BatchPolicy};
use crate::data::model::{Attributes, File, Format, Trace, Value};
use crate::error::{ChromError, Result};
use crate::query::{Defaults, Filter, Keywords, Options};

// ---------------------------------------------------------------------------
// Plot entry: one file plus its filter, options and keywords
// ---------------------------------------------------------------------------

/// The unparsed parts of `<path>[:<filter>[:<options>[:<keywords>]]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryText<'a> {
    pub path: &'a str,
    pub filter: Option<&'a str>,
    pub options: Option<&'a str>,
    pub keywords: Option<&'a str>,
}

impl<'a> EntryText<'a> {
    pub fn split(text: &'a str) -> Result<Self> {
        let segments: Vec<&str> = text.split(':').collect();
        if segments.len() > 4 || segments[0].trim().is_empty() {
            return Err(ChromError::InvalidPlotEntry(text.to_string()));
        }
        Ok(EntryText {
            path: segments[0].trim(),
            filter: segments.get(1).copied(),
            options: segments.get(2).copied(),
            keywords: segments.get(3).copied(),
        })
    }
}

/// Everything the rendering layer needs for one input file.
#[derive(Debug, Clone)]
pub struct PlotEntry {
    pub file: File,
    pub filter: Filter,
    pub options: Options,
    pub keywords: Keywords,
}

/// Role strings of one entry, validated before its file is read.
struct Selection {
    filter: Filter,
    options: Options,
    keywords: Keywords,
}

impl Selection {
    fn build(text: &EntryText<'_>, defaults: &Defaults) -> Result<Self> {
        let mut filter = defaults.filter()?;
        let mut options = defaults.options()?;
        let mut keywords = defaults.keywords()?;
        if let Some(s) = text.filter {
            filter.parse(s, true)?;
        }
        if let Some(s) = text.options {
            options.parse(s, true)?;
        }
        if let Some(s) = text.keywords {
            keywords.parse(s, true)?;
        }
        Ok(Selection {
            filter,
            options,
            keywords,
        })
    }

    fn with_file(self, file: File) -> PlotEntry {
        PlotEntry {
            file,
            filter: self.filter,
            options: self.options,
            keywords: self.keywords,
        }
    }
}

impl PlotEntry {
    /// Parse one entry string and read its file.
    ///
    /// Defaults are copied into each role first, then the entry's own
    /// segments overwrite them.
    pub fn parse(
        text: &str,
        defaults: &Defaults,
        format: Option<Format>,
        ids: &IdAllocator,
    ) -> Result<PlotEntry> {
        let parts = EntryText::split(text)?;
        let selection = Selection::build(&parts, defaults)?;
        let file = match format {
            Some(f) => File::parse_as(parts.path, f, ids)?,
            None => File::parse_with(parts.path, ids)?,
        };
        Ok(selection.with_file(file))
    }

    /// Parse many entry strings, reading their files concurrently.
    ///
    /// Invalid entry strings always fail; unreadable files follow `policy`.
    pub fn parse_all<S: AsRef<str>>(
        texts: &[S],
        defaults: &Defaults,
        format: Option<Format>,
        ids: &IdAllocator,
        policy: BatchPolicy,
    ) -> Result<Vec<PlotEntry>> {
        let mut paths = Vec::with_capacity(texts.len());
        let mut selections = Vec::with_capacity(texts.len());
        for text in texts {
            let parts = EntryText::split(text.as_ref())?;
            selections.push(Selection::build(&parts, defaults)?);
            paths.push(PathBuf::from(parts.path));
        }

        let entries = parse_many(&paths, format, ids)
            .into_iter()
            .zip(selections)
            .map(|(file, selection)| file.map(|f| selection.with_file(f)));
        let kept = policy.apply(entries.zip(&paths))?;
        Ok(kept.into_iter().map(|(entry, _)| entry).collect())
    }

    /// The selected traces, in parse order.
    pub fn traces(&self) -> Vec<&Trace> {
        self.filter.filter(&self.file)
    }

    /// Times and responses of `trace` with `shift` then `scale` applied.
    /// The trace itself is left untouched.
    pub fn series(&self, trace: &Trace) -> (Vec<f64>, Vec<f64>) {
        let (dx, dy) = self.options.shift().unwrap_or((0.0, 0.0));
        let (sx, sy) = self.options.scale().unwrap_or((1.0, 1.0));
        let times = trace.times.iter().map(|t| (t + dx) * sx).collect();
        let responses = trace.responses.iter().map(|r| (r + dy) * sy).collect();
        (times, responses)
    }

    /// Label for the entry: the `name` option, else the sample name.
    pub fn label(&self) -> Option<String> {
        self.options.name().or_else(|| self.file.name.clone())
    }

    /// Subplot `(row, col)`: the `axis` option, else one row per file.
    pub fn axis(&self) -> (usize, usize) {
        self.options
            .axis()
            .unwrap_or((self.file.file_id as usize, 0))
    }

    /// Value of the `colorby` attribute, looked up on the file, then the trace.
    pub fn color_key(&self, trace: &Trace) -> Option<Value> {
        let attr = self.options.colorby()?;
        let value = self
            .file
            .attribute(attr)
            .or_else(|| trace.attribute(attr));
        if value.is_none() {
            log::warn!("no attribute '{attr}' to colour by");
        }
        value
    }

    /// Anchor points for the `peaklabels` option: label `i` sits on the
    /// tallest peak among selected traces of event `i`.
    pub fn peak_labels(&self) -> Vec<(String, (f64, f64))> {
        let traces = self.traces();
        self.options
            .peak_labels()
            .into_iter()
            .enumerate()
            .map(|(i, label)| {
                let anchor = traces
                    .iter()
                    .filter(|t| t.event as usize == i)
                    .filter_map(|t| t.detect_peak())
                    .fold((0.0, 0.0), |best, peak| if peak.1 > best.1 { peak } else { best });
                (label, anchor)
            })
            .collect()
    }
}

/// Grid `(rows, cols)` large enough for every entry's axis.
pub fn required_axes(entries: &[PlotEntry]) -> (usize, usize) {
    entries
        .iter()
        .map(PlotEntry::axis)
        .fold((1, 1), |(rows, cols), (r, c)| (rows.max(r + 1), cols.max(c + 1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{IonMode, TraceMode};

    fn entry(options: &str) -> PlotEntry {
        let mk = |event: u32, responses: Vec<f64>, trace_id: u64| Trace {
            mode: TraceMode::Tic,
            ion_mode: IonMode::Positive,
            event,
            channel: 0,
            precursor: 0.0,
            product: 0.0,
            times: (0..responses.len()).map(|i| i as f64).collect(),
            responses,
            trace_id,
        };
        PlotEntry {
            file: File {
                path: PathBuf::from("/tmp/run.txt"),
                format: Format::Shimadzu,
                name: Some("Run 1".into()),
                id: None,
                file_id: 2,
                traces: vec![
                    mk(0, vec![1.0, 4.0, 2.0], 0),
                    mk(1, vec![3.0, 1.0, 0.0], 1),
                    mk(1, vec![0.0, 2.0, 9.0], 2),
                ],
            },
            filter: Filter::new(),
            options: options.parse().unwrap(),
            keywords: Keywords::new(),
        }
    }

    #[test]
    fn test_split_entry() {
        let parts = EntryText::split("run.txt:mode=tic::color=red").unwrap();
        assert_eq!(parts.path, "run.txt");
        assert_eq!(parts.filter, Some("mode=tic"));
        assert_eq!(parts.options, Some(""));
        assert_eq!(parts.keywords, Some("color=red"));

        let parts = EntryText::split("run.txt").unwrap();
        assert_eq!(parts.filter, None);

        assert!(matches!(
            EntryText::split("a:b:c:d:e"),
            Err(ChromError::InvalidPlotEntry(_))
        ));
        assert!(matches!(
            EntryText::split(":mode=tic"),
            Err(ChromError::InvalidPlotEntry(_))
        ));
    }

    #[test]
    fn test_series_shift_then_scale() {
        let e = entry("shift=(1,1),scale=(2,10)");
        let (x, y) = e.series(&e.file.traces[0]);
        assert_eq!(x, vec![2.0, 4.0, 6.0]);
        assert_eq!(y, vec![20.0, 50.0, 30.0]);
        assert_eq!(e.file.traces[0].responses, vec![1.0, 4.0, 2.0]);
    }

    #[test]
    fn test_label_axis_and_color_key() {
        let e = entry("colorby=event");
        assert_eq!(e.label().as_deref(), Some("Run 1"));
        assert_eq!(e.axis(), (2, 0));
        assert_eq!(e.color_key(&e.file.traces[1]), Some(Value::from(1i64)));

        let e = entry("name=custom,axis=(0,3),colorby=file_id");
        assert_eq!(e.label().as_deref(), Some("custom"));
        assert_eq!(e.axis(), (0, 3));
        assert_eq!(e.color_key(&e.file.traces[1]), Some(Value::from(2i64)));
        assert_eq!(required_axes(&[entry(""), e]), (3, 4));
    }

    #[test]
    fn test_peak_labels_use_tallest_peak_per_event() {
        let e = entry("peaklabels=[a,b,c]");
        let labels = e.peak_labels();
        assert_eq!(labels[0], ("a".to_string(), (1.0, 4.0)));
        assert_eq!(labels[1], ("b".to_string(), (2.0, 9.0)));
        assert_eq!(labels[2], ("c".to_string(), (0.0, 0.0)));
    }

    #[test]
    fn test_skipped_entries_keep_selections_aligned() {
        let dir = tempfile::tempdir().unwrap();
        let text = "name,qc\nprecursor,195.1\nproduct,138\n0.1,10\n\nprecursor,195.1\nproduct,110\n0.1,5\n";
        let first = dir.path().join("first.csv");
        let last = dir.path().join("last.csv");
        std::fs::write(&first, text).unwrap();
        std::fs::write(&last, text).unwrap();
        let texts = vec![
            format!("{}:channel=0:name=first", first.display()),
            format!("{}:channel=1:name=missing", dir.path().join("missing.csv").display()),
            format!("{}:channel=1:name=last", last.display()),
        ];

        let entries = PlotEntry::parse_all(
            &texts,
            &Defaults::builtin(),
            None,
            &IdAllocator::new(),
            BatchPolicy::SkipInvalid,
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].label().as_deref(), Some("first"));
        assert_eq!(entries[0].traces()[0].product, 138.0);
        assert_eq!(entries[1].label().as_deref(), Some("last"));
        assert_eq!(entries[1].traces()[0].product, 110.0);
        assert_eq!(entries[1].file.file_id, 2);
    }
}
