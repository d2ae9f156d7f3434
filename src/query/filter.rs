use std::borrow::Cow;

use crate::data::model::{Attributes, File, IonMode, Scalar, Trace, Value};
use crate::error::Role;

use super::kvparser::{KeyRule, KeyValueParser};

// ---------------------------------------------------------------------------
// Filter keys
// ---------------------------------------------------------------------------

/// Keys that constrain the whole file.
pub const FILE_KEYS: &[&str] = &["path", "name", "id", "file_id"];

/// Keys that constrain individual traces.
pub const TRACE_KEYS: &[&str] = &[
    "mode",
    "ion_mode",
    "event",
    "channel",
    "precursor",
    "product",
    "trace_id",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct FilterKeys;

impl KeyRule for FilterKeys {
    const ROLE: Role = Role::Filter;

    fn is_valid_key(key: &str) -> bool {
        FILE_KEYS.contains(&key) || TRACE_KEYS.contains(&key)
    }
}

/// Trace selection built from a `key=value` string such as
/// `mode=mrm,event=[1,2]`.
pub type Filter = KeyValueParser<FilterKeys>;

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

impl Filter {
    /// Whether every key from `keys` that this filter sets is satisfied by
    /// `record`. When `absent_passes` is false a record lacking one of those
    /// attributes fails.
    pub fn admits<A: Attributes + ?Sized>(&self, record: &A, keys: &[&str], absent_passes: bool) -> bool {
        self.values()
            .iter()
            .filter(|(key, _)| keys.contains(&key.as_str()))
            .all(|(key, allowed)| match record.attribute(key) {
                Some(actual) => actual.is_or_in_either(&canonical(key, allowed)),
                None => absent_passes,
            })
    }

    /// Whether the file-level keys accept `file`. An unset sample name or id
    /// never matches.
    pub fn admits_file(&self, file: &File) -> bool {
        self.admits(file, FILE_KEYS, false)
    }

    /// Whether the trace-level keys accept `trace`.
    pub fn admits_trace(&self, trace: &Trace) -> bool {
        self.admits(trace, TRACE_KEYS, true)
    }

    /// Traces of `file` passing the filter, in parse order.
    ///
    /// A file-level mismatch rejects every trace. An empty filter keeps all.
    pub fn filter<'a>(&self, file: &'a File) -> Vec<&'a Trace> {
        if !self.admits_file(file) {
            return Vec::new();
        }
        file.traces.iter().filter(|t| self.admits_trace(t)).collect()
    }
}

/// `ion_mode` also accepts the `+`/`-` signs used in vendor headers.
fn canonical<'a>(key: &str, allowed: &'a Value) -> Cow<'a, Value> {
    if key != "ion_mode" {
        return Cow::Borrowed(allowed);
    }
    let scalars = allowed
        .as_slice()
        .iter()
        .map(|s| match s.as_str().and_then(IonMode::from_name) {
            Some(mode) => Scalar::from(mode.as_str()),
            None => s.clone(),
        })
        .collect();
    Cow::Owned(Value::from_scalars(scalars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Format, IonMode, TraceMode};
    use crate::error::ChromError;
    use std::path::PathBuf;

    fn trace(trace_id: u64, mode: TraceMode, event: u32, precursor: f64) -> Trace {
        Trace {
            mode,
            ion_mode: IonMode::Positive,
            event,
            channel: 0,
            precursor,
            product: 0.0,
            times: vec![0.0, 1.0],
            responses: vec![1.0, 2.0],
            trace_id,
        }
    }

    fn file(traces: Vec<Trace>) -> File {
        File {
            path: PathBuf::from("/data/F1.txt"),
            format: Format::Shimadzu,
            name: Some("Caffeine".into()),
            id: Some("7".into()),
            file_id: 0,
            traces,
        }
    }

    fn ids(traces: &[&Trace]) -> Vec<u64> {
        traces.iter().map(|t| t.trace_id).collect()
    }

    fn mixed() -> File {
        file(vec![
            trace(0, TraceMode::Tic, 1, 0.0),
            trace(1, TraceMode::Mrm, 2, 195.1),
            trace(2, TraceMode::Tic, 3, 0.0),
            trace(3, TraceMode::Mrm, 3, 250.0),
            trace(4, TraceMode::Mrm, 4, 195.1),
        ])
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let f = mixed();
        let filter = Filter::new();
        assert_eq!(ids(&filter.filter(&f)), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_mode_filter_keeps_order() {
        let f = mixed();
        let filter: Filter = "mode=tic".parse().unwrap();
        assert_eq!(ids(&filter.filter(&f)), vec![0, 2]);
    }

    #[test]
    fn test_event_filter() {
        let f = mixed();
        let filter: Filter = "event=3".parse().unwrap();
        assert_eq!(ids(&filter.filter(&f)), vec![2, 3]);
        let filter: Filter = "event=[1,4]".parse().unwrap();
        assert_eq!(ids(&filter.filter(&f)), vec![0, 4]);
    }

    #[test]
    fn test_all_trace_keys_must_hold() {
        let f = mixed();
        let filter: Filter = "mode=mrm,precursor=195.1".parse().unwrap();
        assert_eq!(ids(&filter.filter(&f)), vec![1, 4]);
        let filter: Filter = "mode=mrm,event=3".parse().unwrap();
        assert_eq!(ids(&filter.filter(&f)), vec![3]);
    }

    #[test]
    fn test_integer_filter_matches_float_attribute() {
        let f = mixed();
        let filter: Filter = "precursor=250".parse().unwrap();
        assert_eq!(ids(&filter.filter(&f)), vec![3]);
    }

    #[test]
    fn test_file_mismatch_vetoes_everything() {
        let f = mixed();
        let filter: Filter = "path=/data/f2.txt,mode=tic".parse().unwrap();
        assert!(filter.filter(&f).is_empty());

        // paths are compared ignoring case, the parser lowercases its input
        let filter: Filter = "path=/data/f1.txt,mode=tic".parse().unwrap();
        assert_eq!(ids(&filter.filter(&f)), vec![0, 2]);
    }

    #[test]
    fn test_file_keys() {
        let f = mixed();
        let filter: Filter = "id=7".parse().unwrap();
        assert_eq!(filter.filter(&f).len(), 5);
        let filter: Filter = "name=[caffeine,theobromine]".parse().unwrap();
        assert_eq!(filter.filter(&f).len(), 5);
        let filter: Filter = "file_id=1".parse().unwrap();
        assert!(filter.filter(&f).is_empty());

        let mut unnamed = mixed();
        unnamed.name = None;
        let filter: Filter = "name=caffeine".parse().unwrap();
        assert!(filter.filter(&unnamed).is_empty());
    }

    #[test]
    fn test_ion_mode_accepts_signs() {
        let mut f = mixed();
        f.traces[1].ion_mode = IonMode::Negative;
        f.traces[3].ion_mode = IonMode::Negative;

        let filter: Filter = "ion_mode=-".parse().unwrap();
        assert_eq!(ids(&filter.filter(&f)), vec![1, 3]);
        let filter: Filter = "ion_mode=negative".parse().unwrap();
        assert_eq!(ids(&filter.filter(&f)), vec![1, 3]);
        let filter: Filter = "ion_mode=+".parse().unwrap();
        assert_eq!(ids(&filter.filter(&f)), vec![0, 2, 4]);
        let filter: Filter = "ion_mode=[+,-]".parse().unwrap();
        assert_eq!(filter.filter(&f).len(), 5);
        let filter: Filter = "ion_mode=neutral".parse().unwrap();
        assert!(filter.filter(&f).is_empty());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = "mode=tic,colour=red".parse::<Filter>().unwrap_err();
        match err {
            ChromError::InvalidKey { key, role } => {
                assert_eq!(key, "colour");
                assert_eq!(role, Role::Filter);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
