use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ChromError;

// ---------------------------------------------------------------------------
// Scalar – a single typed attribute value
// ---------------------------------------------------------------------------

/// A dynamically-typed scalar, produced by key=value coercion or read from a
/// parsed record. Used as a `BTreeMap` key for colour mapping, so it is `Ord`.
///
/// Equality, ordering and hashing all follow [`Ord`]: floats compare by
/// `total_cmp`, so `NaN` equals itself and `-0.0` differs from `0.0`. Use
/// [`Scalar::matches`] for filter-style comparison.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Integer(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl Scalar {
    /// Coerce a raw token: integer, then float (only when it contains a
    /// decimal point), then `true`/`false`, otherwise the trimmed text.
    /// Never fails.
    pub fn parse(raw: &str) -> Scalar {
        let s = raw.trim();
        if let Ok(i) = s.parse::<i64>() {
            return Scalar::Integer(i);
        }
        if s.contains('.') {
            if let Ok(f) = s.parse::<f64>() {
                return Scalar::Float(f);
            }
        }
        if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false") {
            return Scalar::Bool(s.eq_ignore_ascii_case("true"));
        }
        Scalar::String(s.to_string())
    }

    /// Numeric view used for cross-type comparison and colour indexing.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Float(v) => Some(*v),
            Scalar::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    /// Loose equality: numbers by value across integer/float, strings
    /// ignoring case, booleans exactly.
    pub fn matches(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::String(a), Scalar::String(b)) => a.to_lowercase() == b.to_lowercase(),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for Scalar {}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scalar {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Scalar::*;
        fn discriminant(v: &Scalar) -> u8 {
            match v {
                Bool(_) => 0,
                Integer(_) => 1,
                Float(_) => 2,
                String(_) => 3,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Scalar {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Scalar::String(s) => s.hash(state),
            Scalar::Integer(i) => i.hash(state),
            Scalar::Float(f) => f.to_bits().hash(state),
            Scalar::Bool(b) => b.hash(state),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => write!(f, "{s}"),
            Scalar::Integer(i) => write!(f, "{i}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Integer(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::String(v.to_string())
    }
}

// ---------------------------------------------------------------------------
// Value – a scalar or an ordered sequence of scalars
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum Value {
    One(Scalar),
    Many(Vec<Scalar>),
}

impl Value {
    /// Collapse a single scalar to a bare value; keep several as a sequence.
    pub fn from_scalars(mut scalars: Vec<Scalar>) -> Value {
        if scalars.len() == 1 {
            Value::One(scalars.remove(0))
        } else {
            Value::Many(scalars)
        }
    }

    /// The value viewed as a sequence (a bare scalar is a one-element slice).
    pub fn as_slice(&self) -> &[Scalar] {
        match self {
            Value::One(s) => std::slice::from_ref(s),
            Value::Many(v) => v,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::One(s) => Some(s),
            Value::Many(_) => None,
        }
    }

    /// "Is-or-in-either" membership of an actual value against a filter value:
    /// scalar equality, the actual scalar inside the filter sequence, the
    /// filter scalar inside the actual sequence, or any shared element.
    pub fn is_or_in_either(&self, allowed: &Value) -> bool {
        match (self, allowed) {
            (Value::One(a), Value::One(f)) => a.matches(f),
            (Value::One(a), Value::Many(fs)) => fs.iter().any(|f| a.matches(f)),
            (Value::Many(xs), Value::One(f)) => xs.iter().any(|a| a.matches(f)),
            (Value::Many(xs), Value::Many(fs)) => {
                xs.iter().any(|a| fs.iter().any(|f| a.matches(f)))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::One(s) => write!(f, "{s}"),
            Value::Many(v) => {
                write!(f, "[")?;
                for (i, s) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{s}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<Scalar> for Value {
    fn from(v: Scalar) -> Self {
        Value::One(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::One(Scalar::Integer(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::One(Scalar::Float(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::One(Scalar::Bool(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::One(Scalar::from(v))
    }
}

// ---------------------------------------------------------------------------
// Attribute lookup by name
// ---------------------------------------------------------------------------

/// Named attribute access used by filtering and colour selection.
pub trait Attributes {
    /// The typed value of attribute `name`, or `None` when the record has no
    /// such attribute (or it is unset).
    fn attribute(&self, name: &str) -> Option<Value>;
}


// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Vendor export layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Shimadzu,
    Thermo,
    Waters,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Shimadzu, Format::Thermo, Format::Waters];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Shimadzu => "shimadzu",
            Format::Thermo => "thermo",
            Format::Waters => "waters",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = ChromError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Format::ALL
            .into_iter()
            .find(|f| f.as_str() == name)
            .ok_or(ChromError::UnsupportedFormat(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceMode {
    /// Total ion chromatogram.
    #[default]
    Tic,
    /// Multiple reaction monitoring transition.
    Mrm,
}

impl TraceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceMode::Tic => "tic",
            TraceMode::Mrm => "mrm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IonMode {
    #[default]
    Positive,
    Negative,
}

impl IonMode {
    /// Polarity from the sign character used in vendor headers.
    pub fn from_sign(c: char) -> Option<IonMode> {
        match c {
            '+' => Some(IonMode::Positive),
            '-' => Some(IonMode::Negative),
            _ => None,
        }
    }

    /// Polarity from its name or sign, ignoring case.
    pub fn from_name(s: &str) -> Option<IonMode> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" | "+" => Some(IonMode::Positive),
            "negative" | "-" => Some(IonMode::Negative),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IonMode::Positive => "positive",
            IonMode::Negative => "negative",
        }
    }
}

// ---------------------------------------------------------------------------
// Trace – one chromatogram within a file
// ---------------------------------------------------------------------------

/// A single chromatogram trace.
#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    pub mode: TraceMode,
    pub ion_mode: IonMode,
    /// Acquisition segment index.
    pub event: u32,
    /// Ordinal among traces of the same file sharing the same precursor.
    pub channel: u32,
    /// Precursor m/z, `0.0` for TIC.
    pub precursor: f64,
    /// Product m/z, `0.0` for TIC.
    pub product: f64,
    /// Retention times (x).
    pub times: Vec<f64>,
    /// Detector responses (y) – same length as `times`.
    pub responses: Vec<f64>,
    pub trace_id: u64,
}

impl Trace {
    /// Number of points.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether the trace holds no points.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// The `(time, response)` point of maximum response. The first maximum
    /// wins on ties; `None` for an empty trace.
    pub fn detect_peak(&self) -> Option<(f64, f64)> {
        let mut best: Option<usize> = None;
        for (i, r) in self.responses.iter().enumerate() {
            if r.is_nan() {
                continue;
            }
            if best.map_or(true, |b| *r > self.responses[b]) {
                best = Some(i);
            }
        }
        best.map(|i| (self.times[i], self.responses[i]))
    }
}

impl Attributes for Trace {
    fn attribute(&self, name: &str) -> Option<Value> {
        let v = match name {
            "mode" => Value::from(self.mode.as_str()),
            "ion_mode" => Value::from(self.ion_mode.as_str()),
            "event" => Value::from(self.event as i64),
            "channel" => Value::from(self.channel as i64),
            "precursor" => Value::from(self.precursor),
            "product" => Value::from(self.product),
            "trace_id" => Value::from(self.trace_id as i64),
            _ => return None,
        };
        Some(v)
    }
}

// ---------------------------------------------------------------------------
// File – one parsed instrument export
// ---------------------------------------------------------------------------

/// A parsed chromatography run with its traces in source order.
#[derive(Debug, Clone, Serialize)]
pub struct File {
    /// Absolute path of the export.
    pub path: PathBuf,
    pub format: Format,
    /// Sample name.
    pub name: Option<String>,
    /// Sample id.
    pub id: Option<String>,
    pub file_id: u64,
    pub traces: Vec<Trace>,
}

impl File {
    /// Number of traces.
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Whether the file holds no traces.
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
}

impl Attributes for File {
    fn attribute(&self, name: &str) -> Option<Value> {
        let v = match name {
            "path" => Value::from(self.path.to_string_lossy().as_ref()),
            "format" => Value::from(self.format.as_str()),
            "name" => Value::One(Scalar::parse(self.name.as_deref()?)),
            "id" => Value::One(Scalar::parse(self.id.as_deref()?)),
            "file_id" => Value::from(self.file_id as i64),
            _ => return None,
        };
        Some(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(responses: Vec<f64>) -> Trace {
        Trace {
            mode: TraceMode::Tic,
            ion_mode: IonMode::Positive,
            event: 0,
            channel: 0,
            precursor: 0.0,
            product: 0.0,
            times: (0..responses.len()).map(|i| i as f64 * 0.5).collect(),
            responses,
            trace_id: 0,
        }
    }

    #[test]
    fn test_scalar_coercion() {
        assert_eq!(Scalar::parse("12"), Scalar::Integer(12));
        assert_eq!(Scalar::parse("-3"), Scalar::Integer(-3));
        assert_eq!(Scalar::parse("2.5"), Scalar::Float(2.5));
        assert_eq!(Scalar::parse("TRUE"), Scalar::Bool(true));
        assert_eq!(Scalar::parse("false"), Scalar::Bool(false));
        // no decimal point, not an integer: stays text
        assert_eq!(Scalar::parse("1e5"), Scalar::String("1e5".into()));
        assert_eq!(Scalar::parse("1.2.3"), Scalar::String("1.2.3".into()));
    }

    #[test]
    fn test_scalar_matches_across_numeric_types() {
        assert!(Scalar::Integer(500).matches(&Scalar::Float(500.0)));
        assert!(!Scalar::Integer(500).matches(&Scalar::Float(500.5)));
        assert!(Scalar::from("TIC").matches(&Scalar::from("tic")));
        assert!(!Scalar::from("1").matches(&Scalar::Integer(1)));
    }

    #[test]
    fn test_scalar_eq_agrees_with_ord_and_hash() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        fn hash(s: &Scalar) -> u64 {
            let mut h = DefaultHasher::new();
            s.hash(&mut h);
            h.finish()
        }

        let pairs = [
            (Scalar::Float(0.0), Scalar::Float(-0.0)),
            (Scalar::Float(f64::NAN), Scalar::Float(f64::NAN)),
            (Scalar::Float(1.5), Scalar::Float(1.5)),
            (Scalar::Integer(2), Scalar::Float(2.0)),
            (Scalar::from("a"), Scalar::from("a")),
        ];
        for (a, b) in &pairs {
            assert_eq!(a == b, a.cmp(b) == std::cmp::Ordering::Equal, "{a:?} vs {b:?}");
            if a == b {
                assert_eq!(hash(a), hash(b), "{a:?} vs {b:?}");
            }
        }
        assert_ne!(Scalar::Float(0.0), Scalar::Float(-0.0));
        assert_eq!(Scalar::Float(f64::NAN), Scalar::Float(f64::NAN));
        assert!(Scalar::Float(0.0).matches(&Scalar::Float(-0.0)));

        let set: std::collections::HashSet<Scalar> =
            [Scalar::Float(f64::NAN), Scalar::Float(f64::NAN)].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_is_or_in_either() {
        let one = Value::from(3i64);
        let many = Value::Many(vec![Scalar::Integer(1), Scalar::Integer(3)]);
        let other = Value::Many(vec![Scalar::Integer(7), Scalar::Integer(8)]);
        assert!(one.is_or_in_either(&Value::from(3i64)));
        assert!(one.is_or_in_either(&many));
        assert!(many.is_or_in_either(&one));
        assert!(many.is_or_in_either(&Value::Many(vec![Scalar::Integer(3)])));
        assert!(!one.is_or_in_either(&other));
        assert!(!many.is_or_in_either(&other));
    }

    #[test]
    fn test_detect_peak_first_maximum() {
        let t = trace(vec![1.0, 5.0, 3.0, 5.0, 2.0]);
        assert_eq!(t.detect_peak(), Some((0.5, 5.0)));
        assert_eq!(trace(vec![]).detect_peak(), None);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("Thermo".parse::<Format>().unwrap(), Format::Thermo);
        assert!(matches!(
            "agilent".parse::<Format>(),
            Err(ChromError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_trace_attributes() {
        let mut t = trace(vec![1.0]);
        t.mode = TraceMode::Mrm;
        t.precursor = 500.3;
        assert_eq!(t.attribute("mode"), Some(Value::from("mrm")));
        assert_eq!(t.attribute("precursor"), Some(Value::from(500.3)));
        assert_eq!(t.attribute("colour"), None);
    }
}
