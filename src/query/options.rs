use crate::data::model::{Scalar, Value};
use crate::error::Role;

use super::kvparser::{AttributeMap, KeyRule, KeyValueParser};

// ---------------------------------------------------------------------------
// Options – per-entry presentation settings
// ---------------------------------------------------------------------------

/// Accepted option keys:
/// * `axis` – `(row, col)` subplot position
/// * `colorby` – attribute used to pick trace colours
/// * `scale` – `(x, y)` multipliers, or one value for both
/// * `shift` – `(x, y)` offsets, or one value for both
/// * `name` – label replacing the sample name
/// * `peaklabels` – labels for peaks, one per event
pub const OPTION_KEYS: &[&str] = &["axis", "colorby", "scale", "shift", "name", "peaklabels"];

#[derive(Debug, Clone, Copy, Default)]
pub struct OptionKeys;

impl KeyRule for OptionKeys {
    const ROLE: Role = Role::Options;

    fn is_valid_key(key: &str) -> bool {
        OPTION_KEYS.contains(&key)
    }
}

pub type Options = KeyValueParser<OptionKeys>;

impl Options {
    /// Built-in defaults: colour by channel.
    pub fn builtin_defaults() -> AttributeMap {
        AttributeMap::from([("colorby".to_string(), Value::from("channel"))])
    }

    /// Subplot position, when both coordinates are non-negative integers.
    pub fn axis(&self) -> Option<(usize, usize)> {
        match self.get("axis")?.as_slice() {
            [row, col] => Some((to_index(row)?, to_index(col)?)),
            _ => None,
        }
    }

    pub fn colorby(&self) -> Option<&str> {
        self.scalar("colorby").and_then(Scalar::as_str)
    }

    pub fn scale(&self) -> Option<(f64, f64)> {
        self.get("scale").and_then(pair)
    }

    pub fn shift(&self) -> Option<(f64, f64)> {
        self.get("shift").and_then(pair)
    }

    /// Display label; lists are joined back with commas.
    pub fn name(&self) -> Option<String> {
        self.get("name").map(|v| match v {
            Value::One(s) => s.to_string(),
            Value::Many(items) => items
                .iter()
                .map(Scalar::to_string)
                .collect::<Vec<_>>()
                .join(","),
        })
    }

    pub fn peak_labels(&self) -> Vec<String> {
        self.get("peaklabels")
            .map(|v| v.as_slice().iter().map(Scalar::to_string).collect())
            .unwrap_or_default()
    }
}

fn to_index(s: &Scalar) -> Option<usize> {
    s.as_i64().and_then(|i| usize::try_from(i).ok())
}

/// `(x, y)` from a two-element list, or one number used for both.
fn pair(v: &Value) -> Option<(f64, f64)> {
    match v.as_slice() {
        [both] => both.as_f64().map(|b| (b, b)),
        [x, y] => Some((x.as_f64()?, y.as_f64()?)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Keywords – line style forwarded to the renderer
// ---------------------------------------------------------------------------

pub const KEYWORD_KEYS: &[&str] = &[
    "color",
    "linewidth",
    "linestyle",
    "alpha",
    "marker",
    "markersize",
    "label",
    "zorder",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordKeys;

impl KeyRule for KeywordKeys {
    const ROLE: Role = Role::Keywords;

    fn is_valid_key(key: &str) -> bool {
        KEYWORD_KEYS.contains(&key)
    }
}

pub type Keywords = KeyValueParser<KeywordKeys>;

impl Keywords {
    /// Built-in defaults: thin lines.
    pub fn builtin_defaults() -> AttributeMap {
        AttributeMap::from([("linewidth".to_string(), Value::from(0.75))])
    }

    /// Explicit colour, overriding the colour map.
    pub fn color(&self) -> Option<String> {
        self.scalar("color").map(Scalar::to_string)
    }
}
