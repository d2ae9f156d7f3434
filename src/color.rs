use std::collections::{BTreeMap, BTreeSet};

use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::{Scalar, Value};
use crate::plot::PlotEntry;

/// Number of colours integer keys cycle through.
pub const CYCLE_LEN: usize = 10;

/// Colour for traces without a key.
pub const DEFAULT_COLOR: Srgb<u8> = Srgb::new(128, 128, 128);

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Srgb<u8>> {
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            rgb.into_format::<u8>()
        })
        .collect()
}

/// `#rrggbb` form of a colour.
pub fn to_hex(c: Srgb<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", c.red, c.green, c.blue)
}

// ---------------------------------------------------------------------------
// Color mapping: attribute value → colour
// ---------------------------------------------------------------------------

/// Maps values of the `colorby` attribute to colours.
///
/// Integer values pick from a fixed cycle, so channel 2 gets the same colour
/// in every file. Any other value is ranked among the distinct non-integer
/// values seen and gets its own evenly spaced hue.
#[derive(Debug, Clone)]
pub struct ColorMap {
    pub attribute: String,
    cycle: Vec<Srgb<u8>>,
    mapping: BTreeMap<Value, Srgb<u8>>,
    default_color: Srgb<u8>,
}

impl ColorMap {
    /// Build a colour map for `attribute` from its distinct values.
    pub fn new(attribute: &str, keys: &BTreeSet<Value>) -> Self {
        let ranked: Vec<&Value> = keys.iter().filter(|k| integer_key(k).is_none()).collect();
        let palette = generate_palette(ranked.len());
        let mapping = ranked.into_iter().cloned().zip(palette).collect();

        ColorMap {
            attribute: attribute.to_string(),
            cycle: generate_palette(CYCLE_LEN),
            mapping,
            default_color: DEFAULT_COLOR,
        }
    }

    /// Colour map over the selected traces of `entry`, or `None` when the
    /// entry has no `colorby` option.
    pub fn for_entry(entry: &PlotEntry) -> Option<Self> {
        let attribute = entry.options.colorby()?;
        let keys: BTreeSet<Value> = entry
            .traces()
            .into_iter()
            .filter_map(|t| entry.color_key(t))
            .collect();
        Some(ColorMap::new(attribute, &keys))
    }

    /// Look up the colour for a given attribute value.
    pub fn color_for(&self, key: &Value) -> Srgb<u8> {
        match integer_key(key) {
            Some(i) => self.cycle[i.rem_euclid(CYCLE_LEN as i64) as usize],
            None => self.mapping.get(key).copied().unwrap_or(self.default_color),
        }
    }

    /// Colour for an optional key; missing keys get the default grey.
    pub fn color_or_default(&self, key: Option<&Value>) -> Srgb<u8> {
        key.map_or(self.default_color, |k| self.color_for(k))
    }

    /// Legend entries (value label → colour) for the non-integer values.
    pub fn legend_entries(&self) -> Vec<(String, Srgb<u8>)> {
        self.mapping.iter().map(|(v, c)| (v.to_string(), *c)).collect()
    }
}

fn integer_key(v: &Value) -> Option<i64> {
    match v {
        Value::One(Scalar::Integer(i)) => Some(*i),
        _ => None,
    }
}
