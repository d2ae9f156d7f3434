//! TOML configuration file holding defaults for every plot entry.
//!
//! ```toml
//! # chromtrace.toml
//! [filter]
//! mode = "mrm"
//!
//! [options]
//! colorby = "event"
//! scale = [1, 0.001]
//!
//! [keywords]
//! linewidth = 1.5
//! ```
//!
//! String values go through the same coercion as command-line `key=value`
//! strings, so `event = "[1,2]"` and `event = [1, 2]` are equivalent.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::data::model::{Scalar, Value};
use crate::query::kvparser::{parse_value, AttributeMap};
use crate::query::Defaults;

/// Root configuration structure for chromtrace.toml files.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Defaults for the trace filter.
    #[serde(default)]
    pub filter: toml::Table,

    /// Defaults for the presentation options.
    #[serde(default)]
    pub options: toml::Table,

    /// Defaults for the line-style keywords.
    #[serde(default)]
    pub keywords: toml::Table,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Built-in defaults overlaid with this file's sections. Keys are checked
    /// against each section's whitelist.
    pub fn defaults(&self) -> Result<Defaults> {
        let overlay = Defaults {
            filter: section("filter", &self.filter)?,
            options: section("options", &self.options)?,
            keywords: section("keywords", &self.keywords)?,
        };
        Defaults::builtin()
            .overlay(&overlay)
            .context("Invalid key in configuration")
    }
}

fn section(name: &str, table: &toml::Table) -> Result<AttributeMap> {
    table
        .iter()
        .map(|(key, v)| {
            let value = to_value(v).with_context(|| format!("[{name}] {key}"))?;
            Ok::<_, anyhow::Error>((key.to_lowercase(), value))
        })
        .collect()
}

fn to_value(v: &toml::Value) -> Result<Value> {
    match v {
        toml::Value::String(s) => Ok(parse_value(&s.to_lowercase())),
        toml::Value::Array(items) => {
            let scalars = items.iter().map(to_scalar).collect::<Result<Vec<_>>>()?;
            Ok(Value::Many(scalars))
        }
        other => to_scalar(other).map(Value::One),
    }
}

fn to_scalar(v: &toml::Value) -> Result<Scalar> {
    Ok(match v {
        toml::Value::Integer(i) => Scalar::Integer(*i),
        toml::Value::Float(f) => Scalar::Float(*f),
        toml::Value::Boolean(b) => Scalar::Bool(*b),
        toml::Value::String(s) => Scalar::parse(&s.to_lowercase()),
        toml::Value::Datetime(d) => Scalar::String(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => {
            bail!("nested arrays and tables are not supported")
        }
    })
}
