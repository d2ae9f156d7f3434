/// Query layer: key=value attribute sets and trace selection.
///
/// ```text
///   "mode=mrm,event=[1,2]"
///        │
///        ▼
///   ┌──────────┐
///   │ kvparser  │  tokenize + coerce → AttributeMap (role whitelist)
///   └──────────┘
///        │
///        ├──────────────┬───────────────┐
///        ▼              ▼               ▼
///   ┌────────┐    ┌─────────┐    ┌──────────┐
///   │ Filter  │    │ Options  │    │ Keywords  │
///   └────────┘    └─────────┘    └──────────┘
///        │
///        ▼
///   File → Vec<&Trace>
/// ```

pub mod filter;
pub mod kvparser;
pub mod options;

pub use filter::Filter;
pub use kvparser::{AttributeMap, KeyRule, KeyValueParser};
pub use options::{Keywords, Options};

use crate::error::Result;

/// Role-scoped defaults applied before any per-entry string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Defaults {
    pub filter: AttributeMap,
    pub options: AttributeMap,
    pub keywords: AttributeMap,
}

impl Defaults {
    /// The defaults used when nothing else is configured.
    pub fn builtin() -> Self {
        Self {
            filter: AttributeMap::new(),
            options: Options::builtin_defaults(),
            keywords: Keywords::builtin_defaults(),
        }
    }

    /// Layer `other` on top of `self`, validating every key for its role.
    pub fn overlay(&self, other: &Defaults) -> Result<Defaults> {
        Ok(Defaults {
            filter: layer::<filter::FilterKeys>(&self.filter, &other.filter, None)?,
            options: layer::<options::OptionKeys>(&self.options, &other.options, None)?,
            keywords: layer::<options::KeywordKeys>(&self.keywords, &other.keywords, None)?,
        })
    }

    /// Layer `key=value` strings that apply to every entry on top of `self`.
    pub fn with_strings(
        &self,
        filter: Option<&str>,
        options: Option<&str>,
        keywords: Option<&str>,
    ) -> Result<Defaults> {
        let empty = AttributeMap::new();
        Ok(Defaults {
            filter: layer::<filter::FilterKeys>(&self.filter, &empty, filter)?,
            options: layer::<options::OptionKeys>(&self.options, &empty, options)?,
            keywords: layer::<options::KeywordKeys>(&self.keywords, &empty, keywords)?,
        })
    }

    pub fn filter(&self) -> Result<Filter> {
        Filter::with_defaults(None, &self.filter)
    }

    pub fn options(&self) -> Result<Options> {
        Options::with_defaults(None, &self.options)
    }

    pub fn keywords(&self) -> Result<Keywords> {
        Keywords::with_defaults(None, &self.keywords)
    }
}

fn layer<K: KeyRule>(base: &AttributeMap, over: &AttributeMap, text: Option<&str>) -> Result<AttributeMap> {
    let mut parser = KeyValueParser::<K>::new();
    parser.update(base, true)?;
    parser.update(over, true)?;
    if let Some(text) = text {
        parser.parse(text, true)?;
    }
    Ok(parser.into_values())
}
