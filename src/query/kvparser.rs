use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::LazyLock;

use regex::Regex;

use crate::data::model::{Scalar, Value};
use crate::error::{ChromError, Result, Role};

/// Lowercase key → typed value.
pub type AttributeMap = BTreeMap<String, Value>;

/// A comma only separates pairs when the next pair's `key=` follows it.
static PAIR_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\w+\s*=").unwrap());

// ---------------------------------------------------------------------------
// Key rules – which keys a role accepts
// ---------------------------------------------------------------------------

/// The role a parser plays and the keys it accepts.
pub trait KeyRule {
    const ROLE: Role;

    fn is_valid_key(key: &str) -> bool;
}

// ---------------------------------------------------------------------------
// KeyValueParser
// ---------------------------------------------------------------------------

/// Typed attributes parsed from `key=value,key=[a,b]` strings and defaults.
///
/// Keys can be added or overwritten but never removed. Every key is checked
/// against the role's [`KeyRule`] before anything is stored, so a rejected
/// string or map leaves the attributes untouched.
pub struct KeyValueParser<K> {
    values: AttributeMap,
    rule: PhantomData<K>,
}

impl<K: KeyRule> KeyValueParser<K> {
    /// An empty attribute set.
    pub fn new() -> Self {
        Self {
            values: AttributeMap::new(),
            rule: PhantomData,
        }
    }

    /// Parse `text` (when given), then fill in `defaults` for keys it did not set.
    pub fn with_defaults(text: Option<&str>, defaults: &AttributeMap) -> Result<Self> {
        let mut parser = Self::new();
        if let Some(text) = text {
            parser.parse(text, true)?;
        }
        parser.update(defaults, false)?;
        Ok(parser)
    }

    /// Parse a `key=value` list. With `overwrite == false` existing keys are kept.
    pub fn parse(&mut self, text: &str, overwrite: bool) -> Result<()> {
        let pairs = tokenize(text)?;
        self.check_keys(pairs.iter().map(|(k, _)| k.as_str()))?;
        for (key, value) in pairs {
            self.store(key, value, overwrite);
        }
        Ok(())
    }

    /// Merge an already typed map. Keys are lowercased.
    pub fn update(&mut self, map: &AttributeMap, overwrite: bool) -> Result<()> {
        let pairs: Vec<(String, &Value)> = map.iter().map(|(k, v)| (k.to_lowercase(), v)).collect();
        self.check_keys(pairs.iter().map(|(k, _)| k.as_str()))?;
        for (key, value) in pairs {
            self.store(key, value.clone(), overwrite);
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Single scalar stored under `key`.
    pub fn scalar(&self, key: &str) -> Option<&Scalar> {
        self.get(key).and_then(Value::as_scalar)
    }

    pub fn values(&self) -> &AttributeMap {
        &self.values
    }

    pub fn into_values(self) -> AttributeMap {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn check_keys<'k>(&self, mut keys: impl Iterator<Item = &'k str>) -> Result<()> {
        match keys.find(|k| !K::is_valid_key(k)) {
            Some(key) => Err(ChromError::InvalidKey {
                key: key.to_string(),
                role: K::ROLE,
            }),
            None => Ok(()),
        }
    }

    fn store(&mut self, key: String, value: Value, overwrite: bool) {
        if overwrite || !self.values.contains_key(&key) {
            self.values.insert(key, value);
        }
    }
}

impl<K: KeyRule> Default for KeyValueParser<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for KeyValueParser<K> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            rule: PhantomData,
        }
    }
}

impl<K: KeyRule> fmt::Debug for KeyValueParser<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(&K::ROLE.to_string())
            .field("values", &self.values)
            .finish()
    }
}

impl<K: KeyRule> std::str::FromStr for KeyValueParser<K> {
    type Err = ChromError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parser = Self::new();
        parser.parse(s, true)?;
        Ok(parser)
    }
}

// ---------------------------------------------------------------------------
// Tokenizing and coercion
// ---------------------------------------------------------------------------

/// Split a `key=value` list into lowercase keys and coerced values, in order.
///
/// The input is lowercased and trimmed. Commas inside list literals such as
/// `c=[x,y]` or `axis=(1,0)` do not split pairs.
pub fn tokenize(text: &str) -> Result<Vec<(String, Value)>> {
    let text = text.trim().to_lowercase();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let mut pairs = Vec::new();
    let mut start = 0;
    for (i, _) in text.match_indices(',') {
        if PAIR_START.is_match(&text[i + 1..]) {
            pairs.push(split_pair(&text[start..i])?);
            start = i + 1;
        }
    }
    pairs.push(split_pair(&text[start..])?);
    Ok(pairs)
}

fn split_pair(token: &str) -> Result<(String, Value)> {
    let (key, raw) = token
        .split_once('=')
        .ok_or_else(|| ChromError::MalformedPair(token.trim().to_string()))?;
    Ok((key.trim().to_string(), parse_value(raw)))
}

/// Coerce a raw value: strip one pair of surrounding `[]` or `()`, split on
/// commas, coerce each piece. One piece gives a bare scalar.
pub fn parse_value(raw: &str) -> Value {
    let raw = raw.trim();
    let inner = [('[', ']'), ('(', ')')]
        .iter()
        .find_map(|(open, close)| raw.strip_prefix(*open)?.strip_suffix(*close))
        .unwrap_or(raw);
    Value::from_scalars(inner.split(',').map(Scalar::parse).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Anything;

    impl KeyRule for Anything {
        const ROLE: Role = Role::Options;

        fn is_valid_key(_key: &str) -> bool {
            true
        }
    }

    #[derive(Debug)]
    struct OnlyAB;

    impl KeyRule for OnlyAB {
        const ROLE: Role = Role::Keywords;

        fn is_valid_key(key: &str) -> bool {
            key == "a" || key == "b"
        }
    }

    #[test]
    fn test_parse_typed_values() {
        let p: KeyValueParser<Anything> = "a=1,b=2.5,c=[x,y,z]".parse().unwrap();
        assert_eq!(p.get("a"), Some(&Value::from(1i64)));
        assert_eq!(p.get("b"), Some(&Value::from(2.5)));
        assert_eq!(
            p.get("c"),
            Some(&Value::Many(vec!["x".into(), "y".into(), "z".into()]))
        );
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn test_parse_lowercases_and_trims() {
        let p: KeyValueParser<Anything> = "  Name = Sample A , Flag=TRUE ".parse().unwrap();
        assert_eq!(p.get("name"), Some(&Value::from("sample a")));
        assert_eq!(p.get("flag"), Some(&Value::from(true)));
    }

    #[test]
    fn test_parenthesised_list_is_a_sequence() {
        let p: KeyValueParser<Anything> = "axis=(1,0),scale=2".parse().unwrap();
        assert_eq!(
            p.get("axis"),
            Some(&Value::Many(vec![Scalar::Integer(1), Scalar::Integer(0)]))
        );
        assert_eq!(p.get("scale"), Some(&Value::from(2i64)));
    }

    #[test]
    fn test_unbracketed_list_stays_with_its_key() {
        let p: KeyValueParser<Anything> = "event=1,2,3,mode=tic".parse().unwrap();
        assert_eq!(
            p.get("event"),
            Some(&Value::Many(vec![1i64.into(), 2i64.into(), 3i64.into()]))
        );
        assert_eq!(p.get("mode"), Some(&Value::from("tic")));
    }

    #[test]
    fn test_overwrite_flag() {
        let mut p: KeyValueParser<Anything> = "a=1".parse().unwrap();
        p.parse("a=2,b=3", false).unwrap();
        assert_eq!(p.get("a"), Some(&Value::from(1i64)));
        assert_eq!(p.get("b"), Some(&Value::from(3i64)));
        p.parse("a=4", true).unwrap();
        assert_eq!(p.get("a"), Some(&Value::from(4i64)));
    }

    #[test]
    fn test_defaults_do_not_override_parsed() {
        let mut defaults = AttributeMap::new();
        defaults.insert("a".into(), Value::from(9i64));
        defaults.insert("B".into(), Value::from("x"));
        let p = KeyValueParser::<OnlyAB>::with_defaults(Some("a=1"), &defaults).unwrap();
        assert_eq!(p.get("a"), Some(&Value::from(1i64)));
        assert_eq!(p.get("b"), Some(&Value::from("x")));
    }

    #[test]
    fn test_invalid_key_stores_nothing() {
        let mut p = KeyValueParser::<OnlyAB>::new();
        let err = p.parse("a=1,zz=2", true).unwrap_err();
        match err {
            ChromError::InvalidKey { key, role } => {
                assert_eq!(key, "zz");
                assert_eq!(role, Role::Keywords);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(p.is_empty());

        let mut map = AttributeMap::new();
        map.insert("c".into(), Value::from(1i64));
        assert!(p.update(&map, true).is_err());
        assert!(p.is_empty());
    }

    #[test]
    fn test_empty_and_malformed_input() {
        let p: KeyValueParser<Anything> = "   ".parse().unwrap();
        assert!(p.is_empty());
        assert!(matches!(
            "justtext".parse::<KeyValueParser<Anything>>(),
            Err(ChromError::MalformedPair(_))
        ));
    }

    #[test]
    fn test_parse_value_strips_one_bracket_pair() {
        assert_eq!(parse_value("[5]"), Value::from(5i64));
        assert_eq!(
            parse_value("[[a]]"),
            Value::One(Scalar::String("[a]".into()))
        );
        assert_eq!(parse_value("0.75"), Value::from(0.75));
    }
}
