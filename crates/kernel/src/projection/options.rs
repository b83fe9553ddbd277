//! Caller-requested option paths and the matching policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How an option path satisfies a property path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionMatching {
    /// The option equals the path or continues it after a `.`.
    #[default]
    Boundary,
    /// The option merely starts with the path, so option `"abc"` also
    /// satisfies path `"ab"`.
    Prefix,
}

impl OptionMatching {
    /// Whether `option` satisfies `path`.
    pub fn satisfies(self, option: &str, path: &str) -> bool {
        match self {
            OptionMatching::Prefix => option.starts_with(path),
            OptionMatching::Boundary => {
                option == path
                    || option
                        .strip_prefix(path)
                        .is_some_and(|rest| rest.starts_with('.'))
            }
        }
    }
}

impl FromStr for OptionMatching {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "boundary" => Ok(OptionMatching::Boundary),
            "prefix" => Ok(OptionMatching::Prefix),
            other => Err(format!("unknown option matching '{other}'")),
        }
    }
}

impl fmt::Display for OptionMatching {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionMatching::Boundary => f.write_str("boundary"),
            OptionMatching::Prefix => f.write_str("prefix"),
        }
    }
}

/// Exact dotted option strings supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet(Vec<String>);

impl OptionSet {
    pub fn new<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(options.into_iter().map(Into::into).collect())
    }

    /// Split a raw `options` parameter on commas. Segments are not trimmed;
    /// empty segments are dropped.
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Add the options of another raw parameter.
    pub fn extend_from(&mut self, raw: &str) {
        self.0.extend(Self::parse(raw).0);
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Whether any option satisfies `path` under `matching`.
    pub fn satisfies(&self, path: &str, matching: OptionMatching) -> bool {
        self.iter().any(|option| matching.satisfies(option, path))
    }
}
