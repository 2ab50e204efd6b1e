//! A canonical, type-safe representation of a dotted path into story state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path(pub Vec<String>);

impl Path {
    /// Parses `a.b.c`. Empty paths and empty segments are rejected.
    ///
    /// ```rust
    /// use firelight::runtime::path::Path;
    /// let p = Path::parse("properties.turkey-tail").unwrap();
    /// assert_eq!(p.segments(), ["properties", "turkey-tail"]);
    /// assert!(Path::parse("a..b").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Path, ErrorKind> {
        let text = text.trim();
        let segments: Vec<String> = text.split('.').map(|s| s.trim().to_string()).collect();
        if text.is_empty() || segments.iter().any(|s| s.is_empty() || s.contains(char::is_whitespace)) {
            return Err(ErrorKind::InvalidPath {
                path: text.to_string(),
            });
        }
        Ok(Path(segments))
    }

    pub fn single(name: impl Into<String>) -> Path {
        Path(vec![name.into()])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// First segment; paths are never empty once parsed.
    pub fn head(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or("")
    }

    pub fn rest(&self) -> &[String] {
        self.0.get(1..).unwrap_or(&[])
    }

    /// Node-local names start with `_`. Names that also end with `_` are
    /// system variables and live in the global store.
    pub fn is_local(&self) -> bool {
        let head = self.head();
        head.len() > 1 && head.starts_with('_') && !head.ends_with('_')
    }

    /// Dotted rendering of the first `n` segments, for diagnostics.
    pub fn prefix(&self, n: usize) -> String {
        self.0[..n.min(self.0.len())].join(".")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}
