//! Complex Paths
//!
//! A path that names either a plain file or an entry embedded in a container.

use std::fmt;
use std::fs;
use std::path::{Path, MAIN_SEPARATOR};
use std::str::FromStr;
use std::time::SystemTime;

use crate::error::{Result, StgError};

use super::parts::{is_separator, prefix_len};

/// Reserved separator between the physical and the embedded part.
/// Never valid inside a Windows file name.
pub const SEPARATOR: char = '>';

/// Split `path` into its physical part and optional embedded part.
///
/// The separator is only searched after the drive/share prefix. A second
/// separator makes the path malformed.
pub fn split(path: &str) -> Result<(String, Option<String>)> {
    let start = prefix_len(path);
    let Some(offset) = path[start..].find(SEPARATOR) else {
        return Ok((path.to_string(), None));
    };

    let pos = start + offset;
    let physical = &path[..pos];
    let embedded = &path[pos + SEPARATOR.len_utf8()..];

    if embedded.contains(SEPARATOR) {
        return Err(StgError::Malformed(format!(
            "more than one '{}' in {:?}",
            SEPARATOR, path
        )));
    }
    if physical.is_empty() {
        return Err(StgError::Malformed(format!("empty physical part in {:?}", path)));
    }

    Ok((physical.to_string(), Some(embedded.to_string())))
}

/// Join a physical path and an embedded path into the textual complex form
pub fn join(physical: &str, embedded: &str) -> Result<String> {
    if physical.is_empty() {
        return Err(StgError::Malformed("empty physical part".to_string()));
    }
    if physical.contains(SEPARATOR) || embedded.contains(SEPARATOR) {
        return Err(StgError::Malformed(format!(
            "'{}' is reserved: {:?} / {:?}",
            SEPARATOR, physical, embedded
        )));
    }
    Ok(format!("{}{}{}", physical, SEPARATOR, embedded))
}

/// Immutable path value: a physical filesystem path plus, for complex paths,
/// the path of an entry inside the container at that physical path.
///
/// Ordering is by physical part first, so all entries of one container are
/// adjacent in ordered maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComplexPath {
    physical: String,
    embedded: Option<String>,
}

impl ComplexPath {
    /// Parse the textual form, see [`split`]
    pub fn parse(text: &str) -> Result<Self> {
        let (physical, embedded) = split(text)?;
        Ok(Self { physical, embedded })
    }

    /// A plain path with no embedded part
    pub fn plain(physical: impl Into<String>) -> Result<Self> {
        let physical = physical.into();
        let start = prefix_len(&physical);
        if physical[start..].contains(SEPARATOR) {
            return Err(StgError::Malformed(format!(
                "'{}' in plain path {:?}",
                SEPARATOR, physical
            )));
        }
        Ok(Self { physical, embedded: None })
    }

    /// A complex path from its two parts
    pub fn new(physical: impl Into<String>, embedded: impl Into<String>) -> Result<Self> {
        let physical = physical.into();
        let embedded = embedded.into();
        join(&physical, &embedded)?;
        Ok(Self {
            physical,
            embedded: Some(embedded),
        })
    }

    pub fn physical(&self) -> &str {
        &self.physical
    }

    pub fn physical_path(&self) -> &Path {
        Path::new(&self.physical)
    }

    pub fn embedded(&self) -> Option<&str> {
        self.embedded.as_deref()
    }

    /// True if the path points inside a container
    pub fn is_complex(&self) -> bool {
        self.embedded.is_some()
    }

    /// Embedded part split on either slash, empty segments dropped.
    /// Empty for plain paths and for the container root.
    pub fn embedded_segments(&self) -> Vec<&str> {
        self.embedded
            .as_deref()
            .map(|e| e.split(is_separator).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Display form: platform separators on the physical side, `/` inside
    /// the container, and a spaced separator between them.
    pub fn format_pretty(&self) -> String {
        let physical: String = self
            .physical
            .chars()
            .map(|c| if is_separator(c) { MAIN_SEPARATOR } else { c })
            .collect();

        match &self.embedded {
            None => physical,
            Some(embedded) => {
                let embedded = embedded.replace('\\', "/");
                format!("{} {} {}", physical, SEPARATOR, embedded)
            }
        }
    }

    /// True if `self` equals `prefix` or lies below it.
    ///
    /// Compares the canonical text form; the match must end on a path
    /// component boundary, so `a.stg` is not a prefix of `a.stg2>x`.
    pub fn starts_with(&self, prefix: &ComplexPath) -> bool {
        let text = self.to_string();
        let prefix = prefix.to_string();
        let Some(rest) = text.strip_prefix(&prefix) else {
            return false;
        };
        rest.is_empty()
            || prefix.ends_with(|c: char| is_separator(c) || c == SEPARATOR)
            || rest.starts_with(|c: char| is_separator(c) || c == SEPARATOR)
    }

    /// Modify time of the physical file (the container for complex paths)
    pub fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.physical).and_then(|m| m.modified()).ok()
    }
}

impl fmt::Display for ComplexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.embedded {
            None => f.write_str(&self.physical),
            Some(embedded) => write!(f, "{}{}{}", self.physical, SEPARATOR, embedded),
        }
    }
}

impl FromStr for ComplexPath {
    type Err = StgError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
