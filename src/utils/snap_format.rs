//! Reader for stored-snapshot files.
//!
//! A snapshot file is a sequence of assignments of the form
//!
//! ```text
//! exports[`renders correctly 1`] = `
//! Object {
//!   "text": "hi",
//! }
//! `;
//! ```
//!
//! Keys and values are backtick strings where `` ` ``, `\` and `${` are escaped
//! with a backslash. Nothing else in the file is evaluated.

use crate::internal::models::SnapshotEntry;
use anyhow::{Result, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

static EXPORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)exports\[`((?:[^`\\]|\\.)*)`\]\s*=\s*`((?:[^`\\]|\\.)*)`\s*;").unwrap()
});

static ESCAPE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\([`\\]|\$\{)").unwrap());

/// Parse the text of a snapshot file into its named entries, sorted by name.
///
/// A later assignment to the same name replaces the earlier one. Any line that
/// starts an assignment but cannot be read as one makes the whole file invalid.
pub fn parse_snapshot_file(text: &str) -> Result<Vec<SnapshotEntry>> {
    let mut entries = BTreeMap::new();
    let mut starts = HashSet::new();

    for caps in EXPORT_REGEX.captures_iter(text) {
        if let Some(whole) = caps.get(0) {
            starts.insert(whole.start());
        }
        entries.insert(unescape(&caps[1]), unescape(&caps[2]));
    }

    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.starts_with("exports[") && !starts.contains(&offset) {
            let lineno = text[..offset].matches('\n').count() + 1;
            bail!("unterminated or malformed snapshot assignment at line {lineno}");
        }
        offset += line.len();
    }

    Ok(entries
        .into_iter()
        .map(|(name, raw)| SnapshotEntry { name, raw })
        .collect())
}

fn unescape(s: &str) -> String {
    ESCAPE_REGEX.replace_all(s, "$1").into_owned()
}
