use crate::error::Error;
use crate::internal::models::{ExtractedPayload, FixtureFile};
use crate::utils::snap_format::parse_snapshot_file;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::fs;

/// `<category>/<name>.test.js.snap`; the category keeps its inner separators.
static FIXTURE_PATH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<category>.+)/(?P<name>[^/]+)\.test\.js\.snap$").unwrap());

/// Type-name prefixes the snapshot serializer puts in front of containers.
const TYPE_PREFIXES: [&str; 2] = ["Object ", "Array "];

/// Derive the category of a fixture from its relative path, or `None` when the
/// path does not follow the fixture naming convention.
pub fn fixture_category(relative_path: &str) -> Option<&str> {
    FIXTURE_PATH_REGEX
        .captures(relative_path)
        .and_then(|caps| caps.name("category"))
        .map(|m| m.as_str())
}

/// Strip serializer type prefixes and collapse line breaks.
pub fn clean_serialized(raw: &str) -> String {
    let mut cleaned = raw.to_string();
    for prefix in TYPE_PREFIXES {
        cleaned = cleaned.replace(prefix, "");
    }
    cleaned.replace(['\r', '\n'], "")
}

/// Parse cleaned snapshot text, tolerating comments, trailing commas and
/// unquoted keys. Object keys keep their source order. Integers outside the
/// `i64` range load as (lossy) floats.
pub fn parse_lenient(cleaned: &str) -> Result<Value, json5::Error> {
    json5::from_str(&widen_large_integers(cleaned))
}

/// Append `.0` to bare integer literals that do not fit an `i64`, which the
/// lenient parser refuses. Strings and comments are left alone.
fn widen_large_integers(text: &str) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    let mut widened: Option<String> = None;
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !bytes[i..].starts_with(b"*/") {
                    i += 1;
                }
                i += 2;
            }
            b'0'..=b'9' => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let attached =
                    |c: &u8| c.is_ascii_alphanumeric() || matches!(*c, b'_' | b'$' | b'.');
                let standalone = !(start > 0 && attached(&bytes[start - 1]))
                    && !bytes.get(i).is_some_and(attached);
                if standalone && text[start..i].parse::<i64>().is_err() {
                    let out = widened.get_or_insert_with(|| String::with_capacity(text.len() + 2));
                    out.push_str(&text[copied..i]);
                    out.push_str(".0");
                    copied = i;
                }
            }
            _ => i += 1,
        }
    }

    match widened {
        Some(mut out) => {
            out.push_str(&text[copied..]);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(text),
    }
}

/// Outcome of extracting one fixture file.
#[derive(Debug, Default)]
pub struct FileExtraction {
    pub payloads: Vec<ExtractedPayload>,
    /// Entries (or the whole file) that could not be read; never fatal.
    pub failures: Vec<Error>,
}

/// Load a fixture and parse every entry in it. A bad entry is recorded in
/// `failures` and its siblings are still extracted.
#[tracing::instrument(skip(file), fields(file = %file.relative_path))]
pub fn extract_file(file: &FixtureFile, category: &str) -> FileExtraction {
    let mut out = FileExtraction::default();

    let text = match fs::read_to_string(&file.full_path) {
        Ok(text) => text,
        Err(e) => {
            out.failures
                .push(Error::extraction(&file.relative_path, "*", e));
            return out;
        }
    };

    let entries = match parse_snapshot_file(&text) {
        Ok(entries) => entries,
        Err(e) => {
            out.failures
                .push(Error::extraction(&file.relative_path, "*", e));
            return out;
        }
    };

    for entry in entries {
        match parse_lenient(&clean_serialized(&entry.raw)) {
            Ok(value) => out.payloads.push(ExtractedPayload {
                category: category.to_string(),
                snapshot_name: entry.name,
                source_file: file.relative_path.clone(),
                value,
            }),
            Err(e) => out
                .failures
                .push(Error::extraction(&file.relative_path, entry.name, e)),
        }
    }

    tracing::debug!(
        extracted = out.payloads.len(),
        failed = out.failures.len(),
        "extracted fixture"
    );
    out
}
