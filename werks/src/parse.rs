//! Parsing of werk files.
//!
//! Markdown werks look like this:
//!
//! ```text
//! [//]: # (werk v2)
//! # Title of the werk
//!
//! key | value
//! --- | ---
//! date | 2024-01-11T09:03:10+00:00
//! level | 1
//!
//! Free text description.
//! ```
//!
//! Legacy werks have a bare numeric file name, `Key: value` header lines, a
//! blank line and the description. They are converted to markdown metadata
//! while parsing, so callers only ever see one shape.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WerkError};

pub const WERK_V2_MARKER: &str = "[//]: # (werk v2)";

const TABLE_HEADER: &str = "key | value";
const TABLE_SEPARATOR: &str = "--- | ---";

/// Metadata keys of legacy werks that have no markdown counterpart
const DROPPED_V1_KEYS: [&str; 2] = ["knowledge", "state"];

/// Unvalidated content of a werk file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WerkParseResult {
    /// All metadata, including `id` (from the file name) and `title`
    pub metadata: BTreeMap<String, String>,
    pub description: String,
}

impl WerkParseResult {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn title(&self) -> &str {
        self.get("title").unwrap_or_default()
    }
}

/// Parse a werk file, dispatching on its file name.
pub fn parse_werk(file_content: &str, file_name: &str) -> Result<WerkParseResult> {
    if let Some(id) = file_name.strip_suffix(".md") {
        parse_markdown_werk(file_content, id, file_name)
    } else if is_werk_id(file_name) {
        parse_v1_werk(file_content, file_name)
    } else {
        Err(WerkError::parse(
            file_name,
            "werk files are named <id>.md or <id>",
        ))
    }
}

/// Whether a directory entry name is a werk file name
pub fn werk_id_from_file_name(file_name: &str) -> Option<u32> {
    let id = file_name.strip_suffix(".md").unwrap_or(file_name);
    if is_werk_id(id) {
        id.parse().ok()
    } else {
        None
    }
}

fn is_werk_id(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit())
}

fn parse_markdown_werk(content: &str, id: &str, file_name: &str) -> Result<WerkParseResult> {
    if !is_werk_id(id) {
        return Err(WerkError::parse(file_name, "file name is not a werk id"));
    }

    let mut sections = content.splitn(3, "\n\n");
    let header = sections.next().unwrap_or_default();
    let table = sections
        .next()
        .ok_or_else(|| WerkError::parse(file_name, "missing metadata table"))?;
    let description = sections.next().unwrap_or_default();

    let mut header_lines = header.lines();
    if header_lines.next().map(str::trim_end) != Some(WERK_V2_MARKER) {
        return Err(WerkError::parse(
            file_name,
            format!("first line must be {:?}", WERK_V2_MARKER),
        ));
    }
    let title = header_lines
        .next()
        .and_then(|line| line.strip_prefix("# "))
        .ok_or_else(|| WerkError::parse(file_name, "second line must be the title (\"# ...\")"))?;
    if header_lines.next().is_some() {
        return Err(WerkError::parse(
            file_name,
            "expected a blank line after the title",
        ));
    }

    let mut metadata = parse_table(table, file_name)?;
    for reserved in ["id", "title"] {
        if metadata.contains_key(reserved) {
            return Err(WerkError::parse(
                file_name,
                format!("{:?} must not appear in the metadata table", reserved),
            ));
        }
    }
    metadata.insert("id".to_string(), id.to_string());
    metadata.insert("title".to_string(), title.trim().to_string());

    Ok(WerkParseResult {
        metadata,
        description: description
            .strip_suffix('\n')
            .unwrap_or(description)
            .to_string(),
    })
}

fn parse_table(table: &str, file_name: &str) -> Result<BTreeMap<String, String>> {
    let mut lines = table.lines();
    if lines.next().map(str::trim) != Some(TABLE_HEADER) {
        return Err(WerkError::parse(
            file_name,
            format!("metadata table must start with {:?}", TABLE_HEADER),
        ));
    }
    if lines.next().map(str::trim) != Some(TABLE_SEPARATOR) {
        return Err(WerkError::parse(
            file_name,
            format!("metadata table header must be followed by {:?}", TABLE_SEPARATOR),
        ));
    }

    let mut metadata = BTreeMap::new();
    for line in lines {
        let (key, value) = line.split_once('|').ok_or_else(|| {
            WerkError::parse(file_name, format!("table row {:?} has no \"|\"", line))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(WerkError::parse(
                file_name,
                format!("table row {:?} has an empty key", line),
            ));
        }
        if metadata
            .insert(key.to_string(), value.trim().to_string())
            .is_some()
        {
            return Err(WerkError::parse(
                file_name,
                format!("duplicate metadata key {:?}", key),
            ));
        }
    }
    Ok(metadata)
}

fn parse_v1_werk(content: &str, file_name: &str) -> Result<WerkParseResult> {
    let (header, description) = match content.split_once("\n\n") {
        Some((header, description)) => (header, description),
        None => (content.trim_end_matches('\n'), ""),
    };

    let mut metadata = BTreeMap::new();
    for line in header.lines() {
        let (key, value) = line.split_once(':').ok_or_else(|| {
            WerkError::parse(file_name, format!("header line {:?} is not \"Key: value\"", line))
        })?;
        metadata.insert(key.trim().to_lowercase(), value.trim().to_string());
    }
    metadata.insert("id".to_string(), file_name.to_string());

    Ok(WerkParseResult {
        metadata: v1_metadata_to_markdown(metadata, file_name)?,
        description: description.trim_end_matches('\n').to_string(),
    })
}

/// Convert legacy metadata (epoch dates, `compat`/`incomp`) to its markdown form
pub fn v1_metadata_to_markdown(
    mut metadata: BTreeMap<String, String>,
    file_name: &str,
) -> Result<BTreeMap<String, String>> {
    for key in DROPPED_V1_KEYS {
        metadata.remove(key);
    }

    if let Some(date) = metadata.get_mut("date") {
        let epoch: i64 = date
            .parse()
            .map_err(|_| WerkError::parse(file_name, format!("date {:?} is not an epoch", date)))?;
        let converted = Utc
            .timestamp_opt(epoch, 0)
            .single()
            .ok_or_else(|| WerkError::parse(file_name, format!("date {} is out of range", epoch)))?;
        *date = converted.to_rfc3339();
    }

    if let Some(compatible) = metadata.get_mut("compatible") {
        if compatible.as_str() == "compat" {
            *compatible = "yes".to_string();
        } else if compatible.starts_with("incomp") {
            *compatible = "no".to_string();
        }
    }

    Ok(metadata)
}
