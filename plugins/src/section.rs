//! Agent section protocol
//!
//! Agent output is plain text. A header line `<<<name>>>` or
//! `<<<name:sep(N)>>>` starts a section, every following line is a row.
//! Piggyback markers `<<<<hostname>>>>` and `<<<<>>>>` attribute the enclosed
//! sections to another host.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::api::StringTable;
use crate::error::{PluginError, Result};

/// Sections of one host, keyed by section name
pub type HostSections = BTreeMap<String, StringTable>;

/// Parsed agent output, grouped per host. `None` is the queried host itself.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AgentOutput {
    hosts: BTreeMap<Option<String>, HostSections>,
}

impl AgentOutput {
    pub fn section(&self, host: Option<&str>, name: &str) -> Option<&StringTable> {
        self.hosts
            .get(&host.map(str::to_string))
            .and_then(|sections| sections.get(name))
    }

    pub fn sections(&self, host: Option<&str>) -> Option<&HostSections> {
        self.hosts.get(&host.map(str::to_string))
    }

    pub fn hosts(&self) -> impl Iterator<Item = Option<&str>> {
        self.hosts.keys().map(|host| host.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.values().all(|sections| sections.is_empty())
    }
}

/// Name and field separator from a section header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    pub name: String,
    /// `None` splits rows on whitespace
    pub separator: Option<char>,
}

impl SectionHeader {
    /// Parse the inner part of `<<<...>>>`, e.g. `proxmox_ve_node_info:sep(0)`
    pub fn parse(inner: &str) -> Option<Self> {
        let mut parts = inner.split(':');
        let name = parts.next()?.trim();
        if name.is_empty() {
            return None;
        }
        let mut separator = None;
        for option in parts {
            if let Some(code) = option
                .strip_prefix("sep(")
                .and_then(|rest| rest.strip_suffix(')'))
            {
                separator = code.parse::<u32>().ok().and_then(char::from_u32);
            }
        }
        Some(Self {
            name: name.to_string(),
            separator,
        })
    }

    pub fn split_row(&self, line: &str) -> Vec<String> {
        match self.separator {
            Some(sep) => line.split(sep).map(str::to_string).collect(),
            None => line.split_whitespace().map(str::to_string).collect(),
        }
    }
}

/// Split agent output into per-host sections
pub fn parse_agent_output(text: &str) -> AgentOutput {
    let mut output = AgentOutput::default();
    let mut host: Option<String> = None;
    let mut current: Option<SectionHeader> = None;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        if let Some(inner) = line
            .strip_prefix("<<<<")
            .and_then(|rest| rest.strip_suffix(">>>>"))
        {
            host = if inner.is_empty() {
                None
            } else {
                Some(inner.to_string())
            };
            current = None;
            continue;
        }

        if let Some(inner) = line
            .strip_prefix("<<<")
            .and_then(|rest| rest.strip_suffix(">>>"))
        {
            current = SectionHeader::parse(inner);
            if let Some(header) = &current {
                output
                    .hosts
                    .entry(host.clone())
                    .or_default()
                    .entry(header.name.clone())
                    .or_default();
            }
            continue;
        }

        match &current {
            Some(header) => {
                let row = header.split_row(line);
                output
                    .hosts
                    .entry(host.clone())
                    .or_default()
                    .entry(header.name.clone())
                    .or_default()
                    .push(row);
            }
            None => debug!("Ignoring line outside of any section: {:?}", line),
        }
    }

    output
}

/// Decode a section whose rows each carry a JSON document
///
/// The fields of each row are joined by a single space before decoding. A
/// list payload is flattened into the result, rows that cannot be decoded
/// are skipped.
pub fn parse_json_rows(string_table: &StringTable) -> Vec<Value> {
    let mut loaded = Vec::new();
    for row in string_table {
        match serde_json::from_str::<Value>(&row.join(" ")) {
            Ok(Value::Array(items)) => loaded.extend(items),
            Ok(value) => loaded.push(value),
            Err(e) => debug!("Skipping undecodable row: {}", e),
        }
    }
    loaded
}

/// Decode the first row of a `sep(0)` section as one JSON document
pub fn parse_json_section(string_table: &StringTable, section: &str) -> Result<Value> {
    let row = string_table
        .first()
        .ok_or_else(|| PluginError::parse(section, "section is empty"))?;
    Ok(serde_json::from_str(&row.join(""))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "\
<<<check_mk>>>
Version: 2.3.0
<<<proxmox_ve_node_info:sep(0)>>>
{\"status\": \"online\", \"lxc\": [\"103\"]}
<<<<vm-101>>>>
<<<proxmox_ve_mem_usage:sep(0)>>>
{\"mem\": 1024, \"max_mem\": 4096}
<<<<>>>>
<<<uptime>>>
12345.6
";

    #[test]
    fn test_sections_grouped_by_host() {
        let output = parse_agent_output(OUTPUT);
        assert_eq!(
            output.section(None, "check_mk"),
            Some(&vec![vec!["Version:".to_string(), "2.3.0".to_string()]])
        );
        assert_eq!(
            output.section(None, "uptime"),
            Some(&vec![vec!["12345.6".to_string()]])
        );
        assert_eq!(
            output.section(Some("vm-101"), "proxmox_ve_mem_usage"),
            Some(&vec![vec!["{\"mem\": 1024, \"max_mem\": 4096}".to_string()]])
        );
        assert!(output.section(None, "proxmox_ve_mem_usage").is_none());
        assert_eq!(output.hosts().collect::<Vec<_>>(), vec![None, Some("vm-101")]);
    }

    #[test]
    fn test_header_separators() {
        let tab = SectionHeader::parse("df:sep(9)").unwrap();
        assert_eq!(tab.separator, Some('\t'));
        assert_eq!(tab.split_row("a b\tc"), vec!["a b", "c"]);

        let plain = SectionHeader::parse("uptime").unwrap();
        assert_eq!(plain.separator, None);
        assert_eq!(plain.split_row("  1  2 "), vec!["1", "2"]);

        let cached = SectionHeader::parse("aws_ec2_limits:cached(1,2):sep(0)").unwrap();
        assert_eq!(cached.name, "aws_ec2_limits");
        assert_eq!(cached.split_row("a b"), vec!["a b"]);

        assert!(SectionHeader::parse("").is_none());
    }

    #[test]
    fn test_json_rows_are_joined_and_flattened() {
        let table = vec![
            vec!["[{\"a\":".to_string(), "1}]".to_string()],
            vec!["not json".to_string()],
            vec!["{\"b\": 2}".to_string()],
        ];
        let values = parse_json_rows(&table);
        assert_eq!(values, vec![serde_json::json!({"a": 1}), serde_json::json!({"b": 2})]);
    }

    #[test]
    fn test_json_section_requires_a_row() {
        assert!(parse_json_section(&Vec::new(), "x").is_err());
        let table = vec![vec!["{\"x\": true}".to_string()]];
        assert_eq!(
            parse_json_section(&table, "x").unwrap(),
            serde_json::json!({"x": true})
        );
    }
}
