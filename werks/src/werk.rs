use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::config::WerksConfig;
use crate::error::{Result, WerkError};
use crate::parse::{parse_werk, WerkParseResult};

static VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+\.\d+\.\d+(?:[abip]\d+)?(?:-\d{4}\.\d{2}\.\d{2})?$").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WerkClass {
    Fix,
    Feature,
    Security,
}

impl FromStr for WerkClass {
    type Err = WerkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fix" => Ok(WerkClass::Fix),
            "feature" => Ok(WerkClass::Feature),
            "security" => Ok(WerkClass::Security),
            other => Err(WerkError::invalid(
                "class",
                format!("{:?} is not one of fix, feature, security", other),
            )),
        }
    }
}

impl fmt::Display for WerkClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WerkClass::Fix => "fix",
            WerkClass::Feature => "feature",
            WerkClass::Security => "security",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compatibility {
    Yes,
    No,
}

impl FromStr for Compatibility {
    type Err = WerkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "yes" => Ok(Compatibility::Yes),
            "no" => Ok(Compatibility::No),
            other => Err(WerkError::invalid(
                "compatible",
                format!("{:?} is not one of yes, no", other),
            )),
        }
    }
}

impl fmt::Display for Compatibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Compatibility::Yes => "yes",
            Compatibility::No => "no",
        })
    }
}

/// A validated werk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Werk {
    pub id: u32,
    pub title: String,
    pub class: WerkClass,
    pub component: String,
    pub level: u8,
    pub date: DateTime<FixedOffset>,
    pub version: String,
    pub compatible: Compatibility,
    pub edition: String,
    pub description: String,
}

impl Werk {
    /// `(name, value)` of all fields shown next to title and description
    pub fn metadata_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.id.to_string()),
            ("class", self.class.to_string()),
            ("component", self.component.clone()),
            ("level", self.level.to_string()),
            ("date", self.date.to_rfc3339()),
            ("version", self.version.clone()),
            ("compatible", self.compatible.to_string()),
            ("edition", self.edition.clone()),
        ]
    }
}

fn required<'a>(parsed: &'a WerkParseResult, key: &str) -> Result<&'a str> {
    match parsed.get(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(WerkError::invalid(key, "missing")),
    }
}

fn check_choice(field: &str, value: &str, choices: &[&(String, String)]) -> Result<()> {
    if choices.iter().any(|(id, _)| id == value) {
        Ok(())
    } else {
        let known: Vec<&str> = choices.iter().map(|(id, _)| id.as_str()).collect();
        Err(WerkError::invalid(
            field,
            format!("{:?} is not one of {}", value, known.join(", ")),
        ))
    }
}

/// Validate a parsed werk.
///
/// With a config, edition and component must be configured ones.
pub fn load_werk(parsed: &WerkParseResult, config: Option<&WerksConfig>) -> Result<Werk> {
    let id = required(parsed, "id")?
        .parse()
        .map_err(|_| WerkError::invalid("id", "not a number"))?;

    let level = match required(parsed, "level")? {
        "1" => 1,
        "2" => 2,
        "3" => 3,
        other => {
            return Err(WerkError::invalid(
                "level",
                format!("{:?} is not one of 1, 2, 3", other),
            ))
        }
    };

    let version = required(parsed, "version")?;
    if !VERSION.is_match(version) {
        return Err(WerkError::invalid(
            "version",
            format!("{:?} is not a valid version", version),
        ));
    }

    let date = required(parsed, "date")?;
    let date = DateTime::parse_from_rfc3339(date)
        .map_err(|e| WerkError::invalid("date", format!("{:?}: {}", date, e)))?;

    let edition = required(parsed, "edition")?;
    let component = required(parsed, "component")?;
    if let Some(config) = config {
        let editions: Vec<&(String, String)> = config.editions.iter().collect();
        check_choice("edition", edition, &editions)?;
        check_choice("component", component, &config.all_components())?;
    }

    Ok(Werk {
        id,
        title: required(parsed, "title")?.to_string(),
        class: required(parsed, "class")?.parse()?,
        component: component.to_string(),
        level,
        date,
        version: version.to_string(),
        compatible: required(parsed, "compatible")?.parse()?,
        edition: edition.to_string(),
        description: parsed.description.clone(),
    })
}

/// Parse and validate a werk file.
pub fn load_werk_file(
    file_content: &str,
    file_name: &str,
    config: Option<&WerksConfig>,
) -> Result<Werk> {
    parse_werk(file_content, file_name)
        .and_then(|parsed| load_werk(&parsed, config))
        .map_err(|e| e.in_file(file_name, file_content))
}
