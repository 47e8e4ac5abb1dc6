//! The check plugin contract
//!
//! A plugin is a (parse, discover, check) triple for one agent section. The
//! types in this module are what those functions exchange with the host:
//! states, metrics, results, discovered services and host labels.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Rows of an agent section, each row a list of fields
pub type StringTable = Vec<Vec<String>>;

/// Monitoring state of a single result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Ok,
    Warn,
    Crit,
    Unknown,
}

impl State {
    /// Numeric value as understood by the monitoring core
    pub fn value(self) -> i32 {
        match self {
            State::Ok => 0,
            State::Warn => 1,
            State::Crit => 2,
            State::Unknown => 3,
        }
    }

    fn severity(self) -> u8 {
        match self {
            State::Ok => 0,
            State::Warn => 1,
            State::Unknown => 2,
            State::Crit => 3,
        }
    }

    /// The more severe of two states: CRIT > UNKNOWN > WARN > OK
    pub fn worst(self, other: State) -> State {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    /// Worst state of an iterator of states, OK if it is empty
    pub fn worst_of<I: IntoIterator<Item = State>>(states: I) -> State {
        states.into_iter().fold(State::Ok, State::worst)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            State::Ok => "OK",
            State::Warn => "WARN",
            State::Crit => "CRIT",
            State::Unknown => "UNKNOWN",
        };
        f.write_str(text)
    }
}

/// A performance value attached to a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub levels: Option<(f64, f64)>,
    pub boundaries: Option<(Option<f64>, Option<f64>)>,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            levels: None,
            boundaries: None,
        }
    }

    pub fn with_levels(mut self, levels: Option<(f64, f64)>) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_boundaries(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.boundaries = Some((min, max));
        self
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        let (warn, crit) = match self.levels {
            Some((w, c)) => (w.to_string(), c.to_string()),
            None => (String::new(), String::new()),
        };
        let (min, max) = match self.boundaries {
            Some((min, max)) => (
                min.map(|v| v.to_string()).unwrap_or_default(),
                max.map(|v| v.to_string()).unwrap_or_default(),
            ),
            None => (String::new(), String::new()),
        };
        write!(f, ";{};{};{};{}", warn, crit, min, max)
    }
}

/// One line of check output: state, text and optional metrics
///
/// A text starting with a newline is long output, shown in the service
/// details only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub state: State,
    pub text: String,
    pub metrics: Vec<Metric>,
}

impl CheckResult {
    pub fn new(state: State, text: impl Into<String>) -> Self {
        Self {
            state,
            text: text.into(),
            metrics: Vec::new(),
        }
    }

    pub fn ok(text: impl Into<String>) -> Self {
        Self::new(State::Ok, text)
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn with_metrics(mut self, metrics: impl IntoIterator<Item = Metric>) -> Self {
        self.metrics.extend(metrics);
        self
    }

    pub fn is_details(&self) -> bool {
        self.text.starts_with('\n')
    }
}

/// A service found by a discovery function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// `None` for services that exist at most once per host
    pub item: Option<String>,
    /// Parameters suggested at discovery time
    pub parameters: serde_json::Value,
}

impl Service {
    pub fn new(item: Option<String>) -> Self {
        Self {
            item,
            parameters: serde_json::Value::Null,
        }
    }

    pub fn single() -> Self {
        Self::new(None)
    }

    pub fn with_item(item: impl Into<String>) -> Self {
        Self::new(Some(item.into()))
    }
}

/// A label attached to the host by a plugin's host-label function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostLabel {
    pub name: String,
    pub value: String,
}

impl HostLabel {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A (parse, discover, check) triple for one agent section
pub trait CheckPlugin: Send + Sync {
    type Section;
    type Params: DeserializeOwned + Serialize + Default;

    /// Name of the check plugin, also used as the registry key
    fn name(&self) -> &'static str;

    /// Name of the agent section this plugin consumes
    fn section_name(&self) -> &'static str {
        self.name()
    }

    /// Service description, `%s` is replaced by the item
    fn service_name(&self) -> &'static str;

    fn parse(&self, string_table: &StringTable) -> Result<Self::Section>;

    fn host_labels(&self, _section: &Self::Section) -> Vec<HostLabel> {
        Vec::new()
    }

    fn discover(&self, section: &Self::Section) -> Vec<Service>;

    fn check(
        &self,
        item: Option<&str>,
        params: &Self::Params,
        section: &Self::Section,
    ) -> Result<Vec<CheckResult>>;
}

/// Service description for an item
pub fn format_service_name(template: &str, item: Option<&str>) -> String {
    match item {
        Some(item) => template.replace("%s", item),
        None => template.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worst_state_ranks_unknown_below_crit() {
        assert_eq!(State::Warn.worst(State::Unknown), State::Unknown);
        assert_eq!(State::Unknown.worst(State::Crit), State::Crit);
        assert_eq!(State::Crit.worst(State::Unknown), State::Crit);
        assert_eq!(State::worst_of(Vec::new()), State::Ok);
        assert_eq!(
            State::worst_of([State::Ok, State::Warn, State::Ok]),
            State::Warn
        );
    }

    #[test]
    fn test_metric_display() {
        let metric = Metric::new("mem_used", 42.0)
            .with_levels(Some((80.0, 90.0)))
            .with_boundaries(Some(0.0), None);
        assert_eq!(metric.to_string(), "mem_used=42;80;90;0;");
        assert_eq!(Metric::new("x", 1.5).to_string(), "x=1.5;;;;");
    }

    #[test]
    fn test_service_name() {
        assert_eq!(
            format_service_name("AWS/EC2 Limits %s", Some("eu-west-1")),
            "AWS/EC2 Limits eu-west-1"
        );
        assert_eq!(format_service_name("Proxmox VE Node Info", None), "Proxmox VE Node Info");
    }
}
