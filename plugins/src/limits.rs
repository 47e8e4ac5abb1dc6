//! Usage-against-limit evaluation
//!
//! Cloud quota sections report, per resource, the current amount and the
//! provider's limit. [`check_limits`] compares each amount against its
//! limit as a percentage, aggregates the worst state into one summary line
//! and reports every resource as a detail line.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::api::{CheckResult, Metric, State};
use crate::levels::check_levels;
use crate::render;

/// One resource reported by a quota section
#[derive(Debug, Clone)]
pub struct LimitRow {
    pub key: String,
    pub title: String,
    /// Limit reported by the provider, `None` if unlimited
    pub limit: Option<f64>,
    pub amount: f64,
    pub render: fn(f64) -> String,
}

impl LimitRow {
    pub fn new(
        key: impl Into<String>,
        title: impl Into<String>,
        limit: Option<f64>,
        amount: f64,
        render: fn(f64) -> String,
    ) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            limit,
            amount,
            render,
        }
    }
}

/// Configured levels for one resource key
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct LimitLevels {
    /// Overrides the limit reported by the provider
    #[serde(default)]
    pub limit: Option<f64>,
    /// Usage levels in percent, `None` disables the comparison
    #[serde(default)]
    pub levels: Option<(f64, f64)>,
}

impl LimitLevels {
    pub fn percent(warn: f64, crit: f64) -> Self {
        Self {
            limit: None,
            levels: Some((warn, crit)),
        }
    }

    pub fn with_limit(mut self, limit: f64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Resource key to configured levels
pub type LimitParams = BTreeMap<String, LimitLevels>;

/// Classify a usage percentage: CRIT iff `pct >= crit`, WARN iff
/// `crit > pct >= warn`, OK otherwise
pub fn classify(usage_percent: f64, levels: Option<(f64, f64)>) -> State {
    match levels {
        Some((_, crit)) if usage_percent >= crit => State::Crit,
        Some((warn, _)) if usage_percent >= warn => State::Warn,
        _ => State::Ok,
    }
}

/// Evaluate quota rows of `service` against `params`
///
/// Produces one WARN result per row whose key is not configured, one
/// aggregate line carrying all `aws_<service>_<key>` metrics and one detail
/// line per evaluated resource, sorted by text.
pub fn check_limits(service: &str, params: &LimitParams, rows: &[LimitRow]) -> Vec<CheckResult> {
    let mut results = Vec::new();
    let mut metrics = Vec::new();
    let mut details: Vec<(String, State)> = Vec::new();
    let mut reached: Vec<String> = Vec::new();
    let mut worst = State::Ok;

    for row in rows {
        let Some(configured) = params.get(&row.key) else {
            results.push(CheckResult::new(
                State::Warn,
                format!("Unknown resource '{}'", row.key),
            ));
            continue;
        };

        metrics.push(Metric::new(format!("aws_{}_{}", service, row.key), row.amount));

        let limit = configured.limit.or(row.limit);
        let mut text = match limit {
            Some(limit) => format!(
                "{}: {} (of max. {})",
                row.title,
                (row.render)(row.amount),
                (row.render)(limit)
            ),
            None => format!("{}: {}", row.title, (row.render)(row.amount)),
        };

        let limit = match limit {
            Some(limit) if limit != 0.0 => limit,
            _ => {
                details.push((text, State::Ok));
                continue;
            }
        };

        let usage_percent = 100.0 * row.amount / limit;
        let state = classify(usage_percent, configured.levels);
        if state != State::Ok {
            let (_, usage) =
                check_levels(usage_percent, configured.levels, render::percent, "Usage");
            text.push_str(", ");
            text.push_str(&usage);
            reached.push(row.title.clone());
        }
        worst = worst.worst(state);
        details.push((text, state));
    }

    let summary = if reached.is_empty() {
        CheckResult::ok("No levels reached")
    } else {
        reached.sort();
        CheckResult::new(worst, format!("Levels reached: {}", reached.join(", ")))
    };
    results.push(summary.with_metrics(metrics));

    details.sort_by(|a, b| a.0.cmp(&b.0));
    results.extend(
        details
            .into_iter()
            .map(|(text, state)| CheckResult::new(state, format!("\n{}", text))),
    );
    results
}
