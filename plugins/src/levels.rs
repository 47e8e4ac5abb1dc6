//! Upper threshold evaluation

use crate::api::{Metric, State};

/// Compare a value against upper `(warn, crit)` levels
///
/// Returns the state and a text of the form `"<label>: <value>"`, with
/// `" (warn/crit at <w>/<c>)"` appended when a level is reached.
pub fn check_levels(
    value: f64,
    levels_upper: Option<(f64, f64)>,
    render: fn(f64) -> String,
    label: &str,
) -> (State, String) {
    let mut text = format!("{}: {}", label, render(value));
    let state = match levels_upper {
        Some((_, crit)) if value >= crit => State::Crit,
        Some((warn, _)) if value >= warn => State::Warn,
        _ => State::Ok,
    };
    if let (State::Warn | State::Crit, Some((warn, crit))) = (state, levels_upper) {
        text.push_str(&format!(" (warn/crit at {}/{})", render(warn), render(crit)));
    }
    (state, text)
}

/// Like [`check_levels`], also returning a metric carrying the levels
pub fn check_levels_metric(
    value: f64,
    levels_upper: Option<(f64, f64)>,
    render: fn(f64) -> String,
    label: &str,
    metric_name: &str,
) -> (State, String, Metric) {
    let (state, text) = check_levels(value, levels_upper, render, label);
    let metric = Metric::new(metric_name, value).with_levels(levels_upper);
    (state, text, metric)
}
