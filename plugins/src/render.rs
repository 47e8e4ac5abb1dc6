//! Human readable rendering of check values

/// Render a percentage with two decimals, e.g. `90.00%`
pub fn percent(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Render a byte count in IEC units, e.g. `3.50 GiB`
pub fn bytes(value: f64) -> String {
    const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

    let negative = value < 0.0;
    let mut scaled = value.abs();
    let mut unit = 0;
    while scaled >= 1024.0 && unit < UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }
    let sign = if negative { "-" } else { "" };
    if unit == 0 {
        format!("{}{} B", sign, scaled.round() as u64)
    } else {
        format!("{}{:.2} {}", sign, scaled, UNITS[unit])
    }
}

/// Render a count as an integer
pub fn count(value: f64) -> String {
    format!("{}", value.round() as i64)
}

/// Render a bandwidth in bytes per second
pub fn iobandwidth(value: f64) -> String {
    format!("{}/s", bytes(value))
}

/// Render a duration with its two most significant units
///
/// `timespan(93600.0)` gives `1 day 2 hours`, durations under a minute are
/// shown in seconds.
pub fn timespan(seconds: f64) -> String {
    const UNITS: [(&str, u64); 4] = [
        ("day", 86_400),
        ("hour", 3_600),
        ("minute", 60),
        ("second", 1),
    ];

    let negative = seconds < 0.0;
    let mut remaining = seconds.abs().round() as u64;
    if remaining < 60 {
        let sign = if negative { "-" } else { "" };
        return format!("{}{} {}", sign, remaining, plural("second", remaining));
    }

    let mut parts = Vec::new();
    for (name, size) in UNITS {
        let amount = remaining / size;
        remaining %= size;
        if !parts.is_empty() || amount > 0 {
            parts.push((name, amount));
        }
        if parts.len() == 2 {
            break;
        }
    }

    let text = parts
        .iter()
        .filter(|(_, amount)| *amount > 0)
        .map(|(name, amount)| format!("{} {}", amount, plural(name, *amount)))
        .collect::<Vec<_>>()
        .join(" ");
    if negative {
        format!("-{}", text)
    } else {
        text
    }
}

fn plural(name: &str, amount: u64) -> String {
    if amount == 1 {
        name.to_string()
    } else {
        format!("{}s", name)
    }
}
