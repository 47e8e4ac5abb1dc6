//! vzdump backup log parsing
//!
//! Proxmox VE does not expose past backups through its API, the only source
//! is the log of each `vzdump` task. [`BackupLogParser`] walks such a log
//! line by line. A VM section starts with `Starting Backup of VM N` and ends
//! with either `Finished Backup of VM N (HH:MM:SS)` or
//! `ERROR: Backup of VM N failed - ...`; the lines in between carry the
//! figures collected into a [`BackupRecord`].
//!
//! Warnings (data outside of a VM section, incomplete records) reset the
//! parser to idle. Errors (overlapping VM sections) stop parsing the log.
//! In strict mode both abort with the first problem.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};

macro_rules! log_pattern {
    ($name:ident, $pattern:expr) => {
        static $name: Lazy<Regex> = Lazy::new(|| {
            Regex::new(concat!("(?i)", $pattern)).expect("backup log pattern is valid")
        });
    };
}

log_pattern!(START_VM, r"^INFO: Starting Backup of VM (\d+).*");
log_pattern!(STARTED_TIME, r"^INFO: Backup started at (\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})");
log_pattern!(FINISH_VM, r"^INFO: Finished Backup of VM (\d+) \((\d{2}:\d{2}:\d{2})\).*");
log_pattern!(ERROR_VM, r"^ERROR: Backup of VM (\d+) failed - (.*)$");
log_pattern!(FAILED_JOB, r"^INFO: Failed at (\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})$");
log_pattern!(CREATE_ARCHIVE, r"^INFO: creating(?: vzdump)? archive '(.*)'");
log_pattern!(BYTES_WRITTEN, r"^INFO: Total bytes written: (\d+) \(.*, (.*)/s\)");
log_pattern!(TRANSFERRED, r"^INFO: transferred (.*) in <?(\d+) seconds(.*)$");
log_pattern!(
    UPLOADED,
    r"^INFO: (.*): had to upload (.*) of (.*) in (.*)s, average speed (.*)/s"
);
log_pattern!(ARCHIVE_SIZE, r"^INFO: archive file size: (.*)");
log_pattern!(
    BACKUPED,
    r"^INFO: (.*): had to backup (.*) of (.*) \(compressed (.*)\) in ([\d.]+)[\s]*s.*"
);

/// Figures collected for one VM from a backup log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_written_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_written_bandwidth: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_amount: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_amount: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BackupRecord {
    /// True if at least one complete set of figures is present
    pub fn is_complete(&self) -> bool {
        if self.started_time.is_none() || self.total_duration.is_none() {
            return false;
        }
        (self.bytes_written_bandwidth.is_some() && self.bytes_written_size.is_some())
            || (self.transfer_size.is_some() && self.transfer_time.is_some())
            || (self.upload_amount.is_some()
                && self.upload_time.is_some()
                && self.upload_total.is_some())
            || (self.backup_amount.is_some()
                && self.backup_time.is_some()
                && self.backup_total.is_some())
            || (self.archive_name.is_some() && self.archive_size.is_some())
    }

    /// Names of the fields present, for diagnostics
    pub fn present_fields(&self) -> Vec<&'static str> {
        let fields = [
            ("started_time", self.started_time.is_some()),
            ("total_duration", self.total_duration.is_some()),
            ("bytes_written_size", self.bytes_written_size.is_some()),
            ("bytes_written_bandwidth", self.bytes_written_bandwidth.is_some()),
            ("transfer_size", self.transfer_size.is_some()),
            ("transfer_time", self.transfer_time.is_some()),
            ("upload_amount", self.upload_amount.is_some()),
            ("upload_total", self.upload_total.is_some()),
            ("upload_time", self.upload_time.is_some()),
            ("backup_amount", self.backup_amount.is_some()),
            ("backup_total", self.backup_total.is_some()),
            ("backup_time", self.backup_time.is_some()),
            ("archive_name", self.archive_name.is_some()),
            ("archive_size", self.archive_size.is_some()),
        ];
        fields
            .into_iter()
            .filter(|(_, present)| *present)
            .map(|(name, _)| name)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The log is inconsistent, parsing stops
    Error,
    /// The current VM section is dropped, parsing continues
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// A problem found in a backup log. Line 0 refers to the log as a whole.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{severity} in line {line}: {message}")]
pub struct LogParseError {
    pub line: usize,
    pub message: String,
    pub severity: Severity,
}

impl LogParseError {
    fn error(line: usize, message: String) -> Self {
        Self {
            line,
            message,
            severity: Severity::Error,
        }
    }

    fn warning(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

/// Parser position within a log
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ParserState {
    #[default]
    Idle,
    InVm { vmid: String, record: BackupRecord },
}

/// Result of parsing one log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLog {
    /// Finalized records by VM id
    pub records: BTreeMap<String, BackupRecord>,
    /// Problems that did not abort parsing
    pub errors: Vec<LogParseError>,
}

/// Convert a size like `123`, `1.5 GiB` or `512MB` to bytes
///
/// Decimal unit names are treated as binary multiples, as vzdump does.
pub fn to_bytes(text: &str) -> Option<u64> {
    const UNITS: [(&str, u32); 8] = [
        ("KiB", 1),
        ("KB", 1),
        ("MiB", 2),
        ("MB", 2),
        ("GiB", 3),
        ("GB", 3),
        ("TiB", 4),
        ("TB", 4),
    ];

    let text = text.trim();
    let (number, exponent) = UNITS
        .iter()
        .find_map(|(unit, exponent)| text.strip_suffix(unit).map(|n| (n, *exponent)))
        .unwrap_or((text, 0));
    let value: f64 = number.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * 1024f64.powi(exponent as i32)).round() as u64)
}

/// Seconds from `HH:MM:SS`, hours may exceed 23
pub fn duration_from_string(text: &str) -> Option<f64> {
    let mut parts = text.split(':').map(|part| part.parse::<u64>().ok());
    let (hours, minutes, seconds) = (parts.next()??, parts.next()??, parts.next()??);
    if parts.next().is_some() {
        return None;
    }
    Some((hours * 3600 + minutes * 60 + seconds) as f64)
}

/// Forward-only state machine over the lines of one backup log
#[derive(Debug, Default)]
pub struct BackupLogParser {
    strict: bool,
    state: ParserState,
    parsed: ParsedLog,
}

impl BackupLogParser {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            ..Self::default()
        }
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    /// Parse a complete log given as `(line number, text)` pairs
    pub fn parse<'a, I>(lines: I, strict: bool) -> Result<ParsedLog, LogParseError>
    where
        I: IntoIterator<Item = (usize, &'a str)>,
    {
        let mut parser = Self::new(strict);
        for (number, line) in lines {
            if !parser.feed(number, line)? {
                break;
            }
        }
        Ok(parser.finish())
    }

    /// Process one line. Returns `Ok(false)` once an error ended parsing
    /// in non-strict mode.
    pub fn feed(&mut self, number: usize, line: &str) -> Result<bool, LogParseError> {
        match self.step(number, line) {
            Ok(()) => Ok(true),
            Err(e) if self.strict => Err(e),
            Err(e) => {
                error!("Error in log at line {}: {}", e.line, e.message);
                self.state = ParserState::Idle;
                let keep_going = e.severity == Severity::Warning;
                self.parsed.errors.push(e);
                Ok(keep_going)
            }
        }
    }

    /// End of input, an unterminated VM section is recorded as a problem
    pub fn finish(mut self) -> ParsedLog {
        if let ParserState::InVm { vmid, .. } = &self.state {
            self.parsed.errors.push(LogParseError::error(
                0,
                format!("Log for VMID={:?} not finalized", vmid),
            ));
        }
        self.parsed
    }

    fn step(&mut self, number: usize, line: &str) -> Result<(), LogParseError> {
        if let Some(caps) = START_VM.captures(line) {
            let vmid = caps[1].to_string();
            if let ParserState::InVm { vmid: active, .. } = &self.state {
                return Err(LogParseError::error(
                    number,
                    format!(
                        "Captured start of processing VM {:?} while VM {:?} is still active",
                        vmid, active
                    ),
                ));
            }
            self.state = ParserState::InVm {
                vmid,
                record: BackupRecord::default(),
            };
        } else if let Some(caps) = FINISH_VM.captures(line) {
            let stop_vmid = &caps[1];
            let (vmid, mut record) = match std::mem::take(&mut self.state) {
                ParserState::InVm { vmid, record } if vmid == stop_vmid => (vmid, record),
                other => {
                    let active = match &other {
                        ParserState::InVm { vmid, .. } => vmid.clone(),
                        ParserState::Idle => String::new(),
                    };
                    self.state = other;
                    return Err(LogParseError::error(
                        number,
                        format!(
                            "Found end of VM {:?} while another VM {:?} was active",
                            stop_vmid, active
                        ),
                    ));
                }
            };
            record.total_duration = duration_from_string(&caps[2]);
            if !record.is_complete() {
                return Err(LogParseError::warning(
                    number,
                    format!(
                        "End of VM {:?} while still information is missing (we have: {:?})",
                        vmid,
                        record.present_fields()
                    ),
                ));
            }
            self.parsed.records.insert(vmid, record);
        } else if let Some(caps) = ERROR_VM.captures(line) {
            let error_vmid = caps[1].to_string();
            let message = caps[2].to_string();
            if let ParserState::InVm { vmid: active, .. } = &self.state {
                if *active != error_vmid {
                    return Err(LogParseError::error(
                        number,
                        format!(
                            "Error for VM {:?} while another VM {:?} was active",
                            error_vmid, active
                        ),
                    ));
                }
            }
            let record = match std::mem::take(&mut self.state) {
                ParserState::InVm { record, .. } => record,
                ParserState::Idle => BackupRecord::default(),
            };
            warn!("Found error for VM {:?}: {:?}", error_vmid, message);
            self.parsed.records.insert(
                error_vmid,
                BackupRecord {
                    error: Some(message),
                    ..record
                },
            );
        } else if let Some(caps) = STARTED_TIME.captures(line) {
            let record = self.active_record(number, "Found start date while no VM was active")?;
            record.started_time = Some(caps[1].to_string());
        } else if let Some(caps) = FAILED_JOB.captures(line) {
            for record in self.parsed.records.values_mut() {
                if record.started_time.is_none() {
                    record.started_time = Some(caps[1].to_string());
                }
            }
        } else if let Some(caps) = BYTES_WRITTEN.captures(line) {
            let size = parse_number::<u64>(number, &caps, 1)?;
            let bandwidth = parse_size(number, &caps, 2)?;
            let record =
                self.active_record(number, "Found bandwidth information while no VM was active")?;
            record.bytes_written_size = Some(size);
            record.bytes_written_bandwidth = Some(bandwidth);
        } else if let Some(caps) = TRANSFERRED.captures(line) {
            let size = parse_size(number, &caps, 1)?;
            let time = parse_number::<u64>(number, &caps, 2)?;
            let record =
                self.active_record(number, "Found bandwidth information while no VM was active")?;
            record.transfer_size = Some(size);
            record.transfer_time = Some(time);
        } else if let Some(caps) = CREATE_ARCHIVE.captures(line) {
            let record = self.active_record(number, "Found archive name without active VM")?;
            record.archive_name = Some(caps[1].to_string());
        } else if let Some(caps) = ARCHIVE_SIZE.captures(line) {
            let size = parse_size(number, &caps, 1)?;
            let record =
                self.active_record(number, "Found archive size information without active VM")?;
            record.archive_size = Some(size);
        } else if let Some(caps) = UPLOADED.captures(line) {
            let amount = parse_size(number, &caps, 2)?;
            let total = parse_size(number, &caps, 3)?;
            let time = parse_number::<f64>(number, &caps, 4)?;
            let record =
                self.active_record(number, "Found upload information while no VM was active")?;
            record.upload_amount = Some(amount);
            record.upload_total = Some(total);
            record.upload_time = Some(time);
        } else if let Some(caps) = BACKUPED.captures(line) {
            let amount = parse_size(number, &caps, 2)?;
            let total = parse_size(number, &caps, 3)?;
            let time = parse_number::<f64>(number, &caps, 5)?;
            let record =
                self.active_record(number, "Found backup information while no VM was active")?;
            record.backup_amount = Some(amount);
            record.backup_total = Some(total);
            record.backup_time = Some(time);
        }
        Ok(())
    }

    fn active_record(&mut self, number: usize, message: &str) -> Result<&mut BackupRecord, LogParseError> {
        match &mut self.state {
            ParserState::InVm { record, .. } => Ok(record),
            ParserState::Idle => Err(LogParseError::warning(number, message)),
        }
    }
}

fn parse_size(number: usize, caps: &Captures<'_>, group: usize) -> Result<u64, LogParseError> {
    to_bytes(&caps[group])
        .ok_or_else(|| LogParseError::warning(number, format!("Cannot parse size {:?}", &caps[group])))
}

fn parse_number<T: std::str::FromStr>(
    number: usize,
    caps: &Captures<'_>,
    group: usize,
) -> Result<T, LogParseError> {
    caps[group]
        .trim()
        .parse()
        .map_err(|_| LogParseError::warning(number, format!("Cannot parse number {:?}", &caps[group])))
}

/// Turn API log entries (`{"n": 1, "t": "text"}`) into numbered lines
///
/// Entries without text or with blank text are skipped. The entry's own
/// line number is kept, entries lacking one are numbered by position.
pub fn lines_from_entries(entries: &[Value]) -> Vec<(usize, String)> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let text = entry.get("t")?.as_str()?;
            if text.trim().is_empty() {
                return None;
            }
            let number = entry
                .get("n")
                .and_then(Value::as_u64)
                .map(|n| n as usize)
                .unwrap_or(index + 1);
            Some((number, text.to_string()))
        })
        .collect()
}

/// Lines of a plain text log, numbered from 1
pub fn lines_from_text(text: &str) -> Vec<(usize, String)> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| (index + 1, line.to_string()))
        .collect()
}

/// Merge records of several logs, the most recent backup of a VM wins
pub fn collect_vm_backup_info<I>(logs: I) -> BTreeMap<String, BackupRecord>
where
    I: IntoIterator<Item = ParsedLog>,
{
    let mut merged: BTreeMap<String, BackupRecord> = BTreeMap::new();
    for log in logs {
        for (vmid, record) in log.records {
            if let Some(existing) = merged.get(&vmid) {
                if existing.started_time > record.started_time {
                    continue;
                }
            }
            merged.insert(vmid, record);
        }
    }
    merged
}
