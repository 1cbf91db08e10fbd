//! Per-IP activity extracted from raw service logs.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Retained example lines per IP.
pub const MAX_SAMPLES: usize = 3;

/// Characters kept from each example line.
pub const SAMPLE_WIDTH: usize = 200;

/// Records returned when the caller doesn't ask for a specific limit.
pub const DEFAULT_LIMIT: usize = 100;

/// Attackers listed in an [`AttackSummary`].
pub const SUMMARY_TOP: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogActivityRecord {
    pub ip: String,
    pub count: u64,
    pub last_seen: Option<String>,
    pub sample_logs: Vec<String>,
}

/// Accumulates matches line by line. Records stay in first-seen order until
/// ranked.
#[derive(Debug, Default)]
pub struct ActivityTally {
    index: HashMap<String, usize>,
    records: Vec<LogActivityRecord>,
}

impl ActivityTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `patterns` to `line` in order; the first match is counted and
    /// the rest are skipped. Returns whether anything matched.
    pub fn observe(&mut self, line: &str, patterns: &[Regex]) -> bool {
        let Some(ip) = patterns
            .iter()
            .find_map(|re| re.captures(line).and_then(|caps| caps.get(1)))
            .map(|m| m.as_str())
        else {
            return false;
        };

        let slot = match self.index.get(ip) {
            Some(&slot) => slot,
            None => {
                self.records.push(LogActivityRecord {
                    ip: ip.to_string(),
                    count: 0,
                    last_seen: None,
                    sample_logs: Vec::with_capacity(MAX_SAMPLES),
                });
                let slot = self.records.len() - 1;
                self.index.insert(ip.to_string(), slot);
                slot
            }
        };

        let record = &mut self.records[slot];
        record.count += 1;
        // last match decides, even when it carries no timestamp
        record.last_seen = extract_timestamp(line).map(str::to_string);
        if record.sample_logs.len() < MAX_SAMPLES {
            record.sample_logs.push(line.chars().take(SAMPLE_WIDTH).collect());
        }
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records by count descending, ties in first-seen order, at most `limit`.
    pub fn into_ranked(self, limit: usize) -> Vec<LogActivityRecord> {
        let mut records = self.records;
        records.sort_by(|a, b| b.count.cmp(&a.count));
        records.truncate(limit);
        records
    }
}

/// Scan `lines` with `patterns` and rank the per-IP results.
pub fn extract<'a, I>(lines: I, patterns: &[Regex], limit: usize) -> Vec<LogActivityRecord>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tally = ActivityTally::new();
    for line in lines {
        tally.observe(line, patterns);
    }
    tally.into_ranked(limit)
}

static TIMESTAMP_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // syslog: "Jan 25 10:30:45"
        r"^(\w{3}\s+\d+\s+\d+:\d+:\d+)",
        // ISO 8601
        r"^(\d{4}-\d{2}-\d{2}T\d+:\d+:\d+)",
        // nginx error log: "2024/01/25 10:30:45"
        r"^(\d{4}/\d{2}/\d{2} \d+:\d+:\d+)",
        // apache: "[25/Jan/2024:10:30:45"
        r"^\[(\d{2}/\w{3}/\d{4}:\d+:\d+:\d+)",
    ]
    .iter()
    .map(|src| Regex::new(src).expect("timestamp pattern must compile"))
    .collect()
});

/// Leading timestamp of a log line, exactly as written.
pub fn extract_timestamp(line: &str) -> Option<&str> {
    TIMESTAMP_PATTERNS
        .iter()
        .find_map(|re| re.captures(line).and_then(|caps| caps.get(1)))
        .map(|m| m.as_str())
}

#[derive(Debug, Clone, Serialize)]
pub struct AttackSummary {
    pub total_ips: usize,
    pub total_attempts: u64,
    pub top_attackers: Vec<LogActivityRecord>,
}

impl AttackSummary {
    /// Summarise ranked records (as produced by [`extract`]).
    pub fn from_records(records: &[LogActivityRecord]) -> Self {
        Self {
            total_ips: records.len(),
            total_attempts: records.iter().map(|r| r.count).sum(),
            top_attackers: records.iter().take(SUMMARY_TOP).cloned().collect(),
        }
    }
}
