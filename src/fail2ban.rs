//! Client for `fail2ban-client` and the fail2ban activity log.
//!
//! Every call degrades instead of failing: a broken or slow subprocess turns
//! into an empty list, `None` or `false` for the caller.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::error::ProcessError;
use crate::histogram::{self, Histogram};
use crate::iptables;
use crate::runner::{CommandRunner, COMMAND_TIMEOUT};

pub const DEFAULT_FAIL2BAN_LOG: &str = "/var/log/fail2ban.log";

/// Failing IPs returned per jail.
pub const FAILED_IPS_LIMIT: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JailStatus {
    pub name: String,
    pub currently_failed: u64,
    pub total_failed: u64,
    pub currently_banned: u64,
    pub total_banned: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BannedIpRecord {
    pub ip: String,
    pub reject_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedIpRecord {
    pub ip: String,
    pub fail_count: u64,
}

// ---------------------------------------------------------------------------
// Output parsers
// ---------------------------------------------------------------------------

fn after_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    line.find(label).map(|at| &line[at + label.len()..])
}

/// Jail names from `fail2ban-client status`:
///
/// ```text
/// Status
/// |- Number of jail:      2
/// `- Jail list:   sshd, postfix-sasl
/// ```
pub fn parse_jail_list(output: &str) -> Vec<String> {
    output
        .lines()
        .find_map(|line| after_label(line, "Jail list:"))
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

static COUNTER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(Currently failed|Total failed|Currently banned|Total banned):\s*(\d+)")
        .expect("counter pattern must compile")
});

/// Counters from `fail2ban-client status <jail>`. Missing counters stay 0.
pub fn parse_jail_status(jail: &str, output: &str) -> JailStatus {
    let mut status = JailStatus {
        name: jail.to_string(),
        ..JailStatus::default()
    };

    for line in output.lines() {
        let Some(caps) = COUNTER_LINE.captures(line) else {
            continue;
        };
        let Ok(value) = caps[2].parse::<u64>() else {
            continue;
        };
        match &caps[1] {
            "Currently failed" => status.currently_failed = value,
            "Total failed" => status.total_failed = value,
            "Currently banned" => status.currently_banned = value,
            "Total banned" => status.total_banned = value,
            _ => {}
        }
    }
    status
}

/// Addresses on the `Banned IP list:` line of `fail2ban-client status <jail>`.
pub fn parse_banned_ips(output: &str) -> Vec<String> {
    output
        .lines()
        .find_map(|line| after_label(line, "Banned IP list:"))
        .map(|list| list.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

static FOUND_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Found\s+(\d+\.\d+\.\d+\.\d+)").expect("found pattern must compile")
});

/// Failure counts from fail2ban's own log lines for one jail, e.g.
/// `2024-01-27 10:00:01,123 fail2ban.filter [811]: INFO [sshd] Found 1.2.3.4 - 2024-01-27 10:00:01`.
/// Ranked by count descending, ties in first-seen order.
pub fn parse_failed_ips(log: &str, limit: usize) -> Vec<FailedIpRecord> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut records: Vec<FailedIpRecord> = Vec::new();

    for line in log.lines() {
        if !line.contains("Found") {
            continue;
        }
        let Some(caps) = FOUND_LINE.captures(line) else {
            continue;
        };
        let ip = caps.get(1).map_or("", |m| m.as_str());

        match index.get(ip) {
            Some(&slot) => records[slot].fail_count += 1,
            None => {
                index.insert(ip, records.len());
                records.push(FailedIpRecord {
                    ip: ip.to_string(),
                    fail_count: 1,
                });
            }
        }
    }

    records.sort_by(|a, b| b.fail_count.cmp(&a.fail_count));
    records.truncate(limit);
    records
}

/// Attach reject counts to banned addresses (0 when unknown) and order by
/// reject count descending; equal counts keep the daemon's order.
pub fn join_reject_counts(ips: Vec<String>, counts: &HashMap<String, u64>) -> Vec<BannedIpRecord> {
    let mut records: Vec<BannedIpRecord> = ips
        .into_iter()
        .map(|ip| {
            let reject_count = counts.get(&ip).copied().unwrap_or(0);
            BannedIpRecord { ip, reject_count }
        })
        .collect();
    records.sort_by(|a, b| b.reject_count.cmp(&a.reject_count));
    records
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Log `err` and fall back to the caller's default.
fn degrade<T>(what: &str, jail: Option<&str>, result: Result<T, ProcessError>, default: T) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!(operation = what, jail, error = %err, "fail2ban call degraded");
            default
        }
    }
}

#[derive(Clone)]
pub struct Fail2banClient {
    runner: Arc<dyn CommandRunner>,
    activity_log: String,
}

impl Fail2banClient {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_activity_log(runner, DEFAULT_FAIL2BAN_LOG)
    }

    pub fn with_activity_log(runner: Arc<dyn CommandRunner>, activity_log: impl Into<String>) -> Self {
        Self {
            runner,
            activity_log: activity_log.into(),
        }
    }

    async fn client(&self, args: &[&str]) -> Result<String, ProcessError> {
        self.runner
            .run("fail2ban-client", args, COMMAND_TIMEOUT)
            .await
            .map(|out| out.trim().to_string())
    }

    pub async fn list_jails(&self) -> Vec<String> {
        let output = self.client(&["status"]).await.map(|out| parse_jail_list(&out));
        degrade("list_jails", None, output, Vec::new())
    }

    /// `None` only when the daemon rejects the jail (or can't be reached).
    pub async fn get_status(&self, jail: &str) -> Option<JailStatus> {
        let output = self
            .client(&["status", jail])
            .await
            .map(|out| Some(parse_jail_status(jail, &out)));
        degrade("get_status", Some(jail), output, None)
    }

    /// Banned addresses as listed by the daemon, without counters.
    pub async fn list_banned_ips(&self, jail: &str) -> Vec<String> {
        let output = self
            .client(&["status", jail])
            .await
            .map(|out| parse_banned_ips(&out));
        degrade("list_banned_ips", Some(jail), output, Vec::new())
    }

    /// Banned addresses with firewall reject counts, busiest first.
    pub async fn banned_ips(&self, jail: &str) -> Vec<BannedIpRecord> {
        let ips = self.list_banned_ips(jail).await;
        if ips.is_empty() {
            return Vec::new();
        }
        let counts = iptables::correlate(self.runner.as_ref(), jail).await;
        join_reject_counts(ips, &counts)
    }

    /// Addresses fail2ban reported as failing in its activity log.
    pub async fn failed_ips(&self, jail: &str) -> Vec<FailedIpRecord> {
        let needle = format!("[{jail}]");
        let output = self
            .runner
            .run(
                "grep",
                &["-F", needle.as_str(), self.activity_log.as_str()],
                COMMAND_TIMEOUT,
            )
            .await
            .map(|log| parse_failed_ips(&log, FAILED_IPS_LIMIT));
        degrade("failed_ips", Some(jail), output, Vec::new())
    }

    pub async fn reject_histogram(&self, jail: &str) -> Histogram {
        let counts: Vec<u64> = self
            .banned_ips(jail)
            .await
            .iter()
            .map(|record| record.reject_count)
            .collect();
        histogram::bucket(&counts)
    }

    /// True when `fail2ban-client` accepted the command. The jail is not
    /// re-read to confirm the ban took effect.
    pub async fn ban(&self, jail: &str, ip: &str) -> bool {
        let output = self.client(&["set", jail, "banip", ip]).await.map(|_| true);
        degrade("ban", Some(jail), output, false)
    }

    pub async fn unban(&self, jail: &str, ip: &str) -> bool {
        let output = self.client(&["set", jail, "unbanip", ip]).await.map(|_| true);
        degrade("unban", Some(jail), output, false)
    }
}
