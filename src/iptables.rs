//! Per-IP reject counters read from the firewall rules fail2ban installs.

use std::collections::HashMap;

use regex::Regex;
use tracing::warn;

use crate::error::ProcessError;
use crate::runner::{CommandRunner, COMMAND_TIMEOUT};

/// Prefix of the chain fail2ban creates for each jail.
pub const CHAIN_PREFIX: &str = "f2b-";

pub fn chain_name(jail: &str) -> String {
    format!("{CHAIN_PREFIX}{jail}")
}

/// Parse `iptables-save -c` output, e.g.
/// `[708:36816] -A f2b-postfix-sasl -s 77.83.39.180/32 -j REJECT ...`,
/// into packet counts keyed by source IP. Only single-host (`/32`) rules in
/// the jail's own chain are recognised.
pub fn parse_reject_counts(dump: &str, jail: &str) -> HashMap<String, u64> {
    let chain = chain_name(jail);
    let rule = Regex::new(&format!(
        r"\[(\d+):\d+\]\s+-A\s+{}\s+-s\s+(\d+\.\d+\.\d+\.\d+)/32\b",
        regex::escape(&chain)
    ))
    .expect("escaped chain pattern must compile");

    let mut counts = HashMap::new();
    for line in dump.lines() {
        if !line.contains(&chain) || !line.contains("REJECT") {
            continue;
        }

        if let Some(caps) = rule.captures(line) {
            if let Ok(packets) = caps[1].parse::<u64>() {
                counts.insert(caps[2].to_string(), packets);
            }
        }
    }
    counts
}

/// Dump the firewall with counters. Errors are left to the caller.
pub async fn dump_rules(runner: &dyn CommandRunner) -> Result<String, ProcessError> {
    runner.run("iptables-save", &["-c"], COMMAND_TIMEOUT).await
}

/// Reject counts for `jail`'s banned addresses; empty when the dump fails.
pub async fn correlate(runner: &dyn CommandRunner, jail: &str) -> HashMap<String, u64> {
    match dump_rules(runner).await {
        Ok(dump) => parse_reject_counts(&dump, jail),
        Err(err) => {
            warn!(jail, error = %err, "firewall dump failed, reject counts unavailable");
            HashMap::new()
        }
    }
}
