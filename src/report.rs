//! One-shot jail report for the terminal.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::activity::{self, AttackSummary, DEFAULT_LIMIT};
use crate::fail2ban::{BannedIpRecord, Fail2banClient, FailedIpRecord, JailStatus};
use crate::histogram::{self, Histogram};
use crate::log_reader::LogReader;

#[derive(Debug, Serialize)]
pub struct JailReport {
    pub generated_at: DateTime<Utc>,
    pub jail: String,
    pub status: Option<JailStatus>,
    pub banned_ips: Vec<BannedIpRecord>,
    pub failed_ips: Vec<FailedIpRecord>,
    pub reject_histogram: Histogram,
    pub log_activity: AttackSummary,
}

pub async fn build_report(fail2ban: &Fail2banClient, logs: &LogReader, jail: &str) -> JailReport {
    let status = fail2ban.get_status(jail).await;
    let banned_ips = fail2ban.banned_ips(jail).await;
    let failed_ips = fail2ban.failed_ips(jail).await;

    let counts: Vec<u64> = banned_ips.iter().map(|r| r.reject_count).collect();
    let reject_histogram = histogram::bucket(&counts);

    let (category, lines) = logs.recent_lines(jail).await;
    let records = activity::extract(
        lines.iter().map(String::as_str),
        category.patterns(),
        DEFAULT_LIMIT,
    );

    JailReport {
        generated_at: Utc::now(),
        jail: jail.to_string(),
        status,
        banned_ips,
        failed_ips,
        reject_histogram,
        log_activity: AttackSummary::from_records(&records),
    }
}

pub fn render_text_report(report: &JailReport, top_n: usize) -> String {
    let mut out = String::new();
    let mut line = |text: String| {
        out.push_str(&text);
        out.push('\n');
    };

    line(format!("=== FAIL2BAN JAIL REPORT: {} ===\n", report.jail));
    line(format!("Generated: {}\n", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")));

    match &report.status {
        Some(status) => {
            line("STATUS:".to_string());
            line(format!("  Currently failed: {}", status.currently_failed));
            line(format!("  Total failed: {}", status.total_failed));
            line(format!("  Currently banned: {}", status.currently_banned));
            line(format!("  Total banned: {}", status.total_banned));
        }
        None => line("STATUS: jail not found".to_string()),
    }
    line(String::new());

    line(format!("TOP {} BANNED IPs (by rejects):", top_n));
    for record in report.banned_ips.iter().take(top_n) {
        line(format!("  {}: {} rejects", record.ip, record.reject_count));
    }
    line(String::new());

    if !report.reject_histogram.is_empty() {
        line("REJECT DISTRIBUTION:".to_string());
        for (label, count) in report
            .reject_histogram
            .labels
            .iter()
            .zip(&report.reject_histogram.data)
        {
            line(format!("  {}: {} IPs", label, count));
        }
        line(String::new());
    }

    if !report.failed_ips.is_empty() {
        line(format!("TOP {} FAILING IPs:", top_n));
        for record in report.failed_ips.iter().take(top_n) {
            line(format!("  {}: {} failures", record.ip, record.fail_count));
        }
        line(String::new());
    }

    let summary = &report.log_activity;
    line("LOG ACTIVITY:".to_string());
    line(format!("  Distinct IPs: {}", summary.total_ips));
    line(format!("  Attempts: {}", summary.total_attempts));
    for record in summary.top_attackers.iter().take(top_n) {
        line(format!(
            "  {}: {} attempts (last seen {})",
            record.ip,
            record.count,
            record.last_seen.as_deref().unwrap_or("unknown")
        ));
    }

    out
}
