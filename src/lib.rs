//! Web dashboard for fail2ban: jail status, banned and failing addresses,
//! firewall reject counters and log activity, with manual ban / unban.

pub mod activity;
pub mod colors;
pub mod config;
pub mod error;
pub mod fail2ban;
pub mod geoip;
pub mod histogram;
pub mod iptables;
pub mod log_reader;
pub mod patterns;
pub mod report;
pub mod runner;
pub mod web;
