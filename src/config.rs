use std::net::SocketAddr;

use clap::Args;

use crate::fail2ban::DEFAULT_FAIL2BAN_LOG;
use crate::geoip::{DEFAULT_CACHE_CAPACITY, DEFAULT_GEOIP_URL};

/// Settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Address the dashboard listens on
    #[arg(long, env = "F2B_DASHBOARD_BIND", default_value = "0.0.0.0:5000", global = true)]
    pub bind: SocketAddr,

    /// Dashboard login name
    #[arg(long, env = "ADMIN_USERNAME", default_value = "admin", global = true)]
    pub admin_username: String,

    /// Dashboard login password
    #[arg(long, env = "ADMIN_PASSWORD", default_value = "admin", hide_env_values = true, global = true)]
    pub admin_password: String,

    /// Base URL of the geolocation service; the IP is appended
    #[arg(long, env = "GEOIP_URL", default_value = DEFAULT_GEOIP_URL, global = true)]
    pub geoip_url: String,

    /// Number of geolocation results kept in memory
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY, global = true)]
    pub geoip_cache_size: usize,

    /// fail2ban's own activity log
    #[arg(long, default_value = DEFAULT_FAIL2BAN_LOG, global = true)]
    pub fail2ban_log: String,

    /// Run privileged tools directly instead of through sudo
    #[arg(long, global = true)]
    pub no_sudo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
            admin_username: "admin".to_string(),
            admin_password: "admin".to_string(),
            geoip_url: DEFAULT_GEOIP_URL.to_string(),
            geoip_cache_size: DEFAULT_CACHE_CAPACITY,
            fail2ban_log: DEFAULT_FAIL2BAN_LOG.to_string(),
            no_sudo: false,
        }
    }
}
