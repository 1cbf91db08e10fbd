//! Jail categories, their candidate log files and IP extraction patterns.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Log family a jail reads from. Resolution from a free-form jail name is
/// total: anything unrecognised is treated as `Sshd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JailCategory {
    Sshd,
    PostfixSasl,
    Postfix,
    Dovecot,
    NginxHttpAuth,
    NginxBotsearch,
    ApacheAuth,
}

impl JailCategory {
    /// Registration order. `PostfixSasl` must precede `Postfix` so that
    /// "postfix-sasl" jails don't resolve to the broader key.
    pub const ALL: [JailCategory; 7] = [
        JailCategory::Sshd,
        JailCategory::PostfixSasl,
        JailCategory::Postfix,
        JailCategory::Dovecot,
        JailCategory::NginxHttpAuth,
        JailCategory::NginxBotsearch,
        JailCategory::ApacheAuth,
    ];

    pub fn key(self) -> &'static str {
        match self {
            JailCategory::Sshd => "sshd",
            JailCategory::PostfixSasl => "postfix-sasl",
            JailCategory::Postfix => "postfix",
            JailCategory::Dovecot => "dovecot",
            JailCategory::NginxHttpAuth => "nginx-http-auth",
            JailCategory::NginxBotsearch => "nginx-botsearch",
            JailCategory::ApacheAuth => "apache-auth",
        }
    }

    /// Candidate log files, probed in order.
    pub fn log_paths(self) -> &'static [&'static str] {
        match self {
            JailCategory::Sshd => &["/var/log/auth.log", "/var/log/secure"],
            JailCategory::PostfixSasl | JailCategory::Postfix => {
                &["/var/log/mail.log", "/var/log/maillog"]
            }
            JailCategory::Dovecot => &["/var/log/mail.log", "/var/log/dovecot.log"],
            JailCategory::NginxHttpAuth => &["/var/log/nginx/error.log"],
            JailCategory::NginxBotsearch => &["/var/log/nginx/access.log"],
            JailCategory::ApacheAuth => &["/var/log/apache2/error.log", "/var/log/httpd/error_log"],
        }
    }

    fn pattern_sources(self) -> &'static [&'static str] {
        match self {
            JailCategory::Sshd => &[
                r"Failed password for .* from (\d+\.\d+\.\d+\.\d+)",
                r"Failed password for invalid user .* from (\d+\.\d+\.\d+\.\d+)",
                r"Invalid user .* from (\d+\.\d+\.\d+\.\d+)",
                r"Connection closed by authenticating user .* (\d+\.\d+\.\d+\.\d+)",
                r"Disconnected from authenticating user .* (\d+\.\d+\.\d+\.\d+)",
            ],
            JailCategory::PostfixSasl => &[
                r"warning: .*\[(\d+\.\d+\.\d+\.\d+)\]: SASL .* authentication failed",
                r"SASL LOGIN authentication failed: .* \[(\d+\.\d+\.\d+\.\d+)\]",
            ],
            JailCategory::Postfix => &[
                r"NOQUEUE: reject: .* from .*\[(\d+\.\d+\.\d+\.\d+)\]",
                r"warning: .*\[(\d+\.\d+\.\d+\.\d+)\]",
            ],
            JailCategory::Dovecot => &[
                r"auth failed, (\d+\.\d+\.\d+\.\d+)",
                r"Aborted login .* rip=(\d+\.\d+\.\d+\.\d+)",
            ],
            JailCategory::NginxHttpAuth => &[
                r"no user/password was provided .* client: (\d+\.\d+\.\d+\.\d+)",
                r"user .* was not found .* client: (\d+\.\d+\.\d+\.\d+)",
                r"password mismatch .* client: (\d+\.\d+\.\d+\.\d+)",
            ],
            JailCategory::NginxBotsearch => &[
                r#"(\d+\.\d+\.\d+\.\d+) .* "(?:GET|POST) .*(?:\.php|wp-|admin|\.env|\.git)"#,
            ],
            JailCategory::ApacheAuth => &[
                r"\[client (\d+\.\d+\.\d+\.\d+)\] .* authentication failure",
                r"AH01617: user .* authentication failure .* (\d+\.\d+\.\d+\.\d+)",
            ],
        }
    }

    /// Compiled extraction patterns. Each has exactly one capture group: the
    /// source IPv4 address.
    pub fn patterns(self) -> &'static [Regex] {
        COMPILED
            .get(&self)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl fmt::Display for JailCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

static COMPILED: Lazy<HashMap<JailCategory, Vec<Regex>>> = Lazy::new(|| {
    JailCategory::ALL
        .iter()
        .map(|&category| {
            let regexes = category
                .pattern_sources()
                .iter()
                .map(|src| Regex::new(src).expect("built-in pattern must compile"))
                .collect();
            (category, regexes)
        })
        .collect()
});

/// Resolve a jail name to its category: first registered key that occurs as
/// a substring of the lowercased name, else `Sshd`.
pub fn resolve(jail_name: &str) -> JailCategory {
    let name = jail_name.to_lowercase();
    JailCategory::ALL
        .into_iter()
        .find(|category| name.contains(category.key()))
        .unwrap_or(JailCategory::Sshd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_fall_back_to_sshd() {
        for name in ["", "recidive", "custom-jail", "SSH", "exim"] {
            assert_eq!(resolve(name), JailCategory::Sshd, "{name}");
        }
    }

    #[test]
    fn resolution_is_substring_and_case_insensitive() {
        assert_eq!(resolve("sshd"), JailCategory::Sshd);
        assert_eq!(resolve("Postfix-SASL"), JailCategory::PostfixSasl);
        assert_eq!(resolve("postfix"), JailCategory::Postfix);
        assert_eq!(resolve("postfix-rbl"), JailCategory::Postfix);
        assert_eq!(resolve("dovecot-imap"), JailCategory::Dovecot);
        assert_eq!(resolve("my-nginx-http-auth"), JailCategory::NginxHttpAuth);
        assert_eq!(resolve("nginx-botsearch"), JailCategory::NginxBotsearch);
        assert_eq!(resolve("apache-auth"), JailCategory::ApacheAuth);
    }

    #[test]
    fn first_registered_key_wins() {
        // contains both "sshd" and "postfix"; sshd is registered first
        assert_eq!(resolve("sshd-postfix"), JailCategory::Sshd);
    }

    #[test]
    fn every_pattern_compiles_with_one_group() {
        for category in JailCategory::ALL {
            let patterns = category.patterns();
            assert!(!patterns.is_empty(), "{category}");
            for re in patterns {
                assert_eq!(re.captures_len(), 2, "{category}: {}", re.as_str());
            }
            assert!(!category.log_paths().is_empty());
        }
    }

    #[test]
    fn botsearch_pattern_captures_client_address() {
        let line = r#"203.0.113.9 - - [10/Oct/2024:13:55:36 +0000] "GET /wp-login.php HTTP/1.1" 404 153"#;
        let caps = JailCategory::NginxBotsearch.patterns()[0]
            .captures(line)
            .expect("match");
        assert_eq!(&caps[1], "203.0.113.9");
    }
}
