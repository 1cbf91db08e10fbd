use serde::Serialize;

/// Tailwind class names used by the dashboard for one jail card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JailColor {
    pub bg: &'static str,
    pub border: &'static str,
    pub text: &'static str,
}

const fn scheme(bg: &'static str, border: &'static str, text: &'static str) -> JailColor {
    JailColor { bg, border, text }
}

const SCHEMES: [(&str, JailColor); 7] = [
    ("sshd", scheme("bg-blue-500", "border-blue-600", "text-blue-600")),
    ("postfix-sasl", scheme("bg-green-500", "border-green-600", "text-green-600")),
    ("postfix", scheme("bg-emerald-500", "border-emerald-600", "text-emerald-600")),
    ("nginx-http-auth", scheme("bg-orange-500", "border-orange-600", "text-orange-600")),
    ("nginx-botsearch", scheme("bg-amber-500", "border-amber-600", "text-amber-600")),
    ("apache-auth", scheme("bg-red-500", "border-red-600", "text-red-600")),
    ("dovecot", scheme("bg-cyan-500", "border-cyan-600", "text-cyan-600")),
];

const DEFAULT_SCHEME: JailColor = scheme("bg-purple-500", "border-purple-600", "text-purple-600");

pub fn color_for(jail: &str) -> JailColor {
    let name = jail.to_lowercase();
    SCHEMES
        .iter()
        .find(|(key, _)| name.contains(key))
        .map(|(_, color)| *color)
        .unwrap_or(DEFAULT_SCHEME)
}
