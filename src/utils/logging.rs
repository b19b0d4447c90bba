//! Structured Logging with Key Material Redaction
//!
//! Every log line emitted by the signing core goes through `LogEntry`,
//! which redacts:
//! - Private keys, tweaked keys, seeds, chain codes, extended private keys
//! - Addresses (partial)
//! - Transaction ids and sighashes (partial)

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Global flag to enable/disable debug logging
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable debug logging
pub fn enable_debug() {
    DEBUG_ENABLED.store(true, Ordering::SeqCst);
}

/// Disable debug logging
pub fn disable_debug() {
    DEBUG_ENABLED.store(false, Ordering::SeqCst);
}

/// Check if debug logging is enabled
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::SeqCst)
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Structured log entry
#[derive(Debug)]
pub struct LogEntry {
    pub level: LogLevel,
    pub module: &'static str,
    pub message: String,
    pub fields: Vec<(&'static str, String)>,
}

impl LogEntry {
    pub fn new(level: LogLevel, module: &'static str, message: impl Into<String>) -> Self {
        Self {
            level,
            module,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field; redaction is chosen from the key name
    pub fn field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        let redacted = redact_for_key(key, &value.to_string());
        self.fields.push((key, redacted));
        self
    }

    /// Add a field that is always fully redacted
    pub fn secret_field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        let redacted = redact_value(&value.to_string());
        self.fields.push((key, redacted));
        self
    }

    /// Render the line without timestamp
    pub fn render(&self) -> String {
        let fields_str = self
            .fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");

        if fields_str.is_empty() {
            format!("{} [{}] {}", self.level, self.module, self.message)
        } else {
            format!("{} [{}] {} | {}", self.level, self.module, self.message, fields_str)
        }
    }

    /// Emit the entry on stderr
    pub fn log(self) {
        if self.level == LogLevel::Debug && !is_debug_enabled() {
            return;
        }

        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
        eprintln!("[{}] {}", timestamp, self.render());
    }
}

const SECRET_KEYS: &[&str] = &[
    "private", "secret", "seed", "mnemonic", "wif", "xprv", "chain_code", "tweaked", "passphrase",
];

const ADDRESS_KEYS: &[&str] = &["address", "recipient", "sender", "from", "to", "contract"];

const HASH_KEYS: &[&str] = &["txid", "hash", "sighash"];

/// Pick a redaction strategy based on the field name
fn redact_for_key(key: &str, value: &str) -> String {
    let key_lower = key.to_lowercase();

    if SECRET_KEYS.iter().any(|k| key_lower.contains(k)) {
        return redact_value(value);
    }
    if ADDRESS_KEYS.iter().any(|k| key_lower.contains(k)) {
        return redact_address(value);
    }
    if HASH_KEYS.iter().any(|k| key_lower.contains(k)) {
        return redact_hash(value);
    }

    value.to_string()
}

/// Fully redact a sensitive value
fn redact_value(value: &str) -> String {
    match value.len() {
        0 => "[EMPTY]".to_string(),
        1..=4 => "[REDACTED]".to_string(),
        len => format!("[REDACTED:{}chars]", len),
    }
}

/// Partially redact an address (prefix and last 4 chars)
fn redact_address(address: &str) -> String {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return "[EMPTY]".to_string();
    }

    let prefix_len = if trimmed.starts_with("0x") { 8 } else { 6 };
    let suffix_len = 4;
    if trimmed.len() <= prefix_len + suffix_len + 3 {
        return redact_value(trimmed);
    }

    format!(
        "{}...{}",
        &trimmed[..prefix_len],
        &trimmed[trimmed.len() - suffix_len..]
    )
}

/// Partially redact a hash (prefix and last 6 chars)
fn redact_hash(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() <= 20 {
        return trimmed.to_string();
    }

    let prefix_len = if trimmed.starts_with("0x") { 12 } else { 10 };
    format!("{}...{}", &trimmed[..prefix_len], &trimmed[trimmed.len() - 6..])
}

/// Convenience macro for debug logging
#[macro_export]
macro_rules! log_debug {
    ($module:expr, $msg:expr) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Debug,
            $module,
            $msg
        ).log()
    };
    ($module:expr, $msg:expr, $($key:ident = $value:expr),* $(,)?) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Debug,
            $module,
            $msg
        )
        $(.field(stringify!($key), &$value))*
        .log()
    };
}

/// Convenience macro for info logging
#[macro_export]
macro_rules! log_info {
    ($module:expr, $msg:expr) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Info,
            $module,
            $msg
        ).log()
    };
    ($module:expr, $msg:expr, $($key:ident = $value:expr),* $(,)?) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Info,
            $module,
            $msg
        )
        $(.field(stringify!($key), &$value))*
        .log()
    };
}

/// Convenience macro for warning logging
#[macro_export]
macro_rules! log_warn {
    ($module:expr, $msg:expr) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Warn,
            $module,
            $msg
        ).log()
    };
    ($module:expr, $msg:expr, $($key:ident = $value:expr),* $(,)?) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Warn,
            $module,
            $msg
        )
        $(.field(stringify!($key), &$value))*
        .log()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_value() {
        assert_eq!(redact_value(""), "[EMPTY]");
        assert_eq!(redact_value("abc"), "[REDACTED]");
        assert_eq!(redact_value("0123456789abcdef"), "[REDACTED:16chars]");
    }

    #[test]
    fn test_redact_taproot_address() {
        let addr = "bc1p5p6ptfzjfm4dy6vey8zcqk747cnqa35cwggza6fd6qw7g0mucqnq5l6jnc";
        let redacted = redact_address(addr);
        assert_eq!(redacted, "bc1p5p...6jnc");
    }

    #[test]
    fn test_key_material_never_logged() {
        let entry = LogEntry::new(LogLevel::Info, "test", "signing")
            .field("tweaked_key", "aa".repeat(32))
            .field("seed_hex", "00".repeat(64))
            .field("chain_code", "11".repeat(32))
            .field("inputs", 2);

        let line = entry.render();
        assert!(!line.contains(&"aa".repeat(32)));
        assert!(!line.contains(&"00".repeat(64)));
        assert!(line.contains("inputs=2"));
        assert!(line.contains("[REDACTED:64chars]"));
    }

    #[test]
    fn test_hash_partial() {
        let txid = "b00771c6acc9d84e503edb1cab32325dee4d261762e84d23fb11fab26143ff18";
        let line = LogEntry::new(LogLevel::Debug, "btc", "built").field("txid", txid).render();
        assert!(line.contains("b00771c6ac...43ff18"));
    }

    #[test]
    fn test_debug_flag() {
        enable_debug();
        assert!(is_debug_enabled());
        disable_debug();
        assert!(!is_debug_enabled());
    }
}
