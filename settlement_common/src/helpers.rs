use std::{env, str::FromStr, time::Duration};

use log::*;
use rust_decimal::Decimal;

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Reads a boolean flag from the environment variable `name`.
pub fn env_flag(name: &str, default: bool) -> bool {
    parse_boolean_flag(env::var(name).ok(), default)
}

/// Reads a decimal value from the environment. Unset variables yield `None`. Values that do not parse are logged and
/// also yield `None`, so that a typo never silently becomes zero.
pub fn env_decimal(name: &str) -> Option<Decimal> {
    let raw = env::var(name).ok()?;
    match Decimal::from_str(raw.trim()) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("🪛️ Ignoring invalid decimal value for {name} ({raw}): {e}");
            None
        },
    }
}

/// Reads a duration, expressed in whole seconds, from the environment, falling back to `default`.
pub fn env_duration_secs(name: &str, default: Duration) -> Duration {
    match env::var(name) {
        Ok(s) => s.trim().parse::<u64>().map(Duration::from_secs).unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {name} ({s}): {e}. Using {}s.", default.as_secs());
            default
        }),
        Err(_) => default,
    }
}
