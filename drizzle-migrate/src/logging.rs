//! Logging setup for drizzle-kit.
//!
//! The engine logs through `tracing`; nothing is printed unless a subscriber is
//! installed. [`init`] installs one, controlled by:
//!
//! - `DRIZZLE_DEBUG=true|1|yes` - debug level
//! - `DRIZZLE_LOG_LEVEL=trace|debug|info|warn|error` - explicit level
//! - `DRIZZLE_LOG_FORMAT=json|pretty|compact` - output format (default: json)
//!
//! ```rust,no_run
//! drizzle_migrate::logging::init();
//! ```
//!
//! The `verbose` config flag calls [`init_verbose`], which raises the level
//! to `info` unless the environment asks for more.

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Whether `DRIZZLE_DEBUG` asks for debug output.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("DRIZZLE_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Level from `DRIZZLE_LOG_LEVEL`, falling back to `debug` or `warn`.
pub fn get_log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    match env::var("DRIZZLE_LOG_LEVEL") {
        Ok(level) => match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

/// Format from `DRIZZLE_LOG_FORMAT`.
pub fn get_log_format() -> &'static str {
    env::var("DRIZZLE_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

/// Level the subscriber is installed with. `verbose` lifts the default `warn`
/// to `info`; an explicit environment level wins.
pub fn effective_level(verbose: bool) -> &'static str {
    match get_log_level() {
        "warn" if verbose => "info",
        level => level,
    }
}

/// Install the global subscriber. Subsequent calls are no-ops.
pub fn init() {
    init_inner(false);
}

/// Install the global subscriber, at `info` level when `verbose` is set.
///
/// `verbose` mirrors the config flag of the same name.
pub fn init_verbose(verbose: bool) {
    init_inner(verbose);
}

fn init_inner(verbose: bool) {
    // Nothing asked for output; leave the slot free for a later call.
    if !verbose && !is_debug_enabled() && env::var("DRIZZLE_LOG_LEVEL").is_err() {
        return;
    }

    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = effective_level(verbose);
            let filter = EnvFilter::try_new(format!(
                "drizzle_kit={},drizzle_migrate={},drizzle_schema={}",
                level, level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            match get_log_format() {
                "json" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().json())
                        .init();
                }
                "compact" => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().compact())
                        .init();
                }
                _ => {
                    tracing_subscriber::registry()
                        .with(filter)
                        .with(fmt::layer().pretty())
                        .init();
                }
            }

            tracing::info!(level = level, format = get_log_format(), "Logging initialized");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_default() {
        // SAFETY: Test runs in isolation
        unsafe {
            env::remove_var("DRIZZLE_DEBUG");
            env::remove_var("DRIZZLE_LOG_LEVEL");
        }
        assert!(!is_debug_enabled());
        assert_eq!(get_log_level(), "warn");
    }

    #[test]
    fn test_verbose_raises_default_level() {
        // SAFETY: Test runs in isolation
        unsafe {
            env::remove_var("DRIZZLE_DEBUG");
            env::remove_var("DRIZZLE_LOG_LEVEL");
        }
        assert_eq!(effective_level(false), "warn");
        assert_eq!(effective_level(true), "info");
    }

    #[test]
    fn test_log_format_default() {
        // SAFETY: Test runs in isolation
        unsafe {
            env::remove_var("DRIZZLE_LOG_FORMAT");
        }
        assert_eq!(get_log_format(), "json");
    }
}
