use once_cell::sync::Lazy;
use std::time::Duration;

use crate::billing::ReplacementPolling;

/// Base URL of the remote billing API, e.g. `https://erp.example.com/webservice/v1`.
pub static BILLING_API_BASE_URL: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("BILLING_API_BASE_URL"));

/// `Authorization` header value sent verbatim on every billing call.
pub static BILLING_API_TOKEN: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("BILLING_API_TOKEN"));

/// Per-request timeout for billing calls. Defaults to 30 seconds.
pub static BILLING_API_TIMEOUT: Lazy<Duration> = Lazy::new(|| {
    std::env::var("BILLING_API_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(30))
});

/// Replacement invoice polling budget. Defaults to 8 attempts, 2000ms apart.
pub static REPLACEMENT_POLLING: Lazy<ReplacementPolling> = Lazy::new(|| {
    let defaults = ReplacementPolling::default();
    let attempts = std::env::var("REPLACEMENT_POLL_ATTEMPTS")
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(defaults.attempts);
    let delay = std::env::var("REPLACEMENT_POLL_DELAY_MS")
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(defaults.delay);
    ReplacementPolling { attempts, delay }
});

/// Address the HTTP server should bind to. Defaults to `0.0.0.0`.
pub static BIND_ADDRESS: Lazy<String> =
    Lazy::new(|| std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()));

/// Port the HTTP server should listen on. Defaults to `3000`.
pub static BIND_PORT: Lazy<u16> = Lazy::new(|| {
    std::env::var("BIND_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000)
});

fn read_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
