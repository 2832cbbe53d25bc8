//! Metrics definitions for the casting gate.
//!
//! All metrics follow Prometheus naming conventions:
//! - `casting_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `outcome`: 8 values (`authorized` plus one per error kind)
//! - `status`: 2 values (success, error)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Authorization decisions: signature check plus a warm cache lookup
        .set_buckets_for_metric(
            Matcher::Prefix("casting_auth".to_string()),
            &[
                0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set authorization buckets: {e}"))?
        // JWKS fetches: outbound HTTP to the issuer
        .set_buckets_for_metric(
            Matcher::Prefix("casting_jwks_refresh".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set JWKS refresh buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record an authorization decision.
///
/// Metric: `casting_auth_decisions_total`, `casting_auth_duration_seconds`
/// Labels: `outcome` (`authorized` or the error kind)
pub fn record_authorization(outcome: &str, duration: Duration) {
    histogram!("casting_auth_duration_seconds").record(duration.as_secs_f64());

    counter!("casting_auth_decisions_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a JWKS fetch.
///
/// Metric: `casting_jwks_refresh_total`, `casting_jwks_refresh_duration_seconds`
/// Labels: `status`
pub fn record_jwks_refresh(status: &str, duration: Duration) {
    histogram!("casting_jwks_refresh_duration_seconds",
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("casting_jwks_refresh_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Set the number of signing keys currently cached.
///
/// Metric: `casting_jwks_keys_cached`
pub fn set_jwks_keys_cached(count: usize) {
    gauge!("casting_jwks_keys_cached").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AuthErrorKind;

    // These run against the global no-op recorder; they only check that
    // recording never panics without an installed recorder.

    #[test]
    fn test_record_authorization() {
        record_authorization("authorized", Duration::from_micros(800));

        for kind in [
            AuthErrorKind::MissingOrMalformedHeader,
            AuthErrorKind::MalformedToken,
            AuthErrorKind::InvalidSignature,
            AuthErrorKind::ExpiredToken,
            AuthErrorKind::InvalidClaims,
            AuthErrorKind::InsufficientPermission,
            AuthErrorKind::KeySourceUnavailable,
        ] {
            record_authorization(kind.as_str(), Duration::from_millis(1));
        }
    }

    #[test]
    fn test_record_jwks_refresh() {
        record_jwks_refresh("success", Duration::from_millis(120));
        record_jwks_refresh("error", Duration::from_secs(10));
    }

    #[test]
    fn test_set_jwks_keys_cached() {
        set_jwks_keys_cached(2);
        set_jwks_keys_cached(0);
    }
}
