//! Application configuration loaded from environment variables.

use chrono::Duration;
use reconciliation::{LedgerFailurePolicy, ReconcileOptions};

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory stores when unset
/// - `LEDGER_FAILURE_POLICY`: `fail_closed` or `fail_open` (default: `fail_closed`)
/// - `CLAIM_LEASE_SECS`: claim lease for a reconciliation pass (default: `60`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub ledger_failure_policy: LedgerFailurePolicy,
    pub claim_lease_secs: i64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    ///
    /// An unrecognised ledger policy falls back to `fail_closed`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            ledger_failure_policy: std::env::var("LEDGER_FAILURE_POLICY")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.ledger_failure_policy),
            claim_lease_secs: std::env::var("CLAIM_LEASE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &i64| *secs > 0)
                .unwrap_or(defaults.claim_lease_secs),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds the reconciliation options described by this configuration.
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions::new(
            self.ledger_failure_policy,
            Duration::seconds(self.claim_lease_secs),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            ledger_failure_policy: LedgerFailurePolicy::FailClosed,
            claim_lease_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
        assert_eq!(config.ledger_failure_policy, LedgerFailurePolicy::FailClosed);
        assert_eq!(config.claim_lease_secs, 60);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_reconcile_options() {
        let config = Config {
            ledger_failure_policy: LedgerFailurePolicy::FailOpen,
            claim_lease_secs: 15,
            ..Config::default()
        };
        let options = config.reconcile_options();
        assert_eq!(options.ledger_failure_policy, LedgerFailurePolicy::FailOpen);
        assert_eq!(options.claim_lease, Duration::seconds(15));
    }
}
