//! Process configuration from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use campus_infra::AuditSettings;
use campus_observability::LogFormat;

const DEV_JWT_SECRET: &str = "dev-secret";

/// Upper bound for `AUDIT_RETENTION_DAYS` (one hundred years).
pub const MAX_RETENTION_DAYS: u32 = 36_500;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// `None` runs on in-memory stores.
    pub database_url: Option<String>,
    pub audit: AuditSettings,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source (tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_addr = match var("BIND_ADDR") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                name: "BIND_ADDR",
                expected: "a socket address",
                value: v,
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string());

        let defaults = AuditSettings::default();
        let retention_days = match var("AUDIT_RETENTION_DAYS") {
            Some(v) => match parse_number(Some(v.clone()), "AUDIT_RETENTION_DAYS")? {
                Some(days) if days <= u64::from(MAX_RETENTION_DAYS) => days as u32,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "AUDIT_RETENTION_DAYS",
                        expected: "a number of days between 1 and 36500",
                        value: v,
                    });
                }
            },
            None => defaults.retention_days,
        };
        let purge_interval = parse_number(var("AUDIT_PURGE_INTERVAL_SECS"), "AUDIT_PURGE_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.purge_interval);
        let write_timeout = parse_number(var("AUDIT_WRITE_TIMEOUT_MS"), "AUDIT_WRITE_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.write_timeout);

        let log_format = match var("LOG_FORMAT") {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                name: "LOG_FORMAT",
                expected: "json or pretty",
                value: v,
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            database_url: var("DATABASE_URL"),
            audit: AuditSettings {
                retention_days,
                purge_interval,
                write_timeout,
            },
            log_format,
        })
    }
}

impl AppConfig {
    /// True when no `JWT_SECRET` was configured.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

fn parse_number(value: Option<String>, name: &'static str) -> Result<Option<u64>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 && n <= u64::from(u32::MAX) => Ok(Some(n)),
        _ => Err(ConfigError::Invalid {
            name,
            expected: "a positive integer",
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.audit, AuditSettings::default());
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("DATABASE_URL", "postgres://localhost/campus"),
            ("AUDIT_RETENTION_DAYS", "30"),
            ("AUDIT_WRITE_TIMEOUT_MS", "500"),
            ("LOG_FORMAT", "pretty"),
        ])
        .unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/campus"));
        assert_eq!(cfg.audit.retention_days, 30);
        assert_eq!(cfg.audit.write_timeout, Duration::from_millis(500));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = config(&[("AUDIT_RETENTION_DAYS", "forever")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "AUDIT_RETENTION_DAYS", .. }));
        assert!(config(&[("AUDIT_PURGE_INTERVAL_SECS", "0")]).is_err());
    }

    #[test]
    fn retention_is_capped() {
        let cfg = config(&[("AUDIT_RETENTION_DAYS", "36500")]).unwrap();
        assert_eq!(cfg.audit.retention_days, MAX_RETENTION_DAYS);

        for days in ["36501", "4294967295"] {
            let err = config(&[("AUDIT_RETENTION_DAYS", days)]).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { name: "AUDIT_RETENTION_DAYS", .. }));
        }
    }
}
