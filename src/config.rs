//! Provider selection and dispatch settings from environment variables.
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `EMAIL_PROVIDER` | Primary: `sendgrid`, `smtp`, `logger`, `logger_full`, `local` |
//! | `EMAIL_FALLBACK_PROVIDER` | Fallback: same values plus `none` |
//! | `SENDGRID_API_KEY` | SendGrid API key |
//! | `SMTP_HOST` | SMTP relay host |
//! | `SMTP_PORT` | SMTP relay port (default: 587, 465 uses implicit TLS) |
//! | `SMTP_USERNAME` | SMTP username |
//! | `SMTP_PASSWORD` | SMTP password |
//! | `EMAIL_FROM` | Default sender email (required when sendgrid or smtp is configured) |
//! | `EMAIL_FROM_NAME` | Default sender name |
//! | `EMAIL_BULK_DELAY_MS` | Delay between bulk recipients (default: 100) |
//! | `EMAIL_TIMEOUT_SECS` | Per-attempt timeout (default: 30) |
//!
//! Without `EMAIL_PROVIDER` the primary is SendGrid when `SENDGRID_API_KEY`
//! is set, otherwise SMTP when `SMTP_HOST` is set. Without
//! `EMAIL_FALLBACK_PROVIDER` the fallback is SMTP when `SMTP_HOST` is set and
//! the primary is not already SMTP, otherwise none.

use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::address::{is_valid_email, Address};
use crate::dispatch::{DispatchService, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_PACING};
use crate::error::ConfigError;
use crate::mailer::{Mailer, NoFallback};
use crate::providers::{LocalMailer, LoggerMailer};

/// One configured transport.
#[derive(Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    SendGrid {
        api_key: String,
    },
    Smtp {
        host: String,
        port: u16,
        username: Option<String>,
        password: Option<String>,
    },
    Logger {
        full: bool,
    },
    Local,
    /// No transport. Only valid as a fallback.
    None,
}

impl ProviderConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SendGrid { .. } => "sendgrid",
            Self::Smtp { .. } => "smtp",
            Self::Logger { .. } => "logger",
            Self::Local => "local",
            Self::None => "none",
        }
    }

    /// Network transports refuse messages without a sender.
    fn requires_sender(&self) -> bool {
        matches!(self, Self::SendGrid { .. } | Self::Smtp { .. })
    }

    fn from_name<F>(name: &str, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match name.trim().to_lowercase().as_str() {
            "sendgrid" => {
                if !cfg!(feature = "sendgrid") {
                    return Err(ConfigError::FeatureDisabled {
                        provider: "sendgrid",
                        feature: "sendgrid",
                    });
                }
                let api_key = lookup("SENDGRID_API_KEY")
                    .filter(|k| !k.is_empty())
                    .ok_or(ConfigError::Missing("SENDGRID_API_KEY"))?;
                Ok(Self::SendGrid { api_key })
            }
            "smtp" => {
                if !cfg!(feature = "smtp") {
                    return Err(ConfigError::FeatureDisabled {
                        provider: "smtp",
                        feature: "smtp",
                    });
                }
                let host = lookup("SMTP_HOST")
                    .filter(|h| !h.is_empty())
                    .ok_or(ConfigError::Missing("SMTP_HOST"))?;
                let port = parse_var(lookup, "SMTP_PORT", 587u16)?;
                Ok(Self::Smtp {
                    host,
                    port,
                    username: lookup("SMTP_USERNAME").filter(|u| !u.is_empty()),
                    password: lookup("SMTP_PASSWORD").filter(|p| !p.is_empty()),
                })
            }
            "logger" => Ok(Self::Logger { full: false }),
            "logger_full" => Ok(Self::Logger { full: true }),
            "local" => Ok(Self::Local),
            "none" => Ok(Self::None),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }

    /// Build the adapter. Each request gives up after `timeout`.
    pub fn build(&self, timeout: Duration) -> Result<Arc<dyn Mailer>, ConfigError> {
        match self {
            #[cfg(feature = "sendgrid")]
            Self::SendGrid { api_key } => {
                let mailer = crate::providers::SendGridMailer::with_timeout(api_key, timeout)
                    .map_err(|e| ConfigError::Transport {
                        provider: "sendgrid",
                        message: e.to_string(),
                    })?;
                Ok(Arc::new(mailer))
            }
            #[cfg(not(feature = "sendgrid"))]
            Self::SendGrid { .. } => Err(ConfigError::FeatureDisabled {
                provider: "sendgrid",
                feature: "sendgrid",
            }),

            #[cfg(feature = "smtp")]
            Self::Smtp {
                host,
                port,
                username,
                password,
            } => {
                use crate::providers::{SmtpMailer, TlsMode};

                let mut builder = SmtpMailer::new(host, *port).timeout(timeout);
                if *port == 465 {
                    builder = builder.tls(TlsMode::Tls);
                }
                if let Some(username) = username {
                    builder = builder.credentials(username, password.as_deref().unwrap_or_default());
                }
                let mailer = builder.build().map_err(|e| ConfigError::Transport {
                    provider: "smtp",
                    message: e.message,
                })?;
                Ok(Arc::new(mailer))
            }
            #[cfg(not(feature = "smtp"))]
            Self::Smtp { .. } => Err(ConfigError::FeatureDisabled {
                provider: "smtp",
                feature: "smtp",
            }),

            Self::Logger { full: false } => Ok(Arc::new(LoggerMailer::new())),
            Self::Logger { full: true } => Ok(Arc::new(LoggerMailer::full())),
            Self::Local => Ok(Arc::new(LocalMailer::new())),
            Self::None => Ok(Arc::new(NoFallback)),
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendGrid { .. } => f
                .debug_struct("SendGrid")
                .field("api_key", &"<redacted>")
                .finish(),
            Self::Smtp {
                host,
                port,
                username,
                password,
            } => f
                .debug_struct("Smtp")
                .field("host", host)
                .field("port", port)
                .field("username", username)
                .field("password", &password.as_ref().map(|_| "<redacted>"))
                .finish(),
            Self::Logger { full } => f.debug_struct("Logger").field("full", full).finish(),
            Self::Local => f.write_str("Local"),
            Self::None => f.write_str("None"),
        }
    }
}

/// Everything needed to build a [`DispatchService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub primary: ProviderConfig,
    pub fallback: ProviderConfig,
    pub default_from: Option<Address>,
    pub bulk_delay: Duration,
    pub attempt_timeout: Duration,
}

impl DispatchConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup` instead of the process environment.
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use outreach::DispatchConfig;
    ///
    /// let vars: HashMap<&str, &str> = [("EMAIL_PROVIDER", "logger")].into();
    /// let config = DispatchConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
    /// assert_eq!(config.primary.name(), "logger");
    /// assert_eq!(config.fallback.name(), "none");
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let primary = match lookup("EMAIL_PROVIDER").filter(|p| !p.is_empty()) {
            Some(name) => ProviderConfig::from_name(&name, &lookup)?,
            None => detect_primary(&lookup)?,
        };
        if primary == ProviderConfig::None {
            return Err(ConfigError::Invalid {
                var: "EMAIL_PROVIDER",
                value: "none".into(),
            });
        }

        let fallback = match lookup("EMAIL_FALLBACK_PROVIDER").filter(|p| !p.is_empty()) {
            Some(name) => ProviderConfig::from_name(&name, &lookup)?,
            None if primary.name() != "smtp" && cfg!(feature = "smtp") && has(&lookup, "SMTP_HOST") => {
                ProviderConfig::from_name("smtp", &lookup)?
            }
            None => ProviderConfig::None,
        };

        let default_from = match lookup("EMAIL_FROM").filter(|e| !e.is_empty()) {
            Some(email) if is_valid_email(&email) => Some(Address::with_name(
                lookup("EMAIL_FROM_NAME").unwrap_or_default(),
                email,
            )),
            Some(email) => {
                return Err(ConfigError::Invalid {
                    var: "EMAIL_FROM",
                    value: email,
                })
            }
            None => None,
        };
        if default_from.is_none() && (primary.requires_sender() || fallback.requires_sender()) {
            return Err(ConfigError::Missing("EMAIL_FROM"));
        }

        let bulk_delay = Duration::from_millis(parse_var(
            &lookup,
            "EMAIL_BULK_DELAY_MS",
            DEFAULT_PACING.as_millis() as u64,
        )?);
        let attempt_timeout = Duration::from_secs(parse_var(
            &lookup,
            "EMAIL_TIMEOUT_SECS",
            DEFAULT_ATTEMPT_TIMEOUT.as_secs(),
        )?);
        if attempt_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "EMAIL_TIMEOUT_SECS",
                value: "0".into(),
            });
        }

        tracing::debug!(
            primary = primary.name(),
            fallback = fallback.name(),
            "Loaded dispatch configuration"
        );

        Ok(Self {
            primary,
            fallback,
            default_from,
            bulk_delay,
            attempt_timeout,
        })
    }

    /// Build the adapters and the service around them.
    pub fn into_service(self) -> Result<DispatchService, ConfigError> {
        let primary = self.primary.build(self.attempt_timeout)?;
        let fallback = self.fallback.build(self.attempt_timeout)?;

        let mut service = DispatchService::new(primary, fallback)
            .pacing(self.bulk_delay)
            .attempt_timeout(self.attempt_timeout);
        if let Some(from) = self.default_from {
            service = service.default_from(from);
        }
        Ok(service)
    }
}

fn has<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> bool {
    lookup(key).is_some_and(|v| !v.is_empty())
}

fn detect_primary<F>(lookup: &F) -> Result<ProviderConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if cfg!(feature = "sendgrid") && has(lookup, "SENDGRID_API_KEY") {
        tracing::debug!(provider = "sendgrid", "Auto-detected email provider");
        return ProviderConfig::from_name("sendgrid", lookup);
    }
    if cfg!(feature = "smtp") && has(lookup, "SMTP_HOST") {
        tracing::debug!(provider = "smtp", "Auto-detected email provider");
        return ProviderConfig::from_name("smtp", lookup);
    }
    Err(ConfigError::Missing("EMAIL_PROVIDER"))
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var).filter(|v| !v.trim().is_empty()) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}
