use std::{env, fmt::Display, str::FromStr};

use bazaar_common::{
    helpers::{parse_boolean_flag, parse_duration_secs},
    Secret,
    DEFAULT_CURRENCY_CODE,
};
use bazaar_engine::{order_objects::DispatchPolicy, traits::SettlementPolicy};
use chrono::Duration;
use log::*;
use processor_tools::ProcessorConfig;

const DEFAULT_BZR_HOST: &str = "127.0.0.1";
const DEFAULT_BZR_PORT: u16 = 8480;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/bazaar.db";
const DEFAULT_COMMISSION_BPS: u32 = 300;
const DEFAULT_ESTIMATED_DELIVERY_MINUTES: i64 = 45;
const DEFAULT_UNPAID_ORDER_TIMEOUT: Duration = Duration::hours(48);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("'{other}' is not a valid environment")),
        }
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// In production, the messages of internal errors are not sent to clients.
    pub environment: Environment,
    pub settlement: SettlementPolicy,
    pub dispatch: DispatchPolicy,
    /// Pending orders older than this are cancelled and their stock released. Zero disables the sweep.
    pub unpaid_order_timeout: Duration,
    pub webhook: WebhookConfig,
    pub processor: ProcessorConfig,
}

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    /// The shared secret the processor signs webhook bodies with.
    pub hmac_secret: Secret<String>,
    /// If false, webhook signatures are not checked at all. Only ever do this in development.
    pub hmac_checks: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self { hmac_secret: Secret::default(), hmac_checks: true }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BZR_HOST.to_string(),
            port: DEFAULT_BZR_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            environment: Environment::default(),
            settlement: SettlementPolicy::default(),
            dispatch: DispatchPolicy::default(),
            unpaid_order_timeout: DEFAULT_UNPAID_ORDER_TIMEOUT,
            webhook: WebhookConfig::default(),
            processor: ProcessorConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let mut config = Self::from_source(|name| env::var(name).ok());
        config.processor = ProcessorConfig::new_from_env_or_default();
        config
    }

    /// Builds the configuration from `lookup`, which maps a variable name to its value, if set. Invalid values are
    /// logged and replaced by their defaults.
    pub fn from_source<F>(lookup: F) -> Self
    where F: Fn(&str) -> Option<String> {
        let host = lookup("BZR_HOST").unwrap_or_else(|| DEFAULT_BZR_HOST.into());
        let port = parse_or_default(&lookup, "BZR_PORT", DEFAULT_BZR_PORT);
        let database_url = lookup("BZR_DATABASE_URL").unwrap_or_else(|| {
            warn!("🪛️ BZR_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let environment = parse_or_default(&lookup, "BZR_ENVIRONMENT", Environment::default());
        let commission_bps = parse_or_default(&lookup, "BZR_COMMISSION_BPS", DEFAULT_COMMISSION_BPS);
        let commission_bps = if commission_bps > 10_000 {
            error!("🪛️ BZR_COMMISSION_BPS cannot exceed 10000 (100%). Using the default of {DEFAULT_COMMISSION_BPS}.");
            DEFAULT_COMMISSION_BPS
        } else {
            commission_bps
        };
        let currency = lookup("BZR_CURRENCY")
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY_CODE.to_string());
        let minutes = parse_or_default(&lookup, "BZR_ESTIMATED_DELIVERY_MINUTES", DEFAULT_ESTIMATED_DELIVERY_MINUTES);
        let dispatch = DispatchPolicy { estimated_delivery: Duration::minutes(minutes.max(0)) };
        let unpaid_order_timeout = configure_unpaid_order_timeout(&lookup);
        let webhook = WebhookConfig::from_source(&lookup);
        Self {
            host,
            port,
            database_url,
            environment,
            settlement: SettlementPolicy { commission_bps, currency },
            dispatch,
            unpaid_order_timeout,
            webhook,
            processor: ProcessorConfig::default(),
        }
    }

    pub fn expiry_sweep_enabled(&self) -> bool {
        self.unpaid_order_timeout > Duration::zero()
    }
}

impl WebhookConfig {
    fn from_source<F>(lookup: &F) -> Self
    where F: Fn(&str) -> Option<String> {
        let hmac_secret = lookup("BZR_WEBHOOK_HMAC_SECRET").unwrap_or_else(|| {
            error!(
                "🪛️ BZR_WEBHOOK_HMAC_SECRET is not set. Please set it to the webhook signing secret from your payment \
                 processor dashboard."
            );
            String::default()
        });
        let hmac_checks = parse_boolean_flag(lookup("BZR_WEBHOOK_HMAC_CHECKS"), true);
        if !hmac_checks {
            warn!("🚨️ Webhook signature checks are DISABLED. Anyone can mark orders as paid. 🚨️");
        }
        Self { hmac_secret: Secret::new(hmac_secret), hmac_checks }
    }
}

fn parse_or_default<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(name) {
        Some(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        None => default,
    }
}

fn configure_unpaid_order_timeout<F>(lookup: &F) -> Duration
where F: Fn(&str) -> Option<String> {
    let Some(value) = lookup("BZR_UNPAID_ORDER_TIMEOUT") else {
        info!(
            "🪛️ BZR_UNPAID_ORDER_TIMEOUT is not set. Using the default value of {} hrs.",
            DEFAULT_UNPAID_ORDER_TIMEOUT.num_hours()
        );
        return DEFAULT_UNPAID_ORDER_TIMEOUT;
    };
    // A bare number means hours here, unlike the generic duration parser.
    let seconds = match value.trim().parse::<i64>() {
        Ok(hours) => Some(hours.max(0) * 3600),
        Err(_) => parse_duration_secs(&value).and_then(|s| i64::try_from(s).ok()),
    };
    match seconds {
        Some(0) => {
            info!("🪛️ BZR_UNPAID_ORDER_TIMEOUT is zero. Unpaid orders will never expire.");
            Duration::zero()
        },
        Some(s) => Duration::seconds(s),
        None => {
            warn!("🪛️ Invalid configuration value for BZR_UNPAID_ORDER_TIMEOUT ({value}). Using the default.");
            DEFAULT_UNPAID_ORDER_TIMEOUT
        },
    }
}
