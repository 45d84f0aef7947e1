use std::{env, str::FromStr, time::Duration};

use fo_common::{helpers::parse_boolean_flag, Secret};
use log::*;

const DEFAULT_FOS_HOST: &str = "127.0.0.1";
const DEFAULT_FOS_PORT: u16 = 8370;
const DEFAULT_NOTIFICATION_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;
const DEFAULT_LOYALTY_WORKER_INTERVAL_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The shared secret the payment gateway signs its webhook bodies with.
    pub payment_webhook_secret: Secret<String>,
    /// If false, webhook signatures are not checked at all. **DANGER**. Only ever disable this for local testing.
    pub webhook_signature_checks: bool,
    /// The longest a single notification sink call may take before it is abandoned.
    pub notification_timeout: Duration,
    /// The capacity of each event handler's channel. Events published to a full channel are dropped.
    pub event_buffer_size: usize,
    /// How often the background worker sweeps the loyalty outbox for accruals that were not credited inline.
    pub loyalty_worker_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FOS_HOST.to_string(),
            port: DEFAULT_FOS_PORT,
            database_url: String::default(),
            payment_webhook_secret: Secret::default(),
            webhook_signature_checks: true,
            notification_timeout: Duration::from_millis(DEFAULT_NOTIFICATION_TIMEOUT_MS),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            loyalty_worker_interval: Duration::from_secs(DEFAULT_LOYALTY_WORKER_INTERVAL_SECS),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("FOS_HOST").ok().unwrap_or_else(|| DEFAULT_FOS_HOST.into());
        let port = parse_env_or("FOS_PORT", DEFAULT_FOS_PORT);
        let database_url = env::var("FOS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ FOS_DATABASE_URL is not set. Please set it to the URL for the food order database.");
            String::default()
        });
        let payment_webhook_secret = env::var("FOS_PAYMENT_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ FOS_PAYMENT_WEBHOOK_SECRET is not set. Payment webhooks will be rejected until it is set to the \
                 signing key of your payment gateway."
            );
            String::default()
        });
        let payment_webhook_secret = Secret::new(payment_webhook_secret);
        let webhook_signature_checks = parse_boolean_flag(env::var("FOS_WEBHOOK_SIGNATURE_CHECKS").ok(), true);
        if !webhook_signature_checks {
            warn!("🚨️ Webhook signature checks are DISABLED. Anyone can mark orders as paid. 🚨️");
        }
        let notification_timeout =
            Duration::from_millis(parse_env_or("FOS_NOTIFICATION_TIMEOUT_MS", DEFAULT_NOTIFICATION_TIMEOUT_MS));
        let event_buffer_size = parse_env_or("FOS_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE);
        let loyalty_worker_interval =
            Duration::from_secs(parse_env_or("FOS_LOYALTY_WORKER_INTERVAL_SECS", DEFAULT_LOYALTY_WORKER_INTERVAL_SECS));
        Self {
            host,
            port,
            database_url,
            payment_webhook_secret,
            webhook_signature_checks,
            notification_timeout,
            event_buffer_size,
            loyalty_worker_interval,
        }
    }
}

/// Reads and parses `name` from the environment, logging and falling back to `default` if it is missing or invalid.
fn parse_env_or<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(s) => s.parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            info!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}
