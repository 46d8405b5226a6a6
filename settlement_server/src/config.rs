use std::{collections::HashMap, env, path::PathBuf, time::Duration};

use log::*;
use settlement_common::{
    helpers::{env_decimal, env_duration_secs, env_flag},
    Secret,
};
use settlement_engine::{CoordinatorConfig, RateOracleConfig};

const DEFAULT_SRE_HOST: &str = "127.0.0.1";
const DEFAULT_SRE_PORT: u16 = 8480;
const DEFAULT_EXPIRY_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// HMAC key for settlement requests, settlement confirmations and business webhooks
    pub signing_key: Secret<String>,
    /// HMAC key the payment gateway signs its webhooks with
    pub payment_webhook_secret: Secret<String>,
    /// If false, payment webhooks are accepted without checking their signature. **DANGER**
    pub payment_hmac_checks: bool,
    /// A JSON token registry. The built-in registry is used when this is not set.
    pub token_registry: Option<PathBuf>,
    /// How often the expiry worker sweeps for unpaid orders
    pub expiry_interval: Duration,
    pub coordinator: CoordinatorConfig,
    pub rates: RateOracleConfig,
    pub integrations: IntegrationsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SRE_HOST.to_string(),
            port: DEFAULT_SRE_PORT,
            database_url: String::default(),
            signing_key: Secret::default(),
            payment_webhook_secret: Secret::default(),
            payment_hmac_checks: true,
            token_registry: None,
            expiry_interval: DEFAULT_EXPIRY_INTERVAL,
            coordinator: CoordinatorConfig::default(),
            rates: RateOracleConfig::default(),
            integrations: IntegrationsConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SRE_HOST").ok().unwrap_or_else(|| DEFAULT_SRE_HOST.into());
        let port = env::var("SRE_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SRE_PORT. {e} Using the default, {DEFAULT_SRE_PORT}, instead."
                    );
                    DEFAULT_SRE_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SRE_PORT);
        let database_url = env::var("SRE_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SRE_DATABASE_URL is not set. Please set it to the URL for the settlement database.");
            String::default()
        });
        let signing_key = env::var("SRE_SIGNING_KEY").ok().unwrap_or_else(|| {
            error!(
                "🪛️ SRE_SIGNING_KEY is not set. Settlement requests cannot be signed and settlement confirmations will \
                 all be rejected."
            );
            String::default()
        });
        let signing_key = Secret::new(signing_key);
        let payment_webhook_secret = env::var("SRE_PAYMENT_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ SRE_PAYMENT_WEBHOOK_SECRET is not set. Please set it to the key your payment gateway signs its \
                 webhooks with."
            );
            String::default()
        });
        let payment_webhook_secret = Secret::new(payment_webhook_secret);
        let payment_hmac_checks = env_flag("SRE_PAYMENT_HMAC_CHECKS", true);
        if !payment_hmac_checks {
            warn!("🚨️ Payment webhook signatures are NOT being checked. Do not run production like this. 🚨️");
        }
        let token_registry = env::var("SRE_TOKEN_REGISTRY").ok().map(PathBuf::from);
        if token_registry.is_none() {
            info!("🪛️ SRE_TOKEN_REGISTRY is not set. Using the built-in token registry.");
        }
        let expiry_interval = env_duration_secs("SRE_EXPIRY_INTERVAL", DEFAULT_EXPIRY_INTERVAL);
        let coordinator = coordinator_config_from_env(signing_key.clone());
        let rates = rate_config_from_env();
        let integrations = IntegrationsConfig::from_env_or_default();
        Self {
            host,
            port,
            database_url,
            signing_key,
            payment_webhook_secret,
            payment_hmac_checks,
            token_registry,
            expiry_interval,
            coordinator,
            rates,
            integrations,
        }
    }
}

fn coordinator_config_from_env(signing_key: Secret<String>) -> CoordinatorConfig {
    let defaults = CoordinatorConfig::default();
    let mut config = defaults
        .clone()
        .with_liquidity_check(env_flag("SRE_ENABLE_LIQUIDITY_CHECK", defaults.enable_liquidity_check))
        .with_duplicate_guard(env_flag("SRE_ENABLE_DUPLICATE_GUARD", defaults.enable_duplicate_guard));
    if let Some(minimum) = env_decimal("SRE_MIN_SETTLEMENT_VALUE") {
        config = config.with_min_settlement_stable(minimum);
    }
    let default_expiry = defaults.order_expiry.to_std().unwrap_or(Duration::from_secs(1800));
    let expiry = env_duration_secs("SRE_ORDER_EXPIRY", default_expiry);
    config = config.with_order_expiry(chrono::Duration::seconds(expiry.as_secs() as i64));
    if let Ok(s) = env::var("SRE_REQUIRED_CONFIRMATIONS") {
        match s.trim().parse::<u32>() {
            Ok(n) => config = config.with_required_confirmations(n),
            Err(e) => warn!(
                "🪛️ Invalid configuration value for SRE_REQUIRED_CONFIRMATIONS ({s}): {e}. Using {}.",
                defaults.required_confirmations
            ),
        }
    }
    config.collaborator_timeout = env_duration_secs("SRE_HTTP_TIMEOUT", DEFAULT_HTTP_TIMEOUT);
    config.signing_key = signing_key;
    info!(
        "🪛️ Liquidity checks: {}. Duplicate guard: {}. Unpaid orders expire after {}s.",
        config.enable_liquidity_check,
        config.enable_duplicate_guard,
        config.order_expiry.num_seconds()
    );
    config
}

fn rate_config_from_env() -> RateOracleConfig {
    let mut config = RateOracleConfig::default().with_static_rate(env_decimal("SRE_STATIC_RATE"));
    if let Some(rate) = env_decimal("SRE_EMERGENCY_RATE") {
        config = config.with_emergency_rate(rate);
    }
    match config.static_rate {
        Some(rate) => info!("🪛️ Static fallback rate: {rate}"),
        None => warn!(
            "🪛️ SRE_STATIC_RATE is not set. If both rate sources fail, the emergency rate of {} will be used.",
            config.emergency_rate
        ),
    }
    config
}

//-------------------------------------------------  IntegrationsConfig  -----------------------------------------------
/// Where an external collaborator lives, and the key used to call it.
#[derive(Clone, Debug, Default)]
pub struct EndpointConfig {
    pub url: String,
    pub api_key: Secret<String>,
}

impl EndpointConfig {
    pub fn new(url: &str) -> Self {
        Self { url: url.trim_end_matches('/').to_string(), api_key: Secret::default() }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Secret::new(key.to_string());
        self
    }

    /// Reads the endpoint from `url_var`, and its key from `key_var`. Returns `None` if the URL is not set.
    pub fn from_env(url_var: &str, key_var: &str) -> Option<Self> {
        let url = env::var(url_var).ok().filter(|s| !s.trim().is_empty())?;
        let endpoint = Self::new(url.trim());
        match env::var(key_var) {
            Ok(key) => Some(endpoint.with_api_key(&key)),
            Err(_) => Some(endpoint),
        }
    }
}

#[derive(Clone, Debug)]
pub struct IntegrationsConfig {
    pub primary_rate: Option<EndpointConfig>,
    pub secondary_rate: Option<EndpointConfig>,
    pub chain_quoter: Option<EndpointConfig>,
    pub aggregator: Option<EndpointConfig>,
    /// When this is not set, liquidity is assumed to be available on every network
    pub provider_roster: Option<EndpointConfig>,
    pub settlement_executor: Option<EndpointConfig>,
    pub payment_gateway: Option<EndpointConfig>,
    /// Business id to webhook URL
    pub business_webhooks: HashMap<String, String>,
    /// Request timeout applied to every outgoing call
    pub timeout: Duration,
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            primary_rate: None,
            secondary_rate: None,
            chain_quoter: None,
            aggregator: None,
            provider_roster: None,
            settlement_executor: None,
            payment_gateway: None,
            business_webhooks: HashMap::new(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl IntegrationsConfig {
    pub fn from_env_or_default() -> Self {
        let primary_rate = EndpointConfig::from_env("SRE_PRIMARY_RATE_URL", "SRE_PRIMARY_RATE_API_KEY");
        let secondary_rate = EndpointConfig::from_env("SRE_SECONDARY_RATE_URL", "SRE_SECONDARY_RATE_API_KEY");
        if primary_rate.is_none() && secondary_rate.is_none() {
            warn!("🪛️ No rate sources are configured. Only the static and emergency rates will be used.");
        }
        let chain_quoter = EndpointConfig::from_env("SRE_CHAIN_QUOTER_URL", "SRE_CHAIN_QUOTER_API_KEY");
        if chain_quoter.is_none() {
            warn!("🪛️ SRE_CHAIN_QUOTER_URL is not set. Only settlement tokens can be quoted on EVM networks.");
        }
        let aggregator = EndpointConfig::from_env("SRE_AGGREGATOR_URL", "SRE_AGGREGATOR_API_KEY");
        if aggregator.is_none() {
            warn!("🪛️ SRE_AGGREGATOR_URL is not set. Only settlement tokens can be quoted on aggregator networks.");
        }
        let provider_roster = EndpointConfig::from_env("SRE_PROVIDER_ROSTER_URL", "SRE_PROVIDER_ROSTER_API_KEY");
        if provider_roster.is_none() {
            warn!("🚨️ SRE_PROVIDER_ROSTER_URL is not set. Liquidity will be ASSUMED to be available. 🚨️");
        }
        let settlement_executor =
            EndpointConfig::from_env("SRE_SETTLEMENT_EXECUTOR_URL", "SRE_SETTLEMENT_EXECUTOR_API_KEY");
        let payment_gateway = EndpointConfig::from_env("SRE_PAYMENT_GATEWAY_URL", "SRE_PAYMENT_GATEWAY_API_KEY");
        let business_webhooks =
            env::var("SRE_BUSINESS_WEBHOOKS").map(|s| parse_webhook_endpoints(&s)).unwrap_or_default();
        if business_webhooks.is_empty() {
            info!("🪛️ No business webhooks are configured. Order notifications will not be delivered.");
        }
        let timeout = env_duration_secs("SRE_HTTP_TIMEOUT", DEFAULT_HTTP_TIMEOUT);
        Self {
            primary_rate,
            secondary_rate,
            chain_quoter,
            aggregator,
            provider_roster,
            settlement_executor,
            payment_gateway,
            business_webhooks,
            timeout,
        }
    }
}

/// Parses `biz-1=https://one.example/hook,biz-2=https://two.example/hook` into a map of business id to URL.
pub fn parse_webhook_endpoints(value: &str) -> HashMap<String, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|entry| match entry.split_once('=') {
            Some((business, url)) if !business.trim().is_empty() && url.trim().starts_with("http") => {
                Some((business.trim().to_string(), url.trim().to_string()))
            },
            _ => {
                warn!("🪛️ Ignoring invalid entry ({entry}) in SRE_BUSINESS_WEBHOOKS");
                None
            },
        })
        .collect()
}
