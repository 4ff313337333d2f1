/// Configuration module
///
/// Loads configuration from TOML files and environment variables.
/// Priority: ENV > TOML > defaults
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub integrations: IntegrationsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub paymongo: PaymongoConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub db: DbConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default = "default_service_version")]
    pub version: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_body_limit")]
    pub request_body_limit_bytes: usize,
    #[serde(default = "default_cors_allow_origins")]
    pub cors_allow_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IntegrationsConfig {
    #[serde(default = "default_true")]
    pub enable_postgres: bool,
    #[serde(default = "default_true")]
    pub enable_redis: bool,

    // Postgres
    #[serde(default)]
    pub database_url: String,
    #[serde(default = "default_pg_max_connections")]
    pub pg_max_connections: u32,
    #[serde(default = "default_pg_connect_timeout_ms")]
    pub pg_connect_timeout_ms: u64,
    #[serde(default = "default_pg_idle_timeout_ms")]
    pub pg_idle_timeout_ms: u64,

    // Redis
    #[serde(default)]
    pub redis_url: String,
    #[serde(default = "default_redis_connect_timeout_ms")]
    pub redis_connect_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bypass_paths")]
    pub bypass_paths: Vec<String>,
    #[serde(default = "default_protect_prefixes")]
    pub protect_prefixes: Vec<String>,
    #[serde(default = "default_verification_code_len")]
    pub verification_code_len: usize,
    #[serde(default = "default_reset_token_ttl_secs")]
    pub reset_token_ttl_secs: u64,
    /// Return verification and reset codes in API responses instead of
    /// relying on out-of-band delivery. Development only.
    #[serde(default)]
    pub expose_verification_code: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymongoConfig {
    #[serde(default = "default_paymongo_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub webhook_secret: String,
    #[serde(default = "default_success_url")]
    pub success_url: String,
    #[serde(default = "default_cancel_url")]
    pub cancel_url: String,
    #[serde(default = "default_webhook_tolerance_secs")]
    pub webhook_tolerance_secs: u64,
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_down_payment_percent")]
    pub down_payment_percent: i64,
    #[serde(default = "default_payment_method_types")]
    pub payment_method_types: Vec<String>,
    #[serde(default = "default_true")]
    pub send_email_receipt: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default)]
    pub run_migrations_on_start: bool,
}

// Defaults
fn default_service_name() -> String {
    "printlink-api".to_string()
}

fn default_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_body_limit() -> usize {
    1_048_576 // 1 MiB
}

fn default_cors_allow_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_id_header() -> String {
    "x-request-id".to_string()
}

fn default_true() -> bool {
    true
}

fn default_pg_max_connections() -> u32 {
    10
}

fn default_pg_connect_timeout_ms() -> u64 {
    3000
}

fn default_pg_idle_timeout_ms() -> u64 {
    300000
}

fn default_redis_connect_timeout_ms() -> u64 {
    1000
}

fn default_bypass_paths() -> Vec<String> {
    vec![
        "/healthz".to_string(),
        "/readyz".to_string(),
        "/version".to_string(),
        "/api/auth/register".to_string(),
        "/api/auth/login".to_string(),
        "/api/auth/verify-email".to_string(),
        "/api/auth/forgot-password".to_string(),
        "/api/auth/reset-password".to_string(),
        "/api/roles".to_string(),
        "/api/skills".to_string(),
        "/api/printing-skills".to_string(),
        "/api/paymongo/webhook".to_string(),
        // Gateway redirect landings arrive from the payer's browser
        "/api/payments/success".to_string(),
        "/api/payments/failed".to_string(),
    ]
}

fn default_protect_prefixes() -> Vec<String> {
    vec!["/api".to_string()]
}

fn default_verification_code_len() -> usize {
    6
}

fn default_reset_token_ttl_secs() -> u64 {
    3600
}

fn default_paymongo_base_url() -> String {
    "https://api.paymongo.com/v1".to_string()
}

fn default_success_url() -> String {
    "http://localhost:8080/api/payments/success".to_string()
}

fn default_cancel_url() -> String {
    "http://localhost:8080/api/payments/failed".to_string()
}

fn default_webhook_tolerance_secs() -> u64 {
    300
}

fn default_http_timeout_ms() -> u64 {
    10000
}

fn default_currency() -> String {
    "PHP".to_string()
}

fn default_down_payment_percent() -> i64 {
    20
}

fn default_payment_method_types() -> Vec<String> {
    vec!["gcash".to_string(), "card".to_string()]
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            version: default_service_version(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_body_limit_bytes: default_request_body_limit(),
            cors_allow_origins: default_cors_allow_origins(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
            request_id_header: default_request_id_header(),
        }
    }
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            enable_postgres: true,
            enable_redis: true,
            database_url: String::new(),
            pg_max_connections: default_pg_max_connections(),
            pg_connect_timeout_ms: default_pg_connect_timeout_ms(),
            pg_idle_timeout_ms: default_pg_idle_timeout_ms(),
            redis_url: String::new(),
            redis_connect_timeout_ms: default_redis_connect_timeout_ms(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bypass_paths: default_bypass_paths(),
            protect_prefixes: default_protect_prefixes(),
            verification_code_len: default_verification_code_len(),
            reset_token_ttl_secs: default_reset_token_ttl_secs(),
            expose_verification_code: false,
        }
    }
}

impl Default for PaymongoConfig {
    fn default() -> Self {
        Self {
            base_url: default_paymongo_base_url(),
            secret_key: String::new(),
            webhook_secret: String::new(),
            success_url: default_success_url(),
            cancel_url: default_cancel_url(),
            webhook_tolerance_secs: default_webhook_tolerance_secs(),
            http_timeout_ms: default_http_timeout_ms(),
        }
    }
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            down_payment_percent: default_down_payment_percent(),
            payment_method_types: default_payment_method_types(),
            send_email_receipt: true,
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            run_migrations_on_start: false,
        }
    }
}

pub fn load_config() -> Result<Config, config::ConfigError> {
    let env = env::var("APP__ENV").unwrap_or_else(|_| "dev".to_string());

    let mut builder = config::Config::builder();

    // Try to load TOML file, but don't fail if it doesn't exist
    let config_path = format!("configs/{}/default", env);
    if std::path::Path::new(&format!("{}.toml", config_path)).exists() {
        builder = builder.add_source(config::File::with_name(&config_path).required(false));
    }

    // Environment variables override with APP__ prefix
    builder = builder.add_source(
        config::Environment::with_prefix("APP")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_cover_every_section() {
        let config: Config = serde_json::from_str("{}").expect("empty config deserializes");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.telemetry.log_format, "json");
        assert_eq!(config.payments.down_payment_percent, 20);
        assert_eq!(config.payments.currency, "PHP");
        assert!(config.auth.enabled);
        assert!(config
            .auth
            .bypass_paths
            .contains(&"/api/auth/login".to_string()));
        assert_eq!(config.paymongo.base_url, "https://api.paymongo.com/v1");
    }

    #[test]
    fn webhook_route_is_bypassed_by_default() {
        let auth = AuthConfig::default();
        assert!(auth
            .bypass_paths
            .iter()
            .any(|p| p == "/api/paymongo/webhook"));
        assert!(auth.protect_prefixes.iter().any(|p| p == "/api"));
    }

    #[test]
    fn password_reset_routes_are_bypassed_by_default() {
        let auth = AuthConfig::default();
        for path in ["/api/auth/forgot-password", "/api/auth/reset-password"] {
            assert!(auth.bypass_paths.iter().any(|p| p == path), "path: {}", path);
        }
        assert!(!auth.expose_verification_code);
        assert_eq!(auth.reset_token_ttl_secs, 3600);
    }

    #[test]
    fn env_vars_override_file_and_defaults() {
        // The dev TOML sets port = 8080 and expose_verification_code = true;
        // both must lose to the environment.
        env::set_var("APP__SERVER__PORT", "9191");
        env::set_var("APP__PAYMENTS__DOWN_PAYMENT_PERCENT", "35");
        env::set_var("APP__AUTH__EXPOSE_VERIFICATION_CODE", "false");

        let config = load_config().expect("config loads with overrides");
        assert_eq!(config.server.port, 9191);
        assert_eq!(config.payments.down_payment_percent, 35);
        assert!(!config.auth.expose_verification_code);
        // Untouched keys keep their file/default values
        assert_eq!(config.payments.currency, "PHP");

        env::remove_var("APP__SERVER__PORT");
        env::remove_var("APP__PAYMENTS__DOWN_PAYMENT_PERCENT");
        env::remove_var("APP__AUTH__EXPOSE_VERIFICATION_CODE");
    }
}
