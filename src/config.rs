use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub cookie_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub sender: String,
    /// Base URL put in front of the reset link.
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Requests per client address per hour on `/api`.
    pub requests_per_hour: u32,
    pub body_limit_kb: usize,
    pub max_filter_keys: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    Development,
    Production,
}

impl OperatingMode {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => OperatingMode::Production,
            _ => OperatingMode::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == OperatingMode::Production
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub mode: OperatingMode,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub limits: LimitsConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn database_url() -> anyhow::Result<String> {
    let raw = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    Ok(match std::env::var("DATABASE_PORT") {
        Ok(port) => raw.replace("<PORT>", &port),
        Err(_) => raw,
    })
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "natours".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "natours-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60 * 24 * 90),
            cookie_days: env_or("JWT_COOKIE_EXPIRES_IN", 90),
        };

        let mail = MailConfig {
            host: std::env::var("EMAIL_HOST").unwrap_or_else(|_| "localhost".into()),
            port: env_or("EMAIL_PORT", 1025),
            username: std::env::var("EMAIL_USERNAME").ok(),
            password: std::env::var("EMAIL_PASSWORD").ok(),
            sender: std::env::var("EMAIL_SENDER")
                .unwrap_or_else(|_| "Natours <hello@natours.io>".into()),
            public_url: std::env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into()),
        };

        let limits = LimitsConfig {
            requests_per_hour: env_or("RATE_LIMIT_MAX", 100),
            body_limit_kb: env_or("BODY_LIMIT_KB", 10),
            max_filter_keys: env_or("MAX_FILTER_KEYS", 6),
        };

        Ok(Self {
            database_url: database_url()?,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
            mode: OperatingMode::parse(&std::env::var("APP_ENV").unwrap_or_default()),
            jwt,
            mail,
            limits,
        })
    }
}
