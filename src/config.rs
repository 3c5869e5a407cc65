use std::time::Duration;

use crate::errors::AppError;

pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Longest accepted session lifetime.
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(366 * 24 * 60 * 60);
const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    /// Telegram bot token. Signs the login widget payload and authenticates outbound messages.
    pub bot_token: String,
    pub telegram_api_base: String,
    pub notify_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let jwt_secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        if jwt_secret.is_empty() {
            return Err(AppError::configuration("JWT_SECRET must not be empty"));
        }

        let port = std::env::var("APP_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8000);

        let token_ttl = parse_ttl(&std::env::var("JWT_TTL").unwrap_or_default());

        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if bot_token.is_empty() {
            tracing::warn!("TELEGRAM_BOT_TOKEN not set; logins will be rejected and notifications only logged");
        }

        let telegram_api_base = std::env::var("TELEGRAM_API_BASE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string());

        let notify_timeout = std::env::var("NOTIFY_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_NOTIFY_TIMEOUT_SECS));

        Ok(Self {
            port,
            jwt_secret,
            token_ttl,
            bot_token,
            telegram_api_base,
            notify_timeout,
        })
    }

    /// Configuration with fixed secrets and no outbound delivery.
    pub fn for_tests(jwt_secret: &str, bot_token: &str) -> Self {
        Self {
            port: 0,
            jwt_secret: jwt_secret.to_string(),
            token_ttl: DEFAULT_TOKEN_TTL,
            bot_token: bot_token.to_string(),
            telegram_api_base: DEFAULT_TELEGRAM_API_BASE.to_string(),
            notify_timeout: Duration::from_secs(1),
        }
    }
}

/// Parses a TTL such as `24h` or `1h 30m`. Anything unparseable, empty, zero
/// or longer than [`MAX_TOKEN_TTL`] falls back to 24 hours.
pub fn parse_ttl(raw: &str) -> Duration {
    let raw = raw.trim();
    if raw.is_empty() {
        return DEFAULT_TOKEN_TTL;
    }

    match humantime::parse_duration(raw) {
        Ok(ttl) if ttl > MAX_TOKEN_TTL => {
            tracing::warn!(ttl = %raw, "JWT_TTL exceeds the maximum session lifetime, defaulting to 24h");
            DEFAULT_TOKEN_TTL
        }
        Ok(ttl) if !ttl.is_zero() => ttl,
        Ok(_) => {
            tracing::warn!(ttl = %raw, "JWT_TTL is zero, defaulting to 24h");
            DEFAULT_TOKEN_TTL
        }
        Err(err) => {
            tracing::warn!(ttl = %raw, error = %err, "invalid JWT_TTL, defaulting to 24h");
            DEFAULT_TOKEN_TTL
        }
    }
}
