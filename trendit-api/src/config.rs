//! Configuration management for the API server
//!
//! This module loads configuration from environment variables and provides
//! a type-safe configuration struct.
//!
//! # Environment Variables
//!
//! - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:8080)
//! - `CORS_ORIGINS`: comma separated origins, `*` for any (default: `*`)
//! - `APP_ENV`: `production` enables HSTS (default: development)
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
//! - `JWT_SECRET`: secret key for JWT signing, at least 32 characters (required)
//! - `REDIS_URL`: enables per-user rate limiting when set
//! - `RATE_LIMIT_PER_MINUTE`: requests per user per minute (default: 120)
//! - `PAYMENT_GATEWAY`, `PAYSTACK_*`, `FLW_*`, `PAYMENT_CURRENCY`: see [`GatewayConfig`]
//! - `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`, `TELEGRAM_WEBHOOK_SECRET`: admin alerts
//!
//! # Example
//!
//! ```no_run
//! use trendit_api::config::Config;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! println!("Server will listen on {}:{}", config.api.host, config.api.port);
//! # Ok(())
//! # }
//! ```

use std::env;
use trendit_shared::{payments::GatewayConfig, telegram::TelegramConfig};

pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 120;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Rate limiting; disabled without a Redis URL
    pub rate_limit: RateLimitConfig,

    /// Payment provider selection and credentials
    pub gateway: GatewayConfig,

    /// Admin alerts; `None` disables them
    pub telegram: Option<TelegramConfig>,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS on)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub redis_url: Option<String>,
    pub per_minute: u32,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let cors_origins = parse_origins(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()));
        let production = env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let redis_url = env::var("REDIS_URL").ok().filter(|v| !v.trim().is_empty());
        let per_minute = match env::var("RATE_LIMIT_PER_MINUTE") {
            Ok(v) => v.parse::<u32>()?,
            Err(_) => DEFAULT_RATE_LIMIT_PER_MINUTE,
        };
        if per_minute == 0 {
            anyhow::bail!("RATE_LIMIT_PER_MINUTE must be greater than zero");
        }

        let gateway = GatewayConfig::from_env()?;

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
            },
            rate_limit: RateLimitConfig {
                redis_url,
                per_minute,
            },
            gateway,
            telegram: TelegramConfig::from_env(),
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}
