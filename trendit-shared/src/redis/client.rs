//! Redis client wrapper with connection management, health checks and token buckets
//!
//! # Example
//!
//! ```no_run
//! use trendit_shared::redis::client::{RedisClient, RedisConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = RedisConfig::from_env()?;
//! let client = RedisClient::new(config).await?;
//!
//! let bucket = client.take_token("ratelimit:user:42", 120, 2.0).await?;
//! println!("allowed: {}, remaining: {}", bucket.allowed, bucket.remaining);
//! # Ok(())
//! # }
//! ```

use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Redis client errors
#[derive(Error, Debug)]
pub enum RedisClientError {
    #[error("Redis connection error: {0}")]
    ConnectionError(String),

    #[error("Redis command error: {0}")]
    CommandError(String),

    #[error("Redis configuration error: {0}")]
    ConfigError(String),

    #[error("Redis health check failed: {0}")]
    HealthCheckFailed(String),
}

impl From<RedisError> for RedisClientError {
    fn from(err: RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::IoError => {
                RedisClientError::ConnectionError(format!("IO error: {}", err))
            }
            redis::ErrorKind::ResponseError => {
                RedisClientError::CommandError(format!("Response error: {}", err))
            }
            _ => RedisClientError::CommandError(err.to_string()),
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Format: redis://[username:password@]host:port[/db]
    pub url: String,

    /// Per-command timeout in seconds
    pub command_timeout_secs: u64,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            command_timeout_secs: 2,
        }
    }

    /// Loads the configuration from `REDIS_URL` and `REDIS_COMMAND_TIMEOUT_SECS` (default 2)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `REDIS_URL` is not set.
    pub fn from_env() -> Result<Self, RedisClientError> {
        dotenvy::dotenv().ok();

        let url = env::var("REDIS_URL").map_err(|_| {
            RedisClientError::ConfigError("REDIS_URL environment variable is required".to_string())
        })?;

        Ok(Self::with_env_timeouts(url))
    }

    /// Like [`RedisConfig::from_env`], but `None` when `REDIS_URL` is unset or empty
    pub fn from_env_optional() -> Option<Self> {
        dotenvy::dotenv().ok();

        env::var("REDIS_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .map(Self::with_env_timeouts)
    }

    fn with_env_timeouts(url: String) -> Self {
        let command_timeout_secs = env::var("REDIS_COMMAND_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2);

        Self {
            url,
            command_timeout_secs,
        }
    }
}

/// State of a token bucket after one `take_token` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketState {
    /// Whether a token was taken
    pub allowed: bool,

    /// Whole tokens left in the bucket
    pub remaining: u32,

    /// Seconds until a token is available again (0 when allowed)
    pub retry_after: u64,
}

// Refill, take one token and persist atomically. Buckets idle for two minutes expire.
const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])

local bucket = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(bucket[1])
local last_refill = tonumber(bucket[2])

if not tokens then
    tokens = capacity
    last_refill = now
end

local elapsed = math.max(0, now - last_refill)
tokens = math.min(capacity, tokens + (elapsed * refill_rate))

if tokens >= 1 then
    tokens = tokens - 1
    redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
    redis.call('EXPIRE', key, 120)
    return {1, math.floor(tokens), 0}
else
    redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
    redis.call('EXPIRE', key, 120)
    return {0, 0, math.ceil((1 - tokens) / refill_rate)}
end
"#;

/// Redis client with automatic reconnection
///
/// Cloning is cheap; clones share the same connection manager.
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    config: Arc<RedisConfig>,
}

impl RedisClient {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the first connection fails.
    pub async fn new(config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = Client::open(config.url.as_str()).map_err(|e| {
            RedisClientError::ConfigError(format!("Invalid Redis URL: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            RedisClientError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        tracing::info!(url = %sanitize_url(&config.url), "Redis client connected");

        Ok(Self {
            manager,
            config: Arc::new(config),
        })
    }

    /// Sends PING and reports whether PONG came back
    pub async fn ping(&self) -> Result<bool, RedisClientError> {
        let mut conn = self.manager.clone();

        let result: Result<String, RedisError> = tokio::time::timeout(
            self.command_timeout(),
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| RedisClientError::HealthCheckFailed("PING command timed out".to_string()))?;

        match result {
            Ok(pong) if pong == "PONG" => Ok(true),
            Ok(other) => {
                tracing::warn!(response = %other, "Unexpected PING response");
                Ok(false)
            }
            Err(e) => Err(RedisClientError::HealthCheckFailed(e.to_string())),
        }
    }

    /// Takes one token from the bucket stored at `key`
    ///
    /// The bucket holds at most `capacity` tokens and refills at `refill_per_sec`.
    /// A missing bucket starts full.
    pub async fn take_token(
        &self,
        key: &str,
        capacity: u32,
        refill_per_sec: f64,
    ) -> Result<BucketState, RedisClientError> {
        let mut conn = self.manager.clone();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let script = redis::Script::new(TOKEN_BUCKET_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation.key(key).arg(capacity).arg(refill_per_sec).arg(now);

        let reply: Vec<i64> = tokio::time::timeout(
            self.command_timeout(),
            invocation.invoke_async(&mut conn),
        )
        .await
        .map_err(|_| RedisClientError::CommandError("token bucket script timed out".to_string()))??;

        parse_bucket_reply(&reply)
    }

    /// Returns a connection handle for ad-hoc commands
    pub fn get_connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    pub async fn stats(&self) -> RedisStats {
        let healthy = self.ping().await.unwrap_or(false);

        RedisStats {
            healthy,
            url: sanitize_url(&self.config.url),
        }
    }

    fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.config.command_timeout_secs.max(1))
    }
}

/// Redis connection statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisStats {
    pub healthy: bool,

    /// URL with credentials removed
    pub url: String,
}

fn parse_bucket_reply(reply: &[i64]) -> Result<BucketState, RedisClientError> {
    match reply {
        [allowed, remaining, retry_after] => Ok(BucketState {
            allowed: *allowed == 1,
            remaining: u32::try_from(*remaining).unwrap_or(0),
            retry_after: u64::try_from(*retry_after).unwrap_or(0),
        }),
        other => Err(RedisClientError::CommandError(format!(
            "unexpected token bucket reply: {:?}",
            other
        ))),
    }
}

/// Replaces `user:password` in a Redis URL with `***:***`
fn sanitize_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end + 3];
            let host = &url[at_pos + 1..];
            return format!("{}***:***@{}", scheme, host);
        }
    }
    url.to_string()
}
