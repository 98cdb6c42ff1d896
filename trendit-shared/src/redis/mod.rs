//! Redis integration
//!
//! Redis is optional for Trendit. When `REDIS_URL` is set the API keeps its per-user
//! rate-limit buckets there; without it the API runs with rate limiting disabled.
//!
//! # Example
//!
//! ```no_run
//! use trendit_shared::redis::client::{RedisClient, RedisConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! if let Some(config) = RedisConfig::from_env_optional() {
//!     let client = RedisClient::new(config).await?;
//!     println!("Redis healthy: {}", client.ping().await?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;

pub use client::{RedisClient, RedisClientError, RedisConfig, RedisStats};
