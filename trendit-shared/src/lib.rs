//! # Trendit Shared Library
//!
//! Types and business logic shared by the Trendit API server and the background worker.
//!
//! ## Module Organization
//!
//! - `models`: Database models (users, wallets, tasks, performances, payments, ...)
//! - `auth`: Password hashing, JWT tokens, request auth context and role checks
//! - `db`: Connection pool and embedded migrations
//! - `wallet`: The append-only ledger. Every balance change goes through it
//! - `payments`: Payment gateway clients (Paystack, Flutterwave)
//! - `settlement`: Idempotent reconciliation of payments and withdrawals
//! - `assignment`: Random task allocation for performers
//! - `review`: Admin decisions on tasks and submissions
//! - `social`: Linking social accounts and verifying them
//! - `telegram`: Admin alerts through the Telegram Bot API
//! - `redis`: Redis connection management

pub mod assignment;
pub mod auth;
pub mod db;
pub mod models;
pub mod payments;
pub mod redis;
pub mod reference;
pub mod review;
pub mod settlement;
pub mod social;
pub mod telegram;
pub mod wallet;

/// Current version of the Trendit shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
