//! API route handlers, one module per resource
//!
//! - `health`: liveness and dependency status
//! - `auth`: signup, login, token refresh
//! - `profile`: user profile
//! - `settings`: notification, display and security settings
//! - `social`: linked social media accounts
//! - `tasks`: advertiser task creation and listing
//! - `performances`: generating, performing and managing performed tasks
//! - `payments`: gateway checkout, verification and webhooks
//! - `wallet`: balance and ledger
//! - `withdrawals`: payouts to bank accounts
//! - `notifications`: inbox
//! - `stats`: per-user dashboard figures
//! - `pricing`: public price list and its admin CRUD
//! - `admin`: review queues and platform overview
//! - `telegram`: review buttons pressed in the admin chat

pub mod admin;
pub mod auth;
pub mod health;
pub mod notifications;
pub mod payments;
pub mod performances;
pub mod pricing;
pub mod profile;
pub mod settings;
pub mod social;
pub mod stats;
pub mod tasks;
pub mod telegram;
pub mod wallet;
pub mod withdrawals;
