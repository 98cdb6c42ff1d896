//! Database models for Trendit
//!
//! Each model owns its SQL. Balance mutation is the exception: it lives in
//! [`crate::wallet`], and models only read wallets.
//!
//! # Models
//!
//! - `user`: accounts, roles, 2FA setting
//! - `wallet`: one balance per user
//! - `transaction`: append-only wallet ledger
//! - `payment`: gateway payment lifecycle
//! - `task`: advert and engagement tasks
//! - `performance`: a user's attempt at a task
//! - `withdrawal`: payouts to bank accounts
//! - `notification`: messages, notifications and activity
//! - `pricing`: advertiser price list
//! - `settings`: notification and display preferences
//! - `social`: linked social accounts and their verification requests

pub mod notification;
pub mod payment;
pub mod performance;
pub mod pricing;
pub mod settings;
pub mod social;
pub mod task;
pub mod transaction;
pub mod user;
pub mod wallet;
pub mod withdrawal;
