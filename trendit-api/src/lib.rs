//! # Trendit API Server Library
//!
//! HTTP surface of the Trendit marketplace: advertisers pay for social media tasks,
//! earners perform them for wallet rewards, and admins review both.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration from the environment
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Rate limiting and security headers
//! - `response`: Success envelope and pagination
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod response;
pub mod routes;
