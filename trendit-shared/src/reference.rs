//! Random identifiers handed to users and gateways
//!
//! - Task keys: 20 base62 characters
//! - Payment references: `pay-{unix seconds}-{12 base62}`
//! - Withdrawal references: `wdr-{unix seconds}-{12 base62}`
//!
//! References only use characters both Paystack and Flutterwave accept (`[A-Za-z0-9-]`).

use chrono::Utc;
use rand::Rng;

/// Length of a task key
pub const TASK_KEY_LENGTH: usize = 20;

const REFERENCE_RANDOM_LENGTH: usize = 12;

fn random_base62(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

fn prefixed(prefix: &str) -> String {
    format!(
        "{}-{}-{}",
        prefix,
        Utc::now().timestamp(),
        random_base62(REFERENCE_RANDOM_LENGTH)
    )
}

/// Generates a public task key
pub fn task_key() -> String {
    random_base62(TASK_KEY_LENGTH)
}

/// Generates a unique payment reference
pub fn payment_reference() -> String {
    prefixed("pay")
}

/// Generates a unique withdrawal reference
pub fn withdrawal_reference() -> String {
    prefixed("wdr")
}

/// Ledger reference for refunding a declined task's fee
pub fn task_refund_reference(task_key: &str) -> String {
    format!("refund-{}", task_key)
}

/// Ledger reference for crediting a performance reward
pub fn reward_reference(performance_id: uuid::Uuid) -> String {
    format!("reward-{}", performance_id)
}
