//! One-time code generation

use rand::Rng;

/// Smallest code that can be issued (six digits, no leading zero)
pub const CODE_MIN: u32 = 100_000;

/// Largest code that can be issued
pub const CODE_MAX: u32 = 999_999;

/// Generate a six-digit numeric login code
///
/// Uniform over `[100000, 999999]`. The thread-local RNG is sufficient: a
/// code is short-lived, single-use and only valid for one identity.
pub fn generate_code() -> String {
    let value = rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX);
    value.to_string()
}
