//! Shortcode generation and validation

use rand::{distr::Alphanumeric, Rng};

/// Length of generated shortcodes
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Allowed length range for user-supplied shortcodes
pub const MIN_CUSTOM_LEN: usize = 3;
pub const MAX_CUSTOM_LEN: usize = 20;

/// Source of candidate shortcodes
///
/// Implementations do not look at storage; the creation flow checks
/// uniqueness against a snapshot.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self, length: usize) -> String;
}

/// Uniform random codes over `[a-zA-Z0-9]`
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomGenerator;

impl CodeGenerator for RandomGenerator {
    fn generate(&self, length: usize) -> String {
        generate(length)
    }
}

/// Draws `length` characters uniformly from the 62-character alphanumeric alphabet.
pub fn generate(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

pub fn is_alphanumeric(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Custom shortcodes must be ASCII alphanumeric and 3-20 characters long.
pub fn is_valid_custom(code: &str) -> bool {
    (MIN_CUSTOM_LEN..=MAX_CUSTOM_LEN).contains(&code.len()) && is_alphanumeric(code)
}
