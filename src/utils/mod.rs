pub mod time;
pub mod token;

// Re-export time utilities
pub use time::{current_time, expiry_from, is_expired};

// Re-export token utilities
pub use token::{generate_pool_token, generate_unique_token, validate_pool_token, TOKEN_LENGTH};
