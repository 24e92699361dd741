pub mod core;
pub mod utils;

// Re-export everything from core for ergonomic library use
// Users can write `bit::config` instead of `bit::core::config`
pub use self::core::*;
pub use self::utils::*;
