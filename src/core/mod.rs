pub mod changes;
pub mod config;
pub mod error;
pub mod export;
pub mod git;
pub mod platform;
pub mod publish;
pub mod split;
pub mod template;

pub use error::{Error, ErrorCode, Result};
