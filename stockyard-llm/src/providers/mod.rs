//! Model provider implementations.

pub mod anthropic;
pub mod fallback;
