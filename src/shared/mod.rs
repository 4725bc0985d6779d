//! Cross-cutting helpers: configuration and display formatting.

pub mod config;
pub mod fmt;
