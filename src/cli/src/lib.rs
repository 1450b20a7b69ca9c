//! nodeprov CLI - container import and node/profile configuration.

pub mod commands;
pub mod output;
pub mod prompt;
pub mod reload;
