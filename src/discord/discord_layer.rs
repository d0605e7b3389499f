// Discord layer - commands and event handlers.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "counting/counting_events.rs"]
pub mod counting;

// Re-export command types for convenience
pub use commands::counting::{Data, Error};
