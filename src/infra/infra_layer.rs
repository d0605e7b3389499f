// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "counting/mod.rs"]
pub mod counting;

#[path = "config/env_config.rs"]
pub mod config;
