// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "counting/mod.rs"]
pub mod counting;
