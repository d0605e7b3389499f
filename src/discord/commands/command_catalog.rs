// Discord commands module.
// Each feature gets its own command file.

pub mod counting;

// Bot presence management
pub mod presence;
