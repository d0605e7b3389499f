// Discord side of the counting game: turning service reports into
// reactions, announcements, timeouts and log entries.

pub mod counting_messages;
pub mod penalties;
pub mod submission_handler;
