// Core counting module - the counting game itself.
// Same layout as the other core features: models, port, service.

pub mod counting_models;
pub mod counting_service;
pub mod counting_store;
pub mod expression;
pub mod milestones;
pub mod sequence_validator;
pub mod violations;

pub use counting_models::*;
pub use counting_service::{CountingError, CountingService, CountingSettings, MAX_LEADERBOARD_LIMIT};
pub use counting_store::{CountingStore, StoreError};
