// Implementations of the counting store.

pub mod in_memory;
pub mod json_store;

// Re-export for convenience
pub use in_memory::InMemoryCountingStore;
pub use json_store::JsonCountingStore;
