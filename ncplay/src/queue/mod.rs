//! Play queue: contents, position, navigation mode and persistence

pub mod manager;
pub mod state;

pub use manager::QueueManager;
pub use state::{PlayerState, StateStore};
