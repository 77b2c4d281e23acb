//! Backend playback: process launch, transport control, auto-advance

pub mod advance;
pub mod backend;
pub mod controller;
pub mod status;

pub use advance::{AdvanceReport, AutoAdvance};
pub use backend::BackendConfig;
pub use controller::PlaybackController;
pub use status::{PlaybackStatus, SeekMode};
