//! # ncplay Common Library
//!
//! Shared code for the ncplay player controller:
//! - Track and queue item models
//! - Queue navigation modes
//! - Bootstrap path resolution (config file, control endpoint, state file)
//! - Clock formatting for status output

pub mod config;
pub mod error;
pub mod human_time;
pub mod mode;
pub mod track;

pub use error::{Error, Result};
pub use mode::PlayMode;
pub use track::{Album, Artist, Quality, QueueItem, Track};
