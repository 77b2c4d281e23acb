//! Test helper modules for ncplay integration tests
//!
//! - FakeBackend: scripted backend on the far end of an in-memory stream
//! - property_backend: responder that behaves like a property store

#![allow(dead_code)]

pub mod fake_backend;

pub use fake_backend::{property_backend, track, FakeBackend, Reply};
