//! Deterministic, pure logic shared by the action engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests; randomness and
//! time are supplied by callers.

pub mod definition;
pub mod errors;
pub mod polling;
pub mod progress;
pub mod render;
