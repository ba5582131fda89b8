//! Deterministic, pure logic shared by the cleaner.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! strings and return deterministic outputs suitable for tests.

pub mod jobs;
pub mod signatures;
pub mod text;
pub mod types;
