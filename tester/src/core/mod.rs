//! Deterministic, pure logic shared by the tester.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod directive;
pub mod mode;
pub mod statement;
pub mod types;
