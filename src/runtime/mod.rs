//! Runtime system
//!
//! Thread-backed coroutines.

pub mod coroutine;
