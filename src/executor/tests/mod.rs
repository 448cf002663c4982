//! Tests for the executor
//!
//! Organized by feature area

mod helpers;

mod instrument_tests;
mod try_tests;
