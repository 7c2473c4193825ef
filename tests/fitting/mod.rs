//! End-to-end batch fitting tests.

mod batch_tests;
mod config_tests;
mod recovery_tests;
