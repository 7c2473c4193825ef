//! Constraint compilation and parameter layout tests.

mod index_tests;
