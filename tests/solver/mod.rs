//! Model Jacobian and bounded solver tests.

mod jacobian_tests;
