//! Unit tests for the context module.

mod domain_tests;
