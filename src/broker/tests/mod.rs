//! Unit tests for the broker module.
