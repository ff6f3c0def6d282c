//! Unit tests for the backplane facade.
