//! Unit tests for the store port and in-memory adapter.
