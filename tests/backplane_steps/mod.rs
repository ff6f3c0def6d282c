//! Step definitions for backplane scenarios.

mod given;
mod then;
mod when;
pub mod world;
