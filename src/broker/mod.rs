//! Message broker.
//!
//! Envelopes are persisted under their id for later lookup and published on
//! the message channel. Every envelope received from the channel is handed to
//! every locally subscribed handler; handlers decide whether the envelope is
//! meant for them.

pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
