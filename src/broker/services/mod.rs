//! Application services for message transport.

mod broker;

pub use broker::{BrokerError, BrokerResult, MessageBroker};
