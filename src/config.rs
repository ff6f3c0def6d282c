//! Backplane configuration.
//!
//! [`BackplaneConfig`] deserialises from camelCase JSON (or any serde
//! format). Durations are written as humantime strings such as `"30s"` or
//! `"7days"`. Sections other than the store location may be omitted and fall
//! back to their defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::keys::KeySpace;
use crate::store::ports::StoreEndpoint;

const SECS_PER_HOUR: u64 = 60 * 60;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Configuration shared by the backplane and its services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackplaneConfig {
    /// Store host name.
    pub host: String,
    /// Store port.
    pub port: u16,
    /// Prefix applied to every key and channel.
    pub prefix: String,
    /// Channel names, before prefixing.
    pub pubsub: PubSubChannels,
    /// Heartbeat and sweep timing.
    #[serde(default)]
    pub discovery: DiscoveryTiming,
    /// How long each kind of record is kept.
    #[serde(default)]
    pub retention: RetentionPolicy,
}

/// Publish/subscribe channel names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubSubChannels {
    /// Channel carrying message envelopes.
    pub message_channel: String,
    /// Channel carrying context sync events.
    pub context_channel: String,
    /// Channel carrying discovery events.
    pub discovery_channel: String,
}

/// Timing of the discovery heartbeat and staleness sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscoveryTiming {
    /// Period between heartbeat refreshes of a registered agent.
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
    /// Period between staleness sweeps.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Age of the last heartbeat after which an agent is evicted.
    #[serde(with = "humantime_serde")]
    pub staleness_bound: Duration,
}

/// Store TTLs per record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetentionPolicy {
    /// TTL of agent records, refreshed by every heartbeat.
    #[serde(with = "humantime_serde")]
    pub agents: Duration,
    /// TTL of persisted message envelopes.
    #[serde(with = "humantime_serde")]
    pub messages: Duration,
    /// TTL of context entry lists and branch records.
    #[serde(with = "humantime_serde")]
    pub contexts: Duration,
}

impl Default for BackplaneConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 6379,
            prefix: "backplane:".to_owned(),
            pubsub: PubSubChannels::default(),
            discovery: DiscoveryTiming::default(),
            retention: RetentionPolicy::default(),
        }
    }
}

impl Default for PubSubChannels {
    fn default() -> Self {
        Self {
            message_channel: "messages".to_owned(),
            context_channel: "context".to_owned(),
            discovery_channel: "discovery".to_owned(),
        }
    }
}

impl Default for DiscoveryTiming {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(60),
            staleness_bound: Duration::from_secs(120),
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            agents: Duration::from_secs(SECS_PER_DAY),
            messages: Duration::from_secs(SECS_PER_DAY),
            contexts: Duration::from_secs(7 * SECS_PER_DAY),
        }
    }
}

impl BackplaneConfig {
    /// Replaces the key and channel prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Replaces the store location.
    #[must_use]
    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Replaces the discovery timing.
    #[must_use]
    pub const fn with_discovery_timing(mut self, timing: DiscoveryTiming) -> Self {
        self.discovery = timing;
        self
    }

    /// Returns the store endpoint.
    #[must_use]
    pub fn endpoint(&self) -> StoreEndpoint {
        StoreEndpoint::new(self.host.clone(), self.port)
    }

    /// Returns the key space rooted at the configured prefix.
    #[must_use]
    pub fn keys(&self) -> KeySpace {
        KeySpace::new(self.prefix.clone())
    }

    /// Returns the prefixed message channel.
    #[must_use]
    pub fn message_channel(&self) -> String {
        self.keys().channel(&self.pubsub.message_channel)
    }

    /// Returns the prefixed context channel.
    #[must_use]
    pub fn context_channel(&self) -> String {
        self.keys().channel(&self.pubsub.context_channel)
    }

    /// Returns the prefixed discovery channel.
    #[must_use]
    pub fn discovery_channel(&self) -> String {
        self.keys().channel(&self.pubsub.discovery_channel)
    }

    /// Checks the configuration for values the services cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        let channels = [
            ("messageChannel", &self.pubsub.message_channel),
            ("contextChannel", &self.pubsub.context_channel),
            ("discoveryChannel", &self.pubsub.discovery_channel),
        ];
        for (index, (field, name)) in channels.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyChannel { field: *field });
            }
            let repeated = channels
                .iter()
                .skip(index + 1)
                .any(|(_, other)| other == name);
            if repeated {
                return Err(ConfigError::DuplicateChannel {
                    name: name.to_string(),
                });
            }
        }
        let timing = &self.discovery;
        let intervals = [
            ("heartbeatInterval", timing.heartbeat_interval),
            ("sweepInterval", timing.sweep_interval),
            ("stalenessBound", timing.staleness_bound),
        ];
        if let Some((field, _)) = intervals.iter().find(|(_, period)| period.is_zero()) {
            return Err(ConfigError::ZeroInterval { field: *field });
        }
        if timing.staleness_bound <= timing.heartbeat_interval {
            return Err(ConfigError::StalenessTooShort {
                staleness_bound: timing.staleness_bound,
                heartbeat_interval: timing.heartbeat_interval,
            });
        }
        Ok(())
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The key prefix is empty, so records would collide across tenants.
    #[error("prefix must not be empty")]
    EmptyPrefix,

    /// A channel name is blank.
    #[error("channel name {field} must not be empty")]
    EmptyChannel {
        /// Name of the offending field.
        field: &'static str,
    },

    /// Two channels share a name.
    #[error("channel name '{name}' is used more than once")]
    DuplicateChannel {
        /// The repeated channel name.
        name: String,
    },

    /// A discovery period is zero.
    #[error("{field} must be greater than zero")]
    ZeroInterval {
        /// Name of the offending field.
        field: &'static str,
    },

    /// Agents would be evicted between two of their own heartbeats.
    #[error(
        "staleness bound {staleness_bound:?} must exceed heartbeat interval {heartbeat_interval:?}"
    )]
    StalenessTooShort {
        /// Configured staleness bound.
        staleness_bound: Duration,
        /// Configured heartbeat interval.
        heartbeat_interval: Duration,
    },
}
